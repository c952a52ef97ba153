use clap::Parser;
use faultline::{
    AnalysisConfig, TopEvent,
    analysis::{Qualitative, Synthesis, minimal_cut_sets},
};
use serde_json::json;
use tracing::instrument;

use super::{ModelArgs, OutputFormat, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct CutSets {
    #[command(flatten)]
    model: ModelArgs,

    /// Only list cut sets up to this order
    #[arg(long, value_name = "N")]
    max_order: Option<usize>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl CutSets {
    #[instrument(skip(config))]
    pub fn run(self, config: &AnalysisConfig) -> anyhow::Result<()> {
        let model = self.model.load()?;
        let engine = self.model.engine(config)?;
        let mut failed = false;
        let mut json_output = Vec::new();

        for top in model.require_top_events()? {
            let result = engine.synthesize(&model.snapshot, top).and_then(|synthesis| {
                let qualitative =
                    minimal_cut_sets(&synthesis.tree, engine.limits(), engine.cancellation())?;
                Ok((synthesis, qualitative))
            });

            match (result, self.output) {
                (Ok((synthesis, qualitative)), OutputFormat::Table) => {
                    self.output_table(top, &synthesis, &qualitative);
                }
                (Ok((synthesis, qualitative)), OutputFormat::Json) => {
                    json_output.push(self.to_json(top, &synthesis, &qualitative));
                }
                (Err(e), OutputFormat::Table) => {
                    failed = true;
                    eprintln!("{}", format!("✗ {top}: {e}").warning());
                }
                (Err(e), OutputFormat::Json) => {
                    failed = true;
                    json_output.push(json!({
                        "top_event": top,
                        "error": e.to_string(),
                        "entity": e.entity(),
                    }));
                }
            }
        }

        if matches!(self.output, OutputFormat::Json) {
            println!("{}", serde_json::to_string_pretty(&json_output)?);
        }

        if failed {
            std::process::exit(2);
        }

        Ok(())
    }

    fn within_order(&self, order: usize) -> bool {
        self.max_order.is_none_or(|max| order <= max)
    }

    fn output_table(&self, top: &TopEvent, synthesis: &Synthesis, qualitative: &Qualitative) {
        let tree = &synthesis.tree;
        println!(
            "{} {top}: {} minimal cut sets",
            "Top event".info(),
            qualitative.cut_sets.len()
        );

        for cut_set in qualitative
            .cut_sets
            .iter()
            .filter(|c| self.within_order(c.order()))
        {
            let members: Vec<String> = cut_set
                .events()
                .iter()
                .map(|&e| {
                    let event = tree.event(e);
                    format!("{} {}", event.failure_mode, format!("({})", event.label).dim())
                })
                .collect();
            println!("  [{}] {}", cut_set.order(), members.join(" + "));
        }

        for warning in synthesis.warnings.iter().chain(&qualitative.warnings) {
            println!("{}", format!("  ⚠️  {warning}").warning());
        }
        println!();
    }

    fn to_json(
        &self,
        top: &TopEvent,
        synthesis: &Synthesis,
        qualitative: &Qualitative,
    ) -> serde_json::Value {
        let tree = &synthesis.tree;
        let cut_sets: Vec<Vec<&str>> = qualitative
            .cut_sets
            .iter()
            .filter(|c| self.within_order(c.order()))
            .map(|c| {
                c.events()
                    .iter()
                    .map(|&e| tree.event(e).failure_mode.as_str())
                    .collect()
            })
            .collect();
        let single_point_failures: Vec<&str> = qualitative
            .single_point_failures()
            .map(|e| tree.event(e).failure_mode.as_str())
            .collect();
        let warnings: Vec<_> = synthesis
            .warnings
            .iter()
            .chain(&qualitative.warnings)
            .collect();

        json!({
            "top_event": top,
            "minimal_cut_sets": cut_sets,
            "cut_sets_by_order": qualitative.by_order(),
            "single_point_failures": single_point_failures,
            "warnings": warnings,
        })
    }
}
