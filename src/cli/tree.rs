use clap::Parser;
use faultline::AnalysisConfig;
use tracing::instrument;

use super::{ModelArgs, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct Tree {
    #[command(flatten)]
    model: ModelArgs,

    /// Only print tree statistics
    #[arg(long)]
    summary: bool,
}

impl Tree {
    #[instrument(skip(config))]
    pub fn run(self, config: &AnalysisConfig) -> anyhow::Result<()> {
        let model = self.model.load()?;
        let engine = self.model.engine(config)?;
        let mut failed = false;

        for top in model.require_top_events()? {
            let synthesis = match engine.synthesize(&model.snapshot, top) {
                Ok(synthesis) => synthesis,
                Err(e) => {
                    failed = true;
                    eprintln!("{}", format!("✗ {top}: {e}").warning());
                    continue;
                }
            };
            let tree = &synthesis.tree;

            if !self.summary {
                print!("{tree}");
            }
            println!(
                "{}",
                format!(
                    "{top}: {} gates, {} basic events ({} leaves), depth {}",
                    tree.gate_count(),
                    tree.events().len(),
                    tree.leaf_count(),
                    tree.depth()
                )
                .dim()
            );
            for warning in &synthesis.warnings {
                println!("{}", format!("⚠️  {warning}").warning());
            }
            println!();
        }

        if failed {
            std::process::exit(2);
        }

        Ok(())
    }
}
