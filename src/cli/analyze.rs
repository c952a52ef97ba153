use std::path::PathBuf;

use clap::Parser;
use faultline::{
    AnalysisConfig, AnalysisError, AnalysisReport, TaskProfile, TopEvent, storage,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::instrument;

use super::{
    ModelArgs, OutputFormat, probability,
    terminal::{Colorize, is_narrow},
};

#[derive(Debug, Parser)]
pub struct Analyze {
    #[command(flatten)]
    model: ModelArgs,

    /// Task profile (YAML or JSON)
    ///
    /// Defaults to the model's profile, or a single phase of unit duration in
    /// which every failure mode is active.
    #[arg(short, long, value_name = "PATH")]
    profile: Option<PathBuf>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Analyze {
    #[instrument(skip(config))]
    pub fn run(self, config: &AnalysisConfig) -> anyhow::Result<()> {
        let model = self.model.load()?;
        let top_events = model.require_top_events()?;
        let profile = match &self.profile {
            Some(path) => storage::load_profile(path)?,
            None => match model.profile.clone() {
                Some(profile) => profile,
                None => TaskProfile::single_phase(1.0)?,
            },
        };
        let engine = self.model.engine(config)?;

        let results = if let [top] = top_events {
            vec![engine.analyze(&model.snapshot, top, &profile)]
        } else {
            let progress = ProgressBar::new(u64::try_from(top_events.len()).unwrap_or(u64::MAX));
            progress.set_style(ProgressStyle::default_bar());
            let results = engine.analyze_batch_with(&model.snapshot, top_events, &profile, |_| {
                progress.inc(1);
            });
            progress.finish_and_clear();
            results
        };

        match self.output {
            OutputFormat::Table => {
                for (top, result) in top_events.iter().zip(&results) {
                    match result {
                        Ok(report) => output_table(report, &profile),
                        Err(e) => output_error(top, e),
                    }
                }
            }
            OutputFormat::Json => output_json(top_events, &results)?,
        }

        if results.iter().any(Result::is_err) {
            std::process::exit(2);
        }

        Ok(())
    }
}

fn output_table(report: &AnalysisReport, profile: &TaskProfile) {
    println!(
        "{} {} ({})",
        "Top event:".info(),
        report.top_event,
        report.method
    );
    println!(
        "{}",
        format!(
            "  run {} at {}, model {}",
            report.run_id,
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            &report.snapshot_fingerprint[..12.min(report.snapshot_fingerprint.len())]
        )
        .dim()
    );

    println!("\nPhases:");
    for phase in &report.per_phase_probability {
        println!(
            "  {:<16} {:>10} {}  {}",
            phase.phase,
            phase.duration,
            profile.time_unit(),
            probability(phase.probability)
        );
    }
    println!(
        "  {:<16} {:>10} {}  {}",
        "mission",
        profile.total_duration(),
        profile.time_unit(),
        probability(report.mission_probability).success()
    );

    let orders: Vec<String> = report
        .cut_sets_by_order
        .iter()
        .map(|(order, count)| format!("{count} of order {order}"))
        .collect();
    println!(
        "\nMinimal cut sets: {} ({})",
        report.minimal_cut_sets.len(),
        orders.join(", ")
    );
    for (i, cut_set) in report.minimal_cut_sets.iter().enumerate() {
        let members: Vec<&str> = cut_set.failure_modes.iter().map(|f| f.as_str()).collect();
        println!(
            "  {:>3}. {{{}}}  {}",
            i + 1,
            members.join(", "),
            probability(cut_set.probability)
        );
    }
    if !report.single_point_failures.is_empty() {
        let spf: Vec<&str> = report
            .single_point_failures
            .iter()
            .map(|f| f.as_str())
            .collect();
        println!(
            "{}",
            format!("  Single-point failures: {}", spf.join(", ")).warning()
        );
    }

    println!("\nImportance (by risk reduction):");
    let narrow = is_narrow();
    for entry in &report.importance_ranking {
        if narrow {
            println!(
                "  {:<16} {}",
                entry.failure_mode.as_str(),
                probability(entry.risk_reduction)
            );
        } else {
            println!(
                "  {:<16} {:<32} rr {}  birnbaum {}  structural {:.2}",
                entry.failure_mode.as_str(),
                entry.label,
                probability(entry.risk_reduction),
                probability(entry.birnbaum),
                entry.structural
            );
        }
    }

    if !report.warnings.is_empty() {
        println!("\n{}", format!("Warnings ({}):", report.warnings.len()).warning());
        for warning in &report.warnings {
            println!("  ⚠️  {warning}");
        }
    }
    println!();
}

fn output_error(top: &TopEvent, error: &AnalysisError) {
    eprintln!(
        "{}",
        format!("✗ {top}: analysis failed: {error}").warning()
    );
}

fn output_json(
    top_events: &[TopEvent],
    results: &[Result<AnalysisReport, AnalysisError>],
) -> anyhow::Result<()> {
    let output: Vec<serde_json::Value> = top_events
        .iter()
        .zip(results)
        .map(|(top, result)| match result {
            Ok(report) => serde_json::to_value(report),
            Err(e) => Ok(json!({
                "top_event": top,
                "error": e.to_string(),
                "entity": e.entity(),
            })),
        })
        .collect::<Result<_, _>>()?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
