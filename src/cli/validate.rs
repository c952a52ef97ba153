use std::path::PathBuf;

use clap::Parser;
use faultline::{AnalysisConfig, EventRef, storage};
use serde_json::json;
use tracing::instrument;

use super::{OutputFormat, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Check a model for errors without analysing it")]
pub struct Validate {
    #[command(flatten)]
    model: super::ModelArgs,

    /// Task profile to check against the model (YAML or JSON)
    #[arg(short, long, value_name = "PATH")]
    profile: Option<PathBuf>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress all output except errors
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Default)]
struct ValidationResult {
    summary: Option<String>,
    model_issues: Vec<String>,
    cycles: Vec<String>,
    profile_issues: Vec<String>,
    top_event_issues: Vec<(String, String)>,
    warnings: usize,
}

impl ValidationResult {
    fn count_issues(&self) -> usize {
        self.model_issues.len()
            + self.cycles.len()
            + self.profile_issues.len()
            + self.top_event_issues.len()
    }
}

impl Validate {
    #[instrument(skip(config))]
    pub fn run(self, config: &AnalysisConfig) -> anyhow::Result<()> {
        let mut result = ValidationResult::default();
        self.check(config, &mut result)?;

        if !self.quiet {
            match self.output {
                OutputFormat::Table => Self::output_table(&result),
                OutputFormat::Json => Self::output_json(&result)?,
            }
        }

        if result.count_issues() > 0 {
            std::process::exit(2);
        }

        Ok(())
    }

    fn check(&self, config: &AnalysisConfig, result: &mut ValidationResult) -> anyhow::Result<()> {
        let document = storage::load_document(&self.model.model)?;
        let top_events = if self.model.top.is_empty() {
            document.top_events.clone()
        } else {
            self.model.top.clone()
        };
        let embedded_profile = document.profile.clone();

        let snapshot = match document.into_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                result.model_issues.push(e.to_string());
                return Ok(());
            }
        };
        result.summary = Some(format!(
            "{} modules, {} interfaces, {} failure modes, {} cause declarations",
            snapshot.structure().modules().len(),
            snapshot.structure().interfaces().len(),
            snapshot.failure_modes().len(),
            snapshot.causal().declarations().count()
        ));

        result.cycles = snapshot
            .causal()
            .cycles()
            .iter()
            .map(|cycle| {
                cycle
                    .iter()
                    .map(EventRef::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect();

        let profile = match &self.profile {
            Some(path) => match storage::load_profile(path) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    result.profile_issues.push(e.to_string());
                    None
                }
            },
            None => embedded_profile,
        };
        if let Some(profile) = &profile {
            if let Err(e) = snapshot.validate_profile(profile) {
                result.profile_issues.push(e.to_string());
            }
        }

        let engine = self.model.engine(config)?;
        for top in &top_events {
            match engine.synthesize(&snapshot, top) {
                Ok(synthesis) => result.warnings += synthesis.warnings.len(),
                Err(e) => result.top_event_issues.push((top.to_string(), e.to_string())),
            }
        }

        Ok(())
    }

    fn output_table(result: &ValidationResult) {
        if let Some(summary) = &result.summary {
            println!("✓ Model:       {summary}");
        }
        for issue in &result.model_issues {
            println!("{}", format!("✗ Model:       {issue}").warning());
        }

        if result.cycles.is_empty() {
            println!("✓ Causality:   No cycles");
        } else {
            println!(
                "{}",
                format!("✗ Causality:   {} cycles found", result.cycles.len()).warning()
            );
            for cycle in &result.cycles {
                println!("    cycle through {cycle}");
            }
        }

        if result.profile_issues.is_empty() {
            println!("✓ Profile:     OK");
        } else {
            for issue in &result.profile_issues {
                println!("{}", format!("✗ Profile:     {issue}").warning());
            }
        }

        if result.top_event_issues.is_empty() {
            println!("✓ Top events:  All synthesize");
        } else {
            for (top, issue) in &result.top_event_issues {
                println!("{}", format!("✗ Top events:  {top}: {issue}").warning());
            }
        }
        if result.warnings > 0 {
            println!(
                "{}",
                format!("  {} elements excluded (see `fl tree`)", result.warnings).dim()
            );
        }

        let total_issues = result.count_issues();
        if total_issues == 0 {
            println!("\n{}", "Model is valid (0 issues)".success());
        } else {
            println!("\n{}", format!("Summary: {total_issues} issues found").warning());
        }
    }

    fn output_json(result: &ValidationResult) -> anyhow::Result<()> {
        let top_events: Vec<_> = result
            .top_event_issues
            .iter()
            .map(|(top, issue)| json!({ "top_event": top, "error": issue }))
            .collect();
        let total_issues = result.count_issues();

        let output = json!({
            "status": if total_issues == 0 { "valid" } else { "issues_found" },
            "issues": {
                "model": result.model_issues,
                "cycles": result.cycles,
                "profile": result.profile_issues,
                "top_events": top_events,
            },
            "summary": {
                "total_issues": total_issues,
                "excluded_elements": result.warnings,
            }
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
