use std::path::{Path, PathBuf};

mod analyze;
mod cut_sets;
mod terminal;
mod tree;
mod validate;

use analyze::Analyze;
use clap::ArgAction;
use cut_sets::CutSets;
use faultline::{
    AnalysisConfig, Engine, LoadError, SystemSnapshot, TaskProfile, TopEvent, storage,
};
use tracing::instrument;
use tree::Tree;
use validate::Validate;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Analysis configuration file (TOML); defaults apply when omitted
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        self.command.run(self.config.as_deref())
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Synthesize, reduce and quantify the fault tree of each top event
    Analyze(Analyze),

    /// List the minimal cut sets of each top event
    CutSets(CutSets),

    /// Print the synthesized fault tree of each top event
    Tree(Tree),

    /// Check a model for errors without analysing it
    ///
    /// Reports invalid references, causal cycles, task profile problems and
    /// top events that cannot be synthesized.
    Validate(Validate),

    /// Show or create analysis configuration
    Config(Config),
}

impl Command {
    fn run(self, config: Option<&Path>) -> anyhow::Result<()> {
        match self {
            Self::Analyze(command) => command.run(&load_config(config)?)?,
            Self::CutSets(command) => command.run(&load_config(config)?)?,
            Self::Tree(command) => command.run(&load_config(config)?)?,
            Self::Validate(command) => command.run(&load_config(config)?)?,
            Self::Config(command) => command.run(config)?,
        }
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AnalysisConfig> {
    path.map_or_else(
        || Ok(AnalysisConfig::default()),
        |path| AnalysisConfig::load(path).map_err(|e| anyhow::anyhow!("{e}")),
    )
}

/// Output format for commands with machine-readable output.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// The model and what to analyse in it.
#[derive(Debug, clap::Args)]
struct ModelArgs {
    /// Model file (YAML or JSON)
    model: PathBuf,

    /// Failure condition to analyse, e.g. 'interface:IF1/short'
    ///
    /// May be given several times. Defaults to the model's `top_events`.
    #[arg(short, long = "top", value_name = "KIND:ID[/CONDITION]")]
    top: Vec<TopEvent>,

    /// State context for trigger conditions (YAML or JSON)
    #[arg(long, value_name = "PATH")]
    context: Option<PathBuf>,
}

struct LoadedModel {
    snapshot: SystemSnapshot,
    top_events: Vec<TopEvent>,
    profile: Option<TaskProfile>,
}

impl ModelArgs {
    #[instrument(skip(self), fields(model = %self.model.display()))]
    fn load(&self) -> anyhow::Result<LoadedModel> {
        let document = storage::load_document(&self.model)?;
        let top_events = if self.top.is_empty() {
            document.top_events.clone()
        } else {
            self.top.clone()
        };
        let profile = document.profile.clone();
        let snapshot = document
            .into_snapshot()
            .map_err(|source| LoadError::Model {
                path: self.model.clone(),
                source,
            })?;

        Ok(LoadedModel {
            snapshot,
            top_events,
            profile,
        })
    }

    fn engine(&self, config: &AnalysisConfig) -> anyhow::Result<Engine> {
        let engine = Engine::new(config.clone());
        Ok(match &self.context {
            Some(path) => engine.with_context(storage::load_context(path)?),
            None => engine,
        })
    }
}

impl LoadedModel {
    fn require_top_events(&self) -> anyhow::Result<&[TopEvent]> {
        if self.top_events.is_empty() {
            anyhow::bail!("no top event given: pass --top or list `top_events` in the model");
        }
        Ok(&self.top_events)
    }
}

fn probability(p: f64) -> String {
    format!("{p:.4e}")
}

#[derive(Debug, clap::Parser)]
pub struct Config {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Debug, clap::Parser)]
enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Where to write the file
        path: PathBuf,
    },
}

impl Config {
    #[instrument]
    fn run(self, config_path: Option<&Path>) -> anyhow::Result<()> {
        use terminal::Colorize;

        match self.command {
            ConfigCommand::Show => {
                let config = load_config(config_path)?;

                match config_path {
                    Some(path) => println!("Configuration ({}):", path.display()),
                    None => println!("Configuration {}:", "(defaults)".dim()),
                }
                println!("  max_cut_sets: {}", config.max_cut_sets());
                println!(
                    "  exact_combination_limit: {}",
                    config.exact_combination_limit()
                );
                println!(
                    "  trigger_timeout_ms: {}",
                    config.trigger_timeout().as_millis()
                );
                println!("  max_tree_depth: {}", config.max_tree_depth());
                println!("  max_tree_nodes: {}", config.max_tree_nodes());
                println!(
                    "  infer_module_causes: {} ({})",
                    config.infer_module_causes,
                    if config.infer_module_causes {
                        "modules without declared causes expand to their interfaces".dim()
                    } else {
                        "explicit causes only".dim()
                    }
                );
            }
            ConfigCommand::Init { path } => {
                if path.exists() {
                    anyhow::bail!("{} already exists", path.display());
                }
                AnalysisConfig::default()
                    .save(&path)
                    .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
                println!(
                    "{}",
                    format!("✅ Wrote default configuration to {}", path.display()).success()
                );
            }
        }

        Ok(())
    }
}
