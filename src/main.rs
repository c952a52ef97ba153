//! `fl`: fault trees, minimal cut sets and mission probability for interface
//! models.
//!
//! ```text
//! fl analyze model.yaml --top 'interface:IF1/short' --profile mission.yaml
//! fl cut-sets model.yaml --top 'module:M1' --max-order 2
//! fl tree model.yaml
//! fl validate model.yaml --output json
//! ```

use clap::Parser;

mod cli;
use cli::Cli;

fn main() -> anyhow::Result<()> {
    Cli::parse().run()
}
