use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::ENV_CONFIG;

#[derive(Parser)]
#[command(name = "filterc")]
#[command(version, about = "Compile filter bodies into parameterized SQL predicates", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to filter configuration file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,
}

/// Parse a `key=value` request parameter
fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!(
            "Invalid parameter '{}'. Expected key=value, e.g. author[only][]=User/1",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Compile a filter body and print the predicate with its bind values
    Compile {
        /// Filter body as JSON (reads stdin when no body source is given)
        #[arg(long, conflicts_with_all = ["body_file", "param"])]
        body: Option<String>,

        /// Read the filter body from a JSON file
        #[arg(long, conflicts_with = "param")]
        body_file: Option<PathBuf>,

        /// Request parameter in bracket notation (repeatable)
        #[arg(long = "param", short = 'P', value_parser = parse_param)]
        param: Vec<(String, String)>,

        /// Join top-level filters with OR instead of the configured default
        #[arg(long)]
        any: bool,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// List configured filters
    Filters,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig { config: cli.config };
    (config, cli.command)
}
