//! dopc cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; dopc ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate plans and report every issue
    ///
    /// Reads a yaml plan from stdin unless files are given (via --input-file)
    Validate(ValidateCommand),

    /// List the nodes of a plan, series inflated
    Nodes(NodesCommand),

    /// Look up a configuration value for a node
    ///
    /// The plan deploying the node is searched among the given plans. Sources are tried in order,
    /// the first one with a value for the key wins.
    Lookup(LookupCommand),
}

#[derive(Parser, Debug)]
pub struct ValidateCommand {
    #[clap(flatten)]
    pub input: InputArgs,
}

#[derive(Parser, Debug)]
pub struct NodesCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct LookupCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Name of the node, also available as `%{::clientcert}` in sources
    #[clap(short = 'n', long = "node")]
    pub node: String,

    /// Key to look up
    #[clap(short = 'k', long = "key")]
    pub key: String,

    /// Data source, e.g. `nodes/%{::clientcert}`
    #[clap(short = 's', long = "source", required(true))]
    pub sources: Vec<String>,

    /// Additional interpolation variable as NAME=VALUE
    #[clap(long = "scope", value_parser = parse_scope_variable)]
    pub scope: Vec<(String, String)>,
}

fn parse_scope_variable(variable: &str) -> Result<(String, String), String> {
    variable
        .split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("'{variable}' is not of the form NAME=VALUE"))
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Load a plan file (yaml, json or hcl)
    #[clap(short = 'f', long = "input-file")]
    pub files: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
