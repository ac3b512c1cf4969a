mod cli;

use dopc::configuration::Scope;
use dopc::node::Node;
use dopc::value::Value;
use dopc::{Plan, Validate};
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("DOPC_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Validate(validate_cli) => validate(validate_cli),
        cli::Command::Nodes(nodes_cli) => nodes(nodes_cli),
        cli::Command::Lookup(lookup_cli) => lookup(lookup_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn validate(cli: cli::ValidateCommand) -> anyhow::Result<()> {
    let mut failed = 0;
    for (source, plan) in load(&cli.input)? {
        match plan.validate() {
            Ok(()) => println!("{source}: valid"),
            Err(diagnostics) => {
                failed += 1;
                println!("{source}: {} issue(s)", diagnostics.len());
                for issue in diagnostics.issues() {
                    let chain = anyhow::Error::new(issue.clone());
                    println!("  {chain:#}");
                }
            }
        }
    }

    anyhow::ensure!(failed == 0, "{failed} plan(s) failed to validate");
    Ok(())
}

#[derive(serde::Serialize)]
struct NodeSummary<'a> {
    name: &'a str,
    fqdn: &'a str,
    infrastructure: &'a str,
}

fn summarize(node: &Node) -> dopc::error::Result<NodeSummary<'_>> {
    Ok(NodeSummary {
        name: node.name(),
        fqdn: node.fqdn()?,
        infrastructure: node.infrastructure()?.name(),
    })
}

pub fn nodes(cli: cli::NodesCommand) -> anyhow::Result<()> {
    let plans = load(&cli.input)?;
    anyhow::ensure!(plans.len() == 1, "nodes lists the nodes of exactly one plan");

    let plan = &plans[0].1;
    let nodes = plan
        .nodes()?
        .iter()
        .map(summarize)
        .collect::<dopc::error::Result<Vec<_>>>()?;

    output(&cli.output, &nodes)
}

pub fn lookup(cli: cli::LookupCommand) -> anyhow::Result<()> {
    let mut cache = IndexMap::new();
    for (source, plan) in load(&cli.input)? {
        let id = plan.name().map(str::to_string).unwrap_or(source);
        cache.insert(id, plan);
    }

    let mut scope: Scope = cli.scope.into_iter().collect();
    scope
        .entry("::clientcert".to_string())
        .or_insert_with(|| cli.node.clone());

    let lookup = dopc::backend::PlanLookup::new(cache);
    let value = lookup
        .lookup(&cli.node, &cli.key, cli.sources.as_slice(), &scope)
        .ok_or_else(|| anyhow::anyhow!("no value for '{}' found for node {}", cli.key, cli.node))?;

    output(&cli.output, &value)
}

/// Plans of all input files, or of stdin when no file is given
fn load(input: &cli::InputArgs) -> anyhow::Result<Vec<(String, Arc<Plan>)>> {
    if input.files.is_empty() {
        let stdin = std::io::read_to_string(std::io::stdin())?;
        let raw = dopc::document::load_str(&stdin, dopc::document::Format::Yaml)?;
        return Ok(vec![("<stdin>".to_string(), Arc::new(Plan::new(raw)))]);
    }

    input
        .files
        .iter()
        .map(|file_path| -> anyhow::Result<(String, Arc<Plan>)> {
            let raw = load_file(file_path)?;
            Ok((file_path.display().to_string(), Arc::new(Plan::new(raw))))
        })
        .collect()
}

fn load_file(file_path: &Path) -> anyhow::Result<Value> {
    use anyhow::Context;
    dopc::document::load_file(file_path)
        .with_context(|| format!("Failed to load {}", file_path.display()))
}

fn output<T: serde::Serialize + ?Sized>(output: &cli::OutputArgs, value: &T) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}
