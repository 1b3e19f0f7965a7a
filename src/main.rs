//! flowcheck CLI - information-flow verifier for recipes

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use flowcheck::{FixSuggestion, FlowError, FlowGraph, Validator};

#[derive(Parser)]
#[command(name = "flowcheck")]
#[command(about = "flowcheck - information-flow verifier for particle composition graphs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every check declared in a recipe
    Validate {
        /// Path to recipe YAML file
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Log graph construction and path enumeration
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the flow graph built from a recipe
    Graph {
        /// Path to recipe YAML file
        file: PathBuf,

        /// Log graph construction
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Commands::Validate { verbose, .. } | Commands::Graph { verbose, .. } => *verbose,
    };
    init_tracing(verbose);

    let result = match cli.command {
        Commands::Validate { file, format, .. } => validate_recipe(&file, format),
        Commands::Graph { file, .. } => print_graph(&file).map(|()| true),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            if let Some(suggestion) = e.downcast_ref::<FlowError>().and_then(|e| e.fix_suggestion()) {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

/// `-v` forces debug; otherwise `RUST_LOG`, defaulting to warn. Logs go to
/// stderr so JSON output stays clean.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_graph(file: &Path) -> Result<FlowGraph> {
    FlowGraph::from_file(file).with_context(|| format!("Failed to load recipe {:?}", file))
}

/// Returns whether the recipe is valid.
fn validate_recipe(file: &Path, format: OutputFormat) -> Result<bool> {
    let graph = load_graph(file)?;
    let result = Validator::new(&graph).validate();

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "is_valid": result.is_valid(),
                "failures": result.failures,
                "node_count": result.node_count,
                "edge_count": result.edge_count,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            if result.is_valid() {
                println!("{} Recipe '{}' is valid", "✓".green(), file.display());
            } else {
                println!(
                    "{} Recipe '{}' failed {} check path(s)",
                    "✗".red(),
                    file.display(),
                    result.failures.len()
                );
                for failure in &result.failures {
                    println!("  {} {}", "-".red(), failure);
                }
            }
            println!("  Nodes: {}", result.node_count);
            println!("  Edges: {}", result.edge_count);
        }
    }

    Ok(result.is_valid())
}

fn print_graph(file: &Path) -> Result<()> {
    let graph = load_graph(file)?;
    print!("{graph}");

    let connections = graph.connections_as_strings();
    if !connections.is_empty() {
        println!("Connections:");
        for connection in &connections {
            println!("  {connection}");
        }
    }
    Ok(())
}
