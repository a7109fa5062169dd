//! Command line front end: plans a batch design and writes the report.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gentle_assembly::{
    ENZYMES, about,
    design::Design,
    engine::ReferenceEngine,
    planner::{Batch, BatchResult, compute_all_construct_quotes, plan_batches},
    report::write_report,
    topology::{AssemblyMethod, SupplyParameters},
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gentle_assembly")]
#[command(about = "Plan the cheapest way to build a batch of DNA constructs")]
#[command(version = about::GENTLE_ASSEMBLY_DISPLAY_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug messages (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan one batch and write the report sheets
    Plan {
        /// Design file: .json, or .fasta/.gb parts with --compositions
        design: PathBuf,

        /// Directory for the report
        output: PathBuf,

        /// gibson, golden_gate or any_method
        #[arg(long, short, default_value = "any_method")]
        method: String,

        /// CSV file with construct,parts columns
        #[arg(long)]
        compositions: Option<PathBuf>,

        /// Only plan the first N constructs
        #[arg(long = "constructs", short = 'n')]
        max_constructs: Option<usize>,

        /// JSON file with supply parameters
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the batch result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Plan several independent batches in parallel, one report directory each
    Batch {
        /// Directory receiving one sub-directory per design
        output: PathBuf,

        /// JSON designs
        #[arg(required = true)]
        designs: Vec<PathBuf>,

        /// gibson, golden_gate or any_method
        #[arg(long, short, default_value = "any_method")]
        method: String,

        /// JSON file with supply parameters
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the Golden Gate enzymes
    Enzymes,

    /// Print the default supply parameters as JSON
    Parameters,

    /// Print version and build
    About,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_method(method: &str) -> AssemblyMethod {
    method.parse().unwrap_or_else(|e| {
        warn!("{e}; using any_method");
        AssemblyMethod::AnyMethod
    })
}

fn load_parameters(config: Option<&PathBuf>) -> Result<SupplyParameters> {
    match config {
        Some(path) => {
            let path = path.to_string_lossy();
            SupplyParameters::load_from_path(&path)
                .with_context(|| format!("Could not load supply parameters from {path}"))
        }
        None => Ok(SupplyParameters::default()),
    }
}

fn load_design(path: &PathBuf, compositions: Option<&PathBuf>) -> Result<Design> {
    let compositions = compositions.map(|p| p.to_string_lossy().to_string());
    Design::load(&path.to_string_lossy(), compositions.as_deref())
        .with_context(|| format!("Could not load design {}", path.display()))
}

fn summarize(name: &str, result: &BatchResult) {
    info!(
        batch = name,
        planned = result.quotes.len(),
        failed = result.errors.len(),
        primers = result.ordered_primers.len(),
        fragments = result.fragment_quotes.len(),
        "Batch done"
    );
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Plan {
            design,
            output,
            method,
            compositions,
            max_constructs,
            config,
            json,
        } => {
            let params = load_parameters(config.as_ref())?;
            let design_data = load_design(&design, compositions.as_ref())?;
            let constructs = design_data.constructs()?;
            let result = compute_all_construct_quotes(
                &ReferenceEngine,
                &constructs,
                &design_data.parts,
                parse_method(&method),
                max_constructs,
                &params,
            )?;
            summarize(&design.to_string_lossy(), &result);
            let written = write_report(&output, &design_data, &result)
                .with_context(|| format!("Could not write report to {}", output.display()))?;
            for path in written {
                info!("Wrote {}", path.display());
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
        Commands::Batch {
            output,
            designs,
            method,
            config,
        } => {
            let params = load_parameters(config.as_ref())?;
            let mut parts = gentle_assembly::topology::PartCatalog::new();
            let mut loaded = vec![];
            let mut batches = vec![];
            for path in &designs {
                let design = load_design(path, None)?;
                for (name, sequence) in &design.parts {
                    if let Some(existing) = parts.get(name) {
                        if existing != sequence {
                            anyhow::bail!("Part '{name}' differs between designs");
                        }
                    }
                    parts.insert(name.clone(), sequence.clone());
                }
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| format!("batch_{}", batches.len() + 1));
                batches.push(Batch {
                    name,
                    constructs: design.constructs()?,
                });
                loaded.push(design);
            }
            let results = plan_batches(
                &ReferenceEngine,
                &batches,
                &parts,
                parse_method(&method),
                &params,
            );
            for ((name, result), design) in results.into_iter().zip(loaded.iter()) {
                let result = result.with_context(|| format!("Batch {name} failed"))?;
                summarize(&name, &result);
                write_report(&output.join(&name), design, &result)?;
            }
        }
        Commands::Enzymes => {
            println!("name\tsite\tcut\toverhang");
            for enzyme in ENZYMES.restriction_enzymes() {
                println!(
                    "{}\t{}\t{}\t{}",
                    enzyme.name,
                    enzyme.sequence,
                    enzyme.cut,
                    enzyme.overhang_length()
                );
            }
        }
        Commands::Parameters => {
            println!(
                "{}",
                serde_json::to_string_pretty(&SupplyParameters::default())?
            );
        }
        Commands::About => {
            println!("{}", about::version_cli_text());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}
