//! Skunk CLI - feature-annotation metrics for C functions in srcML form

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output
// - Diagnostics go to stderr, results to stdout

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use skunk_core::analysis::build_function;
use skunk_core::{analyze_with_config, config, render_json, render_text, srcml};
use skunk_core::{AnalysisOptions, FeatureTable, SrcMlUnit};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(name = "skunk")]
#[command(about = "Function signatures and feature-annotation metrics for C code in srcML form")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute per-function feature metrics for srcML files
    Analyze {
        /// Path to a srcML file or a directory of srcML files
        path: PathBuf,

        /// Feature references file (overrides config file)
        #[arg(long)]
        features: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Worker threads (overrides config file)
        #[arg(long)]
        threads: Option<usize>,

        /// Minimum lines of feature code per reported function (overrides config file)
        #[arg(long)]
        min_lofc: Option<u64>,
    },
    /// Print the normalized signature of every function in a srcML file
    Signatures {
        /// Path to a srcML file
        path: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate or show a configuration file
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without running analysis
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct SignatureRecord {
    file: String,
    signature: String,
    start_line: u32,
    end_line: u32,
    signature_lines: u32,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze {
            path,
            features,
            format,
            config: config_path,
            threads,
            min_lofc,
        } => {
            let normalized_path = normalize_path(path)?;

            // Load configuration
            let project_root = if normalized_path.is_dir() {
                normalized_path.clone()
            } else {
                normalized_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| normalized_path.clone())
            };
            let resolved_config = config::load_and_resolve(&project_root, config_path.as_deref())
                .context("failed to load configuration")?;

            if let Some(config_path) = &resolved_config.config_path {
                eprintln!("Using config: {}", config_path.display());
            }

            // CLI flags override config file values
            let features_path = features
                .or_else(|| resolved_config.features.clone())
                .context("no feature references given (use --features or set `features` in the config file)")?;
            if threads == Some(0) {
                anyhow::bail!("--threads must be at least 1");
            }
            let options = AnalysisOptions {
                threads: threads.or(resolved_config.threads),
                min_lofc: min_lofc.or(resolved_config.min_lofc),
            };

            let registry = FeatureTable::load(&features_path)?;
            debug!(
                "loaded {} feature reference(s) from {}",
                registry.len(),
                features_path.display()
            );
            let project =
                analyze_with_config(&normalized_path, &registry, options, Some(&resolved_config))?;
            let reports = project.reports()?;

            match format {
                OutputFormat::Text => print!("{}", render_text(&reports)),
                OutputFormat::Json => println!("{}", render_json(&reports)),
            }

            if project.skipped_files > 0 {
                eprintln!("Skipped {} file(s) due to analysis errors", project.skipped_files);
            }
        }
        Commands::Signatures { path, format } => {
            let normalized_path = normalize_path(path)?;
            let unit = SrcMlUnit::load(&normalized_path)?;
            let doc = unit.document()?;

            let records: Vec<SignatureRecord> = srcml::function_nodes(&doc)
                .map(|node| {
                    let function = build_function(node, unit.file());
                    SignatureRecord {
                        file: unit.file().to_string(),
                        signature: function.signature().to_string(),
                        start_line: function.start_line(),
                        end_line: function.end_line(),
                        signature_lines: function.signature_line_count(),
                    }
                })
                .collect();

            match format {
                OutputFormat::Text => {
                    for record in &records {
                        println!(
                            "{}:{}-{}  {}",
                            record.file, record.start_line, record.end_line, record.signature
                        );
                    }
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&records)
                        .context("failed to serialize signatures to JSON")?;
                    println!("{}", json);
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref());

                match resolved {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref())
                    .context("failed to load configuration")?;

                println!("Configuration:");
                if let Some(ref p) = resolved.config_path {
                    println!("  Source: {}", p.display());
                } else {
                    println!("  Source: defaults (no config file found)");
                }
                println!();
                println!("Inputs:");
                println!(
                    "  features: {}",
                    resolved
                        .features
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "none".to_string())
                );
                println!(
                    "  threads: {}",
                    resolved
                        .threads
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "default".to_string())
                );
                println!();
                println!("Filters:");
                println!(
                    "  min_lofc: {}",
                    resolved
                        .min_lofc
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "none".to_string())
                );
                println!(
                    "  include: {}",
                    if resolved.include.is_some() {
                        "custom patterns"
                    } else {
                        "all files"
                    }
                );
                println!(
                    "  exclude: {} ({})",
                    if resolved.uses_default_excludes() {
                        "default patterns"
                    } else {
                        "custom patterns"
                    },
                    resolved.exclude_patterns.join(", ")
                );
            }
        },
    }

    Ok(())
}

/// Resolve a relative path against the working directory and check it exists
fn normalize_path(path: PathBuf) -> anyhow::Result<PathBuf> {
    let normalized_path = if path.is_relative() {
        std::env::current_dir()?.join(&path)
    } else {
        path
    };

    if !normalized_path.exists() {
        anyhow::bail!("Path does not exist: {}", normalized_path.display());
    }

    Ok(normalized_path)
}

/// Log to stderr; RUST_LOG wins over the -v flags
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
