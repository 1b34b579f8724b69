//! Canonical Model CLI
//!
//! Builds the canonical model from a directory of registry schemas, compares
//! two model snapshots, and prints snapshot statistics.
//!
//! Usage:
//!   schema-model build --config schema-model.toml
//!   schema-model diff old-model.json new-model.json
//!   schema-model stats model.json

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use canonical_schemas::build::ModelBuilder;
use canonical_schemas::config::ModelConfig;
use canonical_schemas::legacy::LegacySpec;
use canonical_schemas::model::{diff_databases, render_tree, SpecDatabase};
use canonical_schemas::passes::{link_region, mark_stateful};
use canonical_schemas::patch::{PatchRegistry, StandardRules};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-model")]
#[command(about = "Normalize resource schemas into a canonical typed model")]
struct Cli {
    /// Configuration file (defaults to schema-model.toml and friends)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the model and write the snapshot and reports
    Build {
        /// Registry schema directory (overrides the config)
        #[arg(short, long)]
        registry: Option<PathBuf>,
        /// Legacy specification file (overrides the config)
        #[arg(short, long)]
        legacy: Option<PathBuf>,
        /// Snapshot output file (overrides the config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show what changed between two snapshots
    Diff {
        old: PathBuf,
        new: PathBuf,
        /// Print the diff as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print entity and relationship counts of a snapshot
    Stats { snapshot: PathBuf },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = ModelConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Build { registry, legacy, output } => {
            if let Some(registry) = registry {
                config.sources.registry_dir = registry;
            }
            if legacy.is_some() {
                config.sources.legacy_spec = legacy;
            }
            if let Some(output) = output {
                config.output.snapshot = output;
            }
            build(&config)
        }
        Commands::Diff { old, new, json } => {
            let old = SpecDatabase::load_from_file(&old)
                .with_context(|| format!("Failed to load snapshot {}", old.display()))?;
            let new = SpecDatabase::load_from_file(&new)
                .with_context(|| format!("Failed to load snapshot {}", new.display()))?;
            let diff = diff_databases(&old, &new)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&diff)?);
            } else {
                print!("{}", render_tree(&diff));
            }
            Ok(())
        }
        Commands::Stats { snapshot } => {
            let db = SpecDatabase::load_from_file(&snapshot)
                .with_context(|| format!("Failed to load snapshot {}", snapshot.display()))?;
            println!("📊 {}", snapshot.display());
            for (name, count) in db.stats() {
                println!("   {:<22} {}", name, count);
            }
            Ok(())
        }
    }
}

fn build(config: &ModelConfig) -> Result<()> {
    let registry_dir = ModelConfig::resolve_path(&config.sources.registry_dir);
    println!("📂 Loading registry schemas from: {:?}", registry_dir);

    let legacy = match &config.sources.legacy_spec {
        Some(path) => {
            let spec = LegacySpec::load(path)
                .with_context(|| format!("Failed to load legacy specification {}", path.display()))?;
            println!("   Legacy specification lists {} resource types", spec.len());
            Some(spec)
        }
        None => None,
    };

    let mut patches = PatchRegistry::new();
    if config.build.standard_rules {
        patches.install(&StandardRules);
    }
    let mut builder = ModelBuilder::new(patches, config.build_options());

    for path in registry_files(&registry_dir) {
        let subject = path.display().to_string();
        let document = match read_document(&path) {
            Ok(document) => document,
            Err(e) => {
                builder.record_load_failure(&subject, format!("{:#}", e));
                continue;
            }
        };
        let type_name = type_name_of(&document, &path);
        builder.import_resource(&type_name, &document, legacy.as_ref())?;
    }

    let (mut db, report) = builder.finish();

    let unknown = mark_stateful(&mut db, &config.build.stateful_resources)?;
    if !unknown.is_empty() {
        warn!(count = unknown.len(), "Stateful list names unknown resources");
    }
    for (region, type_names) in &config.build.regions {
        link_region(&mut db, region, type_names)?;
    }

    let snapshot = ModelConfig::resolve_path(&config.output.snapshot);
    db.save_to_file(&snapshot, config.output.pretty)
        .with_context(|| format!("Failed to write snapshot {}", snapshot.display()))?;
    println!("✅ Wrote snapshot to: {:?}", snapshot);

    let report_dir = ModelConfig::resolve_path(&config.output.report_dir);
    let written = report.write_to_dir(&report_dir)?;
    info!(files = written.len(), "Wrote build report");

    println!();
    for (name, count) in db.stats() {
        println!("   {:<22} {}", name, count);
    }
    let failures = report.failures().count();
    let patched = report.patches().count();
    if failures > 0 {
        println!("\n⚠️  {} failures and {} corrections, see {:?}", failures, patched, report_dir);
    } else if patched > 0 {
        println!("\n✅ {} corrections applied, see {:?}", patched, report_dir);
    }
    Ok(())
}

/// Every `*.json` file below the registry directory, in a stable order
fn registry_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
        .collect();
    files.sort();
    files
}

fn read_document(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON in {}", path.display()))
}

/// `typeName` of the document, falling back to the file stem
fn type_name_of(document: &Value, path: &Path) -> String {
    document
        .get("typeName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
}
