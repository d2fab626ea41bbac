// src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use treeport::archive::{ArchiveKind, ArchiveReader};
use treeport::manifest::ManifestReader;
use treeport::store::ResourceStore;
use treeport::{
    check_compatibility, export_data, get_conflicting_paths, import_data, verify_archive,
    ExportParameters, ImportParameters, LogReport, MemoryStore, RecordStatus, TransferConfig,
};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "treeport")]
#[command(author, version, about = "Versioned import/export of resource trees", long_about = None)]
struct Cli {
    /// Configuration file with import/export defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the manifest summary of an archive
    Inspect {
        /// Archive file or directory
        archive: PathBuf,
    },
    /// Check that every referenced entry is present with the declared size
    Verify {
        /// Archive file or directory
        archive: PathBuf,
    },
    /// Check whether a legacy template has a convertible structure
    CheckTemplate {
        /// Template file
        file: PathBuf,
        /// Declared resource type
        #[arg(long, default_value = "template")]
        type_name: String,
    },
    /// Pack a local directory into an archive
    Pack {
        /// Directory to pack
        source: PathBuf,
        /// Archive to create
        archive: PathBuf,
        /// Write a directory tree instead of a compressed container
        #[arg(long)]
        tree: bool,
    },
    /// Import an archive into an empty in-memory store and print the report
    Trial {
        /// Archive file or directory
        archive: PathBuf,
        /// Destination folder
        #[arg(short, long, default_value = "/")]
        destination: String,
    },
}

fn load_config(path: Option<&Path>) -> Result<TransferConfig> {
    match path {
        Some(path) => TransferConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(TransferConfig::default()),
    }
}

fn cmd_inspect(archive_path: &Path) -> Result<()> {
    let archive = ArchiveReader::open(archive_path)
        .with_context(|| format!("Failed to open archive {}", archive_path.display()))?;
    let manifest = ManifestReader::read(&archive).context("Failed to read manifest")?;
    let info = manifest.info();

    println!("Archive:  {} ({})", archive_path.display(), archive.kind());
    match manifest.detect_version() {
        Ok(version) => println!("Format:   {}", version),
        Err(e) => println!("Format:   unsupported ({})", e),
    }
    println!("Creator:  {}", info.creator.as_deref().unwrap_or("-"));
    println!("Created:  {}", info.created.as_deref().unwrap_or("-"));
    println!("Records:  {}", manifest.file_elements().len());
    println!("Entries:  {}", archive.entry_names()?.len());
    if let Some(accounts) = manifest.accounts()? {
        println!(
            "Accounts: {} users, {} groups",
            accounts.users.len(),
            accounts.groups.len()
        );
    }
    if let Some(module) = manifest.module()? {
        println!(
            "Module:   {} {} ({} groupings, {} datasets)",
            module.name,
            module.version,
            module.groupings.len(),
            module.datasets.len()
        );
    }
    Ok(())
}

fn cmd_verify(archive_path: &Path) -> Result<()> {
    let report = verify_archive(archive_path)
        .with_context(|| format!("Failed to verify {}", archive_path.display()))?;
    for issue in &report.issues {
        println!("  {}", issue);
    }
    if !report.is_ok() {
        bail!("{} problem(s) found in {} records", report.issues.len(), report.records);
    }
    println!(
        "{}: {} records, {} datasets, format {}, ok",
        archive_path.display(),
        report.records,
        report.datasets,
        report.version
    );
    Ok(())
}

fn cmd_check_template(file: &Path, type_name: &str) -> Result<()> {
    let content =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let path = file.to_string_lossy();
    if check_compatibility(&path, &content, type_name) {
        println!("{}: compatible", path);
        Ok(())
    } else {
        bail!("{}: incompatible template structure", path)
    }
}

fn cmd_pack(config: &TransferConfig, source: &Path, archive: &Path, tree: bool) -> Result<()> {
    let mut store = MemoryStore::new();
    let root = source
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", source.display()))?;

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let relative = entry.path().strip_prefix(&root)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let resource_path = format!("/{}", relative.to_string_lossy().replace('\\', "/"));
        if entry.file_type().is_dir() {
            store.mkdir_p(&resource_path)?;
        } else if entry.file_type().is_file() {
            let content = std::fs::read(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            store.put_file(&resource_path, "binary", &content)?;
        }
    }

    let kind = if tree { ArchiveKind::Tree } else { ArchiveKind::Container };
    let params = ExportParameters::builder(archive, kind)
        .with_config(config)
        .source("/")
        .build()?;
    let report = export_data(&params, &store, &LogReport::new("pack"))?;
    println!(
        "Packed {} resources into {} ({} manifest writes)",
        report.written(),
        archive.display(),
        report.manifest_chunks
    );
    Ok(())
}

fn cmd_trial(config: &TransferConfig, archive: &Path, destination: &str) -> Result<()> {
    let params = ImportParameters::builder(archive, destination)
        .with_config(config)
        .build()?;

    let mut store = MemoryStore::new();
    let conflicts = get_conflicting_paths(&params, &store)?;
    if !conflicts.is_empty() {
        println!("{} conflicting paths", conflicts.len());
    }

    let report = import_data(&params, &mut store, &LogReport::new("trial"))
        .with_context(|| format!("Failed to import {}", archive.display()))?;
    println!("Format version {} ({})", report.format_version, report.handler);
    for outcome in &report.outcomes {
        let size = match &outcome.status {
            RecordStatus::Written => store
                .read_header(&outcome.path)?
                .map(|h| format!(" [{} bytes]", h.size))
                .unwrap_or_default(),
            _ => String::new(),
        };
        println!("  {} {}{}", outcome.path, outcome.status, size);
        for warning in &outcome.warnings {
            println!("    warning: {}", warning);
        }
    }
    println!(
        "{} written, {} skipped, {} failed",
        report.written(),
        report.skipped(),
        report.failed()
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { archive } => cmd_inspect(&archive),
        Commands::Verify { archive } => cmd_verify(&archive),
        Commands::CheckTemplate { file, type_name } => cmd_check_template(&file, &type_name),
        Commands::Pack { source, archive, tree } => {
            info!("Packing {} into {}", source.display(), archive.display());
            cmd_pack(&config, &source, &archive, tree)
        }
        Commands::Trial { archive, destination } => {
            info!("Trial import of {}", archive.display());
            cmd_trial(&config, &archive, &destination)
        }
    }
}
