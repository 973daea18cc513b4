use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use fieldstage_core::{
    remote_destination, run_ingest, verify_manifest, IngestOptions, PlaceMode, MANIFEST_FILE_NAME,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "fieldstage",
    version,
    about = "Prepare a field import for staging: tree, inventory, and checksum artifacts."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Discover devices, stage files, and write inventory artifacts.
    Prepare(PrepareArgs),
    /// Re-hash staged files against an existing checksum manifest.
    Verify(VerifyArgs),
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum CliPlaceMode {
    Symlink,
    Copy,
    Plan,
}

impl From<CliPlaceMode> for PlaceMode {
    fn from(value: CliPlaceMode) -> Self {
        match value {
            CliPlaceMode::Symlink => PlaceMode::Symlink,
            CliPlaceMode::Copy => PlaceMode::Copy,
            CliPlaceMode::Plan => PlaceMode::Plan,
        }
    }
}

#[derive(Debug, Args)]
struct PrepareArgs {
    /// Import folder containing device subfolders (e.g. camera_01, ARU_01).
    #[arg(long, value_name = "PATH")]
    input: PathBuf,

    /// Reserve identifier (e.g. R034).
    #[arg(long)]
    reserve: String,

    /// Site identifier (e.g. S005).
    #[arg(long)]
    site: String,

    /// Deployment identifier (e.g. 20250905).
    #[arg(long)]
    deployment: String,

    /// Local staging base directory.
    #[arg(long, value_name = "PATH")]
    staging: PathBuf,

    /// Remote root the data will live under; mirrored beneath the staging base.
    #[arg(long, default_value = "projects/field-data/raw", value_name = "PATH")]
    remote_root: String,

    /// Place files as symlinks (default), copy bytes, or plan only.
    #[arg(long, default_value = "symlink")]
    mode: CliPlaceMode,

    /// Compute SHA-256 for every file and write the checksum manifest (slower).
    #[arg(long)]
    hash: bool,

    /// Exclude glob patterns (repeatable).
    #[arg(long = "exclude", value_name = "GLOB", num_args = 1.., action = ArgAction::Append)]
    exclude: Vec<String>,

    /// Optional JSON run report output file.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Remote login, used only in the printed transfer hint.
    #[arg(long, default_value = "your_username")]
    rsync_user: String,

    /// Remote host, used only in the printed transfer hint.
    #[arg(long, default_value = "data.example.edu")]
    rsync_host: String,
}

#[derive(Debug, Args)]
struct VerifyArgs {
    /// Staging root containing the staged tree.
    #[arg(long, value_name = "PATH")]
    staging_root: PathBuf,

    /// Manifest file; defaults to manifest_sha256.txt under the staging root.
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare(args) => run_prepare_command(args),
        Commands::Verify(args) => run_verify_command(args),
    }
}

fn run_prepare_command(args: PrepareArgs) -> Result<()> {
    let options = IngestOptions {
        input: args.input,
        reserve: args.reserve,
        site: args.site,
        deployment: args.deployment,
        staging_base: args.staging,
        remote_root: args.remote_root,
        mode: args.mode.into(),
        compute_hash: args.hash,
        excludes: args.exclude,
        run_id: None,
    };

    let report = run_ingest(&options)?;

    println!("Staging prepared at {}", report.staging_root);
    if let Some(path) = &report.inventory_path {
        println!("Inventory: {path}");
    }
    if let Some(path) = &report.manifest_path {
        println!("Manifest:  {path}");
        println!("Verify later with: shasum -c {MANIFEST_FILE_NAME}");
    }
    println!(
        "Devices: {}, files: {}, staged: {}, planned: {}, duplicates: {}, problems: {}.",
        report.devices.len(),
        report.counters.files,
        report.counters.staged_files,
        report.counters.planned_files,
        report.counters.duplicate_names,
        report.counters.problems
    );
    for warning in &report.warnings {
        println!("Warning: {warning}");
    }

    if let Some(report_path) = args.report {
        let payload =
            serde_json::to_string_pretty(&report).context("failed to serialize run report")?;
        fs::write(&report_path, payload)
            .with_context(|| format!("failed to write run report to {}", report_path.display()))?;
        println!("Run report written to {}", report_path.display());
    }

    let remote = remote_destination(
        &options.remote_root,
        &report.context.year,
        &options.reserve,
        &options.site,
        &options.deployment,
    );
    println!("Suggested upload command (review the staged tree first):");
    println!(
        "rsync -avh --info=progress2 \"{}/\" {}@{}:\"{}\"",
        report.staging_root, args.rsync_user, args.rsync_host, remote
    );
    if options.mode == PlaceMode::Symlink {
        println!("(symlink mode: add --copy-links if your rsync does not follow links by default)");
    }

    Ok(())
}

fn run_verify_command(args: VerifyArgs) -> Result<()> {
    let manifest = args
        .manifest
        .unwrap_or_else(|| args.staging_root.join(MANIFEST_FILE_NAME));
    let outcome = verify_manifest(&args.staging_root, &manifest)?;

    println!(
        "Checked {} entries: {} matched, {} mismatched, {} missing.",
        outcome.checked,
        outcome.matched,
        outcome.mismatched.len(),
        outcome.missing.len()
    );
    for path in &outcome.mismatched {
        println!("Mismatch: {path}");
    }
    for path in &outcome.missing {
        println!("Missing: {path}");
    }

    if !outcome.is_clean() {
        anyhow::bail!("manifest verification failed");
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
