use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use filetime::FileTime;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::classify::media_class_for;
use crate::device::discover_devices;
use crate::inventory::write_inventory;
use crate::layout::{deployment_year, resolve_layout, StagingLayout};
use crate::manifest::{hash_file, write_manifest};
use crate::model::{
    Device, DeviceSummary, FileIssue, IngestReport, InventoryRow, ManifestEntry, PlaceMode,
    PlacementOutcome, RunContext, RunCounters, INVENTORY_FILE_NAME, MANIFEST_FILE_NAME,
    REPORT_VERSION, RUN_LOG_FILE_NAME,
};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub input: PathBuf,
    pub reserve: String,
    pub site: String,
    pub deployment: String,
    pub staging_base: PathBuf,
    /// Remote root the data will live under, mirrored as path segments
    /// beneath the staging base.
    pub remote_root: String,
    pub mode: PlaceMode,
    pub compute_hash: bool,
    pub excludes: Vec<String>,
    pub run_id: Option<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            reserve: String::new(),
            site: String::new(),
            deployment: String::new(),
            staging_base: PathBuf::new(),
            remote_root: "projects/field-data/raw".to_string(),
            mode: PlaceMode::Symlink,
            compute_hash: false,
            excludes: Vec::new(),
            run_id: None,
        }
    }
}

/// Prepares one field import: discovers devices, places every file into the
/// staged tree, and writes the inventory, optional checksum manifest, and
/// run log. Per-file failures are recorded and counted; only missing
/// preconditions abort the run.
pub fn run_ingest(options: &IngestOptions) -> Result<IngestReport> {
    let started = Instant::now();
    let input = validate_options(options)?;
    let run_id = options
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let year = deployment_year(&options.deployment);
    let layout = resolve_layout(
        &options.staging_base,
        &options.remote_root,
        &year,
        &options.reserve,
        &options.site,
        &options.deployment,
    );
    fs::create_dir_all(&layout.staging_root).with_context(|| {
        format!(
            "failed to create staging root {}",
            layout.staging_root.display()
        )
    })?;
    fs::create_dir_all(&layout.logs_dir)
        .with_context(|| format!("failed to create {}", layout.logs_dir.display()))?;

    let mut warnings = Vec::new();
    let excludes = ExcludeMatcher::new(&options.excludes, &mut warnings);
    let devices = discover_devices(&input)?;

    let context = RunContext {
        input: input.to_string_lossy().to_string(),
        reserve: options.reserve.clone(),
        site: options.site.clone(),
        deployment: options.deployment.clone(),
        year,
        mode: options.mode,
        compute_hash: options.compute_hash,
    };

    if devices.is_empty() {
        warnings.push(format!(
            "no device subfolders found under {}; nothing to stage",
            input.display()
        ));
        return Ok(finalize_report(
            run_id,
            context,
            &layout,
            Vec::new(),
            RunCounters::default(),
            None,
            None,
            warnings,
            started,
        ));
    }

    let mut rows: Vec<InventoryRow> = Vec::new();
    let mut manifest_entries: Vec<ManifestEntry> = Vec::new();
    let mut seen_names: HashSet<(String, String)> = HashSet::new();
    let mut counters = RunCounters::default();
    let mut summaries = Vec::new();

    for device in &devices {
        let summary = ingest_device(
            device,
            options,
            &layout,
            &excludes,
            &mut rows,
            &mut manifest_entries,
            &mut seen_names,
            &mut counters,
            &mut warnings,
        )?;
        summaries.push(summary);
    }

    let inventory_path = layout.staging_root.join(INVENTORY_FILE_NAME);
    write_inventory(&inventory_path, &rows)?;

    let manifest_path = if options.compute_hash {
        let path = layout.staging_root.join(MANIFEST_FILE_NAME);
        write_manifest(&path, &manifest_entries)?;
        Some(path)
    } else {
        None
    };

    append_run_log(&layout.logs_dir.join(RUN_LOG_FILE_NAME), &context, &counters)?;

    info!(
        "staged {} file(s) across {} device(s) into {} ({} problem(s))",
        counters.files,
        devices.len(),
        layout.staging_root.display(),
        counters.problems
    );

    Ok(finalize_report(
        run_id,
        context,
        &layout,
        summaries,
        counters,
        Some(inventory_path),
        manifest_path,
        warnings,
        started,
    ))
}

fn validate_options(options: &IngestOptions) -> Result<PathBuf> {
    if options.reserve.trim().is_empty()
        || options.site.trim().is_empty()
        || options.deployment.trim().is_empty()
    {
        return Err(anyhow!(
            "reserve, site, and deployment identifiers must all be provided"
        ));
    }
    if options.staging_base.as_os_str().is_empty() {
        return Err(anyhow!("staging base directory must be provided"));
    }
    if !options.input.is_dir() {
        return Err(anyhow!(
            "input not found or not a directory: {}",
            options.input.display()
        ));
    }
    fs::canonicalize(&options.input)
        .with_context(|| format!("failed to resolve {}", options.input.display()))
}

#[allow(clippy::too_many_arguments)]
fn ingest_device(
    device: &Device,
    options: &IngestOptions,
    layout: &StagingLayout,
    excludes: &ExcludeMatcher,
    rows: &mut Vec<InventoryRow>,
    manifest_entries: &mut Vec<ManifestEntry>,
    seen_names: &mut HashSet<(String, String)>,
    counters: &mut RunCounters,
    warnings: &mut Vec<String>,
) -> Result<DeviceSummary> {
    let dest_device_dir = layout.staging_root.join(&device.label);
    fs::create_dir_all(&dest_device_dir)
        .with_context(|| format!("failed to create {}", dest_device_dir.display()))?;

    let mut device_files = 0_u64;
    let mut device_bytes = 0_u64;

    let walker = WalkDir::new(&device.source_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !excludes.is_excluded(entry.path()));

    for item in walker {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                warnings.push(format!(
                    "walk error under {}: {}",
                    device.source_dir.display(),
                    err
                ));
                counters.problems += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let src = entry.path();
        // Preserve the file's relative position under its device folder.
        let rel_under_device = match src.strip_prefix(&device.source_dir) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let dest = dest_device_dir.join(rel_under_device);

        if let Some(parent) = dest.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                let issue = FileIssue::Placement {
                    path: dest.to_string_lossy().to_string(),
                    detail: err.to_string(),
                };
                warn!("{issue}");
                warnings.push(issue.to_string());
                counters.failed_placements += 1;
                counters.problems += 1;
                continue;
            }
        }

        match place_file(options.mode, src, &dest) {
            PlacementOutcome::Staged => counters.staged_files += 1,
            PlacementOutcome::Planned => counters.planned_files += 1,
            PlacementOutcome::Failed(issue) => {
                warn!("{issue}");
                warnings.push(issue.to_string());
                counters.failed_placements += 1;
                counters.problems += 1;
            }
        }

        let (size_bytes, mtime_utc) = match entry.metadata() {
            Ok(metadata) => {
                let modified = metadata
                    .modified()
                    .ok()
                    .map(DateTime::<Utc>::from)
                    .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true));
                (Some(metadata.len()), modified)
            }
            Err(err) => {
                let issue = FileIssue::Stat {
                    path: src.to_string_lossy().to_string(),
                    detail: err.to_string(),
                };
                warn!("{issue}");
                warnings.push(issue.to_string());
                counters.problems += 1;
                (None, None)
            }
        };

        let file_name = src
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        if !seen_names.insert((device.label.clone(), file_name.clone())) {
            let message = format!(
                "duplicate filename in device {}: {}",
                device.label, file_name
            );
            warn!("{message}");
            warnings.push(message);
            counters.duplicate_names += 1;
        }

        let relative_path = dest
            .strip_prefix(&layout.staging_root)
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| dest.to_string_lossy().to_string());

        rows.push(InventoryRow {
            relative_path: relative_path.clone(),
            device_label: device.label.clone(),
            device_type: device.device_type,
            media_class: media_class_for(src),
            size_bytes,
            mtime_utc,
            reserve: options.reserve.clone(),
            site: options.site.clone(),
            deployment: options.deployment.clone(),
            source_abspath: src.to_string_lossy().to_string(),
        });
        counters.files += 1;
        device_files += 1;
        if let Some(size) = size_bytes {
            counters.total_bytes = counters.total_bytes.saturating_add(size);
            device_bytes = device_bytes.saturating_add(size);
        }

        if options.compute_hash {
            match hash_file(src) {
                Ok(digest) => manifest_entries.push(ManifestEntry {
                    sha256: digest,
                    relative_path,
                }),
                Err(err) => {
                    let issue = FileIssue::Hash {
                        path: src.to_string_lossy().to_string(),
                        detail: format!("{err:#}"),
                    };
                    warn!("{issue}");
                    warnings.push(issue.to_string());
                    counters.problems += 1;
                }
            }
        }
    }

    Ok(DeviceSummary {
        label: device.label.clone(),
        device_type: device.device_type,
        files: device_files,
        bytes: device_bytes,
    })
}

fn place_file(mode: PlaceMode, src: &Path, dest: &Path) -> PlacementOutcome {
    let failed = |err: std::io::Error| {
        PlacementOutcome::Failed(FileIssue::Placement {
            path: dest.to_string_lossy().to_string(),
            detail: err.to_string(),
        })
    };

    match mode {
        PlaceMode::Plan => PlacementOutcome::Planned,
        PlaceMode::Copy => match fs::copy(src, dest).and_then(|_| propagate_mtime(src, dest)) {
            Ok(()) => PlacementOutcome::Staged,
            Err(err) => failed(err),
        },
        PlaceMode::Symlink => {
            if let Err(err) = remove_existing(dest) {
                return failed(err);
            }
            match make_symlink(src, dest) {
                Ok(()) => PlacementOutcome::Staged,
                Err(err) => failed(err),
            }
        }
    }
}

// Copied files keep the source modification time, matching what transfer
// tooling expects from a staged tree.
fn propagate_mtime(src: &Path, dest: &Path) -> std::io::Result<()> {
    let metadata = fs::metadata(src)?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_mtime(dest, mtime)
}

fn remove_existing(dest: &Path) -> std::io::Result<()> {
    match fs::remove_file(dest) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(unix)]
fn make_symlink(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dest)
}

#[cfg(windows)]
fn make_symlink(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(src, dest)
}

fn append_run_log(path: &Path, context: &RunContext, counters: &RunCounters) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(
        file,
        "[{}] input={} reserve={} site={} deployment={} mode={} files={} problems={}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        context.input,
        context.reserve,
        context.site,
        context.deployment,
        context.mode,
        counters.files,
        counters.problems
    )
    .with_context(|| format!("failed to append to {}", path.display()))
}

#[allow(clippy::too_many_arguments)]
fn finalize_report(
    run_id: String,
    context: RunContext,
    layout: &StagingLayout,
    devices: Vec<DeviceSummary>,
    counters: RunCounters,
    inventory_path: Option<PathBuf>,
    manifest_path: Option<PathBuf>,
    warnings: Vec<String>,
    started: Instant,
) -> IngestReport {
    IngestReport {
        report_version: REPORT_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        run_id,
        context,
        staging_root: layout.staging_root.to_string_lossy().to_string(),
        inventory_path: inventory_path.map(|path| path.to_string_lossy().to_string()),
        manifest_path: manifest_path.map(|path| path.to_string_lossy().to_string()),
        devices,
        counters,
        elapsed_ms: started.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
        warnings,
    }
}

struct ExcludeMatcher {
    globset: Option<GlobSet>,
    substrings: Vec<String>,
}

impl ExcludeMatcher {
    fn new(patterns: &[String], warnings: &mut Vec<String>) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut substrings = Vec::new();
        let mut has_globs = false;

        for pattern in patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }
            if is_plain_substring(pattern) {
                substrings.push(pattern.to_lowercase());
                continue;
            }
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    has_globs = true;
                }
                Err(err) => {
                    warnings.push(format!(
                        "invalid exclude glob '{pattern}': {err}; matching as substring"
                    ));
                    substrings.push(pattern.to_lowercase());
                }
            }
        }

        let globset = if has_globs {
            match builder.build() {
                Ok(set) => Some(set),
                Err(err) => {
                    warnings.push(format!(
                        "failed to compile exclude globs: {err}; glob excludes disabled"
                    ));
                    None
                }
            }
        } else {
            None
        };

        Self {
            globset,
            substrings,
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if let Some(globset) = &self.globset {
            if globset.is_match(path) {
                return true;
            }
        }
        if self.substrings.is_empty() {
            return false;
        }
        let lowered = path.to_string_lossy().to_lowercase();
        self.substrings
            .iter()
            .any(|pattern| lowered.contains(pattern))
    }
}

fn is_plain_substring(pattern: &str) -> bool {
    !pattern
        .chars()
        .any(|ch| matches!(ch, '*' | '?' | '[' | ']' | '{' | '}'))
}
