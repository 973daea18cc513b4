use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const REPORT_VERSION: &str = "1.0.0";

pub const INVENTORY_FILE_NAME: &str = "file_inventory.csv";
pub const MANIFEST_FILE_NAME: &str = "manifest_sha256.txt";
pub const RUN_LOG_FILE_NAME: &str = "ingest.log";

/// How files are placed into the staged tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaceMode {
    #[default]
    Symlink,
    Copy,
    Plan,
}

impl std::fmt::Display for PlaceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            PlaceMode::Symlink => "symlink",
            PlaceMode::Copy => "copy",
            PlaceMode::Plan => "plan",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Camera,
    Aru,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaClass {
    Image,
    Audio,
    Video,
    #[default]
    Other,
}

/// A source subfolder discovered under the input directory. Discovered once
/// per run and immutable afterward.
#[derive(Debug, Clone)]
pub struct Device {
    pub source_dir: PathBuf,
    pub label: String,
    pub device_type: DeviceType,
}

/// One inventory row per source file. The serde field order here is the CSV
/// column order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryRow {
    pub relative_path: String,
    pub device_label: String,
    pub device_type: DeviceType,
    pub media_class: MediaClass,
    pub size_bytes: Option<u64>,
    pub mtime_utc: Option<String>,
    pub reserve: String,
    pub site: String,
    pub deployment: String,
    pub source_abspath: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub sha256: String,
    pub relative_path: String,
}

/// Per-file failure reasons. These never abort the run; they are counted as
/// problems and surfaced through the report's warnings.
#[derive(Debug, Error)]
pub enum FileIssue {
    #[error("failed to place {path}: {detail}")]
    Placement { path: String, detail: String },
    #[error("failed to stat {path}: {detail}")]
    Stat { path: String, detail: String },
    #[error("failed to hash {path}: {detail}")]
    Hash { path: String, detail: String },
}

#[derive(Debug)]
pub enum PlacementOutcome {
    Staged,
    Planned,
    Failed(FileIssue),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunContext {
    pub input: String,
    pub reserve: String,
    pub site: String,
    pub deployment: String,
    pub year: String,
    pub mode: PlaceMode,
    pub compute_hash: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunCounters {
    pub files: u64,
    pub staged_files: u64,
    pub planned_files: u64,
    pub failed_placements: u64,
    pub total_bytes: u64,
    pub duplicate_names: u64,
    pub problems: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSummary {
    pub label: String,
    pub device_type: DeviceType,
    pub files: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    pub report_version: String,
    pub generated_at: String,
    pub run_id: String,
    pub context: RunContext,
    pub staging_root: String,
    pub inventory_path: Option<String>,
    pub manifest_path: Option<String>,
    pub devices: Vec<DeviceSummary>,
    pub counters: RunCounters,
    pub elapsed_ms: u64,
    pub warnings: Vec<String>,
}
