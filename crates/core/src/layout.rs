use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};

/// Where a run's staged tree and artifacts live.
#[derive(Debug, Clone)]
pub struct StagingLayout {
    pub staging_root: PathBuf,
    pub logs_dir: PathBuf,
}

/// Derives the deployment year from the first four characters of the
/// deployment id when they are all digits (e.g. `20250905` → `2025`),
/// falling back to the current year.
pub fn deployment_year(deployment: &str) -> String {
    match deployment.get(0..4) {
        Some(prefix) if prefix.chars().all(|ch| ch.is_ascii_digit()) => prefix.to_string(),
        _ => Utc::now().year().to_string(),
    }
}

fn remote_root_segments(remote_root: &str) -> Vec<&str> {
    remote_root
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Computes the deterministic staging root:
/// `staging_base / remote_root / year / reserve / site / Deployment_<id>`.
/// The remote root is treated as path segments under the staging base.
pub fn resolve_layout(
    staging_base: &Path,
    remote_root: &str,
    year: &str,
    reserve: &str,
    site: &str,
    deployment: &str,
) -> StagingLayout {
    let mut staging_root = staging_base.to_path_buf();
    for segment in remote_root_segments(remote_root) {
        staging_root.push(segment);
    }
    staging_root.push(year);
    staging_root.push(reserve);
    staging_root.push(site);
    staging_root.push(format!("Deployment_{deployment}"));

    let logs_dir = staging_root.join("logs");
    StagingLayout {
        staging_root,
        logs_dir,
    }
}

/// The matching absolute destination on the remote host, used only for the
/// printed transfer hint.
pub fn remote_destination(
    remote_root: &str,
    year: &str,
    reserve: &str,
    site: &str,
    deployment: &str,
) -> String {
    let joined = remote_root_segments(remote_root).join("/");
    format!("/{joined}/{year}/{reserve}/{site}/Deployment_{deployment}/")
}
