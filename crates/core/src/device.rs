use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::model::{Device, DeviceType};

// Accepted name starts, checked in order; `-` is treated as `_` before
// matching and the comparison is case-insensitive.
const LABEL_PREFIXES: [(&str, &str); 4] = [
    ("camera_", "CAM"),
    ("aru_", "ARU"),
    ("camera", "CAM"),
    ("aru", "ARU"),
];

/// Lists immediate subdirectories of the input directory, sorted by name;
/// each becomes a device. Folders that match no known prefix are still
/// included with a sanitized label and type `unknown`.
pub fn discover_devices(input_dir: &Path) -> Result<Vec<Device>> {
    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("failed to list {}", input_dir.display()))?;

    let mut children = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry under {}", input_dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            children.push(path);
        }
    }
    children.sort_by_key(|path| path.file_name().map(|name| name.to_os_string()));

    let devices = children
        .into_iter()
        .map(|source_dir| {
            let name = source_dir
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let label = normalize_label(&name);
            let device_type = infer_device_type(&label);
            Device {
                source_dir,
                label,
                device_type,
            }
        })
        .collect::<Vec<_>>();

    if devices.is_empty() {
        warn!("no device subfolders found under {}", input_dir.display());
    }
    Ok(devices)
}

/// Normalizes a device folder name to a stable label, e.g. `camera_01` →
/// `CAM01`, `ARU-3` → `ARU03`. Idempotent: feeding a normalized label back
/// in returns it unchanged.
pub fn normalize_label(name: &str) -> String {
    let cleaned = name.trim().replace('-', "_");
    let lowered = cleaned.to_lowercase();

    for (prefix, tag) in LABEL_PREFIXES {
        if let Some(tail) = lowered.strip_prefix(prefix) {
            let tail = if prefix.ends_with('_') {
                tail
            } else {
                tail.strip_prefix('_').unwrap_or(tail)
            };
            return format!("{tag}{}", normalize_tail(tail));
        }
    }

    cleaned.replace(' ', "_")
}

fn normalize_tail(tail: &str) -> String {
    if !tail.is_empty() && tail.chars().all(|ch| ch.is_ascii_digit()) {
        format!("{tail:0>2}")
    } else {
        tail.to_uppercase()
    }
}

pub fn infer_device_type(label: &str) -> DeviceType {
    let upper = label.to_uppercase();
    if upper.starts_with("CAM") {
        DeviceType::Camera
    } else if upper.starts_with("ARU") {
        DeviceType::Aru
    } else {
        DeviceType::Unknown
    }
}
