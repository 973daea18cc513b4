use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::ManifestEntry;

/// Streaming SHA-256 of a file's content.
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 64 * 1024];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Writes the checksum manifest, one `<sha256>  ./<relative_path>` line per
/// entry. The two-space separator keeps the file usable with `shasum -c`.
pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<()> {
    let mut payload = String::new();
    for entry in entries {
        payload.push_str(&entry.sha256);
        payload.push_str("  ./");
        payload.push_str(&entry.relative_path);
        payload.push('\n');
    }
    fs::write(path, payload).with_context(|| format!("failed to write {}", path.display()))
}

pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut entries = Vec::new();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let (sha256, rest) = line.split_once("  ").ok_or_else(|| {
            anyhow!(
                "malformed manifest line {} in {}: {line}",
                index + 1,
                path.display()
            )
        })?;
        let relative_path = rest.strip_prefix("./").unwrap_or(rest);
        entries.push(ManifestEntry {
            sha256: sha256.to_string(),
            relative_path: relative_path.to_string(),
        });
    }

    Ok(entries)
}

#[derive(Debug, Default, Serialize)]
pub struct VerifyOutcome {
    pub checked: u64,
    pub matched: u64,
    pub mismatched: Vec<String>,
    pub missing: Vec<String>,
}

impl VerifyOutcome {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty()
    }
}

/// Re-hashes every manifest entry against the file at its staged relative
/// path. Symlinked trees verify transparently because hashing follows links.
pub fn verify_manifest(staging_root: &Path, manifest_path: &Path) -> Result<VerifyOutcome> {
    let entries = read_manifest(manifest_path)?;
    let mut outcome = VerifyOutcome::default();

    for entry in entries {
        outcome.checked += 1;
        let target = staging_root.join(&entry.relative_path);
        if !target.exists() {
            outcome.missing.push(entry.relative_path);
            continue;
        }
        match hash_file(&target) {
            Ok(digest) if digest == entry.sha256 => outcome.matched += 1,
            Ok(_) => outcome.mismatched.push(entry.relative_path),
            Err(err) => outcome
                .mismatched
                .push(format!("{} ({err:#})", entry.relative_path)),
        }
    }

    Ok(outcome)
}
