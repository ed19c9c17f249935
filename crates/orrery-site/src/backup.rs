//! Timestamped manifest snapshots with count-based retention.
//!
//! Each successful build writes one snapshot into the backup directory:
//!
//! ```text
//! .orrery/backups/
//! +-- site-map-20250102T030405.000001Z.json
//! +-- site-map-20250102T030512.482913Z.json
//! ```
//!
//! Names embed a fixed-width UTC timestamp, so lexical order is creation
//! order. [`BackupManager::prune`] keeps the newest snapshots by modification
//! time, using the name to break ties.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use orrery_ledger::write_atomic;
use serde::{Deserialize, Serialize};

use crate::sitemap::Manifest;

const PREFIX: &str = "site-map-";
const SUFFIX: &str = ".json";

/// Contents of one snapshot file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    /// RFC 3339 with microseconds.
    pub created_at: String,
    pub manifest: Manifest,
}

/// Error type for snapshot I/O.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("backup I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid backup snapshot at {}: {source}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Writes, lists and prunes snapshots in one directory.
#[derive(Clone, Debug)]
pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a snapshot of `manifest` stamped with the current time.
    pub fn snapshot(&self, manifest: &Manifest) -> Result<PathBuf, BackupError> {
        self.snapshot_at(manifest, Utc::now())
    }

    /// Write a snapshot of `manifest` stamped with `now`.
    ///
    /// If a snapshot with the same timestamp already exists, the timestamp is
    /// advanced one microsecond at a time until the name is free.
    pub fn snapshot_at(
        &self,
        manifest: &Manifest,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, BackupError> {
        let mut stamp = now;
        let mut path = self.dir.join(file_name(stamp));
        while path.exists() {
            stamp += TimeDelta::microseconds(1);
            path = self.dir.join(file_name(stamp));
        }

        let snapshot = BackupSnapshot {
            created_at: stamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            manifest: manifest.clone(),
        };
        let json = serde_json::to_vec_pretty(&snapshot).map_err(|source| BackupError::Format {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &json).map_err(|source| BackupError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "wrote backup snapshot");
        Ok(path)
    }

    /// Snapshot files, oldest first.
    ///
    /// A missing backup directory yields an empty list.
    pub fn list(&self) -> Result<Vec<PathBuf>, BackupError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(BackupError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut snapshots: Vec<(SystemTime, String, PathBuf)> = Vec::new();
        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !(name.starts_with(PREFIX) && name.ends_with(SUFFIX)) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            snapshots.push((modified, name, entry.path()));
        }
        snapshots.sort();
        Ok(snapshots.into_iter().map(|(_, _, path)| path).collect())
    }

    /// Delete all but the `keep` most recent snapshots.
    ///
    /// Returns the number of snapshots removed. Failures are logged and
    /// skipped.
    pub fn prune(&self, keep: usize) -> usize {
        let snapshots = match self.list() {
            Ok(snapshots) => snapshots,
            Err(e) => {
                tracing::warn!(error = %e, "cannot list backups, skipping prune");
                return 0;
            }
        };
        let excess = snapshots.len().saturating_sub(keep);

        let mut removed = 0;
        for path in &snapshots[..excess] {
            match fs::remove_file(path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "pruned backup snapshot");
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to prune backup");
                }
            }
        }
        removed
    }

    /// Read a snapshot back.
    pub fn load(path: &Path) -> Result<BackupSnapshot, BackupError> {
        let bytes = fs::read(path).map_err(|source| BackupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| BackupError::Format {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn file_name(stamp: DateTime<Utc>) -> String {
    format!("{PREFIX}{}{SUFFIX}", stamp.format("%Y%m%dT%H%M%S%.6fZ"))
}
