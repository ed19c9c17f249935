//! Content fingerprint ledger for Orrery.
//!
//! This crate decides which source documents need regenerating. Three pieces
//! form the API:
//!
//! - [`HashLedger`]: Mapping from source filename to last-seen fingerprint
//! - [`LedgerStore`]: Where a ledger is loaded from and flushed to
//! - [`ChangeDetector`]: Compares fresh fingerprints against the ledger
//!
//! # Implementations
//!
//! - [`NullLedgerStore`]: No-op store (every file always looks changed)
//! - [`FileLedgerStore`]: JSON file on disk, replaced atomically on save
//!
//! # Example
//!
//! ```
//! use orrery_ledger::{ChangeDetector, NullLedgerStore};
//!
//! let mut detector = ChangeDetector::load(&NullLedgerStore);
//! assert!(detector.has_changed("index.html", b"<h1>Home</h1>"));
//! assert!(!detector.has_changed("index.html", b"<h1>Home</h1>"));
//! ```

mod atomic;
mod detector;
mod file;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use atomic::write_atomic;
pub use detector::{ChangeDetector, fingerprint};
pub use file::FileLedgerStore;

/// Persistent mapping from source filename to content fingerprint.
///
/// Keys are kept sorted so the serialized form is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashLedger {
    entries: BTreeMap<String, String>,
}

impl HashLedger {
    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&str> {
        self.entries.get(filename).map(String::as_str)
    }

    /// Record `fingerprint` for `filename`, returning the previous value.
    pub fn insert(&mut self, filename: &str, fingerprint: String) -> Option<String> {
        self.entries.insert(filename.to_owned(), fingerprint)
    }

    pub fn remove(&mut self, filename: &str) -> Option<String> {
        self.entries.remove(filename)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Error raised while loading or saving a ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// I/O error.
    #[error("ledger I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The stored ledger is not valid JSON of the expected shape.
    #[error("corrupt ledger at {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Backing store for a [`HashLedger`].
pub trait LedgerStore: Send + Sync {
    /// Load the persisted ledger.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<HashLedger>, LedgerError>;

    /// Persist `ledger`, replacing any previous state.
    fn save(&self, ledger: &HashLedger) -> Result<(), LedgerError>;
}

/// No-op [`LedgerStore`] used when incremental builds are disabled.
///
/// Always loads an empty ledger and discards saves, so every document is
/// reported as changed on every cycle.
pub struct NullLedgerStore;

impl LedgerStore for NullLedgerStore {
    fn load(&self) -> Result<Option<HashLedger>, LedgerError> {
        Ok(Some(HashLedger::default()))
    }

    fn save(&self, _ledger: &HashLedger) -> Result<(), LedgerError> {
        Ok(())
    }
}
