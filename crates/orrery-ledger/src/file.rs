//! File-based ledger store.
//!
//! [`FileLedgerStore`] keeps the ledger as one pretty-printed JSON object:
//!
//! ```text
//! {
//!   "guide.html": "9f86d081884c7d65...",
//!   "index.html": "2c26b46b68ffc68f..."
//! }
//! ```
//!
//! Saves go through [`write_atomic`](crate::write_atomic), so a crash mid-save
//! leaves the previous ledger intact.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::{HashLedger, LedgerError, LedgerStore, write_atomic};

/// [`LedgerStore`] backed by a JSON file.
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl LedgerStore for FileLedgerStore {
    fn load(&self) -> Result<Option<HashLedger>, LedgerError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LedgerError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| LedgerError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, ledger: &HashLedger) -> Result<(), LedgerError> {
        let mut json = serde_json::to_vec_pretty(ledger).map_err(|source| LedgerError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        json.push(b'\n');
        write_atomic(&self.path, &json).map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), entries = ledger.len(), "ledger saved");
        Ok(())
    }
}
