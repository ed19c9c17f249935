//! Change detection against a [`HashLedger`].

use sha2::{Digest, Sha256};

use crate::{HashLedger, LedgerError, LedgerStore};

/// Lower-case hex SHA-256 of `content`.
#[must_use]
pub fn fingerprint(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Compares document fingerprints against the ledger of the previous build.
///
/// The ledger lives in memory for the duration of one build cycle and is
/// flushed once at the end with [`ChangeDetector::persist`].
#[derive(Debug)]
pub struct ChangeDetector {
    ledger: HashLedger,
}

impl ChangeDetector {
    /// Load the ledger from `store`.
    ///
    /// A missing or unreadable ledger degrades to an empty one, which makes
    /// every document look changed and forces a full rebuild. Never fails.
    pub fn load(store: &dyn LedgerStore) -> Self {
        let ledger = match store.load() {
            Ok(Some(ledger)) => ledger,
            Ok(None) => {
                tracing::warn!("no hash ledger found, rebuilding every document");
                HashLedger::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "hash ledger unreadable, rebuilding every document");
                HashLedger::default()
            }
        };
        Self { ledger }
    }

    /// Start from an explicit ledger.
    #[must_use]
    pub fn with_ledger(ledger: HashLedger) -> Self {
        Self { ledger }
    }

    /// Report whether `content` differs from what was last seen for `filename`.
    ///
    /// The ledger entry is updated to the new fingerprint either way.
    pub fn has_changed(&mut self, filename: &str, content: &[u8]) -> bool {
        self.observe(filename, fingerprint(content))
    }

    /// Same as [`has_changed`](Self::has_changed) for an already computed fingerprint.
    pub fn observe(&mut self, filename: &str, fingerprint: String) -> bool {
        match self.ledger.insert(filename, fingerprint) {
            Some(previous) => self.ledger.get(filename) != Some(previous.as_str()),
            None => true,
        }
    }

    /// Drop the entry for `filename` so the next cycle treats it as changed.
    pub fn forget(&mut self, filename: &str) {
        self.ledger.remove(filename);
    }

    #[must_use]
    pub fn ledger(&self) -> &HashLedger {
        &self.ledger
    }

    /// Flush the ledger to `store`.
    pub fn persist(&self, store: &dyn LedgerStore) -> Result<(), LedgerError> {
        store.save(&self.ledger)
    }
}
