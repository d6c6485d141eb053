//! Persisted completed/failed tracking, the sole mechanism for resuming an
//! interrupted run.
//!
//! Every mutation rewrites the whole file through a temp-file rename, so a
//! concurrent or later reader never sees a partial write and a crash loses at
//! most the in-flight record.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AutomationError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureEntry {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerState {
    #[serde(default)]
    processed: Vec<String>,
    #[serde(default)]
    failed: Vec<FailureEntry>,
}

/// End-of-run counts plus the full failure list.
#[derive(Debug, Clone, Default)]
pub struct LedgerSummary {
    pub processed_count: usize,
    pub failed_count: usize,
    pub failures: Vec<FailureEntry>,
}

pub struct ProgressLedger {
    path: PathBuf,
    state: LedgerState,
}

impl ProgressLedger {
    /// Open the ledger at `path`, reading any persisted state. A missing file
    /// starts empty; an undecodable one is logged and treated as empty, never
    /// fatal.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<LedgerState>(&raw) {
                Ok(state) => {
                    info!(
                        "progress loaded: {} processed, {} failed",
                        state.processed.len(),
                        state.failed.len()
                    );
                    state
                }
                Err(e) => {
                    warn!("could not decode progress file {}: {e}", path.display());
                    LedgerState::default()
                }
            },
            Err(_) => LedgerState::default(),
        };
        Self { path, state }
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.state.processed.iter().any(|p| p == id)
    }

    /// Idempotent: marking an already-completed identifier is a no-op.
    pub fn mark_processed(&mut self, id: &str) -> Result<(), AutomationError> {
        if !self.is_processed(id) {
            self.state.processed.push(id.to_string());
            self.flush()?;
        }
        Ok(())
    }

    /// Append-only: repeated failures for the same identifier all remain.
    pub fn mark_failed(&mut self, id: &str, reason: &str) -> Result<(), AutomationError> {
        self.state.failed.push(FailureEntry {
            id: id.to_string(),
            error: reason.to_string(),
        });
        self.flush()
    }

    /// Clear both collections and delete the persisted file.
    pub fn reset(&mut self) -> Result<(), AutomationError> {
        self.state = LedgerState::default();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        info!("progress reset");
        Ok(())
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            processed_count: self.state.processed.len(),
            failed_count: self.state.failed.len(),
            failures: self.state.failed.clone(),
        }
    }

    /// Whole-file replace: serialize into a sibling temp file, then rename it
    /// over the ledger path.
    fn flush(&self) -> Result<(), AutomationError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)?;

        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| AutomationError::Io(std::io::Error::other(e)))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        use std::io::Write;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path)
            .map_err(|e| AutomationError::Io(e.error))?;
        Ok(())
    }
}
