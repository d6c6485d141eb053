//! Coordinate-driven bulk territory entry for the New World Scheduler desktop
//! application.
//!
//! The target application exposes no automation API, so records are replayed
//! as blind UI interactions against a pre-calibrated coordinate table. The
//! orchestrator tracks completed records in a persisted ledger, which makes
//! interrupted runs resumable, and retries transient UI failures with a
//! bounded budget.

pub mod config;
pub mod errors;
pub mod form;
pub mod input;
pub mod ledger;
pub mod records;
pub mod runner;
pub mod session;
#[cfg(test)]
mod tests;

pub use config::{
    AutomationConfig, CloseMethod, CoordinateTable, DelayProfile, StartupDialogConfig,
};
pub use errors::AutomationError;
pub use form::FormDriver;
pub use input::{create_backend, KeyTap, SystemBackend, UiBackend, WindowHandle};
pub use ledger::{FailureEntry, LedgerSummary, ProgressLedger};
pub use records::{ColumnMapping, RecordSource, TerritoryRecord, TerritoryType};
pub use runner::{
    verify_attachments, ConfirmationGate, LineGate, Orchestrator, RunMode, RunSummary,
    StdinGate, VerifyReport, MAX_RETRIES,
};
pub use session::SessionManager;
