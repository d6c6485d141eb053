//! The record-processing orchestrator: drives the record sequence through the
//! form driver with resumability and bounded retry.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tracing::{info, warn};

use crate::config::AutomationConfig;
use crate::errors::AutomationError;
use crate::form::FormDriver;
use crate::ledger::{FailureEntry, ProgressLedger};
use crate::records::TerritoryRecord;
use crate::session::SessionManager;

/// Attempts per record before it is written off as failed.
pub const MAX_RETRIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Full execution; successes are committed to the ledger.
    Normal,
    /// Fill without finalizing; a human confirms each record before the next.
    NoSave,
    /// Report what would be filled without issuing any UI interaction.
    DryRun,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<FailureEntry>,
}

/// Attachment cross-check result, for pre-flight verification.
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub total: usize,
    pub with_attachment: usize,
    pub missing: Vec<String>,
}

/// The manual-checkpoint gate used in no-save mode. Ordering is the real
/// invariant: one record fully confirmed before the next begins.
#[async_trait]
pub trait ConfirmationGate: Send {
    async fn wait(&mut self);
}

/// Blocks on one line from the wrapped reader. EOF counts as confirmation.
///
/// The reader lives as long as the gate, so lines typed ahead of the current
/// confirmation stay buffered for the following ones.
pub struct LineGate<R> {
    reader: R,
}

impl<R> LineGate<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl LineGate<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

/// The console gate used by default.
pub type StdinGate = LineGate<BufReader<Stdin>>;

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> ConfirmationGate for LineGate<R> {
    async fn wait(&mut self) {
        let mut line = String::new();
        let _ = self.reader.read_line(&mut line).await;
    }
}

pub struct Orchestrator {
    records: Vec<TerritoryRecord>,
    ledger: ProgressLedger,
    session: SessionManager,
    driver: FormDriver,
    start_from: usize,
    gate: Box<dyn ConfirmationGate>,
}

impl Orchestrator {
    pub fn new(
        records: Vec<TerritoryRecord>,
        ledger: ProgressLedger,
        session: SessionManager,
        driver: FormDriver,
    ) -> Self {
        Self {
            records,
            ledger,
            session,
            driver,
            start_from: 0,
            gate: Box::new(LineGate::stdin()),
        }
    }

    /// Skip records whose index precedes `index`.
    pub fn with_start_from(mut self, index: usize) -> Self {
        self.start_from = index;
        self
    }

    pub fn with_gate(mut self, gate: Box<dyn ConfirmationGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn reset_progress(&mut self) -> Result<(), AutomationError> {
        self.ledger.reset()
    }

    /// Process every record in source order: skip-if-done, bounded retry,
    /// per-record failure containment, end-of-run summary.
    pub async fn run(&mut self, mode: RunMode) -> Result<RunSummary, AutomationError> {
        let total = self.records.len();
        info!("=== starting run ===");
        info!("records to process: {total}");
        if mode == RunMode::NoSave {
            info!("VALIDATION MODE: fields are filled but NOT saved");
            info!("press Enter after each record to continue, Ctrl+C to stop");
        }

        if mode != RunMode::DryRun {
            self.session.launch_or_connect().await?;
        }

        let mut summary = RunSummary {
            total,
            ..Default::default()
        };

        let records = self.records.clone();
        for (index, record) in records.iter().enumerate() {
            if index < self.start_from {
                summary.skipped += 1;
                continue;
            }

            let id = record.identifier.as_str();
            if self.ledger.is_processed(id) {
                info!("[{}/{}] {} - already processed, skipped", index + 1, total, id);
                summary.skipped += 1;
                continue;
            }

            info!("[{}/{}] processing {}", index + 1, total, id);

            if mode == RunMode::DryRun {
                self.report_dry_run(record);
                summary.processed += 1;
                continue;
            }

            if self.attempt_with_retries(record, mode).await? {
                if mode == RunMode::NoSave {
                    info!("  -> territory {id} filled (NOT saved)");
                    info!("  -> check the fields, then press Enter...");
                    self.gate.wait().await;
                } else {
                    self.ledger.mark_processed(id)?;
                }
                summary.processed += 1;
            } else {
                self.ledger
                    .mark_failed(id, "failed after repeated attempts")?;
                summary.failed += 1;
            }
        }

        info!("=== run complete ===");
        info!("processed: {}", summary.processed);
        info!("failed: {}", summary.failed);

        let ledger_summary = self.ledger.summary();
        if !ledger_summary.failures.is_empty() {
            warn!("territories in failure:");
            for failure in &ledger_summary.failures {
                warn!("  - {}: {}", failure.id, failure.error);
            }
        }
        summary.failures = ledger_summary.failures;
        Ok(summary)
    }

    /// Retry retryable UI failures up to [`MAX_RETRIES`]; configuration and
    /// data errors abort the whole run.
    async fn attempt_with_retries(
        &mut self,
        record: &TerritoryRecord,
        mode: RunMode,
    ) -> Result<bool, AutomationError> {
        let no_save = mode == RunMode::NoSave;
        for attempt in 1..=MAX_RETRIES {
            match self
                .driver
                .process_record(&mut self.session, record, no_save)
                .await
            {
                Ok(()) => return Ok(true),
                Err(e) if e.is_retryable() => {
                    warn!("attempt {attempt}/{MAX_RETRIES} failed: {e}");
                    if attempt < MAX_RETRIES {
                        info!("retrying...");
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    fn report_dry_run(&self, record: &TerritoryRecord) {
        let path = self.driver.attachment_path(record);
        let present = path.exists();
        info!("  -> number: {}", record.identifier);
        info!("  -> suffix: {}", record.suffix);
        info!("  -> type: {}", record.kind);
        info!(
            "  -> attachment: {} ({})",
            record.attachment_filename(),
            if present { "OK" } else { "MISSING" }
        );
    }
}


/// Cross-check every record against the attachment directory without touching
/// the UI.
pub fn verify_attachments(records: &[TerritoryRecord], config: &AutomationConfig) -> VerifyReport {
    let mut report = VerifyReport {
        total: records.len(),
        ..Default::default()
    };
    for record in records {
        let filename = record.attachment_filename();
        if config.attachment_dir.join(&filename).exists() {
            report.with_attachment += 1;
        } else {
            report.missing.push(filename);
        }
    }

    info!("=== data verification ===");
    info!("total territories: {}", report.total);
    info!("with attachment: {}", report.with_attachment);
    info!("without attachment: {}", report.missing.len());
    if !report.missing.is_empty() {
        warn!("missing attachments ({}):", report.missing.len());
        for filename in report.missing.iter().take(10) {
            warn!("  - {filename}");
        }
        if report.missing.len() > 10 {
            warn!("  ... and {} more", report.missing.len() - 10);
        }
    }
    report
}
