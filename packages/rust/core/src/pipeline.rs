//! Batch pipeline: raw ID → validate → registry → cases → enrichment → store.
//!
//! IDs are processed one at a time and each one runs to completion before
//! the next starts. Nothing that happens to one ID stops the batch.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use innscan_shared::Inn;
use innscan_sources::{CaseSource, EnrichmentSource, PrimarySource};
use innscan_storage::Storage;
use tracing::{Span, debug, error, field, info, instrument, warn};
use uuid::Uuid;

use crate::reconcile::{self, EntityRecord, PersistOutcome};

/// Where one ID currently is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    FetchingPrimary,
    FetchingCases,
    FetchingEnrichment,
    Persisting,
    Done,
    /// Processing was cut short by an unexpected failure.
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validating => "validating",
            Self::FetchingPrimary => "bankruptcy registry",
            Self::FetchingCases => "court cases",
            Self::FetchingEnrichment => "business registry",
            Self::Persisting => "saving",
            Self::Done => "done",
            Self::Error => "failed",
        })
    }
}

/// How processing ended for one ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdOutcome {
    /// Record written; `replaced` if it overwrote an earlier one.
    Saved { cases: usize, replaced: bool },
    /// Not a 10- or 12-digit ID. No source was queried.
    Invalid,
    /// The bankruptcy registry has neither a name nor cases for this ID.
    NotFound,
    /// Sources were queried but the record could not be written.
    PersistFailed,
    /// Processing panicked part-way.
    Failed,
}

/// Totals for one batch run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub total: usize,
    pub saved: usize,
    pub invalid: usize,
    pub not_found: usize,
    pub persist_failed: usize,
    pub failed: usize,
    /// IDs seen more than once in the batch (each repeat counted).
    pub duplicates: usize,
}

impl RunSummary {
    fn new(run_id: Uuid, total: usize) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            total,
            saved: 0,
            invalid: 0,
            not_found: 0,
            persist_failed: 0,
            failed: 0,
            duplicates: 0,
        }
    }

    fn record(&mut self, outcome: IdOutcome) {
        match outcome {
            IdOutcome::Saved { .. } => self.saved += 1,
            IdOutcome::Invalid => self.invalid += 1,
            IdOutcome::NotFound => self.not_found += 1,
            IdOutcome::PersistFailed => self.persist_failed += 1,
            IdOutcome::Failed => self.failed += 1,
        }
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when an ID enters a new stage.
    fn phase(&self, id: &str, stage: Stage);
    /// Called before an ID is processed. `current` is 1-based.
    fn id_started(&self, id: &str, current: usize, total: usize);
    /// Called after an ID is processed, whatever the outcome.
    fn id_finished(&self, id: &str, outcome: IdOutcome);
    /// Called when the batch completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _id: &str, _stage: Stage) {}
    fn id_started(&self, _id: &str, _current: usize, _total: usize) {}
    fn id_finished(&self, _id: &str, _outcome: IdOutcome) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// The three sources plus the store, driven one ID at a time.
pub struct Pipeline<P, C, E> {
    primary: P,
    cases: C,
    enrichment: E,
    storage: Storage,
}

impl<P, C, E> Pipeline<P, C, E>
where
    P: PrimarySource,
    C: CaseSource,
    E: EnrichmentSource,
{
    pub fn new(primary: P, cases: C, enrichment: E, storage: Storage) -> Self {
        Self {
            primary,
            cases,
            enrichment,
            storage,
        }
    }

    #[cfg(test)]
    fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Process every ID in `ids`, in order.
    #[instrument(skip_all, fields(run_id = field::Empty, total = ids.len()))]
    pub async fn run(&self, ids: &[String], progress: &dyn ProgressReporter) -> RunSummary {
        let start = Instant::now();
        let run_id = Uuid::now_v7();
        Span::current().record("run_id", field::display(run_id));

        let mut summary = RunSummary::new(run_id, ids.len());
        let mut seen = HashSet::new();
        info!(%run_id, total = ids.len(), "starting run");

        for (index, raw) in ids.iter().enumerate() {
            progress.id_started(raw, index + 1, ids.len());

            if !seen.insert(raw.as_str()) {
                summary.duplicates += 1;
                warn!(id = %raw, "ID already processed in this run, its record will be overwritten");
            }

            let outcome = match AssertUnwindSafe(self.process_one(raw, progress))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(payload) => {
                    error!(id = %raw, panic = panic_message(&*payload), "processing failed");
                    progress.phase(raw, Stage::Error);
                    IdOutcome::Failed
                }
            };
            summary.record(outcome);

            info!(id = %raw, ?outcome, "finished processing {raw}");
            progress.id_finished(raw, outcome);
        }

        summary.elapsed = start.elapsed();
        info!(
            %run_id,
            saved = summary.saved,
            invalid = summary.invalid,
            not_found = summary.not_found,
            persist_failed = summary.persist_failed,
            failed = summary.failed,
            duplicates = summary.duplicates,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "run complete"
        );
        progress.done(&summary);
        summary
    }

    /// Take one raw ID through every stage.
    pub async fn process_one(&self, raw: &str, progress: &dyn ProgressReporter) -> IdOutcome {
        let enter = |stage: Stage| {
            debug!(id = %raw, %stage, "entering stage");
            progress.phase(raw, stage);
        };

        enter(Stage::Validating);
        let inn = match Inn::parse(raw) {
            Ok(inn) => inn,
            Err(e) => {
                warn!(id = %raw, error = %e, "skipping invalid ID");
                return IdOutcome::Invalid;
            }
        };

        enter(Stage::FetchingPrimary);
        let primary = self.primary.lookup(&inn).await;
        if primary.is_absent() {
            info!(inn = %inn, "no bankruptcy registry presence, nothing to save");
            return IdOutcome::NotFound;
        }
        if let Some(listed) = primary.canonical_id.as_deref() {
            if listed != inn.as_str() {
                warn!(inn = %inn, listed, "registry card shows a different ID");
            }
        }

        let mut cases = Vec::with_capacity(primary.case_numbers.len());
        if !primary.case_numbers.is_empty() {
            enter(Stage::FetchingCases);
            for case_number in &primary.case_numbers {
                cases.push(self.cases.lookup_case(case_number).await);
            }
        }

        enter(Stage::FetchingEnrichment);
        let enrichment = self.enrichment.lookup(&inn).await;

        enter(Stage::Persisting);
        let record = EntityRecord::assemble(inn, primary, cases, enrichment);
        let outcome = match reconcile::persist(&self.storage, &record).await {
            PersistOutcome::Written { cases, replaced } => {
                info!(inn = %record.inn, cases, "saved record");
                IdOutcome::Saved { cases, replaced }
            }
            PersistOutcome::Failed => IdOutcome::PersistFailed,
        };

        enter(Stage::Done);
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
