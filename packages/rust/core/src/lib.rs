//! Core pipeline orchestration for innscan.
//!
//! This crate ties the sources and the store together: it reads the ID list,
//! drives each ID through the three registries, and writes the merged record.

pub mod input;
pub mod pipeline;
pub mod reconcile;

pub use input::read_ids;
pub use pipeline::{IdOutcome, Pipeline, ProgressReporter, RunSummary, SilentProgress, Stage};
pub use reconcile::{EntityRecord, PersistOutcome, persist};
