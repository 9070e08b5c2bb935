//! Source adapters for the bankruptcy registry, the arbitration court case
//! search, and the business registry.
//!
//! This crate provides:
//! - [`PrimarySource`], [`CaseSource`], [`EnrichmentSource`]: what the pipeline calls
//! - [`FedresursAdapter`], [`KadArbitrAdapter`], [`DadataAdapter`]: browser-driven implementations

pub mod adapters;

pub use adapters::{
    CaseSource, DadataAdapter, EnrichmentSource, FedresursAdapter, KadArbitrAdapter,
    PrimarySource,
};
