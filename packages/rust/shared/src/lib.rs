//! Shared types, error model, and configuration for innscan.
//!
//! This crate is the foundation depended on by all other innscan crates.
//! It provides:
//! - [`InnScanError`]: the unified error type
//! - Domain types ([`Inn`], per-source partial records, stored rows)
//! - Configuration ([`AppConfig`], [`BrowserConfig`], [`WaitConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserConfig, BrowserSection, InputConfig, PathsConfig, SourcesConfig,
    WaitConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{InnScanError, Result};
pub use types::{
    BankruptcyCase, CaseRecord, EnrichmentRecord, Inn, LegalEntity, PrimaryRecord,
};
