//! Core domain types: taxpayer IDs, per-source partial results, and stored rows.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{InnScanError, Result};

// ---------------------------------------------------------------------------
// Inn
// ---------------------------------------------------------------------------

/// A validated taxpayer identification number: ASCII digits, 10 or 12 long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inn(String);

impl Inn {
    /// Validate a raw value from the ID source.
    pub fn parse(raw: &str) -> Result<Self> {
        let digits_only = !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit());
        if !digits_only || !matches!(raw.len(), 10 | 12) {
            return Err(InnScanError::validation(format!(
                "invalid INN format: {raw:?} (expected 10 or 12 digits)"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Inn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Inn {
    type Err = InnScanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for Inn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Partial results
// ---------------------------------------------------------------------------

/// What the bankruptcy registry knows about one ID. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryRecord {
    /// Name shown on the registry card.
    pub display_name: Option<String>,
    /// ID as printed by the registry.
    pub canonical_id: Option<String>,
    /// State registration number (OGRN / OGRNIP).
    pub registration_number: Option<String>,
    /// Case identifiers in the order the registry lists them.
    pub case_numbers: Vec<String>,
    /// Archival PDF of the registry card.
    pub archive_path: Option<PathBuf>,
}

impl PrimaryRecord {
    /// No identity and no cases: the registry has nothing on this ID.
    pub fn is_absent(&self) -> bool {
        self.display_name.is_none() && self.case_numbers.is_empty()
    }
}

/// Court details for one case identifier. Role lists are empty, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseRecord {
    pub case_number: String,
    pub claimant_name: Option<String>,
    pub judge_name: Option<String>,
    pub creditors: Vec<String>,
    pub third_parties: Vec<String>,
    pub others: Vec<String>,
}

impl CaseRecord {
    /// The echo-only result for a case the court search did not find.
    pub fn not_found(case_number: impl Into<String>) -> Self {
        Self {
            case_number: case_number.into(),
            ..Self::default()
        }
    }
}

/// Normalized business-registry attributes for one ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentRecord {
    pub name_full: Option<String>,
    pub name_short: Option<String>,
    /// "Surname Name Patronymic" of the responsible person.
    pub responsible_person: Option<String>,
    pub okato: Option<String>,
    pub oktmo: Option<String>,
    pub okpo: Option<String>,
    /// Structured address exactly as the registry returned it.
    pub address: Option<serde_json::Value>,
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Stored rows
// ---------------------------------------------------------------------------

/// One row of `legal_entities`, keyed by INN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalEntity {
    pub inn: String,
    pub display_name: Option<String>,
    pub ogrn: Option<String>,
    /// Case identifiers joined with `", "`; empty when there are none.
    pub case_numbers: String,
    pub archive_path: Option<String>,
    pub name_full: Option<String>,
    pub name_short: Option<String>,
    pub responsible_person: Option<String>,
    pub okato: Option<String>,
    pub oktmo: Option<String>,
    pub okpo: Option<String>,
    /// Address serialized as JSON.
    pub address: Option<String>,
    pub status: Option<String>,
}

/// One row of `bankruptcy_cases`, owned by a [`LegalEntity`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankruptcyCase {
    pub case_number: String,
    pub inn: String,
    pub claimant_name: Option<String>,
    pub judge_name: Option<String>,
    /// Party names joined with `"; "`.
    pub creditors: String,
    pub third_parties: String,
    pub others: String,
}
