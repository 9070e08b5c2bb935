//! Reconciliation: merge the three partial results for one ID into stored rows.

use std::collections::HashSet;

use innscan_shared::{
    BankruptcyCase, CaseRecord, EnrichmentRecord, Inn, LegalEntity, PrimaryRecord,
};
use innscan_storage::Storage;
use tracing::{error, info, warn};

/// Separator of the party names in one role list.
pub const PARTY_SEPARATOR: &str = "; ";

/// Separator of the case numbers in the entity's case summary.
pub const CASE_SEPARATOR: &str = ", ";

/// Everything collected about one ID, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub inn: Inn,
    pub primary: PrimaryRecord,
    /// One result per discovered case, in discovery order.
    pub cases: Vec<CaseRecord>,
    pub enrichment: EnrichmentRecord,
}

impl EntityRecord {
    pub fn assemble(
        inn: Inn,
        primary: PrimaryRecord,
        cases: Vec<CaseRecord>,
        enrichment: EnrichmentRecord,
    ) -> Self {
        Self {
            inn,
            primary,
            cases,
            enrichment,
        }
    }

    /// Build the entity row and its case rows.
    ///
    /// The entity is keyed by the validated input ID. A case number listed
    /// more than once keeps its first result only.
    pub fn to_rows(&self) -> (LegalEntity, Vec<BankruptcyCase>) {
        let inn = self.inn.as_str();

        let mut seen = HashSet::new();
        let mut cases = Vec::with_capacity(self.cases.len());
        for case in &self.cases {
            if !seen.insert(case.case_number.as_str()) {
                warn!(inn, case = %case.case_number, "dropping repeated case number");
                continue;
            }
            cases.push(BankruptcyCase {
                case_number: case.case_number.clone(),
                inn: inn.to_string(),
                claimant_name: case.claimant_name.clone(),
                judge_name: case.judge_name.clone(),
                creditors: case.creditors.join(PARTY_SEPARATOR),
                third_parties: case.third_parties.join(PARTY_SEPARATOR),
                others: case.others.join(PARTY_SEPARATOR),
            });
        }

        let summary = cases
            .iter()
            .map(|c| c.case_number.as_str())
            .collect::<Vec<_>>()
            .join(CASE_SEPARATOR);

        let enrichment = &self.enrichment;
        let entity = LegalEntity {
            inn: inn.to_string(),
            display_name: self.primary.display_name.clone(),
            ogrn: self.primary.registration_number.clone(),
            case_numbers: summary,
            archive_path: self
                .primary
                .archive_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            name_full: enrichment.name_full.clone(),
            name_short: enrichment.name_short.clone(),
            responsible_person: enrichment.responsible_person.clone(),
            okato: enrichment.okato.clone(),
            oktmo: enrichment.oktmo.clone(),
            okpo: enrichment.okpo.clone(),
            // Compact JSON with sorted object keys.
            address: enrichment.address.as_ref().map(|a| a.to_string()),
            status: enrichment.status.clone(),
        };

        (entity, cases)
    }
}

/// Result of one persistence attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Entity and cases committed. `replaced` is set when a prior record existed.
    Written { replaced: bool, cases: usize },
    /// Nothing was committed; the previous record, if any, is untouched.
    Failed,
}

/// Replace whatever is stored for `record.inn` with `record`.
///
/// Storage errors are logged and reported as [`PersistOutcome::Failed`].
pub async fn persist(storage: &Storage, record: &EntityRecord) -> PersistOutcome {
    let (entity, cases) = record.to_rows();

    match storage.replace_entity(&entity, &cases).await {
        Ok(replaced) => {
            if replaced {
                info!(inn = %record.inn, "replaced previously stored record");
            }
            PersistOutcome::Written {
                replaced,
                cases: cases.len(),
            }
        }
        Err(e) => {
            error!(inn = %record.inn, error = %e, "failed to save record");
            PersistOutcome::Failed
        }
    }
}
