//! Source traits and the built-in adapters for the three registries.
//!
//! Every lookup returns a partial record, never an error: a field that could
//! not be read is `None` (or an empty list), and a failure anywhere inside an
//! adapter is logged and leaves whatever was collected so far.

#![allow(async_fn_in_trait)]

mod dadata;
mod fedresurs;
mod kad_arbitr;

use innscan_browser::{Browser, Locator};
use innscan_shared::{CaseRecord, EnrichmentRecord, Inn, InnScanError, PrimaryRecord};
use tracing::warn;

pub use dadata::DadataAdapter;
pub use fedresurs::FedresursAdapter;
pub use kad_arbitr::KadArbitrAdapter;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Bankruptcy registry: identity fields, case list, archival document.
pub trait PrimarySource {
    async fn lookup(&self, inn: &Inn) -> PrimaryRecord;
}

/// Court case search: judge, claimant and parties of one case.
pub trait CaseSource {
    async fn lookup_case(&self, case_number: &str) -> CaseRecord;
}

/// Business registry: normalized legal-entity attributes.
pub trait EnrichmentSource {
    async fn lookup(&self, inn: &Inn) -> EnrichmentRecord;
}

// ---------------------------------------------------------------------------
// Defensive extraction
// ---------------------------------------------------------------------------

/// Trimmed text of the first match for `locator`.
///
/// A missing element, an unreadable one, or blank text all yield `None`
/// with a warning naming `field` and `subject`.
pub(crate) async fn text_of<B: Browser>(
    browser: &mut B,
    locator: &Locator,
    field: &str,
    subject: &str,
) -> Option<String> {
    let read = async {
        let element = browser
            .find(locator)
            .await?
            .ok_or_else(|| InnScanError::extraction(format!("no element at {locator}")))?;
        browser.text(&element).await
    };

    match read.await {
        Ok(text) => non_blank(&text),
        Err(e) => {
            warn!(subject, field, error = %e, "could not extract field");
            None
        }
    }
}

/// Rendered text of every match for `locator`, in document order, one entry
/// per element.
pub(crate) async fn texts_of<B: Browser>(
    browser: &mut B,
    locator: &Locator,
    field: &str,
    subject: &str,
) -> Vec<String> {
    let elements = match browser.find_all(locator).await {
        Ok(elements) => elements,
        Err(e) => {
            warn!(subject, field, error = %e, "could not list elements");
            return Vec::new();
        }
    };

    let mut texts = Vec::with_capacity(elements.len());
    for element in &elements {
        match browser.text(element).await {
            Ok(text) => texts.push(text),
            Err(e) => warn!(subject, field, error = %e, "skipping unreadable entry"),
        }
    }
    texts
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
