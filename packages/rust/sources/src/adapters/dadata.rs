//! Business registry adapter (DaData party lookup sandbox).
//!
//! The sandbox page takes a JSON query in an editor and renders the raw JSON
//! response; the adapter parses that response instead of scraping fields.

use innscan_browser::{Browser, BrowserLauncher, Keys, Locator, OnTimeout, WaitCondition, Waiter};
use innscan_shared::{EnrichmentRecord, Inn, InnScanError, Result};
use serde_json::Value;
use tracing::{error, instrument, warn};

use super::EnrichmentSource;

const QUERY_EDITOR: &str = r#"//div[contains(text(), '"query":')]"#;
const SEND_BUTTON: &str = "//button[@data-test='sandbox-btn']";
const RESULTS: &str = "//pre[@data-test='sandbox-results']";
/// Present in the response body once the request has completed.
const RESULTS_READY_TEXT: &str = "suggestions";

/// Looks up legal-entity attributes by INN.
#[derive(Debug, Clone)]
pub struct DadataAdapter<L> {
    launcher: L,
    waiter: Waiter,
    sandbox_url: String,
}

impl<L: BrowserLauncher> DadataAdapter<L> {
    pub fn new(launcher: L, waiter: Waiter, sandbox_url: impl Into<String>) -> Self {
        Self {
            launcher,
            waiter,
            sandbox_url: sandbox_url.into(),
        }
    }

    async fn query<B: Browser>(&self, browser: &mut B, inn: &Inn) -> Result<Value> {
        browser.goto(&self.sandbox_url).await?;

        let editor = browser
            .find(&Locator::xpath(QUERY_EDITOR))
            .await?
            .ok_or_else(|| InnScanError::extraction("query editor not found"))?;
        browser.click(&editor).await?;
        browser.send_keys(&editor, Keys::SELECT_ALL).await?;
        browser
            .send_keys(&editor, &format!(r#"{{ "query": "{inn}" }}"#))
            .await?;

        let send = browser
            .find(&Locator::xpath(SEND_BUTTON))
            .await?
            .ok_or_else(|| InnScanError::extraction("send button not found"))?;
        browser.click(&send).await?;

        let results = self
            .waiter
            .until(
                browser,
                &Locator::xpath(RESULTS),
                &WaitCondition::TextInElement(RESULTS_READY_TEXT.into()),
                OnTimeout::Fail,
            )
            .await?
            .ok_or_else(|| InnScanError::extraction("results block not found"))?;

        let body = browser.text(&results).await?;
        serde_json::from_str(&body)
            .map_err(|e| InnScanError::extraction(format!("malformed registry response: {e}")))
    }
}

impl<L: BrowserLauncher> EnrichmentSource for DadataAdapter<L> {
    #[instrument(skip_all, fields(inn = %inn))]
    async fn lookup(&self, inn: &Inn) -> EnrichmentRecord {
        let mut browser = match self.launcher.launch().await {
            Ok(browser) => browser,
            Err(e) => {
                error!(inn = %inn, error = %e, "could not open business registry session");
                return EnrichmentRecord::default();
            }
        };
        let response = self.query(&mut browser, inn).await;
        if let Err(e) = browser.close().await {
            warn!(inn = %inn, error = %e, "failed to close business registry session");
        }

        match response {
            Ok(body) => parse_party(&body),
            Err(e) => {
                error!(inn = %inn, error = %e, "business registry lookup failed");
                EnrichmentRecord::default()
            }
        }
    }
}

/// Map the first suggestion of a party lookup response.
///
/// Missing keys at any depth yield `None` fields.
pub(crate) fn parse_party(body: &Value) -> EnrichmentRecord {
    let data = &body["suggestions"][0]["data"];
    let string = |v: &Value| v.as_str().map(str::to_string);

    EnrichmentRecord {
        name_full: string(&data["name"]["full_with_opf"]),
        name_short: string(&data["name"]["short_with_opf"]),
        responsible_person: person_name(&data["founders"][0]["fio"])
            .or_else(|| person_name(&data["fio"])),
        okato: string(&data["okato"]),
        oktmo: string(&data["oktmo"]),
        okpo: string(&data["okpo"]),
        address: match &data["address"]["data"] {
            Value::Null => None,
            address => Some(address.clone()),
        },
        status: string(&data["state"]["status"]),
    }
}

/// "Surname Name Patronymic", skipping absent parts. `None` if all are absent.
fn person_name(fio: &Value) -> Option<String> {
    let parts: Vec<&str> = ["surname", "name", "patronymic"]
        .iter()
        .filter_map(|key| fio[*key].as_str())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    (!parts.is_empty()).then(|| parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use innscan_browser::fake::{FakeElement, FakeLauncher, FakePage};
    use innscan_shared::WaitConfig;
    use serde_json::json;

    const SANDBOX_URL: &str = "https://registry.test/api/find-party/";

    fn adapter(launcher: &FakeLauncher) -> DadataAdapter<FakeLauncher> {
        let waiter = Waiter::new(WaitConfig {
            timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
        });
        DadataAdapter::new(launcher.clone(), waiter, SANDBOX_URL)
    }

    fn sandbox(response: &str) -> FakePage {
        FakePage::new()
            .with(QUERY_EDITOR, FakeElement::text(r#"{ "query": "7707083893" }"#))
            .with(SEND_BUTTON, FakeElement::text("Отправить"))
            .with(RESULTS, FakeElement::text(response))
    }

    fn inn() -> Inn {
        Inn::parse("7701234567").unwrap()
    }

    fn full_response() -> Value {
        json!({
            "suggestions": [{
                "value": "ООО \"РОМАШКА\"",
                "data": {
                    "name": {
                        "full_with_opf": "ОБЩЕСТВО С ОГРАНИЧЕННОЙ ОТВЕТСТВЕННОСТЬЮ \"РОМАШКА\"",
                        "short_with_opf": "ООО \"РОМАШКА\""
                    },
                    "founders": [{
                        "fio": { "surname": "Иванов", "name": "Иван", "patronymic": "Иванович" }
                    }],
                    "okato": "45286555000",
                    "oktmo": "45382000000",
                    "okpo": "12345678",
                    "address": {
                        "value": "г Москва",
                        "data": { "region": "Москва", "postal_code": "101000" }
                    },
                    "state": { "status": "ACTIVE" }
                }
            }]
        })
    }

    #[test]
    fn parses_first_suggestion() {
        let record = parse_party(&full_response());

        assert_eq!(record.name_short.as_deref(), Some("ООО \"РОМАШКА\""));
        assert_eq!(
            record.responsible_person.as_deref(),
            Some("Иванов Иван Иванович")
        );
        assert_eq!(record.okato.as_deref(), Some("45286555000"));
        assert_eq!(record.oktmo.as_deref(), Some("45382000000"));
        assert_eq!(record.okpo.as_deref(), Some("12345678"));
        assert_eq!(
            record.address,
            Some(json!({ "region": "Москва", "postal_code": "101000" }))
        );
        assert_eq!(record.status.as_deref(), Some("ACTIVE"));
    }

    #[test]
    fn name_parts_skip_missing_pieces() {
        let body = json!({ "suggestions": [{ "data": {
            "founders": [{ "fio": { "surname": "Петров", "patronymic": "Олегович" } }]
        }}]});
        assert_eq!(
            parse_party(&body).responsible_person.as_deref(),
            Some("Петров Олегович")
        );
    }

    #[test]
    fn sole_trader_name_comes_from_own_fio() {
        let body = json!({ "suggestions": [{ "data": {
            "fio": { "surname": "Сидорова", "name": "Анна", "patronymic": null }
        }}]});
        assert_eq!(
            parse_party(&body).responsible_person.as_deref(),
            Some("Сидорова Анна")
        );
    }

    #[test]
    fn no_person_data_is_none_not_empty() {
        let body = json!({ "suggestions": [{ "data": { "founders": [{ "fio": {} }] } }]});
        assert_eq!(parse_party(&body).responsible_person, None);
    }

    #[test]
    fn empty_or_odd_payloads_yield_empty_record() {
        assert_eq!(parse_party(&json!({ "suggestions": [] })), EnrichmentRecord::default());
        assert_eq!(parse_party(&json!({})), EnrichmentRecord::default());
        assert_eq!(parse_party(&json!([1, 2, 3])), EnrichmentRecord::default());
    }

    #[tokio::test]
    async fn submits_query_and_parses_response() {
        let launcher =
            FakeLauncher::new().with_page(SANDBOX_URL, sandbox(&full_response().to_string()));

        let record = adapter(&launcher).lookup(&inn()).await;
        assert_eq!(record.status.as_deref(), Some("ACTIVE"));

        let log = launcher.log();
        assert_eq!(
            log.typed,
            vec![
                (QUERY_EDITOR.to_string(), Keys::SELECT_ALL.to_string()),
                (QUERY_EDITOR.to_string(), r#"{ "query": "7701234567" }"#.to_string()),
            ]
        );
        assert_eq!(log.clicked, vec![QUERY_EDITOR.to_string(), SEND_BUTTON.to_string()]);
        assert_eq!(log.closed, 1);
    }

    #[tokio::test]
    async fn response_never_arrives() {
        let launcher = FakeLauncher::new().with_page(SANDBOX_URL, sandbox("loading..."));

        let record = adapter(&launcher).lookup(&inn()).await;

        assert_eq!(record, EnrichmentRecord::default());
        assert_eq!(launcher.log().closed, 1);
    }

    #[tokio::test]
    async fn malformed_response_is_contained() {
        let launcher =
            FakeLauncher::new().with_page(SANDBOX_URL, sandbox(r#"{"suggestions": [oops"#));

        let record = adapter(&launcher).lookup(&inn()).await;
        assert_eq!(record, EnrichmentRecord::default());
    }
}
