//! W3C WebDriver implementation of the automation capability.
//!
//! Talks to a WebDriver server (chromedriver, a Selenium grid, ...) over its
//! JSON HTTP protocol. One [`WebDriverSession`] per `POST /session`.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use innscan_shared::{BrowserConfig, InnScanError, Result};

use crate::automation::{Browser, BrowserLauncher, ElementRef, Locator};

/// Key under which W3C WebDriver serializes element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// HTTP timeout for a single protocol command.
const COMMAND_TIMEOUT_SECS: u64 = 60;

/// Chrome switch hiding the automation banner and `navigator.webdriver`.
const STEALTH_ARG: &str = "--disable-blink-features=AutomationControlled";

// ---------------------------------------------------------------------------
// Launcher
// ---------------------------------------------------------------------------

/// Opens Chrome sessions on a WebDriver server.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    client: Client,
    endpoint: String,
    window: (u32, u32),
    headless: bool,
}

impl WebDriverLauncher {
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(COMMAND_TIMEOUT_SECS))
            .build()
            .map_err(|e| InnScanError::Automation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.as_str().trim_end_matches('/').to_string(),
            window: config.window,
            headless: config.headless,
        })
    }

    fn capabilities(&self) -> Value {
        let mut args = vec![STEALTH_ARG.to_string()];
        if self.headless {
            args.push("--headless=new".into());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

impl BrowserLauncher for WebDriverLauncher {
    type Session = WebDriverSession;

    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn launch(&self) -> Result<WebDriverSession> {
        let url = format!("{}/session", self.endpoint);
        let value = send(&self.client, Method::POST, &url, Some(self.capabilities())).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| InnScanError::Automation("new session response has no sessionId".into()))?;
        debug!(session_id, "webdriver session started");

        let session = WebDriverSession {
            client: self.client.clone(),
            base: format!("{url}/{session_id}"),
        };

        let (width, height) = self.window;
        if let Err(e) = session
            .command(
                Method::POST,
                "window/rect",
                Some(json!({ "width": width, "height": height })),
            )
            .await
        {
            // Don't leak the browser if the first command already fails.
            let _ = session.command(Method::DELETE, "", None).await;
            return Err(e);
        }

        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One live WebDriver session.
#[derive(Debug)]
pub struct WebDriverSession {
    client: Client,
    /// `{endpoint}/session/{id}`
    base: String,
}

impl WebDriverSession {
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = if path.is_empty() {
            self.base.clone()
        } else {
            format!("{}/{path}", self.base)
        };
        send(&self.client, method, &url, body).await
    }

    async fn element_command(
        &self,
        method: Method,
        element: &ElementRef,
        action: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        self.command(method, &format!("element/{}/{action}", element.0), body)
            .await
    }
}

impl Browser for WebDriverSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.command(Method::POST, "url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        let value = self.command(Method::GET, "url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| InnScanError::Automation("current url is not a string".into()))
    }

    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<ElementRef>> {
        let value = self
            .command(
                Method::POST,
                "elements",
                Some(json!({ "using": "xpath", "value": locator.as_str() })),
            )
            .await?;

        let items = value.as_array().ok_or_else(|| {
            InnScanError::Automation(format!("find elements for {locator} returned no array"))
        })?;
        Ok(items
            .iter()
            .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str))
            .map(|id| ElementRef(id.to_string()))
            .collect())
    }

    async fn text(&mut self, element: &ElementRef) -> Result<String> {
        let value = self
            .element_command(Method::GET, element, "text", None)
            .await
            .map_err(|e| InnScanError::extraction(format!("reading text: {e}")))?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| InnScanError::extraction("element text is not a string"))
    }

    async fn is_displayed(&mut self, element: &ElementRef) -> Result<bool> {
        let value = self
            .element_command(Method::GET, element, "displayed", None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&mut self, element: &ElementRef) -> Result<bool> {
        let value = self
            .element_command(Method::GET, element, "enabled", None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&mut self, element: &ElementRef) -> Result<()> {
        self.element_command(Method::POST, element, "click", Some(json!({})))
            .await?;
        Ok(())
    }

    async fn send_keys(&mut self, element: &ElementRef, text: &str) -> Result<()> {
        self.element_command(Method::POST, element, "value", Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    async fn window_handles(&mut self) -> Result<Vec<String>> {
        let value = self.command(Method::GET, "window/handles", None).await?;
        Ok(value
            .as_array()
            .map(|handles| {
                handles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn switch_to_window(&mut self, handle: &str) -> Result<()> {
        self.command(Method::POST, "window", Some(json!({ "handle": handle })))
            .await?;
        Ok(())
    }

    async fn print_pdf(&mut self) -> Result<Vec<u8>> {
        let value = self
            .command(Method::POST, "print", Some(json!({ "background": true })))
            .await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| InnScanError::Automation("print returned no document".into()))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| InnScanError::Automation(format!("print returned invalid base64: {e}")))
    }

    async fn close(self) -> Result<()> {
        self.command(Method::DELETE, "", None).await?;
        debug!(session = %self.base, "webdriver session closed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Send one protocol command and unwrap its `value`.
async fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| InnScanError::Automation(format!("{url}: {e}")))?;
    let status = response.status();
    let payload: Value = response
        .json()
        .await
        .map_err(|e| InnScanError::Automation(format!("{url}: invalid response body: {e}")))?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let kind = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let message = value.get("message").and_then(Value::as_str).unwrap_or("");
        return Err(InnScanError::Automation(format!(
            "{url}: HTTP {status}: {kind}: {message}"
        )));
    }

    Ok(value)
}
