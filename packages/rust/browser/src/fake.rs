//! Scripted in-memory browser for tests.
//!
//! Pages are registered per URL as a flat list of `(xpath, element)` pairs;
//! locators are matched verbatim, not evaluated. Clicking an element can open
//! a new window on another registered URL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use innscan_shared::{InnScanError, Result};

use crate::automation::{Browser, BrowserLauncher, ElementRef, Locator};

/// A scripted element.
#[derive(Debug, Clone)]
pub struct FakeElement {
    text: Option<String>,
    displayed: bool,
    enabled: bool,
    appear_after: usize,
    opens: Option<String>,
}

impl FakeElement {
    /// A visible, enabled element with the given text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            displayed: true,
            enabled: true,
            appear_after: 0,
            opens: None,
        }
    }

    /// An element whose text cannot be read.
    pub fn unreadable() -> Self {
        Self {
            text: None,
            ..Self::text("")
        }
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Invisible to the first `lookups` searches for its locator.
    pub fn appearing_after(mut self, lookups: usize) -> Self {
        self.appear_after = lookups;
        self
    }

    /// Clicking opens `url` in a new window.
    pub fn opens(mut self, url: impl Into<String>) -> Self {
        self.opens = Some(url.into());
        self
    }
}

/// A scripted page.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    elements: Vec<(String, FakeElement)>,
    broken: Vec<String>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element matched by `xpath`. Repeat for multiple matches.
    pub fn with(mut self, xpath: &str, element: FakeElement) -> Self {
        self.elements.push((xpath.to_string(), element));
        self
    }

    /// Searching for `xpath` fails with a driver error.
    pub fn breaking(mut self, xpath: &str) -> Self {
        self.broken.push(xpath.to_string());
        self
    }

    fn matches(&self, xpath: &str) -> impl Iterator<Item = (usize, &FakeElement)> {
        self.elements
            .iter()
            .enumerate()
            .filter(move |(_, (x, _))| x == xpath)
            .map(|(i, (_, el))| (i, el))
    }
}

/// Everything the fake sessions did, for assertions.
#[derive(Debug, Clone, Default)]
pub struct FakeLog {
    pub launched: usize,
    pub closed: usize,
    pub visited: Vec<String>,
    pub clicked: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub printed: Vec<String>,
}

/// Launches [`FakeSession`]s over a fixed set of pages.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    site: Arc<HashMap<String, FakePage>>,
    log: Arc<Mutex<FakeLog>>,
    refuse: bool,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, page: FakePage) -> Self {
        Arc::make_mut(&mut self.site).insert(url.to_string(), page);
        self
    }

    /// Every launch fails.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn log(&self) -> FakeLog {
        self.log.lock().expect("fake log poisoned").clone()
    }
}

impl BrowserLauncher for FakeLauncher {
    type Session = FakeSession;

    async fn launch(&self) -> Result<FakeSession> {
        if self.refuse {
            return Err(InnScanError::Automation("browser refused to start".into()));
        }
        self.log.lock().expect("fake log poisoned").launched += 1;
        Ok(FakeSession {
            site: Arc::clone(&self.site),
            log: Arc::clone(&self.log),
            windows: vec![String::from("about:blank")],
            current: 0,
            lookups: HashMap::new(),
            handles: Vec::new(),
        })
    }
}

/// One scripted session.
#[derive(Debug)]
pub struct FakeSession {
    site: Arc<HashMap<String, FakePage>>,
    log: Arc<Mutex<FakeLog>>,
    windows: Vec<String>,
    current: usize,
    lookups: HashMap<(String, String), usize>,
    /// Element id -> (page url, index in page).
    handles: Vec<(String, usize)>,
}

impl FakeSession {
    fn url(&self) -> &str {
        &self.windows[self.current]
    }

    fn resolve(&self, element: &ElementRef) -> Result<&FakeElement> {
        let (url, index) = element
            .0
            .parse::<usize>()
            .ok()
            .and_then(|id| self.handles.get(id))
            .ok_or_else(|| InnScanError::Automation(format!("stale element {}", element.0)))?;
        self.site
            .get(url)
            .and_then(|page| page.elements.get(*index))
            .map(|(_, el)| el)
            .ok_or_else(|| InnScanError::Automation(format!("stale element {}", element.0)))
    }

    fn locator_of(&self, element: &ElementRef) -> String {
        element
            .0
            .parse::<usize>()
            .ok()
            .and_then(|id| self.handles.get(id))
            .and_then(|(url, index)| self.site.get(url)?.elements.get(*index))
            .map(|(xpath, _)| xpath.clone())
            .unwrap_or_default()
    }

    fn record(&self, f: impl FnOnce(&mut FakeLog)) {
        f(&mut self.log.lock().expect("fake log poisoned"));
    }
}

impl Browser for FakeSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.windows[self.current] = url.to_string();
        self.record(|log| log.visited.push(url.to_string()));
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.url().to_string())
    }

    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<ElementRef>> {
        let url = self.url().to_string();
        let Some(page) = self.site.get(&url).cloned() else {
            return Ok(Vec::new());
        };
        if page.broken.iter().any(|x| x == locator.as_str()) {
            return Err(InnScanError::Automation(format!(
                "driver crashed looking for {locator}"
            )));
        }

        let seen = self
            .lookups
            .entry((url.clone(), locator.as_str().to_string()))
            .or_insert(0);
        let lookups_so_far = *seen;
        *seen += 1;

        let mut refs = Vec::new();
        for (index, element) in page.matches(locator.as_str()) {
            if element.appear_after <= lookups_so_far {
                self.handles.push((url.clone(), index));
                refs.push(ElementRef((self.handles.len() - 1).to_string()));
            }
        }
        Ok(refs)
    }

    async fn text(&mut self, element: &ElementRef) -> Result<String> {
        self.resolve(element)?
            .text
            .clone()
            .ok_or_else(|| InnScanError::extraction("element text unavailable"))
    }

    async fn is_displayed(&mut self, element: &ElementRef) -> Result<bool> {
        Ok(self.resolve(element)?.displayed)
    }

    async fn is_enabled(&mut self, element: &ElementRef) -> Result<bool> {
        Ok(self.resolve(element)?.enabled)
    }

    async fn click(&mut self, element: &ElementRef) -> Result<()> {
        let opens = self.resolve(element)?.opens.clone();
        let locator = self.locator_of(element);
        self.record(|log| log.clicked.push(locator));
        if let Some(url) = opens {
            self.windows.push(url);
        }
        Ok(())
    }

    async fn send_keys(&mut self, element: &ElementRef, text: &str) -> Result<()> {
        self.resolve(element)?;
        let locator = self.locator_of(element);
        self.record(|log| log.typed.push((locator, text.to_string())));
        Ok(())
    }

    async fn window_handles(&mut self) -> Result<Vec<String>> {
        Ok((0..self.windows.len()).map(|i| format!("window-{i}")).collect())
    }

    async fn switch_to_window(&mut self, handle: &str) -> Result<()> {
        self.current = handle
            .strip_prefix("window-")
            .and_then(|i| i.parse::<usize>().ok())
            .filter(|i| *i < self.windows.len())
            .ok_or_else(|| InnScanError::Automation(format!("no such window: {handle}")))?;
        Ok(())
    }

    async fn print_pdf(&mut self) -> Result<Vec<u8>> {
        let url = self.url().to_string();
        self.record(|log| log.printed.push(url.clone()));
        Ok(format!("%PDF-1.4 {url}").into_bytes())
    }

    async fn close(self) -> Result<()> {
        self.record(|log| log.closed += 1);
        Ok(())
    }
}
