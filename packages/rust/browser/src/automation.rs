//! The page-interaction capability every source adapter is written against.
//!
//! A [`BrowserLauncher`] opens exclusive, short-lived [`Browser`] sessions.
//! Sessions are never shared: whoever launches one closes it before returning.

#![allow(async_fn_in_trait)]

use innscan_shared::Result;

/// An XPath expression identifying zero or more elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self(expr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to an element located in the current browsing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

/// Special key sequences understood by [`Browser::send_keys`].
pub struct Keys;

impl Keys {
    /// Control + A (select the editor's whole content).
    pub const SELECT_ALL: &'static str = "\u{E009}a\u{E000}";
}

/// One exclusive automation session (a browser with one or more windows).
pub trait Browser {
    /// Navigate the current window to `url`.
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// URL loaded in the current window.
    async fn current_url(&mut self) -> Result<String>;

    /// All elements matching `locator`, in document order.
    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<ElementRef>>;

    /// First element matching `locator`, if any.
    async fn find(&mut self, locator: &Locator) -> Result<Option<ElementRef>> {
        Ok(self.find_all(locator).await?.into_iter().next())
    }

    /// Rendered text of an element.
    async fn text(&mut self, element: &ElementRef) -> Result<String>;

    async fn is_displayed(&mut self, element: &ElementRef) -> Result<bool>;

    async fn is_enabled(&mut self, element: &ElementRef) -> Result<bool>;

    async fn click(&mut self, element: &ElementRef) -> Result<()>;

    /// Type `text` into an element. May contain [`Keys`] sequences.
    async fn send_keys(&mut self, element: &ElementRef, text: &str) -> Result<()>;

    /// Handles of all open windows/tabs, oldest first.
    async fn window_handles(&mut self) -> Result<Vec<String>>;

    async fn switch_to_window(&mut self, handle: &str) -> Result<()>;

    /// Render the current page as a PDF document.
    async fn print_pdf(&mut self) -> Result<Vec<u8>>;

    /// End the session and release the browser.
    async fn close(self) -> Result<()>;
}

/// Opens fresh [`Browser`] sessions.
pub trait BrowserLauncher {
    type Session: Browser;

    async fn launch(&self) -> Result<Self::Session>;
}

