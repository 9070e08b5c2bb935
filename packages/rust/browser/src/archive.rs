//! Archival capture: print a page to `{output_dir}/{filename}`.

#![allow(async_fn_in_trait)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use innscan_shared::{InnScanError, Result};
use tracing::{error, info, instrument, warn};

use crate::automation::{Browser, BrowserLauncher, Locator};
use crate::wait::{OnTimeout, WaitCondition, Waiter};

/// Card text confirming the registry page finished rendering.
const READY_MARKER: &str = "//div[contains(text(),'ОГРН')]";

/// Cookie consent banner covering the bottom of the page.
const COOKIE_ACCEPT: &str = "//button[@class='btn-accept btn-accept_hover btn-accept_properties']";

/// Produces one durable document per subject.
pub trait ArchiveCapture {
    /// Capture `url` into `{output_dir}/{filename}`, replacing any previous
    /// file of that name. Returns `None` when nothing could be written.
    async fn capture(&self, url: &str, output_dir: &Path, filename: &str) -> Option<PathBuf>;
}

/// Prints registry cards to PDF in a dedicated browser session.
#[derive(Debug, Clone)]
pub struct PdfArchiver<L> {
    launcher: L,
    waiter: Waiter,
    settle: Duration,
}

impl<L: BrowserLauncher> PdfArchiver<L> {
    /// `settle` is how long to let late content render before printing.
    pub fn new(launcher: L, waiter: Waiter, settle: Duration) -> Self {
        Self {
            launcher,
            waiter,
            settle,
        }
    }

    async fn print_page<B: Browser>(
        &self,
        browser: &mut B,
        url: &str,
        target: &Path,
    ) -> Result<()> {
        browser.goto(url).await?;
        self.waiter
            .until(
                browser,
                &Locator::xpath(READY_MARKER),
                &WaitCondition::Presence,
                OnTimeout::Fail,
            )
            .await?;
        tokio::time::sleep(self.settle).await;

        if let Some(banner) = browser.find(&Locator::xpath(COOKIE_ACCEPT)).await? {
            if let Err(e) = browser.click(&banner).await {
                warn!(error = %e, "could not dismiss cookie banner");
            }
        }

        let pdf = browser.print_pdf().await?;
        std::fs::write(target, pdf).map_err(|e| InnScanError::io(target, e))
    }
}

impl<L: BrowserLauncher> ArchiveCapture for PdfArchiver<L> {
    #[instrument(skip(self, output_dir))]
    async fn capture(&self, url: &str, output_dir: &Path, filename: &str) -> Option<PathBuf> {
        if let Err(e) = std::fs::create_dir_all(output_dir) {
            error!(dir = %output_dir.display(), error = %e, "cannot create archive directory");
            return None;
        }
        let target = output_dir.join(filename);

        let mut browser = match self.launcher.launch().await {
            Ok(browser) => browser,
            Err(e) => {
                error!(error = %e, "failed to save PDF");
                return None;
            }
        };
        let outcome = self.print_page(&mut browser, url, &target).await;
        if let Err(e) = browser.close().await {
            warn!(error = %e, "failed to close archive session");
        }

        match outcome {
            Ok(()) => {
                info!(path = %target.display(), "archived page");
                Some(target)
            }
            Err(e) => {
                error!(error = %e, "failed to save PDF");
                None
            }
        }
    }
}
