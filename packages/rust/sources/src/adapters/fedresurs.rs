//! Bankruptcy registry adapter (bankrot.fedresurs.ru).
//!
//! Searches the registry by INN, reads the debtor card, archives the card's
//! detail page as PDF, and lists the debtor's bankruptcy case numbers.

use std::path::PathBuf;

use innscan_browser::{
    ArchiveCapture, Browser, BrowserLauncher, Locator, OnTimeout, WaitCondition, Waiter,
};
use innscan_shared::{Inn, PrimaryRecord, Result};
use tracing::{error, info, instrument, warn};

use super::{PrimarySource, text_of, texts_of};

const SEARCH_FORM: &str = "//div[@class='u-card-result__wrapper']";
const SEARCH_INPUT: &str = "//input[@formcontrolname='searchString']";
const SEARCH_BUTTON: &str = "//button[@class='el-button']";
const RESULTS: &str = "//el-tab-panel";
const DEBTOR_NAME: &str =
    "//div[@class='u-card-result__name u-card-result__name_mb u-card-result__name_width']/span";
const DEBTOR_OGRN: &str = "//span[contains(text(), 'ОГРН')]/following-sibling::span";
const DEBTOR_INN: &str = "//span[contains(text(), 'ИНН')]/following-sibling::span";
const DETAILS_LINK: &str = "//el-info-link";
const DETAILS_BLOCK: &str = "//entity-card-biddings-block/div/div/div";
/// Heading that renders last on the debtor detail page.
const DETAILS_READY_TEXT: &str = "Продажа имущества";
const CASE_LINKS: &str = "//a[@class='underlined info-header']";

/// Looks up debtors on the federal bankruptcy registry.
#[derive(Debug, Clone)]
pub struct FedresursAdapter<L, A> {
    launcher: L,
    archiver: A,
    waiter: Waiter,
    search_url: String,
    archive_dir: PathBuf,
}

impl<L, A> FedresursAdapter<L, A>
where
    L: BrowserLauncher,
    A: ArchiveCapture,
{
    /// Archived cards land in `archive_dir` as `{inn}.pdf`.
    pub fn new(
        launcher: L,
        archiver: A,
        waiter: Waiter,
        search_url: impl Into<String>,
        archive_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            launcher,
            archiver,
            waiter,
            search_url: search_url.into(),
            archive_dir: archive_dir.into(),
        }
    }

    async fn scrape<B: Browser>(
        &self,
        browser: &mut B,
        inn: &Inn,
        record: &mut PrimaryRecord,
    ) -> Result<()> {
        let subject = inn.as_str();

        browser.goto(&self.search_url).await?;
        self.waiter
            .until(
                browser,
                &Locator::xpath(SEARCH_FORM),
                &WaitCondition::Presence,
                OnTimeout::Fail,
            )
            .await?;

        if let Some(input) = browser.find(&Locator::xpath(SEARCH_INPUT)).await? {
            browser.send_keys(&input, subject).await?;
        }
        if let Some(button) = browser.find(&Locator::xpath(SEARCH_BUTTON)).await? {
            browser.click(&button).await?;
        }

        let results = self
            .waiter
            .until(
                browser,
                &Locator::xpath(RESULTS),
                &WaitCondition::Presence,
                OnTimeout::Empty,
            )
            .await?;
        if results.is_none() {
            info!(inn = %inn, "no bankruptcy registry data");
            return Ok(());
        }

        record.display_name =
            text_of(browser, &Locator::xpath(DEBTOR_NAME), "display_name", subject).await;
        record.registration_number =
            text_of(browser, &Locator::xpath(DEBTOR_OGRN), "ogrn", subject).await;
        record.canonical_id = text_of(browser, &Locator::xpath(DEBTOR_INN), "inn", subject).await;

        let Some(link) = self
            .waiter
            .until(
                browser,
                &Locator::xpath(DETAILS_LINK),
                &WaitCondition::Clickable,
                OnTimeout::Fail,
            )
            .await?
        else {
            return Ok(());
        };
        self.waiter.follow(browser, &link).await?;
        self.waiter
            .until(
                browser,
                &Locator::xpath(DETAILS_BLOCK),
                &WaitCondition::TextInElement(DETAILS_READY_TEXT.into()),
                OnTimeout::Fail,
            )
            .await?;

        let card_url = browser.current_url().await?;
        record.archive_path = self
            .archiver
            .capture(&card_url, &self.archive_dir, &format!("{inn}.pdf"))
            .await;

        let cases = self
            .waiter
            .until(
                browser,
                &Locator::xpath(CASE_LINKS),
                &WaitCondition::Presence,
                OnTimeout::Empty,
            )
            .await?;
        if cases.is_none() {
            info!(inn = %inn, "no bankruptcy cases listed");
            return Ok(());
        }

        record.case_numbers =
            texts_of(browser, &Locator::xpath(CASE_LINKS), "case_numbers", subject).await;
        Ok(())
    }
}

impl<L, A> PrimarySource for FedresursAdapter<L, A>
where
    L: BrowserLauncher,
    A: ArchiveCapture,
{
    #[instrument(skip_all, fields(inn = %inn))]
    async fn lookup(&self, inn: &Inn) -> PrimaryRecord {
        let mut record = PrimaryRecord::default();

        let mut browser = match self.launcher.launch().await {
            Ok(browser) => browser,
            Err(e) => {
                error!(inn = %inn, error = %e, "could not open bankruptcy registry session");
                return record;
            }
        };
        if let Err(e) = self.scrape(&mut browser, inn, &mut record).await {
            error!(inn = %inn, error = %e, "bankruptcy registry lookup failed");
        }
        if let Err(e) = browser.close().await {
            warn!(inn = %inn, error = %e, "failed to close bankruptcy registry session");
        }

        record
    }
}
