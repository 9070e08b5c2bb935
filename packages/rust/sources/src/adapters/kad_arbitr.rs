//! Arbitration court case adapter (kad.arbitr.ru).
//!
//! Finds one case by number, reads the judge and claimant from the search
//! result, then opens the case print view for the full party lists.

use innscan_browser::{Browser, BrowserLauncher, Locator, OnTimeout, WaitCondition, Waiter};
use innscan_shared::{CaseRecord, Result};
use tracing::{error, info, instrument, warn};

use super::{CaseSource, text_of, texts_of};

const PROMO_CLOSE: &str =
    "//a[@class='b-promo_notification-popup-close js-promo_notification-popup-close']";
const SEARCH_INPUT: &str = "//input[@placeholder='например, А50-5568/08']";
const SEARCH_BUTTON: &str = "//button[@alt='Найти']";
const JUDGE: &str = "//div[@class='judge']";
const CLAIMANT: &str = "//td[@class='plaintiff']/div/div/span";
const CASE_LINK: &str = "//a[@class='num_case']";
const CASE_CARD_READY: &str = "//td[@class='plaintiffs first']//a";
const PRINT_LINK: &str = "//li[@class='case-print']//a";
const PRINT_READY: &str = "//li[@class='chrono active']";
const CREDITORS: &str = "//td[@class='plaintiffs first']//li/span";
const THIRD_PARTIES: &str = "//td[@class='third']//li/span";
const OTHERS: &str = "//td[@class='others']//li/span";

/// Looks up case details on the arbitration court file.
#[derive(Debug, Clone)]
pub struct KadArbitrAdapter<L> {
    launcher: L,
    waiter: Waiter,
    search_url: String,
}

impl<L: BrowserLauncher> KadArbitrAdapter<L> {
    pub fn new(launcher: L, waiter: Waiter, search_url: impl Into<String>) -> Self {
        Self {
            launcher,
            waiter,
            search_url: search_url.into(),
        }
    }

    async fn scrape<B: Browser>(
        &self,
        browser: &mut B,
        case_number: &str,
        record: &mut CaseRecord,
    ) -> Result<()> {
        browser.goto(&self.search_url).await?;

        let promo = self
            .waiter
            .until(
                browser,
                &Locator::xpath(PROMO_CLOSE),
                &WaitCondition::Clickable,
                OnTimeout::Empty,
            )
            .await?;
        if let Some(close) = promo {
            browser.click(&close).await?;
        }

        let input = self
            .waiter
            .until(
                browser,
                &Locator::xpath(SEARCH_INPUT),
                &WaitCondition::Presence,
                OnTimeout::Fail,
            )
            .await?;
        if let Some(input) = input {
            browser.send_keys(&input, case_number).await?;
        }
        if let Some(button) = browser.find(&Locator::xpath(SEARCH_BUTTON)).await? {
            browser.click(&button).await?;
        }

        let judge = self
            .waiter
            .until(
                browser,
                &Locator::xpath(JUDGE),
                &WaitCondition::Presence,
                OnTimeout::Empty,
            )
            .await?;
        if judge.is_none() {
            info!(case = case_number, "case not found in court file");
            return Ok(());
        }

        record.judge_name = text_of(browser, &Locator::xpath(JUDGE), "judge_name", case_number).await;
        record.claimant_name =
            text_of(browser, &Locator::xpath(CLAIMANT), "claimant_name", case_number).await;

        let Some(link) = browser.find(&Locator::xpath(CASE_LINK)).await? else {
            warn!(case = case_number, "case card link missing, party lists unavailable");
            return Ok(());
        };
        self.waiter.follow(browser, &link).await?;
        self.waiter
            .until(
                browser,
                &Locator::xpath(CASE_CARD_READY),
                &WaitCondition::Presence,
                OnTimeout::Fail,
            )
            .await?;

        if let Some(print) = browser.find(&Locator::xpath(PRINT_LINK)).await? {
            browser.click(&print).await?;
        }
        self.waiter
            .until(
                browser,
                &Locator::xpath(PRINT_READY),
                &WaitCondition::Presence,
                OnTimeout::Fail,
            )
            .await?;

        record.creditors = texts_of(browser, &Locator::xpath(CREDITORS), "creditors", case_number).await;
        record.third_parties =
            texts_of(browser, &Locator::xpath(THIRD_PARTIES), "third_parties", case_number).await;
        record.others = texts_of(browser, &Locator::xpath(OTHERS), "others", case_number).await;
        Ok(())
    }
}

impl<L: BrowserLauncher> CaseSource for KadArbitrAdapter<L> {
    #[instrument(skip(self))]
    async fn lookup_case(&self, case_number: &str) -> CaseRecord {
        let mut record = CaseRecord::not_found(case_number);

        let mut browser = match self.launcher.launch().await {
            Ok(browser) => browser,
            Err(e) => {
                error!(case = case_number, error = %e, "could not open court file session");
                return record;
            }
        };
        if let Err(e) = self.scrape(&mut browser, case_number, &mut record).await {
            error!(case = case_number, error = %e, "court case lookup failed");
        }
        if let Err(e) = browser.close().await {
            warn!(case = case_number, error = %e, "failed to close court file session");
        }

        record
    }
}
