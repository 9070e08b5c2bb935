//! Bounded waits for page conditions.
//!
//! [`Waiter`] polls a [`Browser`] until a [`WaitCondition`] holds for the first
//! element matching a locator, or the timeout elapses. What happens on timeout
//! is chosen per call with [`OnTimeout`].

use std::time::Duration;

use innscan_shared::{InnScanError, Result, WaitConfig};
use tokio::time::Instant;
use tracing::trace;

use crate::automation::{Browser, ElementRef, Locator};

/// Condition that must hold for the located element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// The element exists in the DOM.
    Presence,
    /// The element exists and is displayed.
    Visible,
    /// The element is displayed and enabled.
    Clickable,
    /// The element's text contains the given string.
    TextInElement(String),
}

impl WaitCondition {
    /// Resolve a named condition kind.
    ///
    /// Known kinds: `presence`, `visible`, `clickable`, `text_in_element`
    /// (which needs `text`). Anything else is a configuration error.
    pub fn parse(kind: &str, text: Option<&str>) -> Result<Self> {
        match (kind, text) {
            ("presence", _) => Ok(Self::Presence),
            ("visible", _) => Ok(Self::Visible),
            ("clickable", _) => Ok(Self::Clickable),
            ("text_in_element", Some(text)) => Ok(Self::TextInElement(text.to_string())),
            ("text_in_element", None) => Err(InnScanError::config(
                "wait condition 'text_in_element' requires the expected text",
            )),
            (other, _) => Err(InnScanError::config(format!(
                "unsupported wait condition: {other}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Presence => "presence",
            Self::Visible => "visible",
            Self::Clickable => "clickable",
            Self::TextInElement(_) => "text_in_element",
        }
    }
}

/// What a wait returns when the condition never became true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnTimeout {
    /// Fail with [`InnScanError::Timeout`].
    Fail,
    /// Return `Ok(None)`: the feature is absent for this subject.
    Empty,
}

/// Stateless poll loop with a standard timeout.
#[derive(Debug, Clone, Copy)]
pub struct Waiter {
    timeout: Duration,
    poll_interval: Duration,
}

impl Waiter {
    pub fn new(config: WaitConfig) -> Self {
        Self {
            timeout: config.timeout,
            poll_interval: config.poll_interval,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait with the standard timeout.
    pub async fn until<B: Browser>(
        &self,
        browser: &mut B,
        locator: &Locator,
        condition: &WaitCondition,
        on_timeout: OnTimeout,
    ) -> Result<Option<ElementRef>> {
        self.until_within(browser, locator, condition, self.timeout, on_timeout)
            .await
    }

    /// Wait with an explicit timeout.
    ///
    /// The condition is checked at least once, even with a zero timeout.
    pub async fn until_within<B: Browser>(
        &self,
        browser: &mut B,
        locator: &Locator,
        condition: &WaitCondition,
        timeout: Duration,
        on_timeout: OnTimeout,
    ) -> Result<Option<ElementRef>> {
        let deadline = deadline_after(timeout);

        loop {
            if let Some(element) = check(browser, locator, condition).await? {
                return Ok(Some(element));
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }

        trace!(%locator, condition = condition.name(), ?timeout, "wait timed out");
        match on_timeout {
            OnTimeout::Empty => Ok(None),
            OnTimeout::Fail => Err(InnScanError::Timeout {
                condition: condition.name().to_string(),
                locator: locator.to_string(),
                timeout,
            }),
        }
    }

    /// Click a link and move to the window it opened, if it opened one.
    ///
    /// Returns `true` when the browser switched to a new window.
    pub async fn follow<B: Browser>(&self, browser: &mut B, link: &ElementRef) -> Result<bool> {
        let before = browser.window_handles().await?.len();
        browser.click(link).await?;

        let deadline = deadline_after(NEW_WINDOW_GRACE.min(self.timeout));
        loop {
            let handles = browser.window_handles().await?;
            if handles.len() > before {
                if let Some(newest) = handles.last() {
                    browser.switch_to_window(newest).await?;
                    return Ok(true);
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

/// How long a clicked link gets to open its new window.
const NEW_WINDOW_GRACE: Duration = Duration::from_secs(2);

/// Stand-in deadline for timeouts too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new(WaitConfig::default())
    }
}

/// Single evaluation of `condition` against the first match of `locator`.
async fn check<B: Browser>(
    browser: &mut B,
    locator: &Locator,
    condition: &WaitCondition,
) -> Result<Option<ElementRef>> {
    let Some(element) = browser.find(locator).await? else {
        return Ok(None);
    };

    // A failing state probe (stale or detached element) means "not yet".
    let holds = match condition {
        WaitCondition::Presence => true,
        WaitCondition::Visible => browser.is_displayed(&element).await.unwrap_or(false),
        WaitCondition::Clickable => {
            browser.is_displayed(&element).await.unwrap_or(false)
                && browser.is_enabled(&element).await.unwrap_or(false)
        }
        WaitCondition::TextInElement(expected) => browser
            .text(&element)
            .await
            .map(|text| text.contains(expected.as_str()))
            .unwrap_or(false),
    };

    Ok(holds.then_some(element))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeElement, FakeLauncher, FakePage};
    use crate::automation::BrowserLauncher;

    fn fast_waiter() -> Waiter {
        Waiter::new(WaitConfig {
            timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
        })
    }

    async fn session_on(page: FakePage) -> crate::fake::FakeSession {
        let launcher = FakeLauncher::new().with_page("https://site.test/", page);
        let mut session = launcher.launch().await.unwrap();
        session.goto("https://site.test/").await.unwrap();
        session
    }

    #[test]
    fn parse_named_conditions() {
        assert_eq!(
            WaitCondition::parse("presence", None).unwrap(),
            WaitCondition::Presence
        );
        assert_eq!(
            WaitCondition::parse("clickable", None).unwrap(),
            WaitCondition::Clickable
        );
        assert_eq!(
            WaitCondition::parse("text_in_element", Some("ОГРН")).unwrap(),
            WaitCondition::TextInElement("ОГРН".into())
        );
    }

    #[test]
    fn unsupported_condition_is_config_error() {
        let err = WaitCondition::parse("invisible", None).unwrap_err();
        assert!(matches!(err, InnScanError::Config { .. }));

        let err = WaitCondition::parse("text_in_element", None).unwrap_err();
        assert!(matches!(err, InnScanError::Config { .. }));
    }

    #[tokio::test]
    async fn returns_present_element_immediately() {
        let page = FakePage::new().with("//div[@id='a']", FakeElement::text("hello"));
        let mut session = session_on(page).await;

        let found = fast_waiter()
            .until(
                &mut session,
                &Locator::xpath("//div[@id='a']"),
                &WaitCondition::Presence,
                OnTimeout::Fail,
            )
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn waits_for_late_element() {
        let page = FakePage::new().with(
            "//div[@id='late']",
            FakeElement::text("late").appearing_after(3),
        );
        let mut session = session_on(page).await;

        let found = fast_waiter()
            .until(
                &mut session,
                &Locator::xpath("//div[@id='late']"),
                &WaitCondition::Presence,
                OnTimeout::Fail,
            )
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn soft_timeout_returns_none_within_bound() {
        let mut session = session_on(FakePage::new()).await;
        let started = std::time::Instant::now();

        let found = fast_waiter()
            .until(
                &mut session,
                &Locator::xpath("//missing"),
                &WaitCondition::Presence,
                OnTimeout::Empty,
            )
            .await
            .unwrap();

        assert!(found.is_none());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn hard_timeout_raises() {
        let mut session = session_on(FakePage::new()).await;

        let err = fast_waiter()
            .until(
                &mut session,
                &Locator::xpath("//missing"),
                &WaitCondition::Visible,
                OnTimeout::Fail,
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("//missing"));
    }

    #[tokio::test]
    async fn hidden_element_is_present_but_not_visible() {
        let page = FakePage::new().with("//span", FakeElement::text("x").hidden());
        let mut session = session_on(page).await;
        let waiter = fast_waiter();
        let locator = Locator::xpath("//span");

        let present = waiter
            .until(&mut session, &locator, &WaitCondition::Presence, OnTimeout::Empty)
            .await
            .unwrap();
        assert!(present.is_some());

        let visible = waiter
            .until(&mut session, &locator, &WaitCondition::Visible, OnTimeout::Empty)
            .await
            .unwrap();
        assert!(visible.is_none());
    }

    #[tokio::test]
    async fn oversized_timeout_still_returns_a_match() {
        let page = FakePage::new().with("//h1", FakeElement::text("ready"));
        let mut session = session_on(page).await;

        let found = fast_waiter()
            .until_within(
                &mut session,
                &Locator::xpath("//h1"),
                &WaitCondition::Presence,
                Duration::from_secs(u64::MAX),
                OnTimeout::Fail,
            )
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn deadline_for_oversized_timeout_is_capped() {
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline > Instant::now() + Duration::from_secs(86_400));
    }

    #[tokio::test]
    async fn disabled_element_is_not_clickable() {
        let page = FakePage::new().with("//button", FakeElement::text("Go").disabled());
        let mut session = session_on(page).await;

        let clickable = fast_waiter()
            .until(
                &mut session,
                &Locator::xpath("//button"),
                &WaitCondition::Clickable,
                OnTimeout::Empty,
            )
            .await
            .unwrap();
        assert!(clickable.is_none());
    }

    #[tokio::test]
    async fn text_condition_matches_substring() {
        let page = FakePage::new().with("//h2", FakeElement::text("Продажа имущества: 0"));
        let mut session = session_on(page).await;
        let waiter = fast_waiter();
        let locator = Locator::xpath("//h2");

        let hit = waiter
            .until(
                &mut session,
                &locator,
                &WaitCondition::TextInElement("Продажа имущества".into()),
                OnTimeout::Fail,
            )
            .await
            .unwrap();
        assert!(hit.is_some());

        let miss = waiter
            .until(
                &mut session,
                &locator,
                &WaitCondition::TextInElement("Торги".into()),
                OnTimeout::Empty,
            )
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn follow_switches_to_opened_window() {
        let page = FakePage::new()
            .with("//a[@id='tab']", FakeElement::text("details").opens("https://site.test/card"))
            .with("//a[@id='same']", FakeElement::text("stay"));
        let mut session = session_on(page).await;
        let waiter = fast_waiter();

        let same = session.find(&Locator::xpath("//a[@id='same']")).await.unwrap().unwrap();
        assert!(!waiter.follow(&mut session, &same).await.unwrap());
        assert_eq!(session.current_url().await.unwrap(), "https://site.test/");

        let tab = session.find(&Locator::xpath("//a[@id='tab']")).await.unwrap().unwrap();
        assert!(waiter.follow(&mut session, &tab).await.unwrap());
        assert_eq!(session.current_url().await.unwrap(), "https://site.test/card");
    }

    #[tokio::test]
    async fn zero_timeout_still_checks_once() {
        let page = FakePage::new().with("//p", FakeElement::text("now"));
        let mut session = session_on(page).await;

        let found = fast_waiter()
            .until_within(
                &mut session,
                &Locator::xpath("//p"),
                &WaitCondition::Presence,
                Duration::ZERO,
                OnTimeout::Fail,
            )
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
