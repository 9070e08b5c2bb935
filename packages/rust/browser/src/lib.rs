//! Browser automation capability, bounded waits, and archival capture.
//!
//! This crate provides:
//! - [`Browser`] / [`BrowserLauncher`]: the page-interaction contract adapters use
//! - [`Waiter`]: polling for [`WaitCondition`]s with a soft or hard timeout
//! - [`WebDriverLauncher`]: the contract over the W3C WebDriver protocol
//! - [`PdfArchiver`]: prints a page to a named PDF file

pub mod archive;
pub mod automation;
pub mod wait;
pub mod webdriver;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

pub use archive::{ArchiveCapture, PdfArchiver};
pub use automation::{Browser, BrowserLauncher, ElementRef, Keys, Locator};
pub use wait::{OnTimeout, WaitCondition, Waiter};
pub use webdriver::{WebDriverLauncher, WebDriverSession};
