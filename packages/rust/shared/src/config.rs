//! Application configuration for innscan.
//!
//! User config lives at `~/.innscan/innscan.toml`.
//! CLI arguments override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{InnScanError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "innscan.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".innscan";

// ---------------------------------------------------------------------------
// Config structs (matching innscan.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output and database locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// WebDriver and wait settings.
    #[serde(default)]
    pub browser: BrowserSection,

    /// Entry points of the three data sources.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// ID table layout.
    #[serde(default)]
    pub input: InputConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory receiving one archival PDF per ID.
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,

    /// libSQL database file.
    #[serde(default = "default_database")]
    pub database: String,

    /// Run log, rewritten on every run.
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            archive_dir: default_archive_dir(),
            database: default_database(),
            log_file: default_log_file(),
        }
    }
}

fn default_archive_dir() -> String {
    "REPORTS".into()
}
fn default_database() -> String {
    "innscan.db".into()
}
fn default_log_file() -> String {
    "last_run_log.log".into()
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSection {
    /// WebDriver server endpoint (chromedriver or a grid).
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Standard bound for every page wait, in seconds.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    /// Delay between two condition checks, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Run the browser without a visible window.
    #[serde(default)]
    pub headless: bool,

    /// Pause before printing an archival page, in milliseconds.
    #[serde(default = "default_archive_settle")]
    pub archive_settle_ms: u64,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            wait_timeout_secs: default_wait_timeout(),
            poll_interval_ms: default_poll_interval(),
            headless: false,
            archive_settle_ms: default_archive_settle(),
        }
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".into()
}
fn default_window_width() -> u32 {
    1240
}
fn default_window_height() -> u32 {
    1080
}
fn default_wait_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    250
}
fn default_archive_settle() -> u64 {
    3000
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Bankruptcy registry search page (identity + case list).
    #[serde(default = "default_primary_url")]
    pub primary_url: String,

    /// Arbitration court case search page.
    #[serde(default = "default_case_url")]
    pub case_url: String,

    /// Business registry sandbox page.
    #[serde(default = "default_enrichment_url")]
    pub enrichment_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            case_url: default_case_url(),
            enrichment_url: default_enrichment_url(),
        }
    }
}

fn default_primary_url() -> String {
    "https://bankrot.fedresurs.ru/bankrupts?searchString".into()
}
fn default_case_url() -> String {
    "https://kad.arbitr.ru/".into()
}
fn default_enrichment_url() -> String {
    "https://dadata.ru/api/find-party/".into()
}

/// `[input]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Header of the column holding taxpayer IDs.
    #[serde(default = "default_id_column")]
    pub id_column: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            id_column: default_id_column(),
        }
    }
}

fn default_id_column() -> String {
    "ИНН".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (derived from the file)
// ---------------------------------------------------------------------------

/// Runtime WebDriver session configuration.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// WebDriver server endpoint.
    pub endpoint: Url,
    /// Window size applied to every new session.
    pub window: (u32, u32),
    pub headless: bool,
}

impl TryFrom<&AppConfig> for BrowserConfig {
    type Error = InnScanError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.browser.webdriver_url).map_err(|e| {
            InnScanError::config(format!(
                "invalid webdriver_url '{}': {e}",
                config.browser.webdriver_url
            ))
        })?;
        Ok(Self {
            endpoint,
            window: (config.browser.window_width, config.browser.window_height),
            headless: config.browser.headless,
        })
    }
}

/// Runtime bounds for the wait primitive.
#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    /// Standard timeout for a single wait.
    pub timeout: Duration,
    /// Delay between two condition checks.
    pub poll_interval: Duration,
}

impl From<&AppConfig> for WaitConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.browser.wait_timeout_secs),
            poll_interval: Duration::from_millis(config.browser.poll_interval_ms),
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.innscan/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| InnScanError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.innscan/innscan.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| InnScanError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| InnScanError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| InnScanError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| InnScanError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| InnScanError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("archive_dir"));
        assert!(toml_str.contains("bankrot.fedresurs.ru"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[paths]
database = "/tmp/entities.db"

[browser]
headless = true
wait_timeout_secs = 3
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.paths.database, "/tmp/entities.db");
        assert_eq!(config.paths.archive_dir, "REPORTS");
        assert!(config.browser.headless);
        assert_eq!(config.browser.window_width, 1240);
        assert_eq!(config.input.id_column, "ИНН");

        let wait = WaitConfig::from(&config);
        assert_eq!(wait.timeout, Duration::from_secs(3));
        assert_eq!(wait.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn browser_config_from_app_config() {
        let app = AppConfig::default();
        let browser = BrowserConfig::try_from(&app).expect("valid defaults");
        assert_eq!(browser.endpoint.as_str(), "http://localhost:9515/");
        assert_eq!(browser.window, (1240, 1080));
        assert!(!browser.headless);
    }

    #[test]
    fn invalid_webdriver_url_is_config_error() {
        let mut app = AppConfig::default();
        app.browser.webdriver_url = "not a url".into();
        let err = BrowserConfig::try_from(&app).unwrap_err();
        assert!(matches!(err, InnScanError::Config { .. }));
    }
}
