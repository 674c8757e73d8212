//! Environment configuration.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HERALD_GATEWAY_URL` | `https://graph.facebook.com` | Hosted gateway base URL |
//! | `HERALD_GATEWAY_VERSION` | `v17.0` | Gateway API version segment |
//! | `HERALD_PRODUCT_TAG` | `whatsapp` | `messaging_product` sent to the gateway |
//! | `HERALD_WEB_CLIENT_URL` | `https://web.whatsapp.com` | Host of web client deep links |
//! | `HERALD_WEBDRIVER_URL` | `http://localhost:4444` | WebDriver endpoint for browser automation |
//! | `HERALD_HEADLESS` | `true` | Run the automated browser headless |
//! | `HERALD_OPENER` | `xdg-open` (`open` on macOS) | Fallback driver program |
//! | `HERALD_WORKERS` | `4` | Concurrent recipients during group dispatch |
//! | `HERALD_ATTEMPT_TIMEOUT_SECS` | `90` | Bound on one recipient's whole attempt |
//! | `HERALD_AUDIT_PATH` | unset | JSON-lines audit file; in-memory when unset |
//!
//! Unparseable values fall back to the default.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::transport::OpenerTransport;

const DEFAULT_GATEWAY_URL: &str = "https://graph.facebook.com";
const DEFAULT_GATEWAY_VERSION: &str = "v17.0";
const DEFAULT_PRODUCT_TAG: &str = "whatsapp";
const DEFAULT_WEB_CLIENT_URL: &str = "https://web.whatsapp.com";
const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(90);

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeraldConfig {
    pub gateway_url: String,
    pub gateway_version: String,
    pub product_tag: String,
    pub web_client_url: String,
    pub webdriver_url: String,
    pub headless: bool,
    /// `None` uses the platform URL opener.
    pub opener: Option<String>,
    pub workers: usize,
    pub attempt_timeout: Duration,
    pub audit_path: Option<PathBuf>,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            gateway_version: DEFAULT_GATEWAY_VERSION.to_string(),
            product_tag: DEFAULT_PRODUCT_TAG.to_string(),
            web_client_url: DEFAULT_WEB_CLIENT_URL.to_string(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            opener: None,
            workers: DEFAULT_WORKERS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            audit_path: None,
        }
    }
}

impl HeraldConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let workers = lookup("HERALD_WORKERS")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(defaults.workers)
            .max(1);

        let attempt_timeout = lookup("HERALD_ATTEMPT_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.attempt_timeout);

        let headless = lookup("HERALD_HEADLESS")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(defaults.headless);

        Self {
            gateway_url: text("HERALD_GATEWAY_URL", defaults.gateway_url),
            gateway_version: text("HERALD_GATEWAY_VERSION", defaults.gateway_version),
            product_tag: text("HERALD_PRODUCT_TAG", defaults.product_tag),
            web_client_url: text("HERALD_WEB_CLIENT_URL", defaults.web_client_url),
            webdriver_url: text("HERALD_WEBDRIVER_URL", defaults.webdriver_url),
            headless,
            opener: lookup("HERALD_OPENER").filter(|v| !v.trim().is_empty()),
            workers,
            attempt_timeout,
            audit_path: lookup("HERALD_AUDIT_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// The fallback opener transport these settings describe, not yet checked.
    pub(crate) fn opener_transport(&self) -> OpenerTransport {
        let opener = match &self.opener {
            Some(program) => OpenerTransport::new(program.clone()),
            None => OpenerTransport::default(),
        };
        opener.web_client_url(self.web_client_url.clone())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
