//! Browser automation transport over the W3C WebDriver protocol.
//!
//! Each attempt opens its own headless session, loads the web client deep
//! link, waits for the compose box, presses Enter, and deletes the session.
//! The session is deleted on every exit path: explicitly after the flow, and
//! from `Drop` when the attempt is aborted or panics.
//!
//! ```rust,ignore
//! use herald::transport::BrowserTransport;
//!
//! // Checks GET /status once; a dead endpoint marks the transport unavailable.
//! let browser = BrowserTransport::new("http://localhost:4444").detect().await;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};

use crate::error::TransportError;

use super::{deep_link, digits, Outcome, Transport};

const WEBDRIVER_URL: &str = "http://localhost:4444";
const WEB_CLIENT_URL: &str = "https://web.whatsapp.com";
const COMPOSE_SELECTOR: &str = r#"div[data-testid="conversation-compose-box-input"]"#;
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const ENTER_KEY: &str = "\u{E007}";

/// Bound on the deep-link page load.
pub const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);
/// Bound on waiting for the compose box after the page loaded.
pub const COMPOSE_TIMEOUT: Duration = Duration::from_secs(8);
/// Fixed delay after pressing Enter, before the session is torn down.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);
const COMMAND_SLACK: Duration = Duration::from_secs(5);

/// Headless browser transport driven through a WebDriver endpoint
/// (chromedriver, geckodriver, Selenium).
#[derive(Debug, Clone)]
pub struct BrowserTransport {
    client: Client,
    webdriver_url: String,
    web_client_url: String,
    headless: bool,
    page_load_timeout: Duration,
    compose_timeout: Duration,
    settle: Duration,
    available: bool,
}

impl BrowserTransport {
    /// Create a transport for the given WebDriver endpoint.
    ///
    /// The transport is assumed available until [`detect`](Self::detect)
    /// says otherwise.
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            webdriver_url: webdriver_url.into(),
            web_client_url: WEB_CLIENT_URL.to_string(),
            headless: true,
            page_load_timeout: PAGE_LOAD_TIMEOUT,
            compose_timeout: COMPOSE_TIMEOUT,
            settle: SETTLE_DELAY,
            available: true,
        }
    }

    /// Set the web client host used in deep links.
    pub fn web_client_url(mut self, url: impl Into<String>) -> Self {
        self.web_client_url = url.into();
        self
    }

    /// Run the browser with a visible window when `false`.
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Override the page-load, compose-wait and settle durations.
    pub fn timings(mut self, page_load: Duration, compose: Duration, settle: Duration) -> Self {
        self.page_load_timeout = page_load;
        self.compose_timeout = compose;
        self.settle = settle;
        self
    }

    /// Set availability directly.
    pub fn available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Ask the WebDriver endpoint whether it can create sessions.
    pub async fn check_ready(&self) -> bool {
        let url = format!("{}/status", self.base());
        let response = match self.client.get(&url).timeout(CONTROL_TIMEOUT).send().await {
            Ok(r) => r,
            Err(err) => {
                tracing::debug!(error = %err, "WebDriver status check failed");
                return false;
            }
        };
        match response.json::<Value>().await {
            Ok(body) => body["value"]["ready"].as_bool().unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Check once and record the result.
    pub async fn detect(mut self) -> Self {
        self.available = self.check_ready().await;
        tracing::info!(
            webdriver = %self.webdriver_url,
            available = self.available,
            "Browser automation checked"
        );
        self
    }

    fn base(&self) -> &str {
        self.webdriver_url.trim_end_matches('/')
    }

    fn capabilities(&self) -> Value {
        let args: Vec<&str> = if self.headless {
            vec!["--headless=new", "--disable-gpu", "--no-sandbox"]
        } else {
            Vec::new()
        };
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, WebDriverError> {
        let url = format!("{}{}", self.base(), path);
        let mut request = self.client.request(method, &url).timeout(timeout);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WebDriverError::transport(e.to_string()))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| WebDriverError::transport(e.to_string()))?;

        if status.is_success() {
            Ok(body["value"].clone())
        } else {
            Err(WebDriverError {
                code: body["value"]["error"]
                    .as_str()
                    .unwrap_or("unknown error")
                    .to_string(),
                message: body["value"]["message"].as_str().unwrap_or_default().to_string(),
            })
        }
    }

    async fn open_session(&self) -> Result<Session, TransportError> {
        let value = self
            .command(
                Method::POST,
                "/session",
                Some(self.capabilities()),
                self.page_load_timeout + COMMAND_SLACK,
            )
            .await
            .map_err(|e| e.into_transport("session not created"))?;

        let id = value["sessionId"]
            .as_str()
            .ok_or_else(|| TransportError::Automation("session response without sessionId".into()))?;

        tracing::debug!(session = id, "WebDriver session opened");
        Ok(Session {
            client: self.client.clone(),
            url: format!("{}/session/{}", self.base(), id),
            path: format!("/session/{}", id),
            released: false,
        })
    }

    async fn drive(&self, session: &Session, link: &str) -> Result<(), TransportError> {
        let page_load_ms = self.page_load_timeout.as_millis() as u64;
        let command_timeout = self.page_load_timeout + COMMAND_SLACK;

        self.command(
            Method::POST,
            &format!("{}/timeouts", session.path),
            Some(json!({ "pageLoad": page_load_ms })),
            command_timeout,
        )
        .await
        .map_err(|e| e.into_transport("set timeouts"))?;

        self.command(
            Method::POST,
            &format!("{}/url", session.path),
            Some(json!({ "url": link })),
            command_timeout,
        )
        .await
        .map_err(|e| e.into_transport("navigate"))?;

        let element = self.wait_for_compose(session).await?;

        self.command(
            Method::POST,
            &format!("{}/element/{}/value", session.path, element),
            Some(json!({ "text": ENTER_KEY })),
            command_timeout,
        )
        .await
        .map_err(|e| e.into_transport("submit"))?;

        sleep(self.settle).await;
        Ok(())
    }

    async fn wait_for_compose(&self, session: &Session) -> Result<String, TransportError> {
        let deadline = Instant::now() + self.compose_timeout;
        let path = format!("{}/element", session.path);
        let query = json!({ "using": "css selector", "value": COMPOSE_SELECTOR });

        loop {
            match self
                .command(Method::POST, &path, Some(query.clone()), CONTROL_TIMEOUT)
                .await
            {
                Ok(value) => {
                    return value[ELEMENT_KEY]
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| {
                            TransportError::Automation("element reference missing".into())
                        });
                }
                Err(err) if err.code == "no such element" => {}
                Err(err) => return Err(err.into_transport("find compose box")),
            }

            if Instant::now() >= deadline {
                return Err(TransportError::Automation(format!(
                    "compose box not found within {}s",
                    self.compose_timeout.as_secs()
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

impl Default for BrowserTransport {
    fn default() -> Self {
        Self::new(WEBDRIVER_URL)
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    async fn attempt(&self, destination: &str, message: &str) -> Outcome {
        if !self.available {
            return Outcome::Failed(TransportError::unavailable(
                self.name(),
                format!("no WebDriver ready at {}", self.webdriver_url),
            ));
        }
        if digits(destination).is_empty() {
            return Outcome::Failed(TransportError::Automation(format!(
                "destination {destination:?} has no digits"
            )));
        }

        let link = deep_link(&self.web_client_url, destination, message);
        let session = match self.open_session().await {
            Ok(session) => session,
            Err(err) => return Outcome::Failed(err),
        };

        let result = self.drive(&session, &link).await;
        session.release().await;

        match result {
            Ok(()) => Outcome::sent(),
            Err(err) => Outcome::Failed(err),
        }
    }

    fn name(&self) -> &'static str {
        "browser"
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// Error body of a failed WebDriver command.
#[derive(Debug)]
struct WebDriverError {
    code: String,
    message: String,
}

impl WebDriverError {
    fn transport(message: String) -> Self {
        Self {
            code: "transport".into(),
            message,
        }
    }

    fn into_transport(self, step: &str) -> TransportError {
        if self.message.is_empty() {
            TransportError::Automation(format!("{step}: {}", self.code))
        } else {
            TransportError::Automation(format!("{step}: {}: {}", self.code, self.message))
        }
    }
}

/// An open WebDriver session.
///
/// Call [`release`](Self::release) when done. If the owning future is
/// dropped first, `Drop` schedules the delete on the current runtime.
struct Session {
    client: Client,
    url: String,
    path: String,
    released: bool,
}

impl Session {
    async fn release(mut self) {
        if let Err(err) = self.client.delete(&self.url).timeout(CONTROL_TIMEOUT).send().await {
            tracing::warn!(session = %self.url, error = %err, "WebDriver session delete failed");
        }
        self.released = true;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(session = %self.url, "WebDriver session leaked: no runtime for cleanup");
            return;
        };
        let client = self.client.clone();
        let url = std::mem::take(&mut self.url);
        handle.spawn(async move {
            if let Err(err) = client.delete(&url).timeout(CONTROL_TIMEOUT).send().await {
                tracing::warn!(session = %url, error = %err, "WebDriver session delete failed");
            }
        });
    }
}
