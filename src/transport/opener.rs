//! Fallback automation: hand the deep link to an external driver program.
//!
//! The default program is the desktop URL opener (`xdg-open`, or `open` on
//! macOS), which relies on a web client session already logged in in the
//! user's browser. Any program taking the link as its last argument works.
//! Success means the program exited with status 0 in time; delivery beyond
//! that is best effort.

use std::env;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::TransportError;

use super::{deep_link, digits, Outcome, Transport};

const WEB_CLIENT_URL: &str = "https://web.whatsapp.com";

/// Bound on the driver program's run time.
pub const OPENER_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(target_os = "macos")]
const DEFAULT_OPENER: &str = "open";
#[cfg(not(target_os = "macos"))]
const DEFAULT_OPENER: &str = "xdg-open";

/// External-program automation transport.
#[derive(Debug, Clone)]
pub struct OpenerTransport {
    program: String,
    args: Vec<String>,
    web_client_url: String,
    timeout: Duration,
    available: bool,
}

impl OpenerTransport {
    /// Use `program` as the driver. Assumed available until
    /// [`detect`](Self::detect) says otherwise.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            web_client_url: WEB_CLIENT_URL.to_string(),
            timeout: OPENER_TIMEOUT,
            available: true,
        }
    }

    /// Arguments placed before the deep link.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the web client host used in deep links.
    pub fn web_client_url(mut self, url: impl Into<String>) -> Self {
        self.web_client_url = url.into();
        self
    }

    /// Override the run-time bound.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set availability directly.
    pub fn available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Whether the program can be found.
    pub fn check_ready(&self) -> bool {
        program_exists(&self.program)
    }

    /// Check once and record the result.
    pub fn detect(mut self) -> Self {
        self.available = self.check_ready();
        tracing::info!(program = %self.program, available = self.available, "Opener checked");
        self
    }

    async fn run(&self, link: &str) -> Result<(), TransportError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(link)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransportError::unavailable(self.name(), err.to_string()));
            }
            Ok(Err(err)) => return Err(TransportError::Automation(err.to_string())),
            Err(_) => return Err(TransportError::Timeout(self.timeout)),
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(TransportError::Automation(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )))
        }
    }
}

impl Default for OpenerTransport {
    fn default() -> Self {
        Self::new(DEFAULT_OPENER)
    }
}

#[async_trait]
impl Transport for OpenerTransport {
    async fn attempt(&self, destination: &str, message: &str) -> Outcome {
        if !self.available {
            return Outcome::Failed(TransportError::unavailable(
                self.name(),
                format!("{} not found", self.program),
            ));
        }
        if digits(destination).is_empty() {
            return Outcome::Failed(TransportError::Automation(format!(
                "destination {destination:?} has no digits"
            )));
        }

        let link = deep_link(&self.web_client_url, destination, message);
        match self.run(&link).await {
            Ok(()) => Outcome::sent(),
            Err(err) => Outcome::Failed(err),
        }
    }

    fn name(&self) -> &'static str {
        "opener"
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// Resolve a program the way a shell would: a path is checked directly,
/// a bare name is searched on `PATH`.
fn program_exists(program: &str) -> bool {
    if program.is_empty() {
        return false;
    }
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file();
    }
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}
