//! Transport selection policy.
//!
//! Precedence, per recipient:
//!
//! 1. A hosted-capable account exists: hosted gateway, whatever the mode.
//! 2. Mode `web`, or mode `auto` with no hosted account: web automation
//!    (browser, then the opener fallback).
//! 3. Otherwise: log-only.
//!
//! Rule 1 ignores the requested mode. That is the established behavior and
//! it lives in [`use_hosted`] alone; gating hosted delivery behind `auto`
//! would be a change to that one function.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::error::HeraldError;

/// Delivery mode requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Automatic delivery; a single recipient requires a hosted account.
    Auto,
    /// Web automation explicitly requested.
    Web,
    /// No explicit request. Unknown mode strings also land here.
    #[default]
    #[serde(other)]
    Default,
}

impl Mode {
    /// Interpret an optional request parameter. Missing or unknown values
    /// are [`Mode::Default`].
    pub fn from_param(param: Option<&str>) -> Self {
        param.map(|p| p.parse().unwrap_or_default()).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Auto => "auto",
            Self::Web => "web",
        }
    }
}

impl FromStr for Mode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Self::Auto,
            "web" => Self::Web,
            _ => Self::Default,
        })
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which transport family handles a recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Hosted(Account),
    Web,
    LogOnly,
}

impl Route {
    pub fn is_hosted(&self) -> bool {
        matches!(self, Self::Hosted(_))
    }
}

/// The hosted gate: hosted delivery is used whenever a hosted-capable account
/// exists. `mode` does not take part.
pub fn use_hosted(hosted: Option<&Account>, _mode: Mode) -> bool {
    hosted.is_some()
}

/// Pick the route for one recipient.
pub fn select_route(hosted: Option<&Account>, mode: Mode) -> Route {
    if let Some(account) = hosted.filter(|a| use_hosted(Some(a), mode)) {
        return Route::Hosted(account.clone());
    }
    match mode {
        Mode::Web => Route::Web,
        Mode::Auto if hosted.is_none() => Route::Web,
        _ => Route::LogOnly,
    }
}

/// Request-level check for single-recipient dispatch: explicit `auto` with
/// no hosted account is refused before any attempt. Group dispatch does not
/// apply it.
pub fn check_single(hosted: Option<&Account>, mode: Mode) -> Result<(), HeraldError> {
    if mode == Mode::Auto && hosted.is_none() {
        return Err(HeraldError::NoHostedAccount);
    }
    Ok(())
}
