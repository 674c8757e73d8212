//! Sending accounts.
//!
//! An [`Account`] is created by an administrator through the registry; it is
//! never auto-created. Nothing here validates phone numbers or credentials,
//! a bad value shows up on the first hosted attempt.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registry-assigned account identifier. Ids increase with registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hosted gateway credential: the per-account endpoint id and its bearer token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub endpoint_id: String,
    #[serde(skip_serializing, default)]
    pub token: String,
}

impl Credential {
    pub fn new(endpoint_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            token: token.into(),
        }
    }

    /// Both halves are present.
    pub fn is_complete(&self) -> bool {
        !self.endpoint_id.is_empty() && !self.token.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("endpoint_id", &self.endpoint_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// A registered sending account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub credential: Option<Credential>,
    /// May be used for hosted gateway delivery.
    pub hosted_enabled: bool,
    /// A web client session is paired with this account.
    pub connected: bool,
    pub created_at: DateTime<Utc>,
}

/// Account fields supplied at registration.
///
/// ```rust,ignore
/// use herald::NewAccount;
///
/// let account = NewAccount::new()
///     .name("Front desk")
///     .phone_number("+201000000000")
///     .credential("1234567890", "EAAG...")
///     .hosted(true);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub endpoint_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub hosted_enabled: bool,
}

impl NewAccount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn phone_number(mut self, phone: impl Into<String>) -> Self {
        self.phone_number = Some(phone.into());
        self
    }

    /// Set both halves of the hosted credential.
    pub fn credential(mut self, endpoint_id: impl Into<String>, token: impl Into<String>) -> Self {
        self.endpoint_id = Some(endpoint_id.into());
        self.token = Some(token.into());
        self
    }

    /// Mark the account as usable for hosted delivery.
    pub fn hosted(mut self, enabled: bool) -> Self {
        self.hosted_enabled = enabled;
        self
    }

    /// Build the stored account. A credential is kept only when at least one
    /// half was supplied; missing halves stay empty.
    pub(crate) fn into_account(self, id: AccountId, created_at: DateTime<Utc>) -> Account {
        let credential = match (self.endpoint_id, self.token) {
            (None, None) => None,
            (endpoint_id, token) => Some(Credential {
                endpoint_id: endpoint_id.unwrap_or_default(),
                token: token.unwrap_or_default(),
            }),
        };

        Account {
            id,
            name: self.name,
            phone_number: self.phone_number,
            credential,
            hosted_enabled: self.hosted_enabled,
            connected: false,
            created_at,
        }
    }
}
