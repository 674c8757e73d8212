//! Recipients and the collaborators that resolve them.
//!
//! Herald does not own student or group records. A caller either hands the
//! dispatcher ready [`Envelope`]s, or supplies a [`Directory`] to resolve ids
//! and a [`Compose`] to render one message per recipient.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference to a recipient record owned by the caller (e.g. a student id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub u64);

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a recipient group owned by the caller (e.g. a class group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

/// A phone-bearing delivery target.
///
/// The phone string is free-form. It is never validated up front; a bad
/// number surfaces as a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecipientId>,
    pub phone: String,
}

impl Recipient {
    /// Recipient with no backing record.
    pub fn phone(phone: impl Into<String>) -> Self {
        Self {
            id: None,
            phone: phone.into(),
        }
    }

    /// Recipient backed by a record id.
    pub fn with_id(id: RecipientId, phone: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            phone: phone.into(),
        }
    }

    /// Phone with surrounding whitespace removed.
    pub fn destination(&self) -> &str {
        self.phone.trim()
    }
}

/// A recipient paired with the message rendered for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub recipient: Recipient,
    pub message: String,
}

impl Envelope {
    pub fn new(recipient: Recipient, message: impl Into<String>) -> Self {
        Self {
            recipient,
            message: message.into(),
        }
    }
}

/// What a resolved dispatch is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Recipient(RecipientId),
    Group(GroupId),
}

/// Resolves recipient and group ids to phone-bearing recipients.
pub trait Directory: Send + Sync {
    /// Look up one recipient.
    fn recipient(&self, id: RecipientId) -> Option<Recipient>;

    /// Members of a group, in directory order. Unknown groups are empty.
    fn members(&self, group: GroupId) -> Vec<Recipient>;
}

/// Renders the message for one recipient.
pub trait Compose: Send + Sync {
    fn compose(&self, recipient: &Recipient) -> String;
}

/// Blanket implementation for closures.
impl<F> Compose for F
where
    F: Fn(&Recipient) -> String + Send + Sync,
{
    fn compose(&self, recipient: &Recipient) -> String {
        (self)(recipient)
    }
}
