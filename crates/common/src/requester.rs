//! Requester identity.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a requester name or email fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequester {
    #[error("email address is empty")]
    Empty,

    #[error("invalid email format: {0}")]
    Malformed(String),

    #[error("requester name is empty")]
    EmptyName,
}

/// An email-shaped requester identity.
///
/// Stored lower-cased, so `Alice@X.com` and `alice@x.com` hold the same
/// bookings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Parses and normalizes an email address.
    pub fn parse(raw: &str) -> Result<Self, InvalidRequester> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidRequester::Empty);
        }

        let malformed = || InvalidRequester::Malformed(trimmed.to_string());
        let (local, domain) = trimmed.split_once('@').ok_or_else(malformed)?;
        if local.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
            || trimmed.chars().any(char::is_whitespace)
        {
            return Err(malformed());
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = InvalidRequester;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The person a booking is held for.
///
/// Identity is the email; the name is carried for notifications only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub name: String,
    pub email: Email,
}

impl Requester {
    /// Creates a requester, validating both name and email.
    pub fn new(name: impl Into<String>, email: &str) -> Result<Self, InvalidRequester> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(InvalidRequester::EmptyName);
        }
        Ok(Self {
            name,
            email: Email::parse(email)?,
        })
    }
}
