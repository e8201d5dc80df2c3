use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MIN_HANDLE_LEN: usize = 3;
const MAX_HANDLE_LEN: usize = 20;
const RESERVED_HANDLES: &[&str] = &[
    "admin", "api", "app", "help", "login", "logout", "onboarding", "profile", "settings",
    "signin", "signup", "support", "www",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    #[error("handle must not be empty")]
    Empty,
    #[error("handle must be entered without '@'")]
    AtSign,
    #[error("handle must be lowercase")]
    InvalidCase,
    #[error("handle must be 3-20 lowercase letters or digits")]
    InvalidFormat,
    #[error("handle '{0}' is reserved")]
    Reserved(String),
}

/// Public page handle, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageHandle(String);

impl PageHandle {
    pub fn parse(raw: &str) -> Result<Self, HandleError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(HandleError::Empty);
        }
        if value.contains('@') {
            return Err(HandleError::AtSign);
        }
        if value.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(HandleError::InvalidCase);
        }
        let len = value.chars().count();
        if !(MIN_HANDLE_LEN..=MAX_HANDLE_LEN).contains(&len)
            || !value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(HandleError::InvalidFormat);
        }
        if RESERVED_HANDLES.contains(&value) {
            return Err(HandleError::Reserved(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PageHandle {
    type Error = HandleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PageHandle> for String {
    fn from(value: PageHandle) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_trimmed_lowercase_handle() {
        let handle = PageHandle::parse("  minji42 ").expect("valid");
        assert_eq!(handle.as_str(), "minji42");
    }

    #[test]
    fn rejects_malformed_handles() {
        assert_eq!(PageHandle::parse("@minji"), Err(HandleError::AtSign));
        assert_eq!(PageHandle::parse("Minji"), Err(HandleError::InvalidCase));
        assert_eq!(PageHandle::parse("ab"), Err(HandleError::InvalidFormat));
        assert_eq!(PageHandle::parse("min-ji"), Err(HandleError::InvalidFormat));
        assert_eq!(
            PageHandle::parse("settings"),
            Err(HandleError::Reserved("settings".into()))
        );
    }

    #[test]
    fn deserializing_validates() {
        let err = serde_json::from_str::<PageHandle>("\"UPPER\"");
        assert!(err.is_err());
    }
}
