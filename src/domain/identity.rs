use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque caller reference used as the account key (typically an address like `0xabc...`).
/// Identities are compared case-insensitively, so they are stored trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Identity {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("identity cannot be empty")]
pub struct EmptyIdentity;

impl FromStr for Identity {
    type Err = EmptyIdentity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let identity = Self::new(s);
        if identity.0.is_empty() {
            return Err(EmptyIdentity);
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_case_insensitive() {
        assert_eq!(Identity::new("0xAbCd"), Identity::new("0xabcd"));
        assert_eq!(Identity::new("  0xabcd\n").as_str(), "0xabcd");
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert_eq!("   ".parse::<Identity>(), Err(EmptyIdentity));
        assert_eq!("0xF00".parse::<Identity>().unwrap().to_string(), "0xf00");
    }
}
