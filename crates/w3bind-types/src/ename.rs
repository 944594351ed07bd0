//! Normalized identity names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The sigil every normalized identifier starts with.
pub const SIGIL: char = '@';

/// A globally unique identity name (eName / W3ID), always carrying exactly
/// one leading `@`.
///
/// Two identifiers are equal iff their normalized forms are byte-equal, so
/// `Ename::normalize("alice")` equals `Ename::normalize("@alice")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Ename(String);

/// Errors produced when normalizing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnameError {
    /// The input was empty, whitespace, or a bare sigil.
    #[error("identifier is empty")]
    Empty,
}

impl Ename {
    /// Normalizes `raw` into an identifier with a single leading `@`.
    ///
    /// Surrounding whitespace is trimmed. Repeated leading sigils collapse
    /// into one.
    ///
    /// # Errors
    ///
    /// Returns [`EnameError::Empty`] if nothing remains after stripping the
    /// sigil.
    pub fn normalize(raw: &str) -> Result<Self, EnameError> {
        let bare = raw.trim().trim_start_matches(SIGIL);
        if bare.is_empty() {
            return Err(EnameError::Empty);
        }
        Ok(Self(format!("{SIGIL}{bare}")))
    }

    /// The normalized form, including the sigil.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier without its sigil.
    pub fn bare(&self) -> &str {
        &self.0[SIGIL.len_utf8()..]
    }

    /// Returns true if `raw` normalizes to this identifier.
    ///
    /// Unparseable input never matches.
    pub fn matches(&self, raw: &str) -> bool {
        Self::normalize(raw).is_ok_and(|other| other == *self)
    }
}

impl fmt::Display for Ename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Ename {
    type Err = EnameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl AsRef<str> for Ename {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Ename {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::normalize(&raw).map_err(serde::de::Error::custom)
    }
}
