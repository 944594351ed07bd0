//! Error types for the codec.

use std::fmt;

/// A byte encoding the codec can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `0x` followed by hex digits.
    PrefixedHex,
    /// Multibase `z` prefix followed by hex digits.
    MultibaseHex,
    /// Multibase `z` prefix followed by base58btc.
    Base58Btc,
    /// Standard base64.
    Base64,
}

impl Scheme {
    /// Returns the label used in error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrefixedHex => "0x-hex",
            Self::MultibaseHex => "multibase-hex",
            Self::Base58Btc => "base58btc",
            Self::Base64 => "base64",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while decoding keys or signatures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Nothing to decode.
    #[error("encoded value is empty")]
    Empty,

    /// The value does not start with a recognized prefix.
    #[error("public key must start with '{expected}' multibase prefix")]
    MissingPrefix {
        /// The multibase prefix that was expected.
        expected: char,
    },

    /// A single scheme was attempted and failed.
    #[error("failed to decode as {scheme}: {reason}")]
    Decode {
        /// The scheme that was attempted.
        scheme: Scheme,
        /// Why the decoder rejected the input.
        reason: String,
    },

    /// Every applicable scheme was attempted and failed.
    #[error("failed to decode key, tried {}", describe(.attempts))]
    AllSchemesFailed {
        /// Each attempted scheme with its failure reason, in attempt order.
        attempts: Vec<(Scheme, String)>,
    },
}

fn describe(attempts: &[(Scheme, String)]) -> String {
    attempts
        .iter()
        .map(|(scheme, reason)| format!("{scheme} ({reason})"))
        .collect::<Vec<_>>()
        .join(", ")
}
