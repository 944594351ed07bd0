//! Signing-session lifecycle values.

use serde::{Deserialize, Serialize};

/// What a signing session asks the wallet to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Sign an arbitrary message on the signer's own behalf.
    #[default]
    Sign,
    /// Confirm someone else's request (for example a recovery) as a witness.
    Witness,
}

impl SessionKind {
    /// The terminal status a successful callback moves the session to.
    pub fn success_status(self) -> SessionStatus {
        match self {
            Self::Sign => SessionStatus::Completed,
            Self::Witness => SessionStatus::Witnessed,
        }
    }

    /// Returns the wire label for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::Witness => "witness",
        }
    }
}

impl std::str::FromStr for SessionKind {
    type Err = ParseSessionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sign" => Ok(Self::Sign),
            "witness" => Ok(Self::Witness),
            _ => Err(ParseSessionKindError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown session kind string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session kind: {0}")]
pub struct ParseSessionKindError(pub String);

/// Status of a signing session.
///
/// Transitions are one-way out of `Pending`; every other value is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for the wallet callback.
    Pending,
    /// A witness confirmed the request.
    Witnessed,
    /// The wallet signed; recorded but not yet acted upon.
    Signed,
    /// The signature verified and the session is done.
    Completed,
    /// The deadline passed while pending.
    Expired,
    /// The signature did not verify.
    Rejected,
    /// The callback signed the wrong message or came from the wrong signer.
    SecurityViolation,
}

impl SessionStatus {
    /// Returns the canonical string label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Witnessed => "witnessed",
            Self::Signed => "signed",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Rejected => "rejected",
            Self::SecurityViolation => "security_violation",
        }
    }

    /// True for every status other than `Pending`.
    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }

    /// True for the statuses a verified callback produces.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Witnessed | Self::Signed | Self::Completed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = ParseSessionStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "witnessed" => Ok(Self::Witnessed),
            "signed" => Ok(Self::Signed),
            "completed" => Ok(Self::Completed),
            "expired" => Ok(Self::Expired),
            "rejected" => Ok(Self::Rejected),
            "security_violation" => Ok(Self::SecurityViolation),
            _ => Err(ParseSessionStatusError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown session status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session status: {0}")]
pub struct ParseSessionStatusError(pub String);
