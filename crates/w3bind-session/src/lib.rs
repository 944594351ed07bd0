//! Signing sessions.
//!
//! A signing session is a short-lived request for a wallet signature,
//! presented to the user as a `w3ds://sign` deep link (usually a QR code).
//! The wallet signs the session message and posts the result back; the
//! [`SessionManager`] verifies it and moves the session to exactly one
//! terminal status.
//!
//! Sessions live in an injected [`SessionStore`]: [`MemorySessionStore`] for a
//! single process, [`SqliteSessionStore`] when several instances must agree.

mod deep_link;
mod error;
mod manager;
mod model;
pub mod store;

pub use error::SessionError;
pub use manager::{SessionManager, SweepReport, DEFAULT_SESSION_TTL};
pub use model::{
    BindingIntent, BindingIntentRequest, CallbackOutcome, CallbackRequest, CreateSessionRequest,
    SessionUpdate, SigningSession,
};
pub use store::{MemorySessionStore, SessionStore, SqliteSessionStore, StoreError, UpdateOutcome};
