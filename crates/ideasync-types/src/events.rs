use serde::{Deserialize, Serialize};

use crate::api::Session;

/// What happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChange {
    /// Session restored from local storage at startup
    InitialSession,

    /// Password sign-in or email confirmation produced a session
    SignedIn,

    /// Session terminated, locally or remotely
    SignedOut,

    /// Access token renewed with the refresh token
    TokenRefreshed,

    /// User metadata changed (profile edit)
    UserUpdated,
}

/// Auth change notification fanned out by the backend client.
///
/// `sequence` increases by one per notification and is stamped while the
/// client holds its session lock, so a higher sequence always describes a
/// newer session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEvent {
    pub sequence: u64,
    pub change: AuthChange,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn is_signed_out(&self) -> bool {
        self.session.is_none()
    }
}
