use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::Session;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    #[error("session has expired")]
    Expired,

    #[error("session carries no access token")]
    MissingAccessToken,
}

/// Deterministically check that a session is still usable at `now`.
///
/// Note: this validates the session *shape and expiry* only. Token signature
/// verification is the auth provider's business.
pub fn validate_session(session: &Session, now: DateTime<Utc>) -> Result<(), SessionValidationError> {
    if session.access_token.is_empty() {
        return Err(SessionValidationError::MissingAccessToken);
    }
    if now >= session.expires_at {
        return Err(SessionValidationError::Expired);
    }
    Ok(())
}
