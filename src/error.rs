//! Error taxonomy shared by the session store, API client and account flows.
//!
//! ERROR HANDLING
//! ==============
//! `ValidationError` is the only error the session store hands back to its
//! callers. Everything else (`Authentication`, `Network`, `Server`, `Storage`)
//! is rendered into `Session::error` by the store, or returned directly by the
//! account flows which sit outside the store's error-field policy.

use crate::storage::StorageError;

// =============================================================================
// VALIDATION
// =============================================================================

/// Client-side input problems. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was empty or whitespace-only.
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// A confirmation field did not match the value it confirms.
    #[error("{field} does not match")]
    Mismatch { field: &'static str },
}

impl ValidationError {
    /// Name of the offending field.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field } | Self::Mismatch { field } => field,
        }
    }
}

/// Fail with `MissingField` when `value` is empty after trimming.
pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(())
}

/// Fail with `Mismatch` naming the confirmation field when the two differ.
pub(crate) fn require_match(field: &'static str, value: &str, confirmation: &str) -> Result<(), ValidationError> {
    if value != confirmation {
        return Err(ValidationError::Mismatch { field });
    }
    Ok(())
}

// =============================================================================
// AUTH ERROR
// =============================================================================

/// Failures of remote or persisted auth operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backend rejected the credentials or the session token.
    #[error("{0}")]
    Authentication(String),

    /// The operation needs a logged-in session of the right kind.
    #[error("not logged in")]
    NotAuthenticated,

    /// The backend could not be reached or timed out.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The backend answered with a body we could not decode.
    #[error("unexpected response: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Message suitable for inline display next to a form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Authentication(msg) if msg.is_empty() => "invalid username or password".to_owned(),
            Self::Network(_) => "could not reach the server, please try again".to_owned(),
            other => other.to_string(),
        }
    }

    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { status: 429 | 500..=599, .. })
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
