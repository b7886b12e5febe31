//! Session model and the persisted credential record.
//!
//! SYSTEM CONTEXT
//! ==============
//! `Session` is what observers (route guard, screens) read. The credential
//! record is its durable shadow: four flat string keys that must exist
//! together or not at all.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// PERSISTED KEYS
// =============================================================================

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const USER_TYPE_KEY: &str = "user_type";
pub const USER_ID_KEY: &str = "user_id";
pub const USERNAME_KEY: &str = "username";

/// Every key of the credential record, in write order.
pub const CREDENTIAL_KEYS: [&str; 4] = [AUTH_TOKEN_KEY, USER_TYPE_KEY, USER_ID_KEY, USERNAME_KEY];

// =============================================================================
// USER
// =============================================================================

/// Account kind. Wire and persisted form are `PARENT` / `CHILD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserType {
    Parent,
    Child,
}

impl UserType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "PARENT",
            Self::Child => "CHILD",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown user type: {0}")]
pub struct UnknownUserType(pub String);

impl FromStr for UserType {
    type Err = UnknownUserType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PARENT" => Ok(Self::Parent),
            "CHILD" => Ok(Self::Child),
            _ => Err(UnknownUserType(s.to_owned())),
        }
    }
}

/// Authenticated account identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub user_type: UserType,
    /// Backend profile row. Not part of the credential record, so it is
    /// `None` after a restart until the backend supplies it again.
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub profile_id: Option<String>,
}

/// Backend ids are numeric in some responses and strings in others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) if s.is_empty() => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// In-memory authentication state.
///
/// `is_authenticated` implies `user` and `token` are present and
/// `is_auth_checked` is true. `is_auth_checked` never goes back to false.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub is_auth_checked: bool,
    pub error: Option<String>,
}

impl Session {
    /// Checked and idle: safe for the route guard to act on.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.is_auth_checked && !self.is_loading
    }

    #[must_use]
    pub fn user_type(&self) -> Option<UserType> {
        self.user.as_ref().map(|u| u.user_type)
    }

    /// Drop identity and credentials, keeping the checked flag.
    pub(crate) fn sign_out(&mut self) {
        self.user = None;
        self.token = None;
        self.is_authenticated = false;
    }

    pub(crate) fn sign_in(&mut self, user: User, token: String) {
        self.user = Some(user);
        self.token = Some(token);
        self.is_authenticated = true;
        self.is_auth_checked = true;
    }
}

// =============================================================================
// CREDENTIAL RECORD
// =============================================================================

/// Typed view of the four persisted credential keys.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub token: String,
    pub user_type: UserType,
    pub user_id: String,
    pub username: String,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("token", &"<redacted>")
            .field("user_type", &self.user_type)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .finish()
    }
}

/// Result of reading the credential keys back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredCredentials {
    /// No credential key present.
    Absent,
    /// Some keys present, or a value unusable; must be cleaned up.
    Partial,
    Complete(CredentialRecord),
}

impl CredentialRecord {
    #[must_use]
    pub fn new(token: &str, user: &User) -> Self {
        Self {
            token: token.to_owned(),
            user_type: user.user_type,
            user_id: user.id.clone(),
            username: user.username.clone(),
        }
    }

    /// Classify values read for [`CREDENTIAL_KEYS`], in that order.
    #[must_use]
    pub fn from_values(values: [Option<String>; 4]) -> StoredCredentials {
        let present = values.iter().filter(|v| v.is_some()).count();
        if present == 0 {
            return StoredCredentials::Absent;
        }
        let [Some(token), Some(user_type), Some(user_id), Some(username)] = values else {
            return StoredCredentials::Partial;
        };
        if token.is_empty() || user_id.is_empty() || username.is_empty() {
            return StoredCredentials::Partial;
        }
        let Ok(user_type) = user_type.parse::<UserType>() else {
            return StoredCredentials::Partial;
        };
        StoredCredentials::Complete(Self { token, user_type, user_id, username })
    }

    /// Key/value pairs in [`CREDENTIAL_KEYS`] order.
    #[must_use]
    pub fn pairs(&self) -> [(&'static str, String); 4] {
        [
            (AUTH_TOKEN_KEY, self.token.clone()),
            (USER_TYPE_KEY, self.user_type.as_str().to_owned()),
            (USER_ID_KEY, self.user_id.clone()),
            (USERNAME_KEY, self.username.clone()),
        ]
    }

    /// Rebuild the user identity a restart can recover.
    #[must_use]
    pub fn to_user(&self) -> User {
        User {
            id: self.user_id.clone(),
            username: self.username.clone(),
            email: None,
            user_type: self.user_type,
            profile_id: None,
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
