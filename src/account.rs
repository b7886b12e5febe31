//! Account recovery and parent/child linking.
//!
//! These flows sit beside the session store rather than inside it: they
//! never change who is logged in, and they hand errors straight back to the
//! screen that started them instead of going through `Session::error`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{AuthApi, ChangePasswordRequest, ResetPasswordRequest};
use crate::error::{AuthError, require, require_match};
use crate::session::UserType;
use crate::store::SessionStore;

#[derive(Clone)]
pub struct AccountService {
    api: Arc<dyn AuthApi>,
    store: Arc<SessionStore>,
}

impl AccountService {
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<SessionStore>) -> Self {
        Self { api, store }
    }

    /// Change the logged-in user's password.
    ///
    /// # Errors
    ///
    /// Validation failures, `NotAuthenticated` without a session, or the
    /// backend's answer.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<(), AuthError> {
        require("current_password", current_password)?;
        require("new_password", new_password)?;
        require_match("new_password_confirmation", new_password, confirmation)?;
        let token = self.session_token(None)?;

        let request =
            ChangePasswordRequest { current_password: current_password.to_owned(), new_password: new_password.to_owned() };
        self.api
            .change_password(&token, &request)
            .await
            .inspect_err(|e| warn!(error = %e, "password change failed"))?;
        info!("password changed");
        Ok(())
    }

    /// Ask the backend to mail a reset code.
    ///
    /// # Errors
    ///
    /// Validation failure for an empty email, or the backend's answer.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        require("email", email)?;
        self.api.request_password_reset(email.trim()).await
    }

    /// Set a new password using a mailed reset code.
    ///
    /// # Errors
    ///
    /// Validation failures, or the backend's answer.
    pub async fn reset_password(&self, reset_token: &str, new_password: &str, confirmation: &str) -> Result<(), AuthError> {
        require("reset_token", reset_token)?;
        require("new_password", new_password)?;
        require_match("new_password_confirmation", new_password, confirmation)?;
        let request = ResetPasswordRequest { reset_token: reset_token.trim().to_owned(), new_password: new_password.to_owned() };
        self.api.reset_password(&request).await
    }

    /// Look up the username registered to an email address.
    ///
    /// # Errors
    ///
    /// Validation failure for an empty email, or the backend's answer.
    pub async fn find_username(&self, email: &str) -> Result<String, AuthError> {
        require("email", email)?;
        self.api.find_username(email.trim()).await
    }

    /// Code a parent hands to their child to link accounts.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` unless logged in as a parent, or the backend's answer.
    pub async fn parent_connection_code(&self) -> Result<String, AuthError> {
        let token = self.session_token(Some(UserType::Parent))?;
        self.api.parent_connection_code(&token).await
    }

    /// Link the logged-in child to a parent by connection code.
    ///
    /// # Errors
    ///
    /// Validation failure for an empty code, `NotAuthenticated` unless logged
    /// in as a child, or the backend's answer.
    pub async fn connect_parent(&self, code: &str) -> Result<(), AuthError> {
        require("code", code)?;
        let token = self.session_token(Some(UserType::Child))?;
        self.api.connect_parent(&token, code.trim()).await?;
        info!("child linked to parent");
        Ok(())
    }

    fn session_token(&self, required: Option<UserType>) -> Result<String, AuthError> {
        let session = self.store.snapshot();
        if !session.is_authenticated {
            return Err(AuthError::NotAuthenticated);
        }
        if required.is_some_and(|kind| session.user_type() != Some(kind)) {
            return Err(AuthError::NotAuthenticated);
        }
        session.token.ok_or(AuthError::NotAuthenticated)
    }
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;
