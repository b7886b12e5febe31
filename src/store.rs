//! Session store: single source of truth for the current session.
//!
//! ARCHITECTURE
//! ============
//! State lives in a `watch` channel so the route guard and screens observe
//! snapshots without touching persisted storage. Every credential mutation
//! goes through this type, which writes memory and storage together.
//!
//! ERROR HANDLING
//! ==============
//! Only `ValidationError` is returned to callers, and always before any
//! network I/O. Remote and storage failures end up in `Session::error` (or
//! are logged, for background validation) and the call still resolves.
//!
//! CONCURRENCY
//! ===========
//! The store does not serialize overlapping calls; callers check
//! `is_loading` first. Login and logout bump an epoch, and a
//! `check_auth_status` that finishes under an older epoch is discarded so a
//! slow validation can never resurrect a logged-out session.
//!
//! Writes to the credential keys and the matching state update happen
//! together under one async lock, and the epoch is re-read inside it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::api::{AuthApi, ChildSignup, LoginRequest, ParentSignup};
use crate::config::DEFAULT_LOGOUT_TIMEOUT_SECS;
use crate::error::{AuthError, ValidationError, require, require_match};
use crate::session::{CREDENTIAL_KEYS, CredentialRecord, Session, StoredCredentials, UserType};
use crate::storage::{KeyValueStore, StorageError};

/// Outcome of inspecting the persisted record at boot.
enum Verdict {
    Absent,
    Unreadable,
    Valid(CredentialRecord),
    Discard(&'static str),
}

pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    api: Arc<dyn AuthApi>,
    state: watch::Sender<Session>,
    epoch: AtomicU64,
    /// Held across every credential write and its state update.
    credentials: Mutex<()>,
    logout_timeout: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, api: Arc<dyn AuthApi>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            storage,
            api,
            state,
            epoch: AtomicU64::new(0),
            credentials: Mutex::new(()),
            logout_timeout: Duration::from_secs(DEFAULT_LOGOUT_TIMEOUT_SECS),
        }
    }

    /// Bound the best-effort remote logout call.
    #[must_use]
    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    // =========================================================================
    // OBSERVATION
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver notified on every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    // =========================================================================
    // LOGIN / LOGOUT
    // =========================================================================

    /// Authenticate against the backend and persist the credential record.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for an empty username or password. Remote and
    /// storage failures land in `Session::error` instead.
    pub async fn login(&self, username: &str, password: &str, user_type: UserType) -> Result<(), ValidationError> {
        self.clear_error();
        require("username", username)?;
        require("password", password)?;

        let epoch = self.bump_epoch();
        self.state.send_modify(|s| s.is_loading = true);

        let request = LoginRequest { username: username.to_owned(), password: password.to_owned(), user_type };
        let response = match self.api.login(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%username, %user_type, error = %e, "login failed");
                let _credentials = self.credentials.lock().await;
                if self.is_current(epoch) {
                    self.settle_failed_login().await;
                }
                self.finish_with_error(&e);
                return Ok(());
            }
        };

        let _credentials = self.credentials.lock().await;
        if !self.is_current(epoch) {
            debug!(%username, "login superseded before persisting; dropping result");
            return Ok(());
        }

        let record = CredentialRecord::new(&response.token, &response.user);
        if let Err(e) = self.persist(&record).await {
            warn!(%username, error = %e, "saving credentials failed; login rolled back");
            self.state.send_modify(Session::sign_out);
            self.settle_failed_login().await;
            self.finish_with_error(&AuthError::Storage(e));
            return Ok(());
        }

        info!(%username, %user_type, user_id = %response.user.id, "logged in");
        self.state.send_modify(|s| {
            s.sign_in(response.user, response.token);
            s.error = None;
            s.is_loading = false;
        });
        Ok(())
    }

    /// Tear down the session locally, then tell the backend.
    ///
    /// The remote call is bounded by the logout timeout and its failure is
    /// only logged; local state is already gone by then.
    pub async fn logout(&self) {
        self.bump_epoch();
        let token = {
            let _credentials = self.credentials.lock().await;
            let token = self.token();
            if let Err(e) = self.storage.remove_many(&CREDENTIAL_KEYS).await {
                warn!(error = %e, "clearing persisted credentials failed");
            }
            self.state.send_modify(|s| {
                *s = Session { is_auth_checked: true, ..Session::default() };
            });
            token
        };
        info!("logged out");

        let Some(token) = token else {
            return;
        };
        match tokio::time::timeout(self.logout_timeout, self.api.logout(&token)).await {
            Ok(Ok(())) => debug!("remote logout acknowledged"),
            Ok(Err(e)) => warn!(error = %e, "remote logout failed"),
            Err(_) => warn!(timeout_ms = self.logout_timeout.as_millis(), "remote logout timed out"),
        }
    }

    // =========================================================================
    // STATUS CHECK
    // =========================================================================

    /// Reconcile the persisted record with the backend.
    ///
    /// Always ends with `is_auth_checked = true`. When a login or logout
    /// superseded it, that operation owns the rest of the final state.
    pub async fn check_auth_status(&self) {
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.state.send_modify(|s| s.is_loading = true);

        let verdict = self.verify_persisted().await;

        let _credentials = self.credentials.lock().await;
        if !self.is_current(epoch) {
            debug!("auth status check superseded; discarding result");
            // Nothing can be signed in while unchecked, so the session is
            // already unauthenticated here.
            self.state.send_if_modified(|s| !std::mem::replace(&mut s.is_auth_checked, true));
            return;
        }

        match verdict {
            Verdict::Valid(record) => {
                info!(username = %record.username, user_type = %record.user_type, "session restored");
                let user = record.to_user();
                self.state.send_modify(|s| {
                    s.sign_in(user, record.token);
                    s.is_loading = false;
                });
            }
            Verdict::Absent | Verdict::Unreadable => self.settle_unauthenticated(),
            Verdict::Discard(reason) => {
                info!(reason, "discarding persisted session");
                if let Err(e) = self.storage.remove_many(&CREDENTIAL_KEYS).await {
                    warn!(error = %e, "clearing persisted credentials failed");
                }
                self.settle_unauthenticated();
            }
        }
    }

    async fn verify_persisted(&self) -> Verdict {
        let values = match self.storage.get_many(&CREDENTIAL_KEYS).await {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "reading persisted credentials failed");
                return Verdict::Unreadable;
            }
        };
        let Ok(values) = <[Option<String>; 4]>::try_from(values) else {
            return Verdict::Discard("unexpected credential read shape");
        };

        let record = match CredentialRecord::from_values(values) {
            StoredCredentials::Absent => return Verdict::Absent,
            StoredCredentials::Partial => return Verdict::Discard("partial credential record"),
            StoredCredentials::Complete(record) => record,
        };

        match self.api.is_authenticated(&record.token).await {
            Ok(true) => Verdict::Valid(record),
            Ok(false) => Verdict::Discard("token rejected by server"),
            Err(e) => {
                info!(error = %e, "session validation failed");
                Verdict::Discard("validation request failed")
            }
        }
    }

    /// A failed login before the session was ever checked settles it: the
    /// persisted record is dropped and memory is marked checked.
    async fn settle_failed_login(&self) {
        if self.state.borrow().is_auth_checked {
            return;
        }
        info!("login failed before auth check; discarding persisted session");
        if let Err(e) = self.storage.remove_many(&CREDENTIAL_KEYS).await {
            warn!(error = %e, "clearing persisted credentials failed");
        }
        self.settle_unauthenticated();
    }

    fn settle_unauthenticated(&self) {
        self.state.send_modify(|s| {
            s.sign_out();
            s.is_auth_checked = true;
            s.is_loading = false;
        });
    }

    // =========================================================================
    // SIGNUP
    // =========================================================================

    /// Register a parent account. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for missing fields or a password mismatch.
    pub async fn parent_signup(&self, form: &ParentSignup) -> Result<(), ValidationError> {
        self.clear_error();
        validate_parent_signup(form)?;
        self.state.send_modify(|s| s.is_loading = true);
        let result = self.api.parent_signup(form).await;
        self.finish_signup("parent", &form.username, result);
        Ok(())
    }

    /// Register a child account. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for missing fields or a password mismatch.
    pub async fn child_signup(&self, form: &ChildSignup) -> Result<(), ValidationError> {
        self.clear_error();
        validate_child_signup(form)?;
        self.state.send_modify(|s| s.is_loading = true);
        let result = self.api.child_signup(form).await;
        self.finish_signup("child", &form.username, result);
        Ok(())
    }

    fn finish_signup(&self, kind: &'static str, username: &str, result: Result<(), AuthError>) {
        match result {
            Ok(()) => {
                info!(kind, %username, "signup succeeded");
                self.state.send_modify(|s| {
                    s.error = None;
                    s.is_loading = false;
                });
            }
            Err(e) => {
                warn!(kind, %username, error = %e, "signup failed");
                self.finish_with_error(&e);
            }
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn finish_with_error(&self, err: &AuthError) {
        let message = err.user_message();
        self.state.send_modify(|s| {
            s.error = Some(message);
            s.is_loading = false;
        });
    }

    /// Write all four keys; on any failure remove whatever was written.
    async fn persist(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        for (key, value) in record.pairs() {
            if let Err(e) = self.storage.set(key, &value).await {
                if let Err(cleanup) = self.storage.remove_many(&CREDENTIAL_KEYS).await {
                    warn!(error = %cleanup, "cleanup after failed credential write failed");
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_parent_signup(form: &ParentSignup) -> Result<(), ValidationError> {
    require("username", &form.username)?;
    require("email", &form.email)?;
    require("password", &form.password)?;
    require("password_confirmation", &form.password_confirmation)?;
    require_match("password_confirmation", &form.password, &form.password_confirmation)
}

pub(crate) fn validate_child_signup(form: &ChildSignup) -> Result<(), ValidationError> {
    require("username", &form.username)?;
    require("password", &form.password)?;
    require("password_confirmation", &form.password_confirmation)?;
    require_match("password_confirmation", &form.password, &form.password_confirmation)
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
