//! Shared fakes for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::api::{AuthApi, ChangePasswordRequest, ChildSignup, LoginRequest, LoginResponse, ParentSignup, ResetPasswordRequest};
use crate::error::AuthError;
use crate::session::{User, UserType};
use crate::storage::MemoryStore;
use crate::store::SessionStore;

pub(crate) fn parent_user() -> User {
    User {
        id: "11".into(),
        username: "a".into(),
        email: Some("a@example.com".into()),
        user_type: UserType::Parent,
        profile_id: Some("p-11".into()),
    }
}

pub(crate) fn child_user() -> User {
    User {
        id: "22".into(),
        username: "kid".into(),
        email: None,
        user_type: UserType::Child,
        profile_id: Some("c-22".into()),
    }
}

/// Recording `AuthApi` with switchable behavior.
#[derive(Default)]
pub(crate) struct MockApi {
    calls: Mutex<Vec<&'static str>>,
    /// Accounts that log in successfully, keyed by username.
    accounts: Mutex<HashMap<String, User>>,
    valid_tokens: Mutex<HashSet<String>>,
    usernames_by_email: Mutex<HashMap<String, String>>,
    network_down: AtomicBool,
    reject_signup: AtomicBool,
    fail_logout: AtomicBool,
    hang_logout: AtomicBool,
    /// When set, `is_authenticated` waits for a notification.
    validate_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an account; logging in as it yields `token-<username>`.
    pub(crate) fn with_account(self: Arc<Self>, user: User) -> Arc<Self> {
        self.accounts
            .lock()
            .unwrap()
            .insert(user.username.clone(), user);
        self
    }

    pub(crate) fn accept_token(&self, token: &str) {
        self.valid_tokens.lock().unwrap().insert(token.to_owned());
    }

    pub(crate) fn revoke_token(&self, token: &str) {
        self.valid_tokens.lock().unwrap().remove(token);
    }

    pub(crate) fn register_email(&self, email: &str, username: &str) {
        self.usernames_by_email
            .lock()
            .unwrap()
            .insert(email.to_owned(), username.to_owned());
    }

    pub(crate) fn set_network_down(&self, down: bool) {
        self.network_down.store(down, Ordering::SeqCst);
    }

    pub(crate) fn set_reject_signup(&self, reject: bool) {
        self.reject_signup.store(reject, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_logout(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_hang_logout(&self, hang: bool) {
        self.hang_logout.store(hang, Ordering::SeqCst);
    }

    pub(crate) fn gate_validation(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.validate_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == name)
            .count()
    }

    fn record(&self, name: &'static str) -> Result<(), AuthError> {
        self.calls.lock().unwrap().push(name);
        if self.network_down.load(Ordering::SeqCst) {
            return Err(AuthError::Network("connection refused".into()));
        }
        Ok(())
    }

    fn require_token(&self, token: &str) -> Result<(), AuthError> {
        if self.valid_tokens.lock().unwrap().contains(token) {
            Ok(())
        } else {
            Err(AuthError::Authentication("session expired".into()))
        }
    }
}

pub(crate) fn token_for(username: &str) -> String {
    format!("token-{username}")
}

#[async_trait::async_trait]
impl AuthApi for MockApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        self.record("login")?;
        let user = self
            .accounts
            .lock()
            .unwrap()
            .get(&request.username)
            .filter(|u| u.user_type == request.user_type)
            .cloned();
        let Some(user) = user else {
            return Err(AuthError::Authentication("invalid username or password".into()));
        };
        let token = token_for(&user.username);
        self.accept_token(&token);
        Ok(LoginResponse { user, token })
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.record("logout")?;
        if self.hang_logout.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(AuthError::Server { status: 500, message: "boom".into() });
        }
        self.revoke_token(token);
        Ok(())
    }

    async fn is_authenticated(&self, token: &str) -> Result<bool, AuthError> {
        self.record("is_authenticated")?;
        let gate = self.validate_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self.valid_tokens.lock().unwrap().contains(token))
    }

    async fn parent_signup(&self, _form: &ParentSignup) -> Result<(), AuthError> {
        self.record("parent_signup")?;
        if self.reject_signup.load(Ordering::SeqCst) {
            return Err(AuthError::Server { status: 409, message: "username already taken".into() });
        }
        Ok(())
    }

    async fn child_signup(&self, _form: &ChildSignup) -> Result<(), AuthError> {
        self.record("child_signup")?;
        if self.reject_signup.load(Ordering::SeqCst) {
            return Err(AuthError::Server { status: 409, message: "username already taken".into() });
        }
        Ok(())
    }

    async fn change_password(&self, token: &str, _request: &ChangePasswordRequest) -> Result<(), AuthError> {
        self.record("change_password")?;
        self.require_token(token)
    }

    async fn request_password_reset(&self, _email: &str) -> Result<(), AuthError> {
        self.record("request_password_reset")
    }

    async fn reset_password(&self, _request: &ResetPasswordRequest) -> Result<(), AuthError> {
        self.record("reset_password")
    }

    async fn find_username(&self, email: &str) -> Result<String, AuthError> {
        self.record("find_username")?;
        self.usernames_by_email
            .lock()
            .unwrap()
            .get(email)
            .cloned()
            .ok_or_else(|| AuthError::Server { status: 404, message: "no account for that email".into() })
    }

    async fn parent_connection_code(&self, token: &str) -> Result<String, AuthError> {
        self.record("parent_connection_code")?;
        self.require_token(token)?;
        Ok("SPROUT1".into())
    }

    async fn connect_parent(&self, token: &str, code: &str) -> Result<(), AuthError> {
        self.record("connect_parent")?;
        self.require_token(token)?;
        if code == "SPROUT1" {
            Ok(())
        } else {
            Err(AuthError::Server { status: 404, message: "unknown connection code".into() })
        }
    }
}

/// Store wired to fresh fakes.
pub(crate) fn store_with(api: &Arc<MockApi>, storage: &Arc<MemoryStore>) -> SessionStore {
    SessionStore::new(Arc::clone(storage) as _, Arc::clone(api) as _)
}
