//! Remote auth API: trait seam plus the `reqwest` implementation.
//!
//! DESIGN
//! ======
//! The session store and account flows depend on `dyn AuthApi`, never on
//! HTTP directly, so tests swap in recording mocks. `HttpAuthApi` reads the
//! status and body first, then maps: 401/403 to `Authentication`, other
//! non-2xx to `Server`, transport failures to `Network`, bad bodies to `Decode`.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::{ApiConfig, ConfigError};
use crate::error::AuthError;
use crate::session::{User, UserType};

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub user_type: UserType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

/// Parent account registration form.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentSignup {
    pub username: String,
    pub password: String,
    #[serde(skip)]
    pub password_confirmation: String,
    pub email: String,
}

/// Child account registration form.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSignup {
    pub username: String,
    pub password: String,
    #[serde(skip)]
    pub password_confirmation: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    /// Code delivered by the password-reset email.
    pub reset_token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
struct UsernameResponse {
    username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionCodeResponse {
    #[serde(alias = "connectionCode")]
    code: String,
}

/// `GET /auth/is-authenticated` answers with a bare bool or an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AuthCheckResponse {
    Bare(bool),
    Wrapped {
        #[serde(rename = "isAuthenticated", alias = "authenticated")]
        is_authenticated: bool,
    },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: Option<String>,
}

// =============================================================================
// TRAIT
// =============================================================================

/// Remote auth endpoints consumed by the client.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/login`
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError>;

    /// `POST /auth/logout`
    async fn logout(&self, token: &str) -> Result<(), AuthError>;

    /// `GET /auth/is-authenticated`
    async fn is_authenticated(&self, token: &str) -> Result<bool, AuthError>;

    /// `POST /auth/parent/signup`
    async fn parent_signup(&self, form: &ParentSignup) -> Result<(), AuthError>;

    /// `POST /auth/child/signup`
    async fn child_signup(&self, form: &ChildSignup) -> Result<(), AuthError>;

    /// `POST /auth/change-password`
    async fn change_password(&self, token: &str, request: &ChangePasswordRequest) -> Result<(), AuthError>;

    /// `POST /auth/request-password-reset`
    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// `POST /auth/reset-password`
    async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<(), AuthError>;

    /// `POST /auth/find-username`
    async fn find_username(&self, email: &str) -> Result<String, AuthError>;

    /// `GET /auth/parent/connection-code`
    async fn parent_connection_code(&self, token: &str) -> Result<String, AuthError>;

    /// `POST /auth/child/connect-parent`
    async fn connect_parent(&self, token: &str, code: &str) -> Result<(), AuthError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpAuthApi {
    http: reqwest::Client,
    config: ApiConfig,
}

impl HttpAuthApi {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()
            .map_err(|e| ConfigError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, AuthError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        check_status(status, &text)?;
        Ok(text)
    }

    async fn post_json<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<String, AuthError> {
        let mut request = self.http.post(self.config.endpoint(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.send(request).await
    }

    async fn get(&self, path: &str, token: &str) -> Result<String, AuthError> {
        let request = self
            .http
            .get(self.config.endpoint(path))
            .bearer_auth(token);
        self.send(request).await
    }
}

#[async_trait::async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        let text = self.post_json("/auth/login", None, request).await?;
        parse_json(&text)
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.post_json("/auth/logout", Some(token), &serde_json::json!({}))
            .await
            .map(drop)
    }

    async fn is_authenticated(&self, token: &str) -> Result<bool, AuthError> {
        match self.get("/auth/is-authenticated", token).await {
            Ok(text) => parse_auth_check(&text),
            // An expired token is a negative answer, not a failed request.
            Err(AuthError::Authentication(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn parent_signup(&self, form: &ParentSignup) -> Result<(), AuthError> {
        self.post_json("/auth/parent/signup", None, form)
            .await
            .map(drop)
    }

    async fn child_signup(&self, form: &ChildSignup) -> Result<(), AuthError> {
        self.post_json("/auth/child/signup", None, form)
            .await
            .map(drop)
    }

    async fn change_password(&self, token: &str, request: &ChangePasswordRequest) -> Result<(), AuthError> {
        self.post_json("/auth/change-password", Some(token), request)
            .await
            .map(drop)
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let body = serde_json::json!({ "email": email });
        self.post_json("/auth/request-password-reset", None, &body)
            .await
            .map(drop)
    }

    async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<(), AuthError> {
        self.post_json("/auth/reset-password", None, request)
            .await
            .map(drop)
    }

    async fn find_username(&self, email: &str) -> Result<String, AuthError> {
        let body = serde_json::json!({ "email": email });
        let text = self
            .post_json("/auth/find-username", None, &body)
            .await?;
        parse_json::<UsernameResponse>(&text).map(|r| r.username)
    }

    async fn parent_connection_code(&self, token: &str) -> Result<String, AuthError> {
        let text = self
            .get("/auth/parent/connection-code", token)
            .await?;
        parse_json::<ConnectionCodeResponse>(&text).map(|r| r.code)
    }

    async fn connect_parent(&self, token: &str, code: &str) -> Result<(), AuthError> {
        let body = serde_json::json!({ "code": code });
        self.post_json("/auth/child/connect-parent", Some(token), &body)
            .await
            .map(drop)
    }
}

// =============================================================================
// RESPONSE MAPPING
// =============================================================================

pub(crate) fn check_status(status: StatusCode, body: &str) -> Result<(), AuthError> {
    if status.is_success() {
        return Ok(());
    }
    let message = error_message(body);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AuthError::Authentication(message));
    }
    Err(AuthError::Server { status: status.as_u16(), message })
}

/// Pull `message`/`error` out of a JSON error body, else use the raw text.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.trim().to_owned())
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, AuthError> {
    serde_json::from_str(text).map_err(|e| AuthError::Decode(e.to_string()))
}

pub(crate) fn parse_auth_check(text: &str) -> Result<bool, AuthError> {
    match parse_json::<AuthCheckResponse>(text)? {
        AuthCheckResponse::Bare(ok) | AuthCheckResponse::Wrapped { is_authenticated: ok } => Ok(ok),
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
