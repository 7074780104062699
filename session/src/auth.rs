//! Auth service seam.
//!
//! Credential checks belong to the external auth provider. The auth record
//! carries no role; roles come from profile documents (see `resolve`).

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("auth service returned {0}")]
    Status(u16),
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
}

/// What the auth service knows about a signed-in account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthRecord {
    pub uid: String,
    pub email: String,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, email: &str, secret: &str) -> Result<AuthRecord, AuthError>;

    async fn current(&self) -> Option<AuthRecord>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: String,
}

/// Client for the hosted auth provider's password sign-in endpoint.
pub struct HttpAuthClient {
    client: reqwest::Client,
    sign_in_url: String,
    api_key: Option<String>,
    current: Mutex<Option<AuthRecord>>,
}

impl HttpAuthClient {
    pub fn new(base_url: &Url, api_key: Option<String>) -> Self {
        let sign_in_url = format!(
            "{}/{}",
            base_url.as_str().trim_end_matches('/'),
            "v1/accounts:signIn"
        );

        HttpAuthClient {
            client: reqwest::Client::new(),
            sign_in_url,
            api_key,
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AuthService for HttpAuthClient {
    async fn sign_in(&self, email: &str, secret: &str) -> Result<AuthRecord, AuthError> {
        let mut request = self.client.post(&self.sign_in_url).json(&SignInRequest {
            email,
            password: secret,
            return_secure_token: true,
        });
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.json::<SignInResponse>().await?;
                let record = AuthRecord {
                    uid: body.local_id,
                    email: body.email,
                };
                *self.current.lock() = Some(record.clone());
                Ok(record)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthError::InvalidCredentials)
            }
            status => Err(AuthError::Status(status.as_u16())),
        }
    }

    async fn current(&self) -> Option<AuthRecord> {
        self.current.lock().clone()
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // Tokens are client-held; signing out forgets them.
        *self.current.lock() = None;
        Ok(())
    }
}

/// A fixed set of accounts, for tests and the in-memory demo setup.
#[derive(Default)]
pub struct StaticAuth {
    /// email -> (secret, uid)
    accounts: HashMap<String, (String, String)>,
    current: Mutex<Option<AuthRecord>>,
}

impl StaticAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(
        mut self,
        email: impl Into<String>,
        secret: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        self.accounts
            .insert(email.into(), (secret.into(), uid.into()));
        self
    }
}

#[async_trait]
impl AuthService for StaticAuth {
    async fn sign_in(&self, email: &str, secret: &str) -> Result<AuthRecord, AuthError> {
        match self.accounts.get(email) {
            Some((expected, uid)) if expected == secret => {
                let record = AuthRecord {
                    uid: uid.clone(),
                    email: email.to_string(),
                };
                *self.current.lock() = Some(record.clone());
                Ok(record)
            }
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn current(&self) -> Option<AuthRecord> {
        self.current.lock().clone()
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.current.lock() = None;
        Ok(())
    }
}
