use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::envelope::unwrap_object;
use crate::error::{ApiError, ApiResult};
use crate::http::{ApiClient, Credentials};
use crate::models::{AuthResponse, LoginRequest, RegisterRequest};

/// Backend operations the session store depends on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> ApiResult<AuthResponse>;
    /// `None` when the backend created the account without issuing a session
    /// (e.g. email verification pending).
    async fn register(&self, req: &RegisterRequest) -> ApiResult<Option<AuthResponse>>;
    async fn logout(&self, token: &str) -> ApiResult<()>;
    /// Exchange `token` for a fresh one together with the authoritative user.
    async fn refresh(&self, token: &str) -> ApiResult<AuthResponse>;
}

/// `/auth/*` endpoints over HTTP.
#[derive(Clone)]
pub struct AuthApi {
    client: ApiClient,
}

impl AuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn forgot_password(&self, email: &str) -> ApiResult<Value> {
        if !email.contains('@') {
            return Err(ApiError::validation("invalid email address"));
        }
        self.anonymous_post("auth/forgot-password", &json!({ "email": email.trim() })).await
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> ApiResult<Value> {
        if token.trim().is_empty() {
            return Err(ApiError::validation("reset token must not be empty"));
        }
        if password.chars().count() < 6 {
            return Err(ApiError::validation("password must be at least 6 characters"));
        }
        self.anonymous_post("auth/reset-password", &json!({ "token": token, "password": password })).await
    }

    pub async fn verify_email(&self, token: &str) -> ApiResult<Value> {
        if token.trim().is_empty() {
            return Err(ApiError::validation("verification token must not be empty"));
        }
        self.anonymous_post("auth/verify-email", &json!({ "token": token })).await
    }

    pub async fn resend_verification(&self, email: &str) -> ApiResult<Value> {
        if !email.contains('@') {
            return Err(ApiError::validation("invalid email address"));
        }
        self.anonymous_post("auth/resend-verification", &json!({ "email": email.trim() })).await
    }

    async fn anonymous_post(&self, path: &str, body: &Value) -> ApiResult<Value> {
        self.client.send(Method::POST, path, &[], Some(body), Credentials::Anonymous).await
    }
}

/// Credential rejections come back as 400/401/404 depending on the deployment.
fn as_credential_error(e: ApiError) -> ApiError {
    match e {
        ApiError::Validation(m) | ApiError::Auth(m) => ApiError::Auth(m),
        ApiError::NotFound => ApiError::Auth("invalid email or password".into()),
        other => other,
    }
}

fn parse_auth(body: Value) -> Option<AuthResponse> {
    serde_json::from_value(unwrap_object(body, "session")).ok()
}

#[async_trait]
impl AuthBackend for AuthApi {
    async fn login(&self, req: &LoginRequest) -> ApiResult<AuthResponse> {
        let body = self
            .client
            .send(Method::POST, "auth/login", &[], Some(req), Credentials::Anonymous)
            .await
            .map_err(as_credential_error)?;
        parse_auth(body).ok_or_else(|| ApiError::Network("malformed login response".into()))
    }

    async fn register(&self, req: &RegisterRequest) -> ApiResult<Option<AuthResponse>> {
        let body = self
            .client
            .send(Method::POST, "auth/register", &[], Some(req), Credentials::Anonymous)
            .await?;
        Ok(parse_auth(body))
    }

    async fn logout(&self, token: &str) -> ApiResult<()> {
        self.client
            .send::<Value>(Method::POST, "auth/logout", &[], None, Credentials::Token(token))
            .await?;
        Ok(())
    }

    async fn refresh(&self, token: &str) -> ApiResult<AuthResponse> {
        let body = self
            .client
            .send::<Value>(Method::POST, "auth/refresh", &[], None, Credentials::Token(token))
            .await?;
        parse_auth(body).ok_or_else(|| ApiError::Network("malformed refresh response".into()))
    }
}

#[derive(Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// Expiry of a JWT bearer token, read without verifying its signature.
/// Opaque (non-JWT) tokens yield `None`.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let header = decode_header(token).ok()?;
    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    let data = decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    DateTime::from_timestamp(data.claims.exp?, 0)
}

pub fn is_token_expired(token: &str, now: DateTime<Utc>) -> bool {
    token_expiry(token).is_some_and(|exp| exp <= now)
}
