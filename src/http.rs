use std::sync::Arc;

use reqwest::{header, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::envelope::{normalize_item, normalize_list, Resource};
use crate::error::{ApiError, ApiErrorBody, ApiResult};
use crate::storage::{KeyValueStore, AUTH_TOKEN_KEY};

/// Which bearer token, if any, a request carries.
#[derive(Debug, Clone, Copy)]
pub enum Credentials<'a> {
    /// Whatever token is currently in durable storage.
    Stored,
    /// A specific token, regardless of storage.
    Token(&'a str),
    Anonymous,
}

/// JSON-over-HTTP transport shared by every resource API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    store: Arc<dyn KeyValueStore>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, store: Arc<dyn KeyValueStore>) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            store,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn builder(&self, method: Method, path: &str, creds: Credentials<'_>) -> RequestBuilder {
        let mut rb = self
            .http
            .request(method, self.url(path))
            .header(header::ACCEPT, "application/json")
            .header("X-Request-Id", uuid::Uuid::new_v4().to_string());
        let token = match creds {
            Credentials::Stored => self.store.get(AUTH_TOKEN_KEY),
            Credentials::Token(t) => Some(t.to_string()),
            Credentials::Anonymous => None,
        };
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            rb = rb.bearer_auth(token);
        }
        rb
    }

    /// Send a request and classify the outcome into the error taxonomy.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        creds: Credentials<'_>,
    ) -> ApiResult<Value> {
        let mut rb = self.builder(method.clone(), path, creds);
        if !query.is_empty() {
            rb = rb.query(query);
        }
        if let Some(body) = body {
            rb = rb.json(body);
        }
        debug!(%method, path, "backend request");
        let resp = rb.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text)
                .map_err(|e| ApiError::Network(format!("non-JSON response from {path}: {e}")));
        }
        let err = classify_failure(status, &text);
        warn!(%method, path, status = status.as_u16(), error = %err, "backend request failed");
        Err(err)
    }

    pub async fn get(&self, path: &str) -> ApiResult<Value> {
        self.send::<Value>(Method::GET, path, &[], None, Credentials::Stored).await
    }

    pub async fn get_query(&self, path: &str, query: &[(&str, String)]) -> ApiResult<Value> {
        self.send::<Value>(Method::GET, path, query, None, Credentials::Stored).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<Value> {
        self.send(Method::POST, path, &[], Some(body), Credentials::Stored).await
    }

    pub async fn post_empty(&self, path: &str) -> ApiResult<Value> {
        self.send::<Value>(Method::POST, path, &[], None, Credentials::Stored).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<Value> {
        self.send(Method::PUT, path, &[], Some(body), Credentials::Stored).await
    }

    pub async fn put_empty(&self, path: &str) -> ApiResult<Value> {
        self.send::<Value>(Method::PUT, path, &[], None, Credentials::Stored).await
    }

    pub async fn patch_empty(&self, path: &str) -> ApiResult<Value> {
        self.send::<Value>(Method::PATCH, path, &[], None, Credentials::Stored).await
    }

    pub async fn delete(&self, path: &str) -> ApiResult<Value> {
        self.send::<Value>(Method::DELETE, path, &[], None, Credentials::Stored).await
    }

    /// Fetch a list resource. Transient and not-found failures degrade to an
    /// empty list; auth and validation failures propagate.
    pub async fn list<T: Resource>(&self, path: &str, query: &[(&str, String)]) -> ApiResult<Vec<T>> {
        degrade(T::LIST_KEY, self.get_query(path, query).await.map(normalize_list::<T>))
    }

    /// Fetch a single resource; every failure propagates.
    pub async fn item<T: Resource>(&self, path: &str) -> ApiResult<T> {
        normalize_item(self.get(path).await?)
    }
}

pub(crate) fn degrade<T>(resource: &str, result: ApiResult<Vec<T>>) -> ApiResult<Vec<T>> {
    match result {
        Err(e) if e.is_degradable() => {
            warn!(resource, error = %e, "list fetch failed; showing empty list");
            metrics::increment_counter!("forum_client_degraded_lists_total", "resource" => resource.to_string());
            Ok(Vec::new())
        }
        other => other,
    }
}

fn classify_failure(status: StatusCode, text: &str) -> ApiError {
    let parsed = serde_json::from_str::<ApiErrorBody>(text).ok();
    let message = parsed.as_ref().and_then(|b| b.text()).map(str::to_string);
    let reason = || status.canonical_reason().unwrap_or("request failed").to_string();
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::UNAUTHORIZED => ApiError::Auth(message.unwrap_or_else(reason)),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            ApiError::Validation(message.unwrap_or_else(reason))
        }
        // an HTML error page from a proxy or a cold-starting function
        _ if parsed.is_none() => ApiError::Network(format!("backend unavailable ({})", status.as_u16())),
        _ => ApiError::Server { status: status.as_u16(), message: message.unwrap_or_else(reason) },
    }
}
