//! Client-held "current user" with durable token storage and best-effort
//! background revalidation against the backend.
//!
//! The local snapshot answers reads synchronously. The backend is the
//! authority, but it only wins on an explicit rejection: an auth error clears
//! the session, a network error leaves it alone. Each revalidation is tagged
//! with the token it checked and its result is dropped if that token is no
//! longer the active one.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::auth::{is_token_expired, AuthBackend};
use crate::error::{ApiError, ApiResult};
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, User};
use crate::storage::{KeyValueStore, StorageError, AUTH_TOKEN_KEY, CURRENT_USER_KEY};

/// Minimum gap between successful background revalidations of the same token.
pub const DEFAULT_REVALIDATE_INTERVAL: Duration = Duration::from_secs(30);

type Listener = Arc<dyn Fn(Option<&User>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Anonymous,
    Authenticated(User),
}

#[derive(Default)]
struct Inner {
    token: Option<String>,
    user: Option<User>,
    last_validated: Option<Instant>,
    revalidation: Option<(String, JoinHandle<()>)>,
}

struct Shared {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn KeyValueStore>,
    inner: Mutex<Inner>,
    listeners: Mutex<BTreeMap<u64, Listener>>,
    next_listener: AtomicU64,
    revalidate_interval: Duration,
}

/// Shared session handle; clones observe the same state.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Restore whatever session durable storage holds.
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_revalidate_interval(backend, store, DEFAULT_REVALIDATE_INTERVAL)
    }

    pub fn with_revalidate_interval(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn KeyValueStore>,
        revalidate_interval: Duration,
    ) -> Self {
        let inner = restore(store.as_ref());
        Self {
            shared: Arc::new(Shared {
                backend,
                store,
                inner: Mutex::new(inner),
                listeners: Mutex::new(BTreeMap::new()),
                next_listener: AtomicU64::new(1),
                revalidate_interval,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---------------- reads ----------------------------------------------

    /// Cached user, answered without waiting on the network. When a token is
    /// held this also schedules a background revalidation.
    pub fn current_user(&self) -> Option<User> {
        let mut inner = self.lock();
        let token = inner.token.clone()?;
        let user = inner.user.clone();
        self.schedule_revalidation(&mut inner, token);
        user
    }

    pub fn state(&self) -> SessionState {
        match &self.lock().user {
            Some(u) => SessionState::Authenticated(u.clone()),
            None => SessionState::Anonymous,
        }
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().token.is_some()
    }

    // ---------------- transitions ----------------------------------------

    pub async fn sign_in(&self, email: &str, password: &str) -> ApiResult<User> {
        let req = LoginRequest::new(email, password)?;
        let auth = self.shared.backend.login(&req).await?;
        info!(user_id = %auth.user.id, "signed in");
        self.establish(auth)
    }

    /// Register an account; a session is established when the backend issues one.
    pub async fn sign_up(&self, email: &str, password: &str, username: Option<&str>) -> ApiResult<Option<User>> {
        let req = RegisterRequest::new(email, password, username)?;
        match self.shared.backend.register(&req).await? {
            Some(auth) => self.establish(auth).map(Some),
            None => {
                info!(email = %req.email, "account created; no session issued");
                Ok(None)
            }
        }
    }

    /// Ends the session that was active when called. The backend logout is
    /// best effort; only a local storage failure is reported, after memory has
    /// been cleared. A session established while the logout was in flight is
    /// left alone.
    pub async fn sign_out(&self) -> ApiResult<()> {
        let token = self.lock().token.clone();
        if let Some(token) = &token {
            if let Err(e) = self.shared.backend.logout(token).await {
                error!(error = %e, "backend logout failed; clearing local session anyway");
            }
        }
        let result = {
            let mut inner = self.lock();
            if inner.token != token {
                debug!("session replaced during sign-out; keeping the newer session");
                return Ok(());
            }
            self.clear_locked(&mut inner)
        };
        info!("signed out");
        self.notify(None);
        result.map_err(ApiError::from)
    }

    /// Check the active token against the backend now.
    ///
    /// `Ok(None)` when there is no session. An auth rejection signs the session
    /// out and is returned; transient failures are returned with the snapshot
    /// untouched.
    pub async fn revalidate(&self) -> ApiResult<Option<User>> {
        let Some(token) = self.token() else { return Ok(None) };
        self.revalidate_token(token).await
    }

    /// Wait for the in-flight background revalidation, if any.
    pub async fn settled(&self) {
        let handle = self.lock().revalidation.take().map(|(_, h)| h);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "background revalidation task failed");
            }
        }
    }

    /// Exchange the active token for a fresh one and return the token now in use.
    pub async fn refresh_token(&self) -> ApiResult<String> {
        let Some(token) = self.token() else {
            return Err(ApiError::Auth("not signed in".into()));
        };
        self.revalidate_token(token).await?;
        self.token().ok_or_else(|| ApiError::Auth("not signed in".into()))
    }

    // ---------------- listeners ------------------------------------------

    /// Register for auth-state changes; the listener receives the new user
    /// (or `None`) after every transition.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(Option<&User>) + Send + Sync + 'static,
    {
        let id = self.shared.next_listener.fetch_add(1, Ordering::Relaxed);
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id.0)
            .is_some()
    }

    fn notify(&self, user: Option<&User>) {
        // listeners may call back into the session, so never hold a lock here
        let listeners: Vec<Listener> = self
            .shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener(user);
        }
    }

    // ---------------- internals ------------------------------------------

    fn establish(&self, auth: AuthResponse) -> ApiResult<User> {
        let AuthResponse { user, token } = auth;
        if token.is_empty() {
            return Err(ApiError::Network("backend issued an empty token".into()));
        }
        let snapshot = serde_json::to_string(&user).map_err(StorageError::from)?;
        {
            let mut inner = self.lock();
            let persisted = self
                .shared
                .store
                .set(AUTH_TOKEN_KEY, &token)
                .and_then(|_| self.shared.store.set(CURRENT_USER_KEY, &snapshot));
            if let Err(e) = persisted {
                // never leave a token without its snapshot (or vice versa)
                if let Err(rollback) = self.clear_locked(&mut inner) {
                    error!(error = %rollback, "failed to roll back partially stored session");
                }
                return Err(e.into());
            }
            inner.token = Some(token);
            inner.user = Some(user.clone());
            inner.last_validated = Some(Instant::now());
        }
        self.notify(Some(&user));
        Ok(user)
    }

    fn clear_locked(&self, inner: &mut Inner) -> Result<(), StorageError> {
        inner.token = None;
        inner.user = None;
        inner.last_validated = None;
        let token = self.shared.store.remove(AUTH_TOKEN_KEY);
        let user = self.shared.store.remove(CURRENT_USER_KEY);
        token.and(user)
    }

    /// Forced sign-out for `token`, unless a newer session replaced it.
    fn expire(&self, token: &str) {
        {
            let mut inner = self.lock();
            if inner.token.as_deref() != Some(token) {
                return;
            }
            if let Err(e) = self.clear_locked(&mut inner) {
                error!(error = %e, "failed to clear rejected session from storage");
            }
        }
        warn!("session rejected by backend; signed out");
        self.notify(None);
    }

    fn schedule_revalidation(&self, inner: &mut Inner, token: String) {
        if let Some((tag, handle)) = &inner.revalidation {
            if *tag == token && !handle.is_finished() {
                return;
            }
        }
        if inner.last_validated.is_some_and(|at| at.elapsed() < self.shared.revalidate_interval) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime; skipping background revalidation");
            return;
        };
        let session = self.clone();
        let tag = token.clone();
        let handle = runtime.spawn(async move {
            if let Err(e) = session.revalidate_token(token).await {
                debug!(error = %e, "background revalidation did not confirm session");
            }
        });
        inner.revalidation = Some((tag, handle));
    }

    /// Renew `token` through the backend refresh endpoint, which answers with
    /// a fresh token and the authoritative user.
    async fn revalidate_token(&self, token: String) -> ApiResult<Option<User>> {
        let outcome = if is_token_expired(&token, Utc::now()) {
            Err(ApiError::Auth("session token expired".into()))
        } else {
            self.shared.backend.refresh(&token).await
        };
        match outcome {
            Ok(renewed) => Ok(self.apply_renewal(&token, renewed)),
            Err(e) if e.is_auth() => {
                self.expire(&token);
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "revalidation failed; keeping cached session");
                Err(e)
            }
        }
    }

    fn apply_renewal(&self, token: &str, renewed: AuthResponse) -> Option<User> {
        let AuthResponse { user, token: fresh } = renewed;
        let changed = {
            let mut inner = self.lock();
            if inner.token.as_deref() != Some(token) {
                debug!("discarding revalidation for superseded token");
                return inner.user.clone();
            }
            inner.last_validated = Some(Instant::now());
            if !fresh.is_empty() && fresh != token {
                match self.shared.store.set(AUTH_TOKEN_KEY, &fresh) {
                    Ok(()) => inner.token = Some(fresh),
                    Err(e) => warn!(error = %e, "failed to persist renewed token; keeping the previous one"),
                }
            }
            let changed = inner.user.as_ref() != Some(&user);
            if changed {
                match serde_json::to_string(&user) {
                    Ok(snapshot) => {
                        if let Err(e) = self.shared.store.set(CURRENT_USER_KEY, &snapshot) {
                            warn!(error = %e, "failed to persist refreshed user snapshot");
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to serialize refreshed user snapshot"),
                }
                inner.user = Some(user.clone());
            }
            changed
        };
        if changed {
            self.notify(Some(&user));
        }
        Some(user)
    }
}

/// Load the persisted session. A token without a readable snapshot (or the
/// reverse) is discarded entirely.
fn restore(store: &dyn KeyValueStore) -> Inner {
    let token = store.get(AUTH_TOKEN_KEY).filter(|t| !t.is_empty());
    let snapshot = store.get(CURRENT_USER_KEY);
    match (token, snapshot) {
        (None, None) => Inner::default(),
        (Some(token), Some(raw)) => match serde_json::from_str::<User>(&raw) {
            Ok(user) => Inner { token: Some(token), user: Some(user), ..Inner::default() },
            Err(e) => {
                warn!(error = %e, "stored user snapshot is unreadable; discarding session");
                discard(store);
                Inner::default()
            }
        },
        _ => {
            warn!("incomplete stored session; discarding");
            discard(store);
            Inner::default()
        }
    }
}

fn discard(store: &dyn KeyValueStore) {
    for key in [AUTH_TOKEN_KEY, CURRENT_USER_KEY] {
        if let Err(e) = store.remove(key) {
            error!(key, error = %e, "failed to remove stored session key");
        }
    }
}
