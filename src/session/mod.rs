//! Session management.
//!
//! Owns the access/refresh token pair, attaches the bearer header to every
//! outgoing call, and recovers an authorization failure exactly once per
//! call through a single-flight refresh exchange. An unrecoverable refresh
//! clears both tokens and broadcasts a logout signal.

pub mod store;
pub mod transport;

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::types::{error_for_status, ApiError, Result};
use serde::de::DeserializeOwned;
use store::{ACCESS_KEY, REFRESH_KEY};

pub use store::{FileStore, MemoryStore, StateStore, COMMUNITY_KEY};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

/// Broadcast to interested components (identity resolver, UI shell).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedOut,
}

#[derive(Debug, Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

#[derive(Debug, Deserialize)]
struct RefreshedToken {
    access: String,
}

/// Payload for `POST /auth/register`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub community_id: i64,
}

/// Response of a successful registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub email: String,
    pub display_name: String,
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    store: Arc<dyn StateStore>,
    access: RwLock<Option<String>>,
    refresh: RwLock<Option<String>>,
    /// Serializes refresh exchanges; concurrent 401s queue here and reuse
    /// the first caller's outcome.
    refreshing: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Restore a session from whatever the store holds. Absent or stale
    /// tokens are fine; the first 401 sorts it out.
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn StateStore>) -> Self {
        let access = store.get(ACCESS_KEY);
        let refresh = store.get(REFRESH_KEY);
        let (events, _) = broadcast::channel(8);

        Self {
            transport,
            store,
            access: RwLock::new(access),
            refresh: RwLock::new(refresh),
            refreshing: Mutex::new(()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.access.read().await.is_some()
    }

    /// Exchange credentials for a token pair and persist it.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let request = ApiRequest::post(
            "/auth/token",
            serde_json::json!({ "email": email, "password": password }),
        );
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(error_for_status(response.status, &response.body));
        }

        let pair: TokenPair = response.json()?;
        self.store.set(ACCESS_KEY, &pair.access);
        self.store.set(REFRESH_KEY, &pair.refresh);
        *self.access.write().await = Some(pair.access);
        *self.refresh.write().await = Some(pair.refresh);

        info!("session established");
        Ok(())
    }

    /// Create an account. Unauthenticated; does not log in.
    pub async fn register(&self, registration: &Registration) -> Result<RegisteredUser> {
        let body = serde_json::to_value(registration)?;
        let response = self
            .transport
            .send(ApiRequest::post("/auth/register", body))
            .await?;
        if !response.is_success() {
            return Err(error_for_status(response.status, &response.body));
        }
        response.json()
    }

    /// Explicit logout. Clears both tokens and the community selection
    /// together and notifies subscribers.
    pub async fn logout(&self) {
        self.clear_session().await;
        info!("logged out");
    }

    /// Send an authenticated request.
    ///
    /// On 401 the call is retried exactly once after a refresh exchange;
    /// the retried call always observes the completed refresh outcome. A
    /// 401 on the retry itself is terminal.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let access = self.access.read().await.clone();
        let response = self
            .transport
            .send(request.clone().with_bearer(access.as_deref()))
            .await?;
        if response.status != 401 {
            return finish(response);
        }

        let fresh = self.refresh_access(access).await?;
        debug!(path = %request.path, "retrying with refreshed token");
        let response = self
            .transport
            .send(request.with_bearer(Some(&fresh)))
            .await?;
        if response.status == 401 {
            warn!("retried call still unauthorized, clearing session");
            self.clear_session().await;
            return Err(ApiError::AuthExpired);
        }
        finish(response)
    }

    /// `send` and decode the body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.json()
    }

    /// Single-flight refresh exchange.
    ///
    /// `stale` is the access token the failing call used. Callers that
    /// queued behind an in-flight refresh find the stored token already
    /// changed and reuse it instead of issuing a second exchange.
    async fn refresh_access(&self, stale: Option<String>) -> Result<String> {
        let _guard = self.refreshing.lock().await;

        if let Some(current) = self.access.read().await.clone() {
            if stale.as_deref() != Some(current.as_str()) {
                debug!("reusing refresh outcome from concurrent caller");
                return Ok(current);
            }
        }

        let Some(refresh) = self.refresh.read().await.clone() else {
            warn!("authorization failed with no refresh token, clearing session");
            self.clear_session().await;
            return Err(ApiError::AuthExpired);
        };

        debug!("exchanging refresh token");
        let request = ApiRequest::post(
            "/auth/token/refresh",
            serde_json::json!({ "refresh": refresh }),
        );
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            warn!(status = response.status, "refresh rejected, clearing session");
            self.clear_session().await;
            return Err(ApiError::AuthExpired);
        }

        let refreshed: RefreshedToken = response.json()?;
        self.store.set(ACCESS_KEY, &refreshed.access);
        *self.access.write().await = Some(refreshed.access.clone());
        info!("access token refreshed");
        Ok(refreshed.access)
    }

    async fn clear_session(&self) {
        *self.access.write().await = None;
        *self.refresh.write().await = None;
        self.store.clear();
        let _ = self.events.send(SessionEvent::LoggedOut);
    }
}

fn finish(response: ApiResponse) -> Result<ApiResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(error_for_status(response.status, &response.body))
    }
}
