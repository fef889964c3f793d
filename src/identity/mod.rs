//! Identity and community resolution.
//!
//! Fetches `/me`, resolves which approved community is "current" from the
//! persisted preference, and exposes an explicit community switch. Role
//! and status fields are closed enums; an unknown value fails the decode
//! instead of leaking into capability checks.

pub mod permissions;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::session::{ApiRequest, SessionEvent, SessionManager, StateStore, COMMUNITY_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Approved,
    Rejected,
    Expelled,
}

/// Role inside one community. `/me` synthesizes a `superadmin` role for
/// superadmins in every community, so the wire set has three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityRole {
    Member,
    Moderator,
    Superadmin,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Membership {
    pub community_id: i64,
    pub community_name: String,
    pub status: MembershipStatus,
    pub role_in_community: CommunityRole,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub is_superadmin: bool,
    /// Memberships in community-id order, as served by the backend.
    pub communities: Vec<Membership>,
}

impl Identity {
    pub fn approved_memberships(&self) -> impl Iterator<Item = &Membership> {
        self.communities
            .iter()
            .filter(|m| m.status == MembershipStatus::Approved)
    }

    pub fn membership(&self, community_id: i64) -> Option<&Membership> {
        self.communities
            .iter()
            .find(|m| m.community_id == community_id)
    }
}

/// Resolver for the current identity and community context.
pub struct IdentityService {
    session: Arc<SessionManager>,
    store: Arc<dyn StateStore>,
    identity: RwLock<Option<Identity>>,
    current: RwLock<Option<i64>>,
}

impl IdentityService {
    pub fn new(session: Arc<SessionManager>, store: Arc<dyn StateStore>) -> Self {
        Self {
            session,
            store,
            identity: RwLock::new(None),
            current: RwLock::new(None),
        }
    }

    /// Fetch `/me` and resolve the current community.
    ///
    /// Unauthenticated and failed-fetch converge to `None`; callers never
    /// branch on the difference.
    pub async fn load_identity(&self) -> Option<Identity> {
        match self.session.send_json::<Identity>(ApiRequest::get("/me")).await {
            Ok(identity) => {
                debug!(
                    user_id = identity.id,
                    memberships = identity.communities.len(),
                    "identity loaded"
                );
                let resolved = self.resolve_current_community(&identity);
                *self.current.write().await = resolved;
                *self.identity.write().await = Some(identity.clone());
                Some(identity)
            }
            Err(e) => {
                debug!(error = %e, "identity unavailable");
                *self.identity.write().await = None;
                *self.current.write().await = None;
                None
            }
        }
    }

    /// Pick the current community: the persisted preference when it still
    /// names an approved membership, else the first approved membership in
    /// list order, else none. The outcome is written back to the store.
    pub fn resolve_current_community(&self, identity: &Identity) -> Option<i64> {
        let approved: Vec<&Membership> = identity.approved_memberships().collect();
        if approved.is_empty() {
            self.store.remove(COMMUNITY_KEY);
            return None;
        }

        let persisted = self
            .store
            .get(COMMUNITY_KEY)
            .and_then(|value| value.parse::<i64>().ok());
        let resolved = persisted
            .filter(|id| approved.iter().any(|m| m.community_id == *id))
            .unwrap_or(approved[0].community_id);

        self.store.set(COMMUNITY_KEY, &resolved.to_string());
        Some(resolved)
    }

    /// Switch to another community. A target that is not an approved
    /// membership of the current identity is silently ignored; stale UI
    /// can race a membership change.
    pub async fn switch_community(&self, community_id: i64) {
        let guard = self.identity.read().await;
        let Some(identity) = guard.as_ref() else {
            return;
        };
        if !identity
            .approved_memberships()
            .any(|m| m.community_id == community_id)
        {
            warn!(community_id, "ignoring switch to non-approved community");
            return;
        }
        drop(guard);

        self.store.set(COMMUNITY_KEY, &community_id.to_string());
        *self.current.write().await = Some(community_id);
        info!(community_id, "switched community");
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.identity.read().await.clone()
    }

    pub async fn current_community_id(&self) -> Option<i64> {
        *self.current.read().await
    }

    /// The membership backing the current community selection.
    pub async fn current_membership(&self) -> Option<Membership> {
        let current = (*self.current.read().await)?;
        self.identity
            .read()
            .await
            .as_ref()
            .and_then(|identity| identity.membership(current))
            .cloned()
    }

    pub async fn clear(&self) {
        *self.identity.write().await = None;
        *self.current.write().await = None;
    }

    /// Drop identity state whenever the session logs out, forced or not.
    pub fn spawn_logout_listener(self: &Arc<Self>) {
        let service = Arc::clone(self);
        let mut events = service.session.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if event == SessionEvent::LoggedOut {
                    service.clear().await;
                    debug!("identity cleared after logout");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryStore;

    fn membership(community_id: i64, status: MembershipStatus) -> Membership {
        Membership {
            community_id,
            community_name: format!("Community {community_id}"),
            status,
            role_in_community: CommunityRole::Member,
        }
    }

    fn identity(communities: Vec<Membership>) -> Identity {
        Identity {
            id: 10,
            email: "ane@example.com".to_string(),
            display_name: "Ane".to_string(),
            is_superadmin: false,
            communities,
        }
    }

    fn service_with_store(store: Arc<MemoryStore>) -> IdentityService {
        // The session never sends in these tests; resolution is local.
        struct NoTransport;

        #[async_trait::async_trait]
        impl crate::session::Transport for NoTransport {
            async fn send(
                &self,
                _request: ApiRequest,
            ) -> crate::types::Result<crate::session::ApiResponse> {
                Err(crate::types::ApiError::Network("offline".to_string()))
            }
        }

        let session = Arc::new(SessionManager::new(
            Arc::new(NoTransport),
            Arc::clone(&store) as Arc<dyn StateStore>,
        ));
        IdentityService::new(session, store)
    }

    #[test]
    fn unknown_role_fails_decode() {
        let err = serde_json::from_str::<Membership>(
            r#"{"community_id": 1, "community_name": "x", "status": "approved", "role_in_community": "owner"}"#,
        );
        assert!(err.is_err());

        let ok = serde_json::from_str::<Membership>(
            r#"{"community_id": 1, "community_name": "x", "status": "approved", "role_in_community": "superadmin"}"#,
        )
        .unwrap();
        assert_eq!(ok.role_in_community, CommunityRole::Superadmin);
    }

    #[test]
    fn first_approved_wins_without_preference() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with_store(Arc::clone(&store));
        let identity = identity(vec![
            membership(1, MembershipStatus::Approved),
            membership(2, MembershipStatus::Pending),
        ]);

        assert_eq!(service.resolve_current_community(&identity), Some(1));
        assert_eq!(store.get(COMMUNITY_KEY).as_deref(), Some("1"));
    }

    #[test]
    fn valid_preference_is_kept() {
        let store = Arc::new(MemoryStore::new());
        store.set(COMMUNITY_KEY, "2");
        let service = service_with_store(Arc::clone(&store));
        let identity = identity(vec![
            membership(1, MembershipStatus::Approved),
            membership(2, MembershipStatus::Approved),
        ]);

        assert_eq!(service.resolve_current_community(&identity), Some(2));
    }

    #[test]
    fn preference_for_unapproved_community_falls_back() {
        let store = Arc::new(MemoryStore::new());
        store.set(COMMUNITY_KEY, "2");
        let service = service_with_store(Arc::clone(&store));
        let identity = identity(vec![
            membership(1, MembershipStatus::Approved),
            membership(2, MembershipStatus::Expelled),
        ]);

        assert_eq!(service.resolve_current_community(&identity), Some(1));
        assert_eq!(store.get(COMMUNITY_KEY).as_deref(), Some("1"));
    }

    #[test]
    fn no_approved_membership_clears_preference() {
        let store = Arc::new(MemoryStore::new());
        store.set(COMMUNITY_KEY, "1");
        let service = service_with_store(Arc::clone(&store));
        let identity = identity(vec![
            membership(1, MembershipStatus::Pending),
            membership(2, MembershipStatus::Rejected),
        ]);

        assert_eq!(service.resolve_current_community(&identity), None);
        assert_eq!(store.get(COMMUNITY_KEY), None);
    }

    #[tokio::test]
    async fn switch_to_unapproved_community_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with_store(Arc::clone(&store));
        let identity = identity(vec![
            membership(1, MembershipStatus::Approved),
            membership(2, MembershipStatus::Pending),
        ]);
        *service.identity.write().await = Some(identity);
        *service.current.write().await = Some(1);
        store.set(COMMUNITY_KEY, "1");

        service.switch_community(2).await;
        assert_eq!(service.current_community_id().await, Some(1));
        assert_eq!(store.get(COMMUNITY_KEY).as_deref(), Some("1"));

        service.switch_community(5).await;
        assert_eq!(service.current_community_id().await, Some(1));
    }

    #[tokio::test]
    async fn switch_to_approved_community_persists() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with_store(Arc::clone(&store));
        let identity = identity(vec![
            membership(1, MembershipStatus::Approved),
            membership(2, MembershipStatus::Approved),
        ]);
        *service.identity.write().await = Some(identity);
        *service.current.write().await = Some(1);

        service.switch_community(2).await;
        assert_eq!(service.current_community_id().await, Some(2));
        assert_eq!(store.get(COMMUNITY_KEY).as_deref(), Some("2"));
        assert_eq!(
            service.current_membership().await.map(|m| m.community_id),
            Some(2)
        );
    }

    #[tokio::test]
    async fn failed_fetch_converges_to_no_identity() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with_store(store);

        assert_eq!(service.load_identity().await, None);
        assert_eq!(service.identity().await, None);
        assert_eq!(service.current_community_id().await, None);
    }
}
