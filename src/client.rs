//! Top-level client facade.
//!
//! Wires the Session Manager, the identity resolver, and the resource
//! clients together with explicit dependency passing, and owns the
//! re-resolution rules: identity is reloaded after login and after any
//! mutation that can change the acting user's own membership or profile.

use std::sync::Arc;

use crate::api::chat::ChatApi;
use crate::api::communities::{CommunitiesApi, CommunityMember, MemberUpdate};
use crate::api::loans::LoansApi;
use crate::api::profile::{OwnProfile, ProfileApi, ProfileUpdate};
use crate::api::reports::ReportsApi;
use crate::api::requests::RequestsApi;
use crate::identity::{Identity, IdentityService, Membership};
use crate::session::{SessionManager, StateStore, Transport};
use crate::types::Result;

pub struct AuzolanClient {
    pub session: Arc<SessionManager>,
    pub identity: Arc<IdentityService>,
    pub requests: RequestsApi,
    pub loans: LoansApi,
    pub reports: ReportsApi,
    pub communities: CommunitiesApi,
    pub profile: ProfileApi,
    pub chat: ChatApi,
}

impl AuzolanClient {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn StateStore>) -> Self {
        let session = Arc::new(SessionManager::new(transport, Arc::clone(&store)));
        let identity = Arc::new(IdentityService::new(Arc::clone(&session), store));
        identity.spawn_logout_listener();

        Self {
            requests: RequestsApi::new(Arc::clone(&session)),
            loans: LoansApi::new(Arc::clone(&session)),
            reports: ReportsApi::new(Arc::clone(&session)),
            communities: CommunitiesApi::new(Arc::clone(&session)),
            profile: ProfileApi::new(Arc::clone(&session)),
            chat: ChatApi::new(Arc::clone(&session)),
            session,
            identity,
        }
    }

    /// Log in and resolve identity and current community.
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<Identity>> {
        self.session.login(email, password).await?;
        Ok(self.identity.load_identity().await)
    }

    /// Explicit logout. The logout listener clears identity state too,
    /// but doing it here keeps the caller's next read deterministic.
    pub async fn logout(&self) {
        self.session.logout().await;
        self.identity.clear().await;
    }

    /// Re-fetch `/me` and re-resolve the community selection.
    pub async fn refresh_identity(&self) -> Option<Identity> {
        self.identity.load_identity().await
    }

    /// Edit the own profile, then re-resolve identity so the display name
    /// everywhere matches the round-trip.
    pub async fn update_own_profile(&self, changes: &ProfileUpdate) -> Result<OwnProfile> {
        let profile = self.profile.update(changes).await?;
        self.refresh_identity().await;
        Ok(profile)
    }

    /// Member edit with the edit-self rule: when a manager touches their
    /// own membership (role or status), the identity is stale and gets
    /// re-resolved before anything else reads it.
    pub async fn update_member(
        &self,
        actor: &Identity,
        membership: Option<&Membership>,
        community_id: i64,
        user_id: i64,
        changes: &MemberUpdate,
    ) -> Result<CommunityMember> {
        let updated = self
            .communities
            .update_member(actor, membership, community_id, user_id, changes)
            .await?;
        if user_id == actor.id {
            self.refresh_identity().await;
        }
        Ok(updated)
    }
}
