//! Community directory, membership, and member administration.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{Page, PageQuery};
use crate::identity::{permissions, CommunityRole, Identity, Membership, MembershipStatus};
use crate::session::{ApiRequest, SessionManager};
use crate::types::{ApiError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Community {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One row of the member roster.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommunityMember {
    pub user_id: i64,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    pub status: MembershipStatus,
    pub role_in_community: CommunityRole,
    pub joined_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Moderator edit of a member: any subset of these fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemberUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MembershipStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_in_community: Option<CommunityRole>,
}

/// Membership created (or found) by a join call.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinedCommunity {
    pub community_id: i64,
    pub status: MembershipStatus,
}

pub struct CommunitiesApi {
    session: Arc<SessionManager>,
}

impl CommunitiesApi {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Public directory of communities.
    pub async fn list(&self) -> Result<Vec<Community>> {
        self.session.send_json(ApiRequest::get("/communities")).await
    }

    /// Join a community. Idempotent server-side.
    pub async fn join(&self, community_id: i64) -> Result<JoinedCommunity> {
        let joined: JoinedCommunity = self
            .session
            .send_json(ApiRequest::post_empty(format!(
                "/communities/{community_id}/join"
            )))
            .await?;
        info!(community_id, status = ?joined.status, "joined community");
        Ok(joined)
    }

    /// Member roster. Manager-gated before the call goes out.
    pub async fn members(
        &self,
        actor: &Identity,
        membership: Option<&Membership>,
        community_id: i64,
        page: PageQuery,
    ) -> Result<Page<CommunityMember>> {
        if !permissions::can_manage_community(actor, membership) {
            return Err(ApiError::forbidden("member roster requires a manager role"));
        }
        let request = ApiRequest::get(format!("/communities/{community_id}/members"));
        self.session.send_json(page.apply(request)).await
    }

    /// Edit a member's profile fields, approval status, or role.
    ///
    /// Callers editing the acting user's own membership must reload the
    /// identity afterwards; the facade handles that.
    pub async fn update_member(
        &self,
        actor: &Identity,
        membership: Option<&Membership>,
        community_id: i64,
        user_id: i64,
        changes: &MemberUpdate,
    ) -> Result<CommunityMember> {
        if !permissions::can_manage_community(actor, membership) {
            return Err(ApiError::forbidden("member edits require a manager role"));
        }
        let body = serde_json::to_value(changes)?;
        let updated: CommunityMember = self
            .session
            .send_json(ApiRequest::patch(
                format!("/communities/{community_id}/members/{user_id}"),
                body,
            ))
            .await?;
        info!(community_id, user_id, actor_id = actor.id, "member updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_update_serializes_only_set_fields() {
        let update = MemberUpdate {
            status: Some(MembershipStatus::Expelled),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "status": "expelled" })
        );

        let update = MemberUpdate {
            role_in_community: Some(CommunityRole::Moderator),
            bio: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "bio": "", "role_in_community": "moderator" })
        );
    }

    #[test]
    fn roster_row_decodes() {
        let member: CommunityMember = serde_json::from_str(
            r#"{
                "user_id": 11,
                "email": "jon@example.com",
                "display_name": "Jon",
                "bio": "",
                "status": "pending",
                "role_in_community": "member",
                "joined_at": null,
                "updated_at": "2025-05-01T10:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(member.status, MembershipStatus::Pending);
        assert!(member.joined_at.is_none());
    }
}
