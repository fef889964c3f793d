//! Own-profile read and edit. Email is immutable.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::session::{ApiRequest, SessionManager};
use crate::types::Result;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OwnProfile {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

pub struct ProfileApi {
    session: Arc<SessionManager>,
}

impl ProfileApi {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn get(&self) -> Result<OwnProfile> {
        self.session.send_json(ApiRequest::get("/profile")).await
    }

    /// Update display name and/or bio. Callers must re-resolve the
    /// identity afterwards; the facade handles that.
    pub async fn update(&self, changes: &ProfileUpdate) -> Result<OwnProfile> {
        let body = serde_json::to_value(changes)?;
        let profile: OwnProfile = self
            .session
            .send_json(ApiRequest::patch("/profile", body))
            .await?;
        info!(user_id = profile.id, "profile updated");
        Ok(profile)
    }
}
