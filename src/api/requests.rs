//! Help requests and volunteer offers.
//!
//! Lifecycle: `open -> in_progress -> {resolved, cancelled}`, with
//! `open -> cancelled` also allowed; `resolved` and `cancelled` are
//! terminal. Offers move `offered -> {accepted, rejected, withdrawn}` and
//! at most one offer per request is ever accepted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::{ListOrder, Page, PageQuery};
use crate::identity::{permissions, Identity, Membership};
use crate::session::{ApiRequest, SessionManager};
use crate::types::{ApiError, Result};

use super::reports::{Report, ReportReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpRequestStatus {
    Open,
    InProgress,
    Resolved,
    Cancelled,
}

impl HelpRequestStatus {
    /// No transition the client exposes leaves these states.
    pub fn is_terminal(self) -> bool {
        matches!(self, HelpRequestStatus::Resolved | HelpRequestStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HelpRequestStatus::Open => "open",
            HelpRequestStatus::InProgress => "in_progress",
            HelpRequestStatus::Resolved => "resolved",
            HelpRequestStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Offered,
    Accepted,
    Rejected,
    Withdrawn,
}

/// Close outcome chosen by the creator (or forced by moderation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseOutcome {
    Resolved,
    Cancelled,
}

impl CloseOutcome {
    fn as_str(self) -> &'static str {
        match self {
            CloseOutcome::Resolved => "resolved",
            CloseOutcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HelpRequest {
    pub id: i64,
    pub community_id: i64,
    pub created_by_user_id: i64,
    pub created_by_display_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub time_window_text: String,
    #[serde(default)]
    pub location_area_text: String,
    pub location_radius_km: Option<i32>,
    pub status: HelpRequestStatus,
    pub accepted_offer_id: Option<i64>,
    pub offers_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Offer {
    pub id: i64,
    pub request_id: i64,
    pub volunteer_user_id: i64,
    pub volunteer_display_name: String,
    #[serde(default)]
    pub message: String,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Detail view: the entity plus the server's own capability flags. The
/// client still recomputes its flags from the snapshot; these mirror what
/// the server would let through.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestDetail {
    pub request: HelpRequest,
    pub offers_count: u32,
    pub accepted_offer_id: Option<i64>,
    pub can_offer: bool,
    pub can_accept: bool,
    pub can_close: bool,
    pub can_moderate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewHelpRequest {
    pub community_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub time_window_text: String,
    pub location_area_text: String,
    pub location_radius_km: Option<i32>,
}

/// Creator-only edit, valid while the request is still open.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HelpRequestUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_window_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_area_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_radius_km: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<HelpRequestStatus>,
    pub category: Option<String>,
    /// Only the acting user's own requests.
    pub mine: bool,
    pub order: Option<ListOrder>,
    pub page: PageQuery,
}

/// Outcome of an offer acceptance: the authoritative post-transition
/// snapshot, re-fetched rather than assumed.
#[derive(Debug, Clone)]
pub struct AcceptOutcome {
    pub detail: RequestDetail,
    pub offers: Vec<Offer>,
}

pub struct RequestsApi {
    session: Arc<SessionManager>,
}

impl RequestsApi {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn list(
        &self,
        community_id: i64,
        filter: &RequestFilter,
    ) -> Result<Page<HelpRequest>> {
        let mut request =
            ApiRequest::get("/requests").query("community_id", community_id);
        if let Some(status) = filter.status {
            request = request.query("status", status.as_str());
        }
        if let Some(ref category) = filter.category {
            request = request.query("category", category);
        }
        if filter.mine {
            request = request.query("mine", 1);
        }
        if let Some(order) = filter.order {
            request = request.query("order", order.as_str());
        }
        self.session.send_json(filter.page.apply(request)).await
    }

    pub async fn detail(&self, request_id: i64) -> Result<RequestDetail> {
        self.session
            .send_json(ApiRequest::get(format!("/requests/{request_id}")))
            .await
    }

    pub async fn create(&self, new: &NewHelpRequest) -> Result<HelpRequest> {
        let body = serde_json::to_value(new)?;
        let created: HelpRequest = self
            .session
            .send_json(ApiRequest::post("/requests", body))
            .await?;
        info!(request_id = created.id, community_id = created.community_id, "request created");
        Ok(created)
    }

    /// Edit a request. Creator only, only while open.
    pub async fn update(
        &self,
        actor: &Identity,
        snapshot: &HelpRequest,
        changes: &HelpRequestUpdate,
    ) -> Result<HelpRequest> {
        if snapshot.created_by_user_id != actor.id
            || snapshot.status != HelpRequestStatus::Open
        {
            return Err(ApiError::forbidden("only the creator can edit an open request"));
        }
        let body = serde_json::to_value(changes)?;
        self.session
            .send_json(ApiRequest::patch(format!("/requests/{}", snapshot.id), body))
            .await
    }

    /// Offers of a request. Visible to the creator and to managers.
    pub async fn offers(&self, request_id: i64) -> Result<Vec<Offer>> {
        self.session
            .send_json(ApiRequest::get(format!("/requests/{request_id}/offers")))
            .await
    }

    /// Volunteer on someone else's open request.
    pub async fn submit_offer(
        &self,
        actor: &Identity,
        snapshot: &HelpRequest,
        message: &str,
    ) -> Result<Offer> {
        if !permissions::can_offer_on_request(actor, snapshot) {
            return Err(ApiError::forbidden("cannot volunteer on this request"));
        }
        let offer: Offer = self
            .session
            .send_json(ApiRequest::post(
                format!("/requests/{}/offers", snapshot.id),
                serde_json::json!({ "message": message }),
            ))
            .await?;
        info!(request_id = snapshot.id, offer_id = offer.id, "offer submitted");
        Ok(offer)
    }

    /// Accept one offer. Moves the request to in_progress server-side;
    /// sibling offers are whatever the server decided, so the detail and
    /// the offer list are re-fetched and returned as the new truth.
    pub async fn accept_offer(
        &self,
        actor: &Identity,
        snapshot: &HelpRequest,
        offer_id: i64,
    ) -> Result<AcceptOutcome> {
        if !permissions::can_accept_offer(actor, snapshot) {
            return Err(ApiError::forbidden("only the creator can accept an offer"));
        }
        self.session
            .send(ApiRequest::post_empty(format!(
                "/requests/{}/accept-offer/{offer_id}",
                snapshot.id
            )))
            .await?;
        info!(request_id = snapshot.id, offer_id, "offer accepted");

        let detail = self.detail(snapshot.id).await?;
        let offers = self.offers(snapshot.id).await?;
        Ok(AcceptOutcome { detail, offers })
    }

    /// Close as resolved or cancelled. Creator only, terminal.
    pub async fn close(
        &self,
        actor: &Identity,
        snapshot: &HelpRequest,
        outcome: CloseOutcome,
    ) -> Result<RequestDetail> {
        if !permissions::can_close_request(actor, snapshot) {
            return Err(ApiError::forbidden("only the creator can close this request"));
        }
        self.session
            .send(ApiRequest::post(
                format!("/requests/{}/close", snapshot.id),
                serde_json::json!({ "status": outcome.as_str() }),
            ))
            .await?;
        info!(request_id = snapshot.id, outcome = outcome.as_str(), "request closed");
        self.detail(snapshot.id).await
    }

    /// Report a request. Always available regardless of the request's own
    /// status; creates a Report, not a transition on the request.
    pub async fn report(
        &self,
        request_id: i64,
        reason: ReportReason,
        description: &str,
    ) -> Result<Report> {
        let report: Report = self
            .session
            .send_json(ApiRequest::post(
                format!("/requests/{request_id}/reports"),
                serde_json::json!({ "reason": reason, "description": description }),
            ))
            .await?;
        info!(request_id, report_id = report.id, "request reported");
        Ok(report)
    }

    /// Moderation: force the request to cancelled, bypassing creator
    /// consent. Valid from open or in_progress.
    pub async fn moderation_close(
        &self,
        actor: &Identity,
        membership: Option<&Membership>,
        snapshot: &HelpRequest,
    ) -> Result<RequestDetail> {
        if !permissions::can_moderate_request(actor, membership, snapshot) {
            return Err(ApiError::forbidden("moderation not allowed here"));
        }
        if snapshot.status.is_terminal() {
            return Err(ApiError::forbidden("request is already closed"));
        }
        self.session
            .send(ApiRequest::post(
                format!("/moderation/requests/{}/close", snapshot.id),
                serde_json::json!({ "status": CloseOutcome::Cancelled.as_str() }),
            ))
            .await?;
        info!(request_id = snapshot.id, actor_id = actor.id, "request closed by moderation");
        self.detail(snapshot.id).await
    }

    /// Moderation: delete the request entirely. Irreversible.
    pub async fn moderation_delete(
        &self,
        actor: &Identity,
        membership: Option<&Membership>,
        snapshot: &HelpRequest,
    ) -> Result<()> {
        if !permissions::can_moderate_request(actor, membership, snapshot) {
            return Err(ApiError::forbidden("moderation not allowed here"));
        }
        self.session
            .send(ApiRequest::delete(format!(
                "/moderation/requests/{}",
                snapshot.id
            )))
            .await?;
        info!(request_id = snapshot.id, actor_id = actor.id, "request deleted by moderation");
        debug!(request_id = snapshot.id, "entity gone, callers must drop their snapshot");
        Ok(())
    }
}
