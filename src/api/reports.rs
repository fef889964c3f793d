//! Abuse reports and their triage.
//!
//! A report has its own lifecycle, `{open, in_review, closed}`, freely
//! re-orderable by a manager; it tracks triage, not the target request.
//! Moderation actions against the target live in the requests client and
//! are reachable regardless of the report's own status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{Page, PageQuery};
use crate::identity::{permissions, Identity, Membership};
use crate::session::{ApiRequest, SessionManager};
use crate::types::{ApiError, Result};

use super::requests::HelpRequestStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Open,
    InReview,
    Closed,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Open => "open",
            ReportStatus::InReview => "in_review",
            ReportStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Payments,
    Advertising,
    ProhibitedContent,
    Harassment,
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Report {
    pub id: i64,
    pub reporter_user_id: i64,
    pub reporter_display_name: String,
    pub request_id: i64,
    pub request_title: String,
    /// Status of the target request, denormalized for the triage list.
    pub request_status: HelpRequestStatus,
    pub request_community_id: i64,
    pub request_community_name: String,
    pub reason: ReportReason,
    #[serde(default)]
    pub description: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub page: PageQuery,
}

pub struct ReportsApi {
    session: Arc<SessionManager>,
}

impl ReportsApi {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Triage list. Manager-gated before the call goes out.
    pub async fn list(
        &self,
        actor: &Identity,
        membership: Option<&Membership>,
        filter: &ReportFilter,
    ) -> Result<Page<Report>> {
        if !permissions::can_manage_reports(actor, membership) {
            return Err(ApiError::forbidden("report triage requires a manager role"));
        }
        let mut request = ApiRequest::get("/reports");
        if let Some(status) = filter.status {
            request = request.query("status", status.as_str());
        }
        self.session.send_json(filter.page.apply(request)).await
    }

    /// Move a report between open/in_review/closed. Any of the three is
    /// reachable from any other; there is no forced order. The server's
    /// response is the canonical snapshot (reports have no detail
    /// endpoint to re-fetch).
    pub async fn set_status(
        &self,
        actor: &Identity,
        membership: Option<&Membership>,
        report_id: i64,
        status: ReportStatus,
    ) -> Result<Report> {
        if !permissions::can_manage_reports(actor, membership) {
            return Err(ApiError::forbidden("report triage requires a manager role"));
        }
        let updated: Report = self
            .session
            .send_json(ApiRequest::post(
                format!("/reports/{report_id}/status"),
                serde_json::json!({ "status": status.as_str() }),
            ))
            .await?;
        info!(report_id, status = status.as_str(), "report status updated");
        Ok(updated)
    }
}
