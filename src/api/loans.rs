//! Lendable items and loan requests.
//!
//! Lifecycle: `available <-> loaned`. An item is loaned exactly while one
//! of its loan requests is accepted and a borrower is set; marking it
//! returned clears the borrower and makes it available again. Loan
//! requests move `pending -> {accepted, rejected, withdrawn}`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{ListOrder, Page, PageQuery};
use crate::identity::{permissions, Identity};
use crate::session::{ApiRequest, SessionManager};
use crate::types::{ApiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanItemStatus {
    Available,
    Loaned,
}

impl LoanItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LoanItemStatus::Available => "available",
            LoanItemStatus::Loaned => "loaned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanRequestStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoanItem {
    pub id: i64,
    pub community_id: i64,
    pub owner_user_id: i64,
    pub owner_display_name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: LoanItemStatus,
    /// Set exactly while the item is loaned.
    pub borrower_user_id: Option<i64>,
    pub borrower_display_name: Option<String>,
    pub loaned_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub pending_requests_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoanRequest {
    pub id: i64,
    pub item_id: i64,
    pub requester_user_id: i64,
    pub requester_display_name: String,
    #[serde(default)]
    pub message: String,
    pub status: LoanRequestStatus,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Detail view with the server's capability flags alongside the snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct LoanDetail {
    pub item: LoanItem,
    pub can_request: bool,
    pub can_manage_item: bool,
    pub can_manage_requests: bool,
    pub can_mark_returned: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewLoanItem {
    pub community_id: i64,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoanItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    pub status: Option<LoanItemStatus>,
    /// Only items the acting user owns.
    pub mine: bool,
    pub order: Option<ListOrder>,
    pub page: PageQuery,
}

pub struct LoansApi {
    session: Arc<SessionManager>,
}

impl LoansApi {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn list(&self, community_id: i64, filter: &LoanFilter) -> Result<Page<LoanItem>> {
        let mut request = ApiRequest::get("/loans").query("community_id", community_id);
        if let Some(status) = filter.status {
            request = request.query("status", status.as_str());
        }
        if filter.mine {
            request = request.query("mine", 1);
        }
        if let Some(order) = filter.order {
            request = request.query("order", order.as_str());
        }
        self.session.send_json(filter.page.apply(request)).await
    }

    pub async fn detail(&self, item_id: i64) -> Result<LoanDetail> {
        self.session
            .send_json(ApiRequest::get(format!("/loans/{item_id}")))
            .await
    }

    pub async fn create(&self, new: &NewLoanItem) -> Result<LoanItem> {
        let body = serde_json::to_value(new)?;
        let item: LoanItem = self
            .session
            .send_json(ApiRequest::post("/loans", body))
            .await?;
        info!(item_id = item.id, community_id = item.community_id, "loan item created");
        Ok(item)
    }

    /// Edit title/description. Owner only.
    pub async fn update(
        &self,
        actor: &Identity,
        snapshot: &LoanItem,
        changes: &LoanItemUpdate,
    ) -> Result<LoanItem> {
        if !permissions::can_manage_loan_item(actor, snapshot) {
            return Err(ApiError::forbidden("only the owner can edit this item"));
        }
        let body = serde_json::to_value(changes)?;
        self.session
            .send_json(ApiRequest::patch(format!("/loans/{}", snapshot.id), body))
            .await
    }

    /// Loan requests for an item. Owner only.
    pub async fn requests(
        &self,
        item_id: i64,
        page: PageQuery,
    ) -> Result<Page<LoanRequest>> {
        let request = ApiRequest::get(format!("/loans/{item_id}/requests"));
        self.session.send_json(page.apply(request)).await
    }

    /// Ask to borrow an available item owned by someone else.
    pub async fn submit_request(
        &self,
        actor: &Identity,
        snapshot: &LoanItem,
        message: &str,
    ) -> Result<LoanRequest> {
        if !permissions::can_request_loan(actor, snapshot) {
            return Err(ApiError::forbidden("cannot request this item"));
        }
        let loan_request: LoanRequest = self
            .session
            .send_json(ApiRequest::post(
                format!("/loans/{}/requests", snapshot.id),
                serde_json::json!({ "message": message }),
            ))
            .await?;
        info!(item_id = snapshot.id, loan_request_id = loan_request.id, "loan requested");
        Ok(loan_request)
    }

    /// Accept a pending loan request: the item becomes loaned and the
    /// requester its borrower. Sibling requests are the server's call; the
    /// returned detail is the re-fetched truth.
    pub async fn accept_request(
        &self,
        actor: &Identity,
        snapshot: &LoanItem,
        loan_request_id: i64,
    ) -> Result<LoanDetail> {
        if !permissions::can_manage_loan_item(actor, snapshot) {
            return Err(ApiError::forbidden("only the owner can accept loan requests"));
        }
        if snapshot.status != LoanItemStatus::Available {
            return Err(ApiError::forbidden("item is not available"));
        }
        self.session
            .send(ApiRequest::post_empty(format!(
                "/loans/{}/requests/{loan_request_id}/accept",
                snapshot.id
            )))
            .await?;
        info!(item_id = snapshot.id, loan_request_id, "loan request accepted");
        self.detail(snapshot.id).await
    }

    /// Reject a pending loan request. Item status is untouched.
    pub async fn reject_request(
        &self,
        actor: &Identity,
        snapshot: &LoanItem,
        loan_request_id: i64,
    ) -> Result<LoanRequest> {
        if !permissions::can_manage_loan_item(actor, snapshot) {
            return Err(ApiError::forbidden("only the owner can reject loan requests"));
        }
        let rejected: LoanRequest = self
            .session
            .send_json(ApiRequest::post_empty(format!(
                "/loans/{}/requests/{loan_request_id}/reject",
                snapshot.id
            )))
            .await?;
        info!(item_id = snapshot.id, loan_request_id, "loan request rejected");
        Ok(rejected)
    }

    /// Mark a loaned item as returned: clears the borrower and makes it
    /// available again.
    pub async fn mark_returned(
        &self,
        actor: &Identity,
        snapshot: &LoanItem,
    ) -> Result<LoanDetail> {
        if !permissions::can_mark_returned(actor, snapshot) {
            return Err(ApiError::forbidden("item is not loaned or not yours"));
        }
        self.session
            .send(ApiRequest::post_empty(format!(
                "/loans/{}/mark-returned",
                snapshot.id
            )))
            .await?;
        info!(item_id = snapshot.id, "loan item returned");
        self.detail(snapshot.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_decodes_with_borrower() {
        let item: LoanItem = serde_json::from_str(
            r#"{
                "id": 7,
                "community_id": 1,
                "owner_user_id": 10,
                "owner_display_name": "Ane",
                "title": "Ladder",
                "description": "3m",
                "status": "loaned",
                "borrower_user_id": 11,
                "borrower_display_name": "Jon",
                "loaned_at": "2025-05-01T10:00:00Z",
                "returned_at": null,
                "pending_requests_count": 0,
                "created_at": "2025-04-01T10:00:00Z",
                "updated_at": "2025-05-01T10:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(item.status, LoanItemStatus::Loaned);
        assert_eq!(item.borrower_user_id, Some(11));
    }

    #[test]
    fn unknown_loan_status_is_rejected() {
        assert!(serde_json::from_str::<LoanItemStatus>(r#""reserved""#).is_err());
        assert!(serde_json::from_str::<LoanRequestStatus>(r#""expired""#).is_err());
    }

    #[test]
    fn item_update_serializes_sparsely() {
        let update = LoanItemUpdate {
            description: Some("with charger".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "description": "with charger" })
        );
    }
}
