//! Per-request chat between the creator and the accepted volunteer.
//!
//! A conversation exists once an offer is accepted. Delivery is polling
//! only; callers re-fetch the message page when they want news.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::api::{Page, PageQuery};
use crate::session::{ApiRequest, SessionManager};
use crate::types::Result;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Conversation {
    pub conversation_id: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_user_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

pub struct ChatApi {
    session: Arc<SessionManager>,
}

impl ChatApi {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// The conversation of a request. Participants only; 400 while no
    /// volunteer has been accepted yet.
    pub async fn conversation(&self, request_id: i64) -> Result<Conversation> {
        self.session
            .send_json(ApiRequest::get(format!(
                "/requests/{request_id}/conversation"
            )))
            .await
    }

    /// Messages, newest first.
    pub async fn messages(
        &self,
        conversation_id: i64,
        page: PageQuery,
    ) -> Result<Page<Message>> {
        let request = ApiRequest::get(format!("/conversations/{conversation_id}/messages"));
        self.session.send_json(page.apply(request)).await
    }

    pub async fn send_message(&self, conversation_id: i64, body: &str) -> Result<Message> {
        let message: Message = self
            .session
            .send_json(ApiRequest::post(
                format!("/conversations/{conversation_id}/messages"),
                serde_json::json!({ "body": body }),
            ))
            .await?;
        debug!(conversation_id, message_id = message.id, "message sent");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_and_message_decode() {
        let conversation: Conversation =
            serde_json::from_str(r#"{"conversation_id": 9}"#).unwrap();
        assert_eq!(conversation.conversation_id, 9);

        let message: Message = serde_json::from_str(
            r#"{
                "id": 1,
                "conversation_id": 9,
                "sender_user_id": 10,
                "body": "See you at ten",
                "created_at": "2025-05-01T10:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(message.sender_user_id, 10);
    }
}
