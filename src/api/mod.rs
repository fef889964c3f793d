//! REST resource clients.
//!
//! Every mutating call checks the Permission Evaluator before touching the
//! network and re-fetches the canonical snapshot afterwards; the client
//! never trusts an optimistic local transition. Whether the server
//! auto-rejects sibling offers or loan requests on acceptance is its own
//! business; the re-fetch is what the caller displays.

pub mod chat;
pub mod communities;
pub mod loans;
pub mod profile;
pub mod reports;
pub mod requests;

use serde::Deserialize;

use crate::session::ApiRequest;

/// Pagination envelope used by every list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub(crate) fn apply(self, mut request: ApiRequest) -> ApiRequest {
        if let Some(page) = self.page {
            request = request.query("page", page);
        }
        if let Some(page_size) = self.page_size {
            request = request.query("page_size", page_size);
        }
        request
    }
}

/// List ordering accepted by the requests and loans endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    Latest,
    Oldest,
}

impl ListOrder {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ListOrder::Latest => "latest",
            ListOrder::Oldest => "oldest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_envelope_decodes() {
        let page: Page<i64> = serde_json::from_str(
            r#"{"count": 3, "next": "/requests?page=2", "previous": null, "results": [1, 2]}"#,
        )
        .unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.results, vec![1, 2]);
        assert!(page.previous.is_none());
    }

    #[test]
    fn page_query_applies_only_set_fields() {
        let query = PageQuery {
            page: Some(2),
            page_size: None,
        };
        let request = query.apply(ApiRequest::get("/requests"));
        assert_eq!(request.query, vec![("page".to_string(), "2".to_string())]);
    }
}
