//! Error taxonomy shared by every component of the client.
//!
//! The Session Manager is the only layer that ever recovers from an error
//! (a single refresh-and-retry on an authorization failure). Everything
//! else surfaces a typed failure to the caller.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The refresh token is missing, invalid or expired. Tokens have been
    /// cleared and a logout signal emitted before this is returned.
    #[error("Session expired, login required")]
    AuthExpired,

    /// A capability check failed, either client-side or on the server.
    /// Callers should re-sync permissions from a fresh snapshot.
    #[error("Forbidden: {detail}")]
    Forbidden { detail: String },

    /// The entity disappeared or changed under us. Surface a re-fetch.
    #[error("Not found: {detail}")]
    NotFound { detail: String },

    #[error("Conflict: {detail}")]
    Conflict { detail: String },

    /// Field-level validation failure (HTTP 400). Recoverable by the user.
    #[error("Validation failed: {summary}")]
    Validation {
        summary: String,
        fields: BTreeMap<String, Vec<String>>,
    },

    /// Transport failure. Retryable by explicit user action, never
    /// automatically.
    #[error("Network error: {0}")]
    Network(String),

    /// The response body did not match the expected shape.
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected status {status}: {detail}")]
    Unexpected { status: u16, detail: String },
}

impl ApiError {
    /// Forbidden error raised by a client-side capability check, before
    /// any request is issued to the network.
    pub fn forbidden(detail: impl Into<String>) -> Self {
        ApiError::Forbidden {
            detail: detail.into(),
        }
    }
}

/// Standard `{"detail": "..."}` error body used by the backend.
#[derive(Debug, Deserialize)]
struct DetailBody {
    detail: String,
}

/// Map a non-success response to the error taxonomy.
///
/// 401 never reaches this function for authenticated calls; the Session
/// Manager intercepts it for the refresh path. A 401 seen here means bad
/// credentials on login, which is a plain `Forbidden`.
pub(crate) fn error_for_status(status: u16, body: &[u8]) -> ApiError {
    let detail = || -> String {
        if let Ok(parsed) = serde_json::from_slice::<DetailBody>(body) {
            return parsed.detail;
        }
        String::from_utf8_lossy(body).trim().to_string()
    };

    match status {
        400 => {
            // DRF validation errors arrive as {"field": ["msg", ...]}.
            if let Ok(fields) =
                serde_json::from_slice::<BTreeMap<String, Vec<String>>>(body)
            {
                let summary = fields
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
                return ApiError::Validation { summary, fields };
            }
            ApiError::Validation {
                summary: detail(),
                fields: BTreeMap::new(),
            }
        }
        401 | 403 => ApiError::Forbidden { detail: detail() },
        404 => ApiError::NotFound { detail: detail() },
        409 => ApiError::Conflict { detail: detail() },
        status => ApiError::Unexpected {
            status,
            detail: detail(),
        },
    }
}
