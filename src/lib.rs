//! Auzolan client core.
//!
//! Client library for the Auzolan community help-exchange API: members
//! post help requests, volunteer on others', lend and borrow items, chat
//! once matched, and moderators triage abuse reports.
//!
//! ## Components
//!
//! - **Session**: token pair, bearer attach, single-flight refresh with a
//!   logout broadcast on unrecoverable failure
//! - **Identity**: `/me` fetch, approved-community resolution, explicit
//!   community switch
//! - **Permissions**: pure capability checks over explicit snapshots
//! - **Api**: lifecycle clients for requests, loans, reports, communities,
//!   profile, and chat, all of which gate mutations client-side and
//!   re-fetch the canonical snapshot afterwards

pub mod api;
pub mod client;
pub mod config;
pub mod identity;
pub mod session;
pub mod types;

pub use client::AuzolanClient;
pub use config::Args;
pub use types::{ApiError, Result};
