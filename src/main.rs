//! Auzolan - community help-exchange CLI
//!
//! Thin command-line front end over the client library, mainly useful for
//! poking a backend by hand: login, identity, requests, loans, reports.

use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auzolan_client::api::loans::LoanFilter;
use auzolan_client::api::reports::{ReportFilter, ReportStatus};
use auzolan_client::api::requests::{HelpRequestStatus, RequestFilter};
use auzolan_client::config::{Args, Command};
use auzolan_client::session::{FileStore, HttpTransport};
use auzolan_client::AuzolanClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("auzolan_client={log_level},warn").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let transport = Arc::new(HttpTransport::new(&args.api_url, args.request_timeout_ms)?);
    let store = Arc::new(FileStore::open(&args.state_file));
    let client = AuzolanClient::new(transport, store);

    match args.command {
        Command::Login { email, password } => {
            let identity = client.login(&email, &password).await?;
            match identity {
                Some(identity) => {
                    println!("Logged in as {} (#{})", identity.display_name, identity.id);
                    match client.identity.current_community_id().await {
                        Some(id) => println!("Current community: {id}"),
                        None => println!("No approved community membership"),
                    }
                }
                None => println!("Logged in, but the identity could not be loaded"),
            }
        }

        Command::Logout => {
            client.logout().await;
            println!("Logged out");
        }

        Command::Me => {
            let Some(identity) = client.refresh_identity().await else {
                println!("Not logged in");
                return Ok(());
            };
            println!(
                "{} <{}>{}",
                identity.display_name,
                identity.email,
                if identity.is_superadmin { " [superadmin]" } else { "" }
            );
            let current = client.identity.current_community_id().await;
            for membership in &identity.communities {
                let marker = if current == Some(membership.community_id) { "*" } else { " " };
                println!(
                    " {marker} #{} {} ({:?}, {:?})",
                    membership.community_id,
                    membership.community_name,
                    membership.status,
                    membership.role_in_community,
                );
            }
        }

        Command::Communities { switch, join } => {
            if let Some(community_id) = join {
                let joined = client.communities.join(community_id).await?;
                println!("Joined community {} ({:?})", joined.community_id, joined.status);
                client.refresh_identity().await;
                return Ok(());
            }
            if let Some(community_id) = switch {
                client.refresh_identity().await;
                client.identity.switch_community(community_id).await;
                match client.identity.current_community_id().await {
                    Some(id) if id == community_id => println!("Switched to community {id}"),
                    other => println!(
                        "Switch ignored, current community is {:?}",
                        other
                    ),
                }
                return Ok(());
            }
            for community in client.communities.list().await? {
                println!("#{} {} - {}", community.id, community.name, community.description);
            }
        }

        Command::Requests { status, mine } => {
            let community_id = require_community(&client).await?;
            let filter = RequestFilter {
                status: status.as_deref().map(parse_request_status).transpose()?,
                mine,
                ..Default::default()
            };
            let page = client.requests.list(community_id, &filter).await?;
            println!("{} request(s)", page.count);
            for request in page.results {
                println!(
                    "#{} [{}] {} (by {}, {} offer(s))",
                    request.id,
                    request.status.as_str(),
                    request.title,
                    request.created_by_display_name,
                    request.offers_count,
                );
            }
        }

        Command::Request { id } => {
            let detail = client.requests.detail(id).await?;
            let request = &detail.request;
            println!("#{} [{}] {}", request.id, request.status.as_str(), request.title);
            println!("{}", request.description);
            println!(
                "offers: {}  can_offer: {}  can_accept: {}  can_close: {}  can_moderate: {}",
                detail.offers_count,
                detail.can_offer,
                detail.can_accept,
                detail.can_close,
                detail.can_moderate,
            );
        }

        Command::Offers { request_id } => {
            for offer in client.requests.offers(request_id).await? {
                println!(
                    "#{} [{:?}] {} - {}",
                    offer.id, offer.status, offer.volunteer_display_name, offer.message
                );
            }
        }

        Command::Loans { mine } => {
            let community_id = require_community(&client).await?;
            let filter = LoanFilter { mine, ..Default::default() };
            let page = client.loans.list(community_id, &filter).await?;
            println!("{} item(s)", page.count);
            for item in page.results {
                let borrower = item
                    .borrower_display_name
                    .map(|name| format!(" -> {name}"))
                    .unwrap_or_default();
                println!(
                    "#{} [{}] {} (by {}){}",
                    item.id,
                    item.status.as_str(),
                    item.title,
                    item.owner_display_name,
                    borrower,
                );
            }
        }

        Command::Reports { status } => {
            let Some(identity) = client.refresh_identity().await else {
                anyhow::bail!("not logged in");
            };
            let membership = client.identity.current_membership().await;
            let filter = ReportFilter {
                status: status.as_deref().map(parse_report_status).transpose()?,
                ..Default::default()
            };
            let page = client
                .reports
                .list(&identity, membership.as_ref(), &filter)
                .await?;
            println!("{} report(s)", page.count);
            for report in page.results {
                println!(
                    "#{} [{}] {:?} on \"{}\" in {} (target {})",
                    report.id,
                    report.status.as_str(),
                    report.reason,
                    report.request_title,
                    report.request_community_name,
                    report.request_status.as_str(),
                );
            }
        }
    }

    Ok(())
}

/// Resolve the current community or bail with a hint.
async fn require_community(client: &AuzolanClient) -> anyhow::Result<i64> {
    if client.refresh_identity().await.is_none() {
        anyhow::bail!("not logged in");
    }
    client
        .identity
        .current_community_id()
        .await
        .ok_or_else(|| anyhow::anyhow!("no approved community membership"))
}

fn parse_request_status(value: &str) -> anyhow::Result<HelpRequestStatus> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| anyhow::anyhow!("unknown request status: {value}"))
}

fn parse_report_status(value: &str) -> anyhow::Result<ReportStatus> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| anyhow::anyhow!("unknown report status: {value}"))
}
