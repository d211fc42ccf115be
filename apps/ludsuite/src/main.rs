//! # LUD Suite Server
//!
//! The main binary for the LUD Suite mentorship registry.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for provisioning and access checks
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                apps/ludsuite (THE BINARY)             │
//! │                                                       │
//! │      ┌─────────────┐            ┌─────────────┐       │
//! │      │    CLI      │            │  HTTP API   │       │
//! │      │   (clap)    │            │   (axum)    │       │
//! │      └──────┬──────┘            └──────┬──────┘       │
//! │             └────────────┬─────────────┘              │
//! │                          ▼                            │
//! │                 ┌────────────────┐                    │
//! │                 │ ludsuite-core  │                    │
//! │                 │  (THE LOGIC)   │                    │
//! │                 └────────────────┘                    │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! ludsuite --config ludsuite.toml server --port 8080
//!
//! # CLI operations
//! ludsuite user add --username root --email root@example.org --superuser
//! ludsuite assign --mentor 2 --mentee 1
//! ludsuite access --requester 2 --mentee 1 --on 2024-07-01
//! ```

use clap::Parser;
use ludsuite::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // LUDSUITE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("LUDSUITE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ludsuite=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  LUD Suite v{}

  Mentors · Mentees · Endorsers · Reviewers
"#,
        env!("CARGO_PKG_VERSION")
    );
}
