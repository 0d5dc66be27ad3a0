//! minifund entry point.
//!
//! `minifund` (or `minifund serve`) runs the auth API:
//! 1. Load configuration from environment
//! 2. Build shared state (nonce table, session signer, rate limiter)
//! 3. Start the nonce sweep task
//! 4. Build router with body limit, CORS and security headers
//! 5. Start Axum server
//!
//! `minifund seed <path>` fills a record store file with seed campaigns,
//! donations and the local profile.

use minifund::{
    auth::middleware::AppState, cleanup, config::Config, fixtures, routes, storage::FileStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  minifund [serve]        Run the auth API");
    eprintln!("  minifund seed <path>    Seed a record store file");
    eprintln!();
    eprintln!("Configuration is read from the environment (.env supported).");
    eprintln!("SESSION_SECRET is required for serve:");
    eprintln!("  openssl rand -base64 32");
}

async fn seed(path: &str) -> Result<(), String> {
    let store = FileStore::new(path);
    let outcome = fixtures::initialize_if_empty(&store, chrono::Utc::now(), &mut rand::rng())
        .await
        .map_err(|e| format!("Seeding {} failed: {}", path, e))?;

    let summary =
        serde_json::to_string_pretty(&outcome).map_err(|e| format!("Encoding report: {}", e))?;
    println!("{}", summary);

    match outcome.report {
        Some(report) if !report.valid => Err("Seed data failed consistency checks".to_string()),
        _ => Ok(()),
    }
}

async fn serve() {
    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting minifund on {}", config.bind_addr);
    let bind_addr = config.bind_addr;

    // Build shared state
    let state = AppState::new(config).expect("Failed to build state");

    // Expired nonces are also evicted on issuance; the sweep covers idle periods.
    tokio::spawn(cleanup::run_sweep_loop(
        Arc::clone(&state.nonces),
        Arc::clone(&state.auth_limiter),
        Duration::from_secs(state.config.nonce_sweep_interval_secs),
    ));

    let app = routes::app(state);

    // Bind to configured address
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", bind_addr);

    // Start server (with_connect_info required for ConnectInfo<SocketAddr> extractors)
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

#[tokio::main]
async fn main() {
    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        None | Some("serve") => serve().await,
        Some("seed") => {
            let Some(path) = args.get(2) else {
                print_usage();
                std::process::exit(1);
            };
            if let Err(e) = seed(path).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Some(_) => {
            print_usage();
            std::process::exit(1);
        }
    }
}
