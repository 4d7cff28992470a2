//! Flight Surety Server
//!
//! Hosts the coordination engine behind a small HTTP read and customer
//! surface. With `SEED_DEMO=true` it also seeds demo airlines, flights and
//! oracles and runs a simulated oracle pool against the event feed.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderName, HeaderValue, Method};
use tokio::time::{sleep, Duration};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use flight_surety::app_state::AppState;
use flight_surety::config::{EngineConfig, ServerConfig};
use flight_surety::handlers::CALLER_HEADER;
use flight_surety::models::Identity;
use flight_surety::routes;
use flight_surety::services::{self, OracleSimulator, SimulatorError};
use flight_surety::settlement::InMemoryAccounts;
use flight_surety::FlightSuretyApp;

const SIMULATOR_SUPERVISOR_MAX_BACKOFF_SECONDS: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let engine_config = EngineConfig::from_env().context("invalid engine configuration")?;
    let server_config = ServerConfig::from_env().context("invalid server configuration")?;

    let engine = Arc::new(FlightSuretyApp::new(
        engine_config,
        Arc::new(InMemoryAccounts::new()),
    ));

    if server_config.seed_demo {
        let roster = services::seed_demo(&engine, server_config.demo_oracles)
            .context("failed to seed demo data")?;
        spawn_simulator_supervisor(engine.clone(), roster.oracles);
    } else {
        info!("Demo seeding disabled; set SEED_DEMO=true to enable the oracle simulator");
    }

    // Create the app router
    let app = routes::api_router(AppState::new(engine))
        .layer(build_cors_layer(&server_config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([127, 0, 0, 1], server_config.port));
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Runs the oracle simulator and restarts it with backoff if it dies.
fn spawn_simulator_supervisor(engine: Arc<FlightSuretyApp>, oracles: Vec<Identity>) {
    tokio::spawn(async move {
        let mut restart_count: u32 = 0;
        loop {
            let simulator = OracleSimulator::new(engine.clone(), oracles.clone());
            let handle = tokio::spawn(simulator.start());

            match handle.await {
                Ok(Ok(())) => {
                    info!("oracle simulator exited cleanly; stopping supervisor");
                    break;
                }
                Ok(Err(SimulatorError::NoOracles)) => {
                    info!("Oracle simulator disabled: no demo oracles configured");
                    break;
                }
                Err(join_error) => {
                    if join_error.is_panic() {
                        error!("oracle simulator panicked; restarting");
                    } else {
                        error!(error = %join_error, "oracle simulator task failed; restarting");
                    }
                }
            }

            restart_count = restart_count.saturating_add(1);
            let backoff_seconds = (2u64.saturating_pow(restart_count.min(5)))
                .min(SIMULATOR_SUPERVISOR_MAX_BACKOFF_SECONDS);
            warn!(restart_count, backoff_seconds, "oracle simulator restart backoff");
            sleep(Duration::from_secs(backoff_seconds)).await;
        }
    });
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed_origins = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(CALLER_HEADER),
        ])
        .allow_credentials(false)
}
