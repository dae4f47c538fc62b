//! SlotPark Backend Server
//!
//! Rust backend for SlotPark: slot reservations with payment holds, gate
//! check-in/out by plate or QR, and background reconciliation of
//! time-based booking state.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use slotpark_server::anpr::PlateRecognitionClient;
use slotpark_server::app_state::AppState;
use slotpark_server::booking_service::BookingService;
use slotpark_server::config::{AppConfig, GatewayConfig, PlateProviderConfig};
use slotpark_server::gate_service::GateService;
use slotpark_server::jobs;
use slotpark_server::parking_service::ParkingService;
use slotpark_server::payment_gateway::PaymentGatewayClient;
use slotpark_server::payment_service::PaymentService;
use slotpark_server::routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!().run(&pool).await?;

    let gateway = PaymentGatewayClient::new(GatewayConfig::from_env());
    let plate_client = Arc::new(PlateRecognitionClient::new(PlateProviderConfig::from_env()));

    let app_state = AppState::new(
        Arc::new(BookingService::new(pool.clone())),
        Arc::new(PaymentService::new(pool.clone(), gateway)),
        Arc::new(GateService::new(pool.clone())),
        Arc::new(ParkingService::new(pool.clone())),
        plate_client,
    );

    // Start the per-minute reconciliation sweeps; the scheduler handle must
    // stay alive for the jobs to keep firing.
    let _scheduler = jobs::start(pool).await?;

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(routes::booking_routes())
        .merge(routes::payment_routes())
        .merge(routes::gate_routes())
        .merge(routes::parking_routes())
        .merge(routes::anpr_routes())
        .layer(build_cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "SlotPark API Server"
}

async fn health_check() -> &'static str {
    "OK"
}

fn build_cors_layer(allowed_origins: &str) -> CorsLayer {
    let origins = allowed_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(false)
}
