use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use dotenvy::dotenv;
use log::{info, warn};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod api_router;
mod assets;
mod config;
mod courses;
mod email;
mod payments;
mod profiles;
mod progress;
mod shared;
pub mod tests;

use crate::api_router::configure_api_routes;
use crate::assets::init_drive;
use crate::config::AppConfig;
use crate::courses::CourseEngine;
use crate::email::build_mailer;
use crate::payments::gateway::PaymentClient;
use crate::shared::state::AppState;
use crate::shared::utils::{create_conn, run_migrations};

// Multipart bodies carry lecture videos, so the 2MB axum default is far
// too small.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = AppConfig::from_env().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Configuration error: {}", e),
        )
    })?;

    let conn = create_conn(&config.database_url()).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            format!("Failed to create database pool: {}", e),
        )
    })?;
    run_migrations(&conn).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to run migrations: {}", e),
        )
    })?;

    match CourseEngine::new(conn.clone())
        .seed_default_categories()
        .await
    {
        Ok(0) => {}
        Ok(count) => info!("Seeded {} default categories", count),
        Err(e) => warn!("Could not seed default categories: {}", e),
    }

    let drive = match init_drive(&config.drive).await {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("Asset storage unavailable, uploads disabled: {}", e);
            None
        }
    };

    let mailer = match build_mailer(&config.email) {
        Ok(mailer) => Some(mailer),
        Err(e) => {
            warn!("Mailer unavailable, notifications disabled: {}", e);
            None
        }
    };

    let payments = PaymentClient::new(&config.payment);
    if !payments.is_configured() {
        warn!("Payment gateway keys not set, order creation disabled");
    }

    let state = Arc::new(AppState {
        drive,
        bucket_name: config.drive.bucket.clone(),
        mailer,
        payments,
        config: config.clone(),
        conn,
    });

    let app = Router::new()
        .merge(configure_api_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
