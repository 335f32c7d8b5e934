//! Registro API - student registration administration backend
//!
//! Staff authentication with role-gated routes, a public achievements list
//! and student records for the school dashboard.
//!
//! Storage is PostgreSQL when `DATABASE_URL` is set, otherwise everything
//! lives in process memory and is lost on restart.

mod auth;
mod config;
mod db;
mod error;
mod models;
mod routes;
mod state;
mod store;
mod users;

use crate::auth::{PasswordHasher, TokenService};
use crate::config::{LogFormat, Settings};
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let settings = Settings::load()?;

    // Initialize tracing subscriber for structured logging
    init_tracing(settings.log_format);

    info!("🚀 Starting Registro API...");
    info!(environment = ?settings.environment, "📋 Configuration loaded successfully");

    let tokens = match settings.auth.jwt_secret.as_deref() {
        Some(secret) => TokenService::new(secret.as_bytes(), settings.auth.token_ttl_hours),
        // Production without a secret is rejected while loading settings.
        None => {
            warn!("⚠️  JWT_SECRET not set, using a random per-process secret. Sessions will not survive a restart");
            TokenService::ephemeral(settings.auth.token_ttl_hours)
        }
    };
    let hasher = PasswordHasher::new(settings.auth.bcrypt_cost);

    let state = match &settings.database {
        Some(database) => {
            let pool = db::create_pool(database).await?;
            info!("✅ Database pool created successfully");
            db::create_schema(&pool).await?;
            AppState::with_database(pool, tokens, hasher)
        }
        None => {
            warn!("⚠️  DATABASE_URL not set, using the in-memory store. Data is lost on shutdown");
            AppState::in_memory(tokens, hasher)
        }
    };
    let state = Arc::new(state);

    // Make sure an admin exists
    match &settings.auth.bootstrap_admin {
        Some(admin) => {
            state
                .users
                .bootstrap_admin(&admin.username, &admin.password)
                .await?;
        }
        None => {
            if state.users.admin_count().await? == 0 {
                warn!("⚠️  No admin account exists. Set BOOTSTRAP_ADMIN_USERNAME and BOOTSTRAP_ADMIN_PASSWORD to create one");
            }
        }
    }

    // Build the router
    let app = create_router(state, &settings.cors);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("📚 API Endpoints:");
    info!("   POST /api/auth/login                 - Login with username/password");
    info!("   GET  /api/auth/verify                - Verify session (admin)");
    info!("   GET  /api/auth/users                 - List staff accounts (admin)");
    info!("   POST /api/auth/users                 - Create staff account (admin)");
    info!("   PUT  /api/auth/users/{{id}}            - Update staff account (admin)");
    info!("   DELETE /api/auth/users/{{id}}          - Delete staff account (admin)");
    info!("   GET  /api/logros                     - Public achievements");
    info!("   *    /api/dashboard/logro(s)         - Achievements (admin, subdireccion)");
    info!("   *    /api/dashboard/alumno(s)        - Students (any staff role)");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,registro_api=debug,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init(),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
