//! Database connection management
//!
//! Builds the PostgreSQL pool (with TLS when the URL asks for it) and creates
//! the schema at startup.

pub mod queries;

use crate::config::DatabaseConfig;
use crate::error::AppError;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::{info, warn};

/// Create a connection pool and check that it can reach the server
pub async fn create_pool(config: &DatabaseConfig) -> Result<Pool, AppError> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.pool = Some(PoolConfig::new(config.max_pool_size));
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = if config.require_tls {
        cfg.create_pool(Some(Runtime::Tokio1), tls_connector())
            .map_err(|e| AppError::Config(format!("Failed to create TLS pool: {}", e)))?
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| AppError::Config(format!("Failed to create pool: {}", e)))?
    };

    // Test connection
    let client = pool.get().await?;
    client.query_one("SELECT 1", &[]).await?;
    drop(client);

    info!(
        host = %config.host,
        database = %config.database,
        tls = config.require_tls,
        "Database connection successful"
    );
    Ok(pool)
}

/// rustls connector trusting the platform's root certificates
fn tls_connector() -> tokio_postgres_rustls::MakeRustlsConnect {
    let certs = rustls_native_certs::load_native_certs();
    for err in &certs.errors {
        warn!("Skipping unreadable native certificate: {}", err);
    }

    let mut root_store = rustls::RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(certs.certs);
    if ignored > 0 {
        warn!(added, ignored, "Some native root certificates could not be parsed");
    }

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    tokio_postgres_rustls::MakeRustlsConnect::new(tls_config)
}

/// Create types, tables and indexes if they don't exist
pub async fn create_schema(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;

    for statement in [
        queries::CREATE_ROLE_TYPE,
        queries::CREATE_USERS_TABLE,
        queries::CREATE_ACHIEVEMENTS_TABLE,
        queries::CREATE_STUDENTS_TABLE,
        queries::CREATE_INDEXES,
    ] {
        client.batch_execute(statement).await?;
    }

    info!("Database tables initialized");
    Ok(())
}
