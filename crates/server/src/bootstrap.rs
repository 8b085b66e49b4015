use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use loadline_core::audit::{AuditEvent, AuditSink};
use loadline_core::clock::SystemClock;
use loadline_core::config::AppConfig;
use loadline_core::negotiation::lifecycle::LifecycleManager;
use loadline_core::negotiation::policy::NegotiationPolicy;
use loadline_db::repositories::{
    SqlCallRepository, SqlCarrierRepository, SqlLoadRepository, SqlNegotiationStore,
};
use loadline_db::{connect_with_settings, migrations, DbPool};

use crate::api::AppState;
use crate::fmcsa::{FmcsaClient, FmcsaError};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application").finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Fmcsa(#[from] FmcsaError),
}

/// Audit sink for the running server: every negotiation transition lands in
/// the structured log stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = %event.event_type,
            correlation_id = %event.correlation_id,
            negotiation_id =
                event.negotiation_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
            call_id = event.call_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
            actor = %event.actor,
            outcome = ?event.outcome,
            "audit event"
        );
    }
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let verifier = FmcsaClient::new(&config.fmcsa)?;
    let state = build_state(db_pool.clone(), config.negotiation.to_policy(), verifier);

    Ok(Application { config, db_pool, state })
}

fn build_state(pool: DbPool, policy: NegotiationPolicy, verifier: FmcsaClient) -> AppState {
    let lifecycle = LifecycleManager::new(
        SqlNegotiationStore::new(pool.clone()),
        SystemClock,
        TracingAuditSink,
        policy,
    );

    AppState {
        lifecycle: Arc::new(lifecycle),
        calls: Arc::new(SqlCallRepository::new(pool.clone())),
        loads: Arc::new(SqlLoadRepository::new(pool.clone())),
        carriers: Arc::new(SqlCarrierRepository::new(pool)),
        verifier: Arc::new(verifier),
    }
}

/// Fully wired state over a fresh in-memory database, for router tests.
#[cfg(test)]
pub async fn test_state() -> AppState {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");

    let verifier = FmcsaClient::new(&AppConfig::default().fmcsa).expect("fmcsa client");
    build_state(pool, NegotiationPolicy::default(), verifier)
}
