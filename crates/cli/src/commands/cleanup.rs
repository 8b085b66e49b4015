use crate::commands::CommandResult;
use loadline_core::audit::NoopAuditSink;
use loadline_core::clock::SystemClock;
use loadline_core::config::{AppConfig, LoadOptions};
use loadline_core::negotiation::lifecycle::LifecycleManager;
use loadline_db::repositories::SqlNegotiationStore;
use loadline_db::{connect_with_settings, migrations};

/// Operator entry point for the expiry sweep. The same transition rules as
/// the API path apply; running it repeatedly is safe.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "cleanup",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "cleanup",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let manager = LifecycleManager::new(
            SqlNegotiationStore::new(pool.clone()),
            SystemClock,
            NoopAuditSink,
            config.negotiation.to_policy(),
        );

        let swept = manager
            .cleanup_expired()
            .await
            .map_err(|error| ("cleanup_execution", error.to_string(), 5u8))?;

        pool.close().await;
        Ok::<usize, (&'static str, String, u8)>(swept)
    });

    match result {
        Ok(swept) => {
            CommandResult::success("cleanup", format!("expired {swept} stale negotiations"))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("cleanup", error_class, message, exit_code)
        }
    }
}
