use std::env;
use std::sync::{Mutex, OnceLock};

use loadline_cli::commands::{cleanup, config, doctor, migrate, seed};
use serde_json::Value;

#[test]
fn migrate_returns_success_against_an_in_memory_database() {
    with_env(&[("LOADLINE_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_reports_config_failures_with_exit_code_two() {
    with_env(&[("LOADLINE_DATABASE_URL", "postgres://nope")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_loads_the_demo_dataset() {
    with_env(&[("LOADLINE_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected deterministic seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("4 loads"), "unexpected message: {message}");
        assert!(message.contains("4 carriers"), "unexpected message: {message}");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(&[("LOADLINE_DATABASE_URL", "sqlite::memory:")], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        assert_eq!(parse_payload(&first.output)["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn cleanup_reports_zero_on_an_empty_database() {
    with_env(&[("LOADLINE_DATABASE_URL", "sqlite::memory:")], || {
        let result = cleanup::run();
        assert_eq!(result.exit_code, 0, "expected cleanup success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "cleanup");
        assert_eq!(payload["message"], "expired 0 stale negotiations");
    });
}

#[test]
fn config_renders_the_effective_values() {
    with_env(&[("LOADLINE_DATABASE_URL", "sqlite::memory:")], || {
        let output = config::run();
        assert!(output.contains("[negotiation]"));
        assert!(output.contains("url = \"sqlite::memory:\""));
    });
}

#[test]
fn doctor_passes_with_an_in_memory_database() {
    with_env(&[("LOADLINE_DATABASE_URL", "sqlite::memory:")], || {
        let output = doctor::run(true);
        let payload: Value =
            serde_json::from_str(&output).expect("doctor --json output should be valid JSON");
        assert_eq!(payload["overall_status"], "pass");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "LOADLINE_DATABASE_URL",
        "LOADLINE_DATABASE_MAX_CONNECTIONS",
        "LOADLINE_DATABASE_TIMEOUT_SECS",
        "LOADLINE_SERVER_BIND_ADDRESS",
        "LOADLINE_SERVER_PORT",
        "LOADLINE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "LOADLINE_FMCSA_BASE_URL",
        "LOADLINE_FMCSA_WEB_KEY",
        "LOADLINE_FMCSA_TIMEOUT_SECS",
        "LOADLINE_NEGOTIATION_MAX_ROUNDS",
        "LOADLINE_NEGOTIATION_EXPIRY_HOURS",
        "LOADLINE_NEGOTIATION_ACCEPT_WITHIN_PCT",
        "LOADLINE_NEGOTIATION_FINAL_ROUND_WITHIN_PCT",
        "LOADLINE_LOGGING_LEVEL",
        "LOADLINE_LOGGING_FORMAT",
        "LOADLINE_LOG_LEVEL",
        "LOADLINE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
