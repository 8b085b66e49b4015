use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::negotiation::policy::NegotiationPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub fmcsa: FmcsaConfig,
    pub negotiation: NegotiationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct FmcsaConfig {
    pub base_url: String,
    pub web_key: Option<SecretString>,
    pub timeout_secs: u64,
}

/// Bargaining knobs, expressed in whole percent so the TOML stays exact.
#[derive(Clone, Debug)]
pub struct NegotiationConfig {
    pub max_rounds: u32,
    pub expiry_hours: u64,
    pub accept_within_pct: u32,
    pub final_round_within_pct: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://loadline.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            fmcsa: FmcsaConfig {
                base_url: "https://mobile.fmcsa.dot.gov".to_string(),
                web_key: None,
                timeout_secs: 10,
            },
            negotiation: NegotiationConfig {
                max_rounds: 3,
                expiry_hours: 24,
                accept_within_pct: 95,
                final_round_within_pct: 90,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl NegotiationConfig {
    pub fn to_policy(&self) -> NegotiationPolicy {
        NegotiationPolicy {
            accept_within_pct: Decimal::new(i64::from(self.accept_within_pct), 2),
            final_round_within_pct: Decimal::new(i64::from(self.final_round_within_pct), 2),
            default_max_rounds: self.max_rounds,
            expiry: Duration::hours(self.expiry_hours as i64),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("loadline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(fmcsa) = patch.fmcsa {
            if let Some(base_url) = fmcsa.base_url {
                self.fmcsa.base_url = base_url;
            }
            if let Some(web_key) = fmcsa.web_key {
                self.fmcsa.web_key = Some(web_key.into());
            }
            if let Some(timeout_secs) = fmcsa.timeout_secs {
                self.fmcsa.timeout_secs = timeout_secs;
            }
        }

        if let Some(negotiation) = patch.negotiation {
            if let Some(max_rounds) = negotiation.max_rounds {
                self.negotiation.max_rounds = max_rounds;
            }
            if let Some(expiry_hours) = negotiation.expiry_hours {
                self.negotiation.expiry_hours = expiry_hours;
            }
            if let Some(accept_within_pct) = negotiation.accept_within_pct {
                self.negotiation.accept_within_pct = accept_within_pct;
            }
            if let Some(final_round_within_pct) = negotiation.final_round_within_pct {
                self.negotiation.final_round_within_pct = final_round_within_pct;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LOADLINE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LOADLINE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("LOADLINE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LOADLINE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LOADLINE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LOADLINE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LOADLINE_SERVER_PORT") {
            self.server.port = parse_u16("LOADLINE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LOADLINE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("LOADLINE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("LOADLINE_FMCSA_BASE_URL") {
            self.fmcsa.base_url = value;
        }
        if let Some(value) = read_env("LOADLINE_FMCSA_WEB_KEY") {
            self.fmcsa.web_key = Some(value.into());
        }
        if let Some(value) = read_env("LOADLINE_FMCSA_TIMEOUT_SECS") {
            self.fmcsa.timeout_secs = parse_u64("LOADLINE_FMCSA_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LOADLINE_NEGOTIATION_MAX_ROUNDS") {
            self.negotiation.max_rounds = parse_u32("LOADLINE_NEGOTIATION_MAX_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("LOADLINE_NEGOTIATION_EXPIRY_HOURS") {
            self.negotiation.expiry_hours =
                parse_u64("LOADLINE_NEGOTIATION_EXPIRY_HOURS", &value)?;
        }
        if let Some(value) = read_env("LOADLINE_NEGOTIATION_ACCEPT_WITHIN_PCT") {
            self.negotiation.accept_within_pct =
                parse_u32("LOADLINE_NEGOTIATION_ACCEPT_WITHIN_PCT", &value)?;
        }
        if let Some(value) = read_env("LOADLINE_NEGOTIATION_FINAL_ROUND_WITHIN_PCT") {
            self.negotiation.final_round_within_pct =
                parse_u32("LOADLINE_NEGOTIATION_FINAL_ROUND_WITHIN_PCT", &value)?;
        }

        let log_level =
            read_env("LOADLINE_LOGGING_LEVEL").or_else(|| read_env("LOADLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LOADLINE_LOGGING_FORMAT").or_else(|| read_env("LOADLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_fmcsa(&self.fmcsa)?;
        validate_negotiation(&self.negotiation)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("loadline.toml"), PathBuf::from("config/loadline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_fmcsa(fmcsa: &FmcsaConfig) -> Result<(), ConfigError> {
    if !fmcsa.base_url.starts_with("http://") && !fmcsa.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "fmcsa.base_url must start with http:// or https://".to_string(),
        ));
    }

    if fmcsa.timeout_secs == 0 || fmcsa.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "fmcsa.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    if let Some(web_key) = &fmcsa.web_key {
        if web_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "fmcsa.web_key must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_negotiation(negotiation: &NegotiationConfig) -> Result<(), ConfigError> {
    if negotiation.max_rounds == 0 {
        return Err(ConfigError::Validation(
            "negotiation.max_rounds must be at least 1".to_string(),
        ));
    }

    if negotiation.expiry_hours == 0 {
        return Err(ConfigError::Validation(
            "negotiation.expiry_hours must be at least 1".to_string(),
        ));
    }

    let in_range = |pct: u32| (1..=100).contains(&pct);
    if !in_range(negotiation.accept_within_pct) || !in_range(negotiation.final_round_within_pct) {
        return Err(ConfigError::Validation(
            "negotiation acceptance percentages must be in range 1..=100".to_string(),
        ));
    }

    if negotiation.final_round_within_pct > negotiation.accept_within_pct {
        return Err(ConfigError::Validation(
            "negotiation.final_round_within_pct cannot exceed accept_within_pct".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    fmcsa: Option<FmcsaPatch>,
    negotiation: Option<NegotiationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FmcsaPatch {
    base_url: Option<String>,
    web_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NegotiationPatch {
    max_rounds: Option<u32>,
    expiry_hours: Option<u64>,
    accept_within_pct: Option<u32>,
    final_round_within_pct: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
