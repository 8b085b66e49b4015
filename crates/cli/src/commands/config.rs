use loadline_core::config::{AppConfig, LoadOptions, LogFormat};
use secrecy::ExposeSecret;

/// Render the effective configuration with secrets redacted. Values reflect
/// the full precedence chain (defaults, file, environment).
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("configuration issue: {error}"),
    };

    render(&config)
}

fn render(config: &AppConfig) -> String {
    let web_key = match &config.fmcsa.web_key {
        Some(secret) if !secret.expose_secret().is_empty() => "<redacted>",
        _ => "<unset>",
    };
    let log_format = match config.logging.format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    };

    [
        "[database]".to_string(),
        format!("url = \"{}\"", config.database.url),
        format!("max_connections = {}", config.database.max_connections),
        format!("timeout_secs = {}", config.database.timeout_secs),
        String::new(),
        "[server]".to_string(),
        format!("bind_address = \"{}\"", config.server.bind_address),
        format!("port = {}", config.server.port),
        format!("graceful_shutdown_secs = {}", config.server.graceful_shutdown_secs),
        String::new(),
        "[fmcsa]".to_string(),
        format!("base_url = \"{}\"", config.fmcsa.base_url),
        format!("web_key = {web_key}"),
        format!("timeout_secs = {}", config.fmcsa.timeout_secs),
        String::new(),
        "[negotiation]".to_string(),
        format!("max_rounds = {}", config.negotiation.max_rounds),
        format!("expiry_hours = {}", config.negotiation.expiry_hours),
        format!("accept_within_pct = {}", config.negotiation.accept_within_pct),
        format!("final_round_within_pct = {}", config.negotiation.final_round_within_pct),
        String::new(),
        "[logging]".to_string(),
        format!("level = \"{}\"", config.logging.level),
        format!("format = \"{log_format}\""),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use loadline_core::config::AppConfig;

    use super::render;

    #[test]
    fn render_redacts_the_web_key_and_shows_every_section() {
        let mut config = AppConfig::default();
        config.fmcsa.web_key = Some("super-secret".to_string().into());

        let output = render(&config);

        assert!(output.contains("web_key = <redacted>"));
        assert!(!output.contains("super-secret"));
        for section in ["[database]", "[server]", "[fmcsa]", "[negotiation]", "[logging]"] {
            assert!(output.contains(section), "missing section {section}");
        }
    }

    #[test]
    fn render_marks_an_absent_web_key_as_unset() {
        let output = render(&AppConfig::default());
        assert!(output.contains("web_key = <unset>"));
    }
}
