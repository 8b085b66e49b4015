use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use loadline_core::config::FmcsaConfig;
use loadline_core::domain::carrier::FmcsaVerification;
use loadline_core::domain::negotiation::McNumber;

#[derive(Debug, Error)]
pub enum FmcsaError {
    #[error("fmcsa client construction failed: {0}")]
    Client(String),
    #[error("fmcsa lookup failed: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait FmcsaVerifier: Send + Sync {
    async fn verify(&self, mc_number: &McNumber) -> Result<FmcsaVerification, FmcsaError>;
}

/// FMCSA QCMobile lookup. Without a web key the client answers from a small
/// deterministic table and allows unknown carriers, which keeps offline and
/// demo environments working.
pub struct FmcsaClient {
    http: reqwest::Client,
    base_url: String,
    web_key: Option<SecretString>,
}

const KNOWN_CARRIERS: &[(&str, &str, &str)] = &[
    ("123456", "ABC Trucking LLC", "987654"),
    ("789012", "XYZ Transport Inc", "555666"),
    ("456789", "Best Freight Co", "111222"),
    ("999888", "Demo Carrier Ltd", "333444"),
];

#[derive(Debug, Deserialize)]
struct QcMobileResponse {
    content: Option<QcMobileContent>,
}

#[derive(Debug, Deserialize)]
struct QcMobileContent {
    carrier: Option<QcMobileCarrier>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QcMobileCarrier {
    legal_name: Option<String>,
    dot_number: Option<serde_json::Value>,
    allowed_to_operate: Option<String>,
}

impl FmcsaClient {
    pub fn new(config: &FmcsaConfig) -> Result<Self, FmcsaError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| FmcsaError::Client(error.to_string()))?;

        Ok(Self { http, base_url: config.base_url.clone(), web_key: config.web_key.clone() })
    }

    fn stub_lookup(mc_number: &McNumber) -> FmcsaVerification {
        if let Some((_, company, dot)) =
            KNOWN_CARRIERS.iter().find(|(mc, _, _)| *mc == mc_number.0)
        {
            return FmcsaVerification {
                mc_number: mc_number.clone(),
                is_valid: true,
                status: "ACTIVE".to_string(),
                company_name: Some((*company).to_string()),
                dot_number: Some((*dot).to_string()),
            };
        }

        // Unknown carriers pass in stub mode so demo flows are not blocked.
        FmcsaVerification {
            mc_number: mc_number.clone(),
            is_valid: true,
            status: "ACTIVE".to_string(),
            company_name: Some(format!("Carrier {}", mc_number.0)),
            dot_number: Some(format!("DOT{}", mc_number.0)),
        }
    }

    async fn live_lookup(
        &self,
        mc_number: &McNumber,
        web_key: &SecretString,
    ) -> Result<FmcsaVerification, FmcsaError> {
        let url = format!(
            "{}/qc/services/carriers/docket-number/{}?webKey={}",
            self.base_url.trim_end_matches('/'),
            mc_number.0,
            web_key.expose_secret(),
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|error| FmcsaError::Upstream(error.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(FmcsaVerification {
                mc_number: mc_number.clone(),
                is_valid: false,
                status: "NOT_FOUND".to_string(),
                company_name: None,
                dot_number: None,
            });
        }

        let parsed: QcMobileResponse = response
            .error_for_status()
            .map_err(|error| FmcsaError::Upstream(error.to_string()))?
            .json()
            .await
            .map_err(|error| FmcsaError::Upstream(error.to_string()))?;

        let carrier = parsed.content.and_then(|content| content.carrier);
        let Some(carrier) = carrier else {
            return Ok(FmcsaVerification {
                mc_number: mc_number.clone(),
                is_valid: false,
                status: "NOT_FOUND".to_string(),
                company_name: None,
                dot_number: None,
            });
        };

        let allowed = carrier.allowed_to_operate.as_deref().is_some_and(|flag| flag == "Y");
        Ok(FmcsaVerification {
            mc_number: mc_number.clone(),
            is_valid: allowed,
            status: if allowed { "ACTIVE".to_string() } else { "INACTIVE".to_string() },
            company_name: carrier.legal_name,
            dot_number: carrier.dot_number.map(|value| match value {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            }),
        })
    }
}

#[async_trait]
impl FmcsaVerifier for FmcsaClient {
    async fn verify(&self, mc_number: &McNumber) -> Result<FmcsaVerification, FmcsaError> {
        match &self.web_key {
            Some(web_key) => {
                let result = self.live_lookup(mc_number, web_key).await;
                if let Err(error) = &result {
                    warn!(
                        event_name = "fmcsa.lookup_failed",
                        mc_number = %mc_number,
                        error = %error,
                        "fmcsa lookup failed"
                    );
                }
                result
            }
            None => Ok(Self::stub_lookup(mc_number)),
        }
    }
}

#[cfg(test)]
mod tests {
    use loadline_core::config::FmcsaConfig;
    use loadline_core::domain::negotiation::McNumber;

    use super::{FmcsaClient, FmcsaVerifier};

    fn offline_client() -> FmcsaClient {
        FmcsaClient::new(&FmcsaConfig {
            base_url: "https://mobile.fmcsa.dot.gov".to_string(),
            web_key: None,
            timeout_secs: 5,
        })
        .expect("client")
    }

    #[tokio::test]
    async fn stub_mode_answers_from_the_known_table() {
        let client = offline_client();
        let verification =
            client.verify(&McNumber("123456".to_string())).await.expect("verify");

        assert!(verification.is_valid);
        assert_eq!(verification.company_name.as_deref(), Some("ABC Trucking LLC"));
        assert_eq!(verification.dot_number.as_deref(), Some("987654"));
    }

    #[tokio::test]
    async fn stub_mode_allows_unknown_carriers() {
        let client = offline_client();
        let verification =
            client.verify(&McNumber("314159".to_string())).await.expect("verify");

        assert!(verification.is_valid);
        assert_eq!(verification.status, "ACTIVE");
        assert_eq!(verification.company_name.as_deref(), Some("Carrier 314159"));
    }
}
