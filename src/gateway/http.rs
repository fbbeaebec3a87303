//! HTTP implementation of the gateway contracts against the portal REST API.

use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::gateway::{AccessClient, PaymentGateway, PaymentReceipt};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// REST client for the portal backend and its payment-processor proxy.
///
/// Every request carries the caller's bearer token (ambient identity) and is
/// bounded by the configured per-request timeout, so a hung poll cannot stall
/// the confirmation loop past its interval budget.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

#[derive(Serialize)]
struct VerifySessionRequest<'a> {
    session_token: &'a str,
}

#[derive(Deserialize)]
struct PortalAccessResponse {
    portal_access_granted_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct EnrollmentResponse {
    is_enrolled: bool,
}

impl HttpGateway {
    /// Create a gateway client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Gateway(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: None,
        })
    }

    /// Attach a bearer token for authenticated backend calls.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self.client.request(method, url);
        if let Some(ref token) = self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn verify_session(&self, session_token: &str) -> Result<PaymentReceipt> {
        debug!("Verifying checkout session with payment processor");

        let response = self
            .request(reqwest::Method::POST, "/payments/verify-session")
            .json(&VerifySessionRequest { session_token })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Payment verification returned HTTP {status}");
            return Err(Error::Gateway(format!(
                "verify-session returned HTTP {status}"
            )));
        }

        response
            .json::<PaymentReceipt>()
            .await
            .map_err(|e| Error::BadResponse(format!("verify-session payload: {e}")))
    }
}

#[async_trait]
impl AccessClient for HttpGateway {
    async fn portal_access(&self) -> Result<Option<DateTime<Utc>>> {
        let response = self
            .request(reqwest::Method::GET, "/me/portal-access")
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Gateway(e.to_string()))?;

        let payload = response
            .json::<PortalAccessResponse>()
            .await
            .map_err(|e| Error::BadResponse(format!("portal-access payload: {e}")))?;

        Ok(payload.portal_access_granted_at)
    }

    async fn course_enrollment(&self, course: &str) -> Result<bool> {
        let response = self
            .request(reqwest::Method::GET, &format!("/me/enrollments/{course}"))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Gateway(e.to_string()))?;

        let payload = response
            .json::<EnrollmentResponse>()
            .await
            .map_err(|e| Error::BadResponse(format!("enrollment payload: {e}")))?;

        Ok(payload.is_enrolled)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let config = GatewayConfig {
            base_url: "https://api.learnhub.dev/".to_string(),
            request_timeout_secs: 5,
        };
        let gateway = HttpGateway::new(&config).expect("should build");
        assert_eq!(gateway.base_url, "https://api.learnhub.dev");
    }

    #[test]
    fn receipt_decodes_from_backend_payload() {
        let receipt: PaymentReceipt =
            serde_json::from_str(r#"{"paid": true}"#).expect("should decode");
        assert!(receipt.paid);
    }

    #[test]
    fn portal_access_payload_absent_timestamp() {
        let payload: PortalAccessResponse =
            serde_json::from_str(r#"{"portal_access_granted_at": null}"#).expect("should decode");
        assert!(payload.portal_access_granted_at.is_none());
    }
}
