//! HTTP client for the registrar API.
//!
//! Three endpoints are consumed:
//!
//! - `GET  /pricing/{extension}`
//! - `GET  /availability/check?domain=..&include_pricing=..`
//! - `POST /availability/batch` with `{"domains": [..]}`
//!
//! Every response is wrapped in a `{success, data}` envelope. This client
//! reports every failure as a [`DomainSearchError`]; turning failures into
//! safe defaults is the job of the fetchers above it.

use crate::error::DomainSearchError;
use crate::types::{AvailabilityResult, AvailabilityStatus, PricingRecord, SearchConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// `{success, data}` envelope used by every endpoint.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default, alias = "error")]
    message: Option<String>,
}

/// Availability as reported for one domain.
///
/// The API has used both a boolean `available` and a `status` string;
/// `available` wins when both are present.
#[derive(Debug, Deserialize)]
struct AvailabilityPayload {
    #[serde(default)]
    available: Option<bool>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    pricing: Option<PricingRecord>,
}

impl AvailabilityPayload {
    fn status(&self) -> Option<AvailabilityStatus> {
        match (self.available, self.status.as_deref()) {
            (Some(available), _) => Some(available.into()),
            (None, Some(status)) => Some(AvailabilityStatus::from_status(status)),
            (None, None) => None,
        }
    }

    fn into_result(self, domain: &str) -> Result<AvailabilityResult, DomainSearchError> {
        let status = self.status().ok_or_else(|| {
            DomainSearchError::parse(format!(
                "availability for '{}' has neither 'available' nor 'status'",
                domain
            ))
        })?;
        Ok(AvailabilityResult {
            domain: domain.to_string(),
            status,
            pricing: self.pricing,
        })
    }
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    domains: &'a [String],
}

/// Client for the registrar API.
///
/// Cheap to clone: the underlying `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct RegistrarClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    include_pricing: bool,
}

impl RegistrarClient {
    /// Create a client from the pipeline configuration.
    pub fn new(config: &SearchConfig) -> Result<Self, DomainSearchError> {
        let http_client = reqwest::Client::builder()
            // tokio::time::timeout below is authoritative; this is a backstop
            .timeout(config.request_timeout + Duration::from_secs(2))
            .user_agent(concat!("ke-domain/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                DomainSearchError::network_with_source(
                    "Failed to create registrar HTTP client",
                    e.to_string(),
                )
            })?;

        Ok(Self {
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
            include_pricing: config.include_pricing,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the price table for an extension such as `co.ke`.
    pub async fn fetch_pricing(&self, extension: &str) -> Result<PricingRecord, DomainSearchError> {
        let endpoint = format!("/pricing/{}", extension);
        let request = self.http_client.get(self.url(&endpoint));
        self.send_enveloped(&endpoint, request).await
    }

    /// Check a single fully qualified domain.
    pub async fn check_availability(
        &self,
        domain: &str,
    ) -> Result<AvailabilityResult, DomainSearchError> {
        let endpoint = "/availability/check";
        let include_pricing = if self.include_pricing { "true" } else { "false" };
        let request = self
            .http_client
            .get(self.url(endpoint))
            .query(&[("domain", domain), ("include_pricing", include_pricing)]);

        let payload: AvailabilityPayload = self.send_enveloped(endpoint, request).await?;
        payload.into_result(domain)
    }

    /// Check many domains in one request.
    ///
    /// The map contains whatever the registrar reported; domains it left
    /// out are simply absent. Entries without a usable status come back as
    /// `Unknown`.
    pub async fn check_batch(
        &self,
        domains: &[String],
    ) -> Result<HashMap<String, AvailabilityResult>, DomainSearchError> {
        let endpoint = "/availability/batch";
        let request = self
            .http_client
            .post(self.url(endpoint))
            .json(&BatchRequest { domains });

        let data: HashMap<String, AvailabilityPayload> =
            self.send_enveloped(endpoint, request).await?;

        Ok(data
            .into_iter()
            .map(|(domain, payload)| {
                let domain = domain.trim().to_ascii_lowercase();
                let result = payload
                    .into_result(&domain)
                    .unwrap_or_else(|_| AvailabilityResult::unknown(domain.clone()));
                (domain, result)
            })
            .collect())
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Send a request and unwrap the `{success, data}` envelope.
    async fn send_enveloped<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, DomainSearchError> {
        let envelope: ApiEnvelope<T> = self
            .with_timeout(endpoint, async {
                let response = request.send().await.map_err(|e| {
                    tracing::debug!(endpoint, error = %e, "request failed");
                    DomainSearchError::from(e)
                })?;

                match response.status() {
                    status if status.is_success() => {
                        let body = response.bytes().await.map_err(DomainSearchError::from)?;
                        serde_json::from_slice::<ApiEnvelope<T>>(&body).map_err(|e| {
                            DomainSearchError::parse(format!(
                                "Malformed response from {}: {}",
                                endpoint, e
                            ))
                        })
                    }
                    status => Err(DomainSearchError::http(endpoint, status.as_u16())),
                }
            })
            .await?;

        if !envelope.success {
            return Err(DomainSearchError::api(
                endpoint,
                envelope
                    .message
                    .unwrap_or_else(|| "success=false".to_string()),
            ));
        }

        envelope
            .data
            .ok_or_else(|| DomainSearchError::parse(format!("{} returned no data", endpoint)))
    }

    async fn with_timeout<T>(
        &self,
        endpoint: &str,
        fut: impl Future<Output = Result<T, DomainSearchError>>,
    ) -> Result<T, DomainSearchError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(endpoint, timeout = ?self.timeout, "registrar request timed out");
                Err(DomainSearchError::timeout(endpoint, self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_prefers_available_flag() {
        let payload: AvailabilityPayload =
            serde_json::from_value(serde_json::json!({ "available": true, "status": "taken" }))
                .unwrap();
        assert_eq!(payload.status(), Some(AvailabilityStatus::Available));
    }

    #[test]
    fn test_payload_status_string() {
        let payload: AvailabilityPayload =
            serde_json::from_value(serde_json::json!({ "status": "registered" })).unwrap();
        let result = payload.into_result("foo.co.ke").unwrap();
        assert_eq!(result.status, AvailabilityStatus::Taken);
        assert_eq!(result.domain, "foo.co.ke");
    }

    #[test]
    fn test_payload_without_status_is_structural_error() {
        let payload: AvailabilityPayload = serde_json::from_value(serde_json::json!({})).unwrap();
        let err = payload.into_result("foo.co.ke").unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_envelope_accepts_error_alias() {
        let envelope: ApiEnvelope<serde_json::Value> =
            serde_json::from_value(serde_json::json!({ "success": false, "error": "down" }))
                .unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.message.as_deref(), Some("down"));
    }

    #[test]
    fn test_client_trims_base_url() {
        let config = SearchConfig::default().with_api_base_url("http://localhost:9999/api/");
        let client = RegistrarClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9999/api");
        assert_eq!(client.url("/pricing/ke"), "http://localhost:9999/api/pricing/ke");
    }
}
