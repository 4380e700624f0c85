//! Domain availability, single and batched.
//!
//! Availability is more volatile than pricing, so it is cached for a short
//! TTL. Only definite answers (`available` / `taken`) are cached; a failed
//! check is reported as `unknown` and retried next time.
//!
//! Batch policy: cached domains are answered locally, the rest go out in a
//! single batch request. When the batch endpoint fails, or leaves domains
//! out, those domains are checked one by one in parallel. Every requested
//! domain gets an entry in the result; a domain whose individual check also
//! failed is reported as `unknown`.

use crate::cache::{availability_key, CachedValue};
use crate::client::RegistrarClient;
use crate::error::DomainSearchError;
use crate::pipeline::PipelineState;
use crate::types::AvailabilityResult;
use crate::utils::{dedup_preserving_order, normalize_domain};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Checks and caches domain availability.
#[derive(Debug, Clone)]
pub struct AvailabilityChecker {
    client: RegistrarClient,
    state: Arc<PipelineState>,
    ttl: Duration,
}

impl AvailabilityChecker {
    pub fn new(client: RegistrarClient, state: Arc<PipelineState>, ttl: Duration) -> Self {
        Self { client, state, ttl }
    }

    /// Availability of one domain. Fails closed: any error yields `unknown`,
    /// for which `is_available()` is false.
    pub async fn check_one(&self, domain: &str) -> AvailabilityResult {
        match self.try_check_one(domain).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(domain, error = %e, "availability check failed");
                let domain = normalize_domain(domain)
                    .unwrap_or_else(|| domain.trim().to_ascii_lowercase());
                AvailabilityResult::unknown(domain)
            }
        }
    }

    /// Availability of many domains, keyed by normalised domain name.
    ///
    /// Invalid domain names are reported as `unknown` without a request.
    pub async fn check_batch(&self, domains: &[String]) -> HashMap<String, AvailabilityResult> {
        let mut results = HashMap::new();
        let mut valid = Vec::new();

        for domain in dedup_preserving_order(domains.iter().map(|d| d.trim().to_ascii_lowercase()))
        {
            match normalize_domain(&domain) {
                Some(normalized) => valid.push(normalized),
                None => {
                    results.insert(domain.clone(), AvailabilityResult::unknown(domain));
                }
            }
        }
        let valid = dedup_preserving_order(valid);

        let mut uncached = Vec::new();
        for domain in valid {
            match self.cached(&domain) {
                Some(hit) => {
                    results.insert(domain, hit);
                }
                None => uncached.push(domain),
            }
        }

        if uncached.is_empty() {
            return results;
        }

        tracing::debug!(
            cached = results.len(),
            uncached = uncached.len(),
            "checking availability batch"
        );

        let missing = match self.fetch_batch(&uncached).await {
            Ok(batch) => {
                let mut missing = Vec::new();
                for domain in uncached {
                    match batch.get(&domain) {
                        Some(result) if !result.is_unknown() => {
                            results.insert(domain, result.clone());
                        }
                        _ => missing.push(domain),
                    }
                }
                missing
            }
            Err(e) => {
                tracing::warn!(error = %e, "batch availability failed, falling back to single checks");
                uncached
            }
        };

        if !missing.is_empty() {
            let checks = missing.iter().map(|domain| self.try_check_one(domain));
            for (domain, outcome) in missing.iter().zip(join_all(checks).await) {
                let result = outcome.unwrap_or_else(|e| {
                    tracing::warn!(domain = %domain, error = %e, "fallback availability check failed");
                    AvailabilityResult::unknown(domain.clone())
                });
                results.insert(domain.clone(), result);
            }
        }

        results
    }

    fn cached(&self, domain: &str) -> Option<AvailabilityResult> {
        match self.state.cache.get(&availability_key(domain)) {
            Some(CachedValue::Availability(result)) => {
                tracing::debug!(domain, "availability cache hit");
                Some(result)
            }
            _ => None,
        }
    }

    async fn try_check_one(&self, domain: &str) -> Result<AvailabilityResult, DomainSearchError> {
        let domain = normalize_domain(domain)
            .ok_or_else(|| DomainSearchError::invalid_query(domain, "not a valid domain name"))?;

        if let Some(hit) = self.cached(&domain) {
            return Ok(hit);
        }

        let client = self.client.clone();
        let state = Arc::clone(&self.state);
        let ttl = self.ttl;
        let key = availability_key(&domain);

        self.state
            .availability_flights
            .dedupe(&key, move || async move {
                let result = client.check_availability(&domain).await?;
                if !result.is_unknown() {
                    state.cache.set(
                        availability_key(&result.domain),
                        CachedValue::Availability(result.clone()),
                        Some(ttl),
                    );
                }
                Ok::<_, DomainSearchError>(result)
            })
            .await
    }

    async fn fetch_batch(
        &self,
        domains: &[String],
    ) -> Result<HashMap<String, AvailabilityResult>, DomainSearchError> {
        let mut sorted = domains.to_vec();
        sorted.sort();
        let key = format!("batch:{}", sorted.join(","));

        let client = self.client.clone();
        let state = Arc::clone(&self.state);
        let ttl = self.ttl;
        let domains = domains.to_vec();

        self.state
            .batch_flights
            .dedupe(&key, move || async move {
                let batch = client.check_batch(&domains).await?;
                for result in batch.values().filter(|r| !r.is_unknown()) {
                    state.cache.set(
                        availability_key(&result.domain),
                        CachedValue::Availability(result.clone()),
                        Some(ttl),
                    );
                }
                Ok::<_, DomainSearchError>(batch)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AvailabilityStatus, SearchConfig};

    fn checker() -> AvailabilityChecker {
        // Invalid names never reach the network, so the address is unused.
        let config = SearchConfig::default().with_api_base_url("http://127.0.0.1:9");
        let client = RegistrarClient::new(&config).unwrap();
        AvailabilityChecker::new(
            client,
            Arc::new(PipelineState::default()),
            config.availability_ttl,
        )
    }

    #[tokio::test]
    async fn test_invalid_domain_keyed_alike_on_both_paths() {
        let checker = checker();

        let single = checker.check_one("  Not A Domain ").await;
        assert_eq!(single.domain, "not a domain");
        assert_eq!(single.status, AvailabilityStatus::Unknown);

        let batch = checker.check_batch(&["  Not A Domain ".to_string()]).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch["not a domain"].domain, single.domain);
        assert!(checker.state.cache.is_empty());
    }
}
