//! Per-extension price tables.
//!
//! Lookups go cache → in-flight registry → network. Failures come back as
//! `None` and are never cached, so the next lookup tries again.

use crate::cache::{pricing_key, CachedValue};
use crate::client::RegistrarClient;
use crate::pipeline::PipelineState;
use crate::types::PricingRecord;
use std::sync::Arc;
use std::time::Duration;

/// Fetches and caches price tables.
#[derive(Debug, Clone)]
pub struct PricingFetcher {
    client: RegistrarClient,
    state: Arc<PipelineState>,
    ttl: Duration,
}

/// `".CO.KE"` → `"co.ke"`.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

impl PricingFetcher {
    pub fn new(client: RegistrarClient, state: Arc<PipelineState>, ttl: Duration) -> Self {
        Self { client, state, ttl }
    }

    /// Price table for `extension` (with or without leading dot).
    ///
    /// Never fails: transport and structural errors are logged and reported
    /// as `None`.
    pub async fn get_pricing(&self, extension: &str) -> Option<PricingRecord> {
        let extension = normalize_extension(extension);
        if extension.is_empty() {
            return None;
        }

        let key = pricing_key(&extension);
        if let Some(CachedValue::Pricing(record)) = self.state.cache.get(&key) {
            tracing::debug!(extension = %extension, "pricing cache hit");
            return Some(record);
        }

        let client = self.client.clone();
        let state = Arc::clone(&self.state);
        let ttl = self.ttl;

        self.state
            .pricing_flights
            .dedupe(&key, move || async move {
                match client.fetch_pricing(&extension).await {
                    Ok(record) => {
                        state.cache.set(
                            pricing_key(&extension),
                            CachedValue::Pricing(record.clone()),
                            Some(ttl),
                        );
                        Some(record)
                    }
                    Err(e) => {
                        tracing::warn!(extension = %extension, error = %e, "pricing lookup failed");
                        None
                    }
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".co.ke"), "co.ke");
        assert_eq!(normalize_extension("  .ME.KE "), "me.ke");
        assert_eq!(normalize_extension("ke"), "ke");
        assert_eq!(normalize_extension("."), "");
    }
}
