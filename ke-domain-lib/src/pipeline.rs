//! Shared pipeline state and the top-level [`DomainSearch`] handle.
//!
//! All caching and in-flight bookkeeping lives in one [`PipelineState`]
//! that is passed explicitly to every fetcher. Two `DomainSearch` values
//! built from the same state share one cache; values built separately are
//! fully isolated, which is what tests want.

use crate::availability::AvailabilityChecker;
use crate::cache::{CachedValue, TtlCache};
use crate::catalog::Catalog;
use crate::client::RegistrarClient;
use crate::dedupe::RequestDeduplicator;
use crate::error::DomainSearchError;
use crate::pricing::PricingFetcher;
use crate::search::SearchOrchestrator;
use crate::suggest::SuggestionGenerator;
use crate::types::{AvailabilityResult, PricingRecord, SearchConfig, Suggestion};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type AvailabilityOutcome = Result<AvailabilityResult, DomainSearchError>;
type BatchOutcome = Result<HashMap<String, AvailabilityResult>, DomainSearchError>;

/// Cache plus the in-flight registries for each request kind.
#[derive(Debug)]
pub struct PipelineState {
    pub cache: TtlCache<CachedValue>,
    pub(crate) pricing_flights: RequestDeduplicator<Option<PricingRecord>>,
    pub(crate) availability_flights: RequestDeduplicator<AvailabilityOutcome>,
    pub(crate) batch_flights: RequestDeduplicator<BatchOutcome>,
}

impl PipelineState {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            cache: TtlCache::with_default_ttl(default_ttl),
            pricing_flights: RequestDeduplicator::new(),
            availability_flights: RequestDeduplicator::new(),
            batch_flights: RequestDeduplicator::new(),
        }
    }

    /// Requests currently pending across all registries.
    pub fn in_flight(&self) -> usize {
        self.pricing_flights.in_flight()
            + self.availability_flights.in_flight()
            + self.batch_flights.in_flight()
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new(crate::cache::DEFAULT_TTL)
    }
}

/// Entry point wiring the client, fetchers, catalog and generator together.
///
/// # Example
///
/// ```rust,no_run
/// use ke_domain_lib::{DomainSearch, SearchConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let search = DomainSearch::new(SearchConfig::default())?;
///     search.load_catalog_pricing().await;
///
///     for suggestion in search.generate("mybrand").await {
///         println!("{} {:?} {}", suggestion.domain(), suggestion.available, suggestion.price_display());
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DomainSearch {
    config: SearchConfig,
    state: Arc<PipelineState>,
    catalog: Arc<Catalog>,
    pricing: PricingFetcher,
    availability: AvailabilityChecker,
    generator: SuggestionGenerator,
}

impl DomainSearch {
    /// Pipeline over the Kenyan catalog with fresh state.
    pub fn new(config: SearchConfig) -> Result<Self, DomainSearchError> {
        Self::with_catalog(config, Catalog::kenya())
    }

    /// Pipeline over a custom catalog with fresh state.
    pub fn with_catalog(config: SearchConfig, catalog: Catalog) -> Result<Self, DomainSearchError> {
        let state = Arc::new(PipelineState::new(config.default_ttl));
        Self::with_state(config, Arc::new(catalog), state)
    }

    /// Pipeline sharing an existing catalog and state.
    pub fn with_state(
        config: SearchConfig,
        catalog: Arc<Catalog>,
        state: Arc<PipelineState>,
    ) -> Result<Self, DomainSearchError> {
        if catalog.is_empty() {
            return Err(DomainSearchError::config("Extension catalog is empty"));
        }

        let client = RegistrarClient::new(&config)?;
        let pricing = PricingFetcher::new(client.clone(), Arc::clone(&state), config.pricing_ttl);
        let availability =
            AvailabilityChecker::new(client, Arc::clone(&state), config.availability_ttl);
        let generator = SuggestionGenerator::new(
            Arc::clone(&catalog),
            availability.clone(),
            config.min_query_len,
        );

        Ok(Self {
            config,
            state,
            catalog,
            pricing,
            availability,
            generator,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<PipelineState> {
        &self.state
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn pricing(&self) -> &PricingFetcher {
        &self.pricing
    }

    pub fn availability(&self) -> &AvailabilityChecker {
        &self.availability
    }

    pub fn generator(&self) -> &SuggestionGenerator {
        &self.generator
    }

    /// New debounced search session over this pipeline.
    pub fn orchestrator(&self) -> SearchOrchestrator {
        SearchOrchestrator::new(self.generator.clone(), &self.config)
    }

    /// Fill catalog pricing from the pricing endpoint. Returns how many
    /// extensions now carry a price table.
    pub async fn load_catalog_pricing(&self) -> usize {
        self.catalog.load_pricing(&self.pricing).await
    }

    pub async fn get_pricing(&self, extension: &str) -> Option<PricingRecord> {
        self.pricing.get_pricing(extension).await
    }

    pub async fn check_one(&self, domain: &str) -> AvailabilityResult {
        self.availability.check_one(domain).await
    }

    pub async fn check_batch(&self, domains: &[String]) -> HashMap<String, AvailabilityResult> {
        self.availability.check_batch(domains).await
    }

    /// Ranked suggestions for a raw query; empty if the query is rejected.
    pub async fn generate(&self, query: &str) -> Vec<Suggestion> {
        self.generator.generate(query).await
    }
}
