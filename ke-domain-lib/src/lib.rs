//! # KE Domain Library
//!
//! Search-as-you-type domain suggestions for the Kenyan `.ke` namespace.
//!
//! A raw query is expanded across the extension catalog, availability is
//! checked in one batch (with per-domain fallback), and the results are
//! ranked available-first. Pricing and availability are cached with
//! separate TTLs and concurrent identical requests share one network call.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ke_domain_lib::{DomainSearch, SearchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SearchConfig::default().with_api_base_url("https://api.example.ke/api");
//!     let search = DomainSearch::new(config)?;
//!
//!     for suggestion in search.generate("mybrand").await {
//!         println!("{} - {:?}", suggestion.domain(), suggestion.available);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Components
//!
//! - **TtlCache**: lazily evicting key/value cache
//! - **RequestDeduplicator**: single-flight registry for in-flight requests
//! - **PricingFetcher** / **AvailabilityChecker**: network boundary, never fail
//! - **SuggestionGenerator**: skeleton first, then ranked results
//! - **SearchOrchestrator**: debounced search state machine

pub use availability::AvailabilityChecker;
pub use cache::{availability_key, pricing_key, CacheEntry, CachedValue, TtlCache, DEFAULT_TTL};
pub use catalog::{kenya_extensions, Catalog};
pub use client::RegistrarClient;
pub use config::{
    load_env_config, parse_duration_string, ConfigManager, EnvConfig, ExtensionEntry, FileConfig,
};
pub use dedupe::{FlightState, RequestDeduplicator};
pub use error::DomainSearchError;
pub use pipeline::{DomainSearch, PipelineState};
pub use pricing::{normalize_extension, PricingFetcher};
pub use search::{SearchOrchestrator, SearchPhase, SearchState};
pub use suggest::{rank, SuggestionBatch, SuggestionGenerator};
pub use types::{
    AvailabilityResult, AvailabilityStatus, CheckoutSelection, ExtensionDescriptor, PriceDisplay,
    PricingRecord, PricingSource, SearchConfig, Suggestion, TermLength,
};
pub use utils::normalize_domain;

mod availability;
mod cache;
mod catalog;
mod client;
mod config;
mod dedupe;
mod error;
mod pipeline;
mod pricing;
mod search;
mod suggest;
mod types;
mod utils;

pub type Result<T> = std::result::Result<T, DomainSearchError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        author: AUTHOR,
        extensions: kenya_extensions().len(),
    }
}

/// Information about the library build
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub author: &'static str,
    /// Size of the built-in extension catalog
    pub extensions: usize,
}
