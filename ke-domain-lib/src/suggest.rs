//! Query → ranked domain suggestions.
//!
//! A search cycle publishes twice on the generator's watch channel: first a
//! skeleton list with every entry loading, sent before any network call is
//! awaited, then the resolved and ranked list. Callers that only await
//! [`SuggestionGenerator::generate`] see just the resolved list.

use crate::availability::AvailabilityChecker;
use crate::catalog::Catalog;
use crate::error::DomainSearchError;
use crate::types::Suggestion;
use crate::utils::MAX_LABEL_LEN;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::watch;

/// One publication on the suggestion channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionBatch {
    /// Normalised label the suggestions were built for
    pub label: String,
    pub suggestions: Vec<Suggestion>,
    /// False for the skeleton, true once availability is applied
    pub resolved: bool,
    /// Which `generate` call produced this batch. Increases per call; a
    /// batch from an older call is never published after a newer one.
    pub sequence: u64,
}

/// Expands a query across the extension catalog and resolves availability.
#[derive(Debug, Clone)]
pub struct SuggestionGenerator {
    catalog: Arc<Catalog>,
    availability: AvailabilityChecker,
    min_len: usize,
    updates: Arc<watch::Sender<SuggestionBatch>>,
    sequence: Arc<AtomicU64>,
}

impl SuggestionGenerator {
    pub fn new(catalog: Arc<Catalog>, availability: AvailabilityChecker, min_len: usize) -> Self {
        let (updates, _) = watch::channel(SuggestionBatch::default());
        Self {
            catalog,
            availability,
            min_len,
            updates: Arc::new(updates),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Receiver for skeleton and resolved publications.
    pub fn subscribe(&self) -> watch::Receiver<SuggestionBatch> {
        self.updates.subscribe()
    }

    /// Turn raw input into a searchable label.
    ///
    /// Lower-cases, strips one trailing known extension, drops everything
    /// outside `[a-z0-9-]` and trims hyphens from the ends. Labels longer
    /// than a DNS label allows are rejected, since no candidate could be
    /// checked.
    pub fn normalize_query(&self, raw: &str) -> Result<String, DomainSearchError> {
        let lowered = raw.trim().to_lowercase();
        let stripped = self.catalog.strip_known_extension(&lowered);

        let label: String = stripped
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
            .collect();
        let label = label.trim_matches('-');

        if label.chars().count() < self.min_len {
            return Err(DomainSearchError::invalid_query(
                raw,
                format!("needs at least {} letters or digits", self.min_len),
            ));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(DomainSearchError::invalid_query(
                raw,
                format!("must be at most {} characters", MAX_LABEL_LEN),
            ));
        }

        Ok(label.to_string())
    }

    /// Loading placeholders for every extension, in search order.
    ///
    /// Returns `None` when the query does not normalise to a usable label.
    pub fn skeleton(&self, raw: &str) -> Option<(String, Vec<Suggestion>)> {
        let label = self.normalize_query(raw).ok()?;
        let suggestions = self
            .catalog
            .search_order()
            .iter()
            .map(|ext| Suggestion::skeleton(&label, ext))
            .collect();
        Some((label, suggestions))
    }

    /// Ranked suggestions for `raw`. Empty when the query is rejected.
    ///
    /// The skeleton is published before the availability batch is awaited.
    /// Per-domain failures show up as unavailable entries, never as an error.
    pub async fn generate(&self, raw: &str) -> Vec<Suggestion> {
        let Some((label, mut suggestions)) = self.skeleton(raw) else {
            tracing::debug!(query = raw, "query rejected");
            return Vec::new();
        };

        let sequence = self.sequence.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        self.publish(SuggestionBatch {
            label: label.clone(),
            suggestions: suggestions.clone(),
            resolved: false,
            sequence,
        });

        let domains: Vec<String> = suggestions.iter().map(Suggestion::domain).collect();
        let results = self.availability.check_batch(&domains).await;

        for suggestion in &mut suggestions {
            suggestion.resolve(results.get(&suggestion.domain()));
        }
        rank(&mut suggestions);

        tracing::debug!(
            label = %label,
            available = suggestions.iter().filter(|s| s.available == Some(true)).count(),
            total = suggestions.len(),
            "suggestions resolved"
        );

        self.publish(SuggestionBatch {
            label,
            suggestions: suggestions.clone(),
            resolved: true,
            sequence,
        });

        suggestions
    }

    /// Publish unless a newer `generate` call has already published.
    fn publish(&self, batch: SuggestionBatch) {
        self.updates.send_if_modified(|current| {
            if batch.sequence < current.sequence {
                tracing::debug!(label = %batch.label, "dropping superseded suggestions");
                return false;
            }
            *current = batch;
            true
        });
    }
}

/// Available first, then popular extensions, then cheapest first-year price.
/// Suggestions without a price sort after priced ones. Stable, so catalog
/// order breaks remaining ties.
pub fn rank(suggestions: &mut [Suggestion]) {
    suggestions.sort_by(compare);
}

fn compare(a: &Suggestion, b: &Suggestion) -> Ordering {
    let available = |s: &Suggestion| s.available == Some(true);
    let price = |s: &Suggestion| s.price().unwrap_or(f64::INFINITY);

    available(b)
        .cmp(&available(a))
        .then_with(|| b.extension.popular.cmp(&a.extension.popular))
        .then_with(|| price(a).total_cmp(&price(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RegistrarClient;
    use crate::pipeline::PipelineState;
    use crate::types::{ExtensionDescriptor, PricingRecord, PricingSource, SearchConfig};

    fn generator(catalog: Catalog) -> SuggestionGenerator {
        let config = SearchConfig::default();
        let state = Arc::new(PipelineState::default());
        let client = RegistrarClient::new(&config).unwrap();
        let availability = AvailabilityChecker::new(client, state, config.availability_ttl);
        SuggestionGenerator::new(Arc::new(catalog), availability, 2)
    }

    fn suggestion(ext: &str, popular: bool, available: bool, price: Option<f64>) -> Suggestion {
        let mut descriptor = ExtensionDescriptor::new(ext, "", popular, "", "");
        descriptor.pricing =
            price.map(|p| PricingRecord::with_first_year("KES", p, PricingSource::Live));
        let mut s = Suggestion::skeleton("brand", &descriptor);
        s.available = Some(available);
        s.is_loading = false;
        s
    }

    #[test]
    fn test_normalize_query() {
        let gen = generator(Catalog::kenya());
        assert_eq!(gen.normalize_query("MyBrand").unwrap(), "mybrand");
        assert_eq!(gen.normalize_query("my brand!").unwrap(), "mybrand");
        assert_eq!(gen.normalize_query("shop.co.ke").unwrap(), "shop");
        assert_eq!(gen.normalize_query("  my-shop.KE ").unwrap(), "my-shop");
        assert_eq!(gen.normalize_query("-ab-").unwrap(), "ab");
    }

    #[test]
    fn test_normalize_query_rejects_short() {
        let gen = generator(Catalog::kenya());
        assert!(gen.normalize_query("a").is_err());
        assert!(gen.normalize_query("a!").is_err());
        assert!(gen.normalize_query(".co.ke").is_err());
        assert!(gen.normalize_query("").is_err());
    }

    #[test]
    fn test_normalize_query_rejects_overlong_label() {
        let gen = generator(Catalog::kenya());
        assert_eq!(gen.normalize_query(&"a".repeat(63)).unwrap().len(), 63);
        assert!(gen.normalize_query(&"a".repeat(64)).is_err());
        assert!(gen.normalize_query(&format!("{}.co.ke", "b".repeat(70))).is_err());
    }

    #[tokio::test]
    async fn test_generate_overlong_label_is_empty() {
        let gen = generator(Catalog::kenya());
        let mut rx = gen.subscribe();
        assert!(gen.generate(&"a".repeat(70)).await.is_empty());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_skeleton_covers_catalog() {
        let catalog = Catalog::kenya();
        let size = catalog.len();
        let gen = generator(catalog);

        let (label, skeleton) = gen.skeleton("ab").unwrap();
        assert_eq!(label, "ab");
        assert_eq!(skeleton.len(), size);
        assert!(skeleton.iter().all(|s| s.is_loading && s.available.is_none()));

        // popular group first
        let first_plain = skeleton.iter().position(|s| !s.extension.popular).unwrap();
        assert!(skeleton[first_plain..].iter().all(|s| !s.extension.popular));
    }

    #[test]
    fn test_rank_order() {
        let mut list = vec![
            suggestion(".co.ke", true, false, Some(1000.0)),
            suggestion(".or.ke", false, true, Some(900.0)),
            suggestion(".me.ke", true, true, None),
            suggestion(".ke", true, true, Some(3000.0)),
            suggestion(".ac.ke", false, true, Some(500.0)),
        ];
        rank(&mut list);

        let order: Vec<String> = list.iter().map(|s| s.extension.ext.clone()).collect();
        assert_eq!(order, vec![".ke", ".me.ke", ".ac.ke", ".or.ke", ".co.ke"]);
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let mut list = vec![
            suggestion(".sc.ke", false, false, None),
            suggestion(".go.ke", false, false, None),
        ];
        rank(&mut list);
        assert_eq!(list[0].extension.ext, ".sc.ke");
    }

    #[test]
    fn test_superseded_batch_not_published() {
        let gen = generator(Catalog::kenya());
        let mut rx = gen.subscribe();
        let batch = |label: &str, sequence| SuggestionBatch {
            label: label.to_string(),
            suggestions: Vec::new(),
            resolved: true,
            sequence,
        };

        gen.publish(batch("newer", 2));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().label, "newer");

        gen.publish(batch("older", 1));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(rx.borrow().label, "newer");
    }

    #[tokio::test]
    async fn test_generate_rejected_query_is_empty() {
        let gen = generator(Catalog::kenya());
        let mut rx = gen.subscribe();
        assert!(gen.generate("x").await.is_empty());
        assert!(!rx.has_changed().unwrap());
    }
}
