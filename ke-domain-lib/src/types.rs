//! Core data types for the search pipeline.
//!
//! Pricing tables, availability results, extension descriptors, suggestions
//! and the runtime configuration all live here so every component shares one
//! vocabulary.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Registration term offered by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TermLength {
    OneYear,
    TwoYears,
    ThreeYears,
    FiveYears,
    TenYears,
}

impl TermLength {
    pub const ALL: [TermLength; 5] = [
        TermLength::OneYear,
        TermLength::TwoYears,
        TermLength::ThreeYears,
        TermLength::FiveYears,
        TermLength::TenYears,
    ];

    /// Number of years covered by this term.
    pub fn years(self) -> u8 {
        match self {
            TermLength::OneYear => 1,
            TermLength::TwoYears => 2,
            TermLength::ThreeYears => 3,
            TermLength::FiveYears => 5,
            TermLength::TenYears => 10,
        }
    }

    /// Key used by the registrar API (`"1_year"`, `"2_years"`, ...).
    pub fn key(self) -> &'static str {
        match self {
            TermLength::OneYear => "1_year",
            TermLength::TwoYears => "2_years",
            TermLength::ThreeYears => "3_years",
            TermLength::FiveYears => "5_years",
            TermLength::TenYears => "10_years",
        }
    }

    /// Parse an API key. Singular and plural spellings are both accepted.
    pub fn from_key(key: &str) -> Option<Self> {
        let years = key
            .trim()
            .strip_suffix("_years")
            .or_else(|| key.trim().strip_suffix("_year"))?;
        match years.parse::<u8>().ok()? {
            1 => Some(TermLength::OneYear),
            2 => Some(TermLength::TwoYears),
            3 => Some(TermLength::ThreeYears),
            5 => Some(TermLength::FiveYears),
            10 => Some(TermLength::TenYears),
            _ => None,
        }
    }
}

/// Where a price table came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingSource {
    #[default]
    Live,
    Estimated,
}

/// Per-extension price table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRecord {
    /// ISO currency code, "KES" unless the API says otherwise
    #[serde(default = "default_currency")]
    pub currency: String,

    /// One-off setup fee
    #[serde(default, alias = "setupFee")]
    pub setup_fee: f64,

    /// Registration price per term
    #[serde(
        default,
        alias = "registrationByTerm",
        alias = "registration",
        serialize_with = "serialize_terms",
        deserialize_with = "deserialize_terms"
    )]
    pub registration_by_term: BTreeMap<TermLength, f64>,

    /// Renewal price per term
    #[serde(
        default,
        alias = "renewalByTerm",
        alias = "renewal",
        serialize_with = "serialize_terms",
        deserialize_with = "deserialize_terms"
    )]
    pub renewal_by_term: BTreeMap<TermLength, f64>,

    #[serde(default)]
    pub source: PricingSource,
}

fn default_currency() -> String {
    "KES".to_string()
}

fn serialize_terms<S: Serializer>(
    terms: &BTreeMap<TermLength, f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(terms.iter().map(|(term, price)| (term.key(), price)))
}

/// Accepts numeric or numeric-string prices and silently skips unknown terms.
fn deserialize_terms<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<TermLength, f64>, D::Error> {
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    let mut terms = BTreeMap::new();

    for (key, value) in raw.unwrap_or_default() {
        let Some(term) = TermLength::from_key(&key) else {
            continue;
        };
        let price = match &value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        if let Some(price) = price {
            terms.insert(term, price);
        }
    }

    Ok(terms)
}

impl PricingRecord {
    /// Build a record with just a 1-year registration price.
    pub fn with_first_year(currency: impl Into<String>, price: f64, source: PricingSource) -> Self {
        Self {
            currency: currency.into(),
            setup_fee: 0.0,
            registration_by_term: BTreeMap::from([(TermLength::OneYear, price)]),
            renewal_by_term: BTreeMap::new(),
            source,
        }
    }

    /// Registration price for a term, if the registry publishes a usable one.
    ///
    /// Zero, negative and non-finite values count as missing.
    pub fn registration_price(&self, term: TermLength) -> Option<f64> {
        self.registration_by_term
            .get(&term)
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
    }

    /// Renewal price for a term, same rules as [`registration_price`](Self::registration_price).
    pub fn renewal_price(&self, term: TermLength) -> Option<f64> {
        self.renewal_by_term
            .get(&term)
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
    }

    /// What the storefront should show for this record.
    pub fn display_price(&self) -> PriceDisplay {
        match self.registration_price(TermLength::OneYear) {
            Some(amount) => PriceDisplay::Amount {
                currency: self.currency.clone(),
                amount,
                estimated: self.source == PricingSource::Estimated,
            },
            None => PriceDisplay::ContactForPricing,
        }
    }
}

/// Display state of a first-year price.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceDisplay {
    Amount {
        currency: String,
        amount: f64,
        estimated: bool,
    },
    ContactForPricing,
}

impl PriceDisplay {
    /// Display state for an optional record; no record means contact for pricing.
    pub fn for_pricing(pricing: Option<&PricingRecord>) -> Self {
        pricing
            .map(PricingRecord::display_price)
            .unwrap_or(PriceDisplay::ContactForPricing)
    }
}

impl fmt::Display for PriceDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceDisplay::Amount {
                currency,
                amount,
                estimated,
            } => {
                write!(f, "{} {:.2}/yr", currency, amount)?;
                if *estimated {
                    write!(f, " (est.)")?;
                }
                Ok(())
            }
            PriceDisplay::ContactForPricing => write!(f, "Contact for pricing"),
        }
    }
}

/// Outcome of an availability lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityStatus {
    Available,
    Taken,
    /// The check failed or the registrar did not report this domain
    Unknown,
}

impl AvailabilityStatus {
    /// Map a registrar status string.
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "available" | "free" => AvailabilityStatus::Available,
            "taken" | "registered" | "unavailable" | "reserved" => AvailabilityStatus::Taken,
            _ => AvailabilityStatus::Unknown,
        }
    }
}

impl From<bool> for AvailabilityStatus {
    fn from(available: bool) -> Self {
        if available {
            AvailabilityStatus::Available
        } else {
            AvailabilityStatus::Taken
        }
    }
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailabilityStatus::Available => write!(f, "available"),
            AvailabilityStatus::Taken => write!(f, "taken"),
            AvailabilityStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Availability of one fully qualified domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub domain: String,
    pub status: AvailabilityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingRecord>,
}

impl AvailabilityResult {
    /// A failed or missing check. Fails closed: not available.
    pub fn unknown(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            status: AvailabilityStatus::Unknown,
            pricing: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == AvailabilityStatus::Available
    }

    pub fn is_unknown(&self) -> bool {
        self.status == AvailabilityStatus::Unknown
    }
}

/// One entry of the extension catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    /// Extension including the leading dot, e.g. ".co.ke"
    pub ext: String,
    pub description: String,
    #[serde(default)]
    pub popular: bool,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub eligibility: String,
    /// Filled in after construction by the pricing fetcher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingRecord>,
}

impl ExtensionDescriptor {
    pub fn new(
        ext: &str,
        description: &str,
        popular: bool,
        category: &str,
        eligibility: &str,
    ) -> Self {
        Self {
            ext: ext.to_string(),
            description: description.to_string(),
            popular,
            category: category.to_string(),
            eligibility: eligibility.to_string(),
            pricing: None,
        }
    }

    /// Extension without its leading dot, as used in API paths.
    pub fn key(&self) -> &str {
        self.ext.trim_start_matches('.')
    }
}

/// A candidate domain shown in the result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub base_label: String,
    pub extension: ExtensionDescriptor,
    /// `None` until the availability check for this cycle resolves
    pub available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingRecord>,
    pub is_loading: bool,
}

impl Suggestion {
    /// Placeholder rendered before availability is known.
    pub fn skeleton(base_label: &str, extension: &ExtensionDescriptor) -> Self {
        Self {
            base_label: base_label.to_string(),
            extension: extension.clone(),
            available: None,
            pricing: extension.pricing.clone(),
            is_loading: true,
        }
    }

    /// Fully qualified domain name.
    pub fn domain(&self) -> String {
        format!("{}{}", self.base_label, self.extension.ext)
    }

    /// First-year registration price, if one is published.
    pub fn price(&self) -> Option<f64> {
        self.pricing
            .as_ref()
            .and_then(|p| p.registration_price(TermLength::OneYear))
    }

    pub fn price_display(&self) -> PriceDisplay {
        PriceDisplay::for_pricing(self.pricing.as_ref())
    }

    /// Apply the outcome of an availability check. Unknown fails closed.
    pub(crate) fn resolve(&mut self, result: Option<&AvailabilityResult>) {
        let available = result.map(AvailabilityResult::is_available).unwrap_or(false);
        self.available = Some(available);
        if let Some(pricing) = result.and_then(|r| r.pricing.clone()) {
            self.pricing = Some(pricing);
        }
        self.is_loading = false;
    }

    /// Hand-off value for the checkout flow. Only available domains qualify.
    pub fn checkout_selection(&self) -> Option<CheckoutSelection> {
        if self.available != Some(true) {
            return None;
        }
        Some(CheckoutSelection {
            domain: self.domain(),
            price: self.price(),
            extension: self.extension.ext.clone(),
            pricing: self.pricing.clone(),
        })
    }
}

/// What the search page hands to the registrar-selection/checkout flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSelection {
    pub domain: String,
    pub price: Option<f64>,
    pub extension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingRecord>,
}

/// Runtime configuration for the pipeline.
///
/// Built from defaults, config files, environment and CLI flags; see
/// [`crate::config`] for the file and environment layers.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Base URL of the registrar API, without trailing slash
    pub api_base_url: String,

    /// Fixed timeout applied to every network call. Default: 15 seconds
    pub request_timeout: Duration,

    /// TTL used by `TtlCache::set` when none is given. Default: 5 minutes
    pub default_ttl: Duration,

    /// TTL for cached price tables. Default: 10 minutes
    pub pricing_ttl: Duration,

    /// TTL for cached availability. Default: 2 minutes
    pub availability_ttl: Duration,

    /// Quiet period before a typed query is searched. Default: 300ms
    pub debounce: Duration,

    /// Shortest searchable label. Default: 2
    pub min_query_len: usize,

    /// Ask the availability endpoint to include pricing. Default: true
    pub include_pricing: bool,

    /// How long a resolved result counts as fresh for "search now"
    pub result_freshness: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            request_timeout: Duration::from_secs(15),
            default_ttl: Duration::from_secs(5 * 60),
            pricing_ttl: Duration::from_secs(10 * 60),
            availability_ttl: Duration::from_secs(2 * 60),
            debounce: Duration::from_millis(300),
            min_query_len: 2,
            include_pricing: true,
            result_freshness: Duration::from_secs(2 * 60),
        }
    }
}

impl SearchConfig {
    /// Point the pipeline at a registrar API. A trailing slash is dropped.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_pricing_ttl(mut self, ttl: Duration) -> Self {
        self.pricing_ttl = ttl;
        self
    }

    /// Also moves the result freshness window, which tracks availability.
    pub fn with_availability_ttl(mut self, ttl: Duration) -> Self {
        self.availability_ttl = ttl;
        self.result_freshness = ttl;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_include_pricing(mut self, enabled: bool) -> Self {
        self.include_pricing = enabled;
        self
    }

    pub fn with_result_freshness(mut self, freshness: Duration) -> Self {
        self.result_freshness = freshness;
        self
    }
}
