//! The .ke extension catalog.
//!
//! The catalog is static apart from pricing, which is filled in after
//! construction by [`Catalog::load_pricing`]. Readers always get a cloned
//! snapshot, so a pricing update never changes a list that is already on
//! screen.

use crate::pricing::{normalize_extension, PricingFetcher};
use crate::types::{ExtensionDescriptor, PricingRecord};
use futures::future::join_all;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Second-level and top-level extensions offered by the Kenyan registry.
pub fn kenya_extensions() -> Vec<ExtensionDescriptor> {
    vec![
        ExtensionDescriptor::new(
            ".co.ke",
            "Companies and businesses",
            true,
            "business",
            "Open to all",
        ),
        ExtensionDescriptor::new(
            ".ke",
            "Short national domain",
            true,
            "general",
            "Open to all",
        ),
        ExtensionDescriptor::new(
            ".me.ke",
            "Personal sites, blogs and portfolios",
            true,
            "personal",
            "Individuals",
        ),
        ExtensionDescriptor::new(
            ".or.ke",
            "Non-profit organisations",
            false,
            "nonprofit",
            "Registered NGOs, CBOs and societies",
        ),
        ExtensionDescriptor::new(
            ".ne.ke",
            "Network and infrastructure providers",
            false,
            "network",
            "Licensed network operators",
        ),
        ExtensionDescriptor::new(
            ".info.ke",
            "Information resources",
            false,
            "general",
            "Open to all",
        ),
        ExtensionDescriptor::new(
            ".mobi.ke",
            "Mobile-first content and services",
            false,
            "general",
            "Open to all",
        ),
        ExtensionDescriptor::new(
            ".ac.ke",
            "Universities and colleges",
            false,
            "education",
            "Accredited institutions of higher learning",
        ),
        ExtensionDescriptor::new(
            ".sc.ke",
            "Primary and secondary schools",
            false,
            "education",
            "Registered schools",
        ),
        ExtensionDescriptor::new(
            ".go.ke",
            "Government of Kenya",
            false,
            "government",
            "Government ministries, departments and agencies",
        ),
    ]
}

/// Ordered extension catalog with late-bound pricing.
#[derive(Debug)]
pub struct Catalog {
    extensions: RwLock<Vec<ExtensionDescriptor>>,
}

impl Catalog {
    /// Catalog with the Kenyan registry's extensions.
    pub fn kenya() -> Self {
        Self::from_descriptors(kenya_extensions())
    }

    /// Catalog from arbitrary descriptors. Extensions are normalised to a
    /// lower-case, dot-prefixed form and duplicates after the first dropped.
    pub fn from_descriptors(descriptors: Vec<ExtensionDescriptor>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let extensions = descriptors
            .into_iter()
            .filter_map(|mut d| {
                let key = normalize_extension(&d.ext);
                if key.is_empty() || !seen.insert(key.clone()) {
                    return None;
                }
                d.ext = format!(".{}", key);
                Some(d)
            })
            .collect();

        Self {
            extensions: RwLock::new(extensions),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ExtensionDescriptor>> {
        self.extensions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ExtensionDescriptor>> {
        self.extensions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Catalog order snapshot.
    pub fn snapshot(&self) -> Vec<ExtensionDescriptor> {
        self.read().clone()
    }

    /// Popular extensions first, then the rest; catalog order within each group.
    pub fn search_order(&self) -> Vec<ExtensionDescriptor> {
        let mut extensions = self.snapshot();
        // stable: keeps catalog order inside each group
        extensions.sort_by_key(|d| !d.popular);
        extensions
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, extension: &str) -> Option<ExtensionDescriptor> {
        let key = normalize_extension(extension);
        self.read().iter().find(|d| d.key() == key).cloned()
    }

    /// Strip one trailing known extension from a lower-cased query.
    ///
    /// The longest matching extension wins, so `shop.co.ke` loses `.co.ke`
    /// rather than `.ke`.
    pub fn strip_known_extension<'a>(&self, query: &'a str) -> &'a str {
        let extensions = self.read();
        let longest = extensions
            .iter()
            .filter(|d| query.ends_with(d.ext.as_str()))
            .map(|d| d.ext.len())
            .max();

        match longest {
            Some(len) => &query[..query.len() - len],
            None => query,
        }
    }

    /// Attach a price table to an extension. Returns false if it is not in the catalog.
    pub fn set_pricing(&self, extension: &str, pricing: PricingRecord) -> bool {
        let key = normalize_extension(extension);
        let mut extensions = self.write();
        match extensions.iter_mut().find(|d| d.key() == key) {
            Some(descriptor) => {
                descriptor.pricing = Some(pricing);
                true
            }
            None => false,
        }
    }

    /// Fetch pricing for every extension concurrently and attach what arrives.
    ///
    /// Returns the number of extensions that now have pricing. Extensions
    /// whose lookup failed keep whatever they had before.
    pub async fn load_pricing(&self, fetcher: &PricingFetcher) -> usize {
        let keys: Vec<String> = self.read().iter().map(|d| d.key().to_string()).collect();
        let lookups = keys.iter().map(|key| fetcher.get_pricing(key));
        let records = join_all(lookups).await;

        let mut loaded = 0;
        for (key, record) in keys.iter().zip(records) {
            if let Some(record) = record {
                if self.set_pricing(key, record) {
                    loaded += 1;
                }
            }
        }

        tracing::debug!(loaded, total = keys.len(), "catalog pricing loaded");
        loaded
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::kenya()
    }
}
