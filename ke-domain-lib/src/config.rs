//! Configuration file parsing and management.
//!
//! Settings come from TOML files and `KE_*` environment variables and are
//! layered onto [`SearchConfig`] with this precedence, highest first:
//! CLI flags, environment, local file, global file, XDG file, defaults.

use crate::error::DomainSearchError;
use crate::types::{ExtensionDescriptor, SearchConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Registrar API settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,

    /// Cache lifetimes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,

    /// Search box behaviour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchSection>,

    /// Replacement extension catalog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<ExtensionEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ApiConfig {
    /// Base URL, e.g. "https://api.example.ke/api"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Per-request timeout, e.g. "15s"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing_ttl: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_ttl: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SearchSection {
    /// Debounce delay, e.g. "300ms"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_pricing: Option<bool>,
}

/// One `[[extensions]]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtensionEntry {
    pub ext: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub popular: bool,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub eligibility: String,
}

impl From<&ExtensionEntry> for ExtensionDescriptor {
    fn from(entry: &ExtensionEntry) -> Self {
        ExtensionDescriptor::new(
            &entry.ext,
            &entry.description,
            entry.popular,
            &entry.category,
            &entry.eligibility,
        )
    }
}

impl FileConfig {
    /// Layer this file's settings onto `config`. Unset fields are left alone.
    ///
    /// Values are assumed validated; anything unparseable is skipped.
    pub fn apply_to(&self, mut config: SearchConfig) -> SearchConfig {
        if let Some(api) = &self.api {
            if let Some(url) = &api.base_url {
                config = config.with_api_base_url(url.clone());
            }
            if let Some(timeout) = api.timeout.as_deref().and_then(parse_duration_string) {
                config = config.with_request_timeout(timeout);
            }
        }

        if let Some(cache) = &self.cache {
            if let Some(ttl) = cache.default_ttl.as_deref().and_then(parse_duration_string) {
                config = config.with_default_ttl(ttl);
            }
            if let Some(ttl) = cache.pricing_ttl.as_deref().and_then(parse_duration_string) {
                config = config.with_pricing_ttl(ttl);
            }
            if let Some(ttl) = cache
                .availability_ttl
                .as_deref()
                .and_then(parse_duration_string)
            {
                config = config.with_availability_ttl(ttl);
            }
        }

        if let Some(search) = &self.search {
            if let Some(debounce) = search.debounce.as_deref().and_then(parse_duration_string) {
                config = config.with_debounce(debounce);
            }
            if let Some(include) = search.include_pricing {
                config = config.with_include_pricing(include);
            }
        }

        config
    }

    /// Catalog override from `[[extensions]]`, if any.
    pub fn extension_descriptors(&self) -> Option<Vec<ExtensionDescriptor>> {
        self.extensions
            .as_ref()
            .map(|entries| entries.iter().map(ExtensionDescriptor::from).collect())
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to log which files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load and validate a specific configuration file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, DomainSearchError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DomainSearchError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            DomainSearchError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            DomainSearchError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;

        if self.verbose {
            tracing::info!(path = %path.display(), "loaded configuration file");
        }

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// Files that exist but fail to load are reported and skipped.
    pub fn discover_and_load(&self) -> Result<FileConfig, DomainSearchError> {
        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        let mut merged = FileConfig::default();
        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => merged = self.merge_configs(merged, config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring configuration file")
                }
            }
        }

        Ok(merged)
    }

    /// Local configuration in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./ke-domain.toml", "./.ke-domain.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Global configuration in the home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".ke-domain.toml", "ke-domain.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// `$XDG_CONFIG_HOME/ke-domain/config.toml`, falling back to `~/.config`.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("ke-domain").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations field by field; `higher` wins.
    ///
    /// An `[[extensions]]` list replaces the lower one wholesale.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            api: match (lower.api, higher.api) {
                (Some(lower), Some(higher)) => Some(ApiConfig {
                    base_url: higher.base_url.or(lower.base_url),
                    timeout: higher.timeout.or(lower.timeout),
                }),
                (lower, higher) => higher.or(lower),
            },
            cache: match (lower.cache, higher.cache) {
                (Some(lower), Some(higher)) => Some(CacheConfig {
                    default_ttl: higher.default_ttl.or(lower.default_ttl),
                    pricing_ttl: higher.pricing_ttl.or(lower.pricing_ttl),
                    availability_ttl: higher.availability_ttl.or(lower.availability_ttl),
                }),
                (lower, higher) => higher.or(lower),
            },
            search: match (lower.search, higher.search) {
                (Some(lower), Some(higher)) => Some(SearchSection {
                    debounce: higher.debounce.or(lower.debounce),
                    include_pricing: higher.include_pricing.or(lower.include_pricing),
                }),
                (lower, higher) => higher.or(lower),
            },
            extensions: higher.extensions.or(lower.extensions),
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), DomainSearchError> {
        if let Some(api) = &config.api {
            if let Some(url) = &api.base_url {
                validate_base_url(url)?;
            }
            validate_duration("api.timeout", api.timeout.as_deref())?;
        }

        if let Some(cache) = &config.cache {
            validate_duration("cache.default_ttl", cache.default_ttl.as_deref())?;
            validate_duration("cache.pricing_ttl", cache.pricing_ttl.as_deref())?;
            validate_duration("cache.availability_ttl", cache.availability_ttl.as_deref())?;
        }

        if let Some(search) = &config.search {
            validate_duration("search.debounce", search.debounce.as_deref())?;
        }

        if let Some(extensions) = &config.extensions {
            if extensions.is_empty() {
                return Err(DomainSearchError::config(
                    "[[extensions]] must list at least one extension",
                ));
            }
            for entry in extensions {
                let ext = entry.ext.trim().trim_start_matches('.');
                let valid = !ext.is_empty()
                    && ext.split('.').all(|label| {
                        !label.is_empty()
                            && label
                                .chars()
                                .all(|c| c.is_ascii_alphanumeric() || c == '-')
                    });
                if !valid {
                    return Err(DomainSearchError::config(format!(
                        "Invalid extension '{}' in [[extensions]]",
                        entry.ext
                    )));
                }
            }
        }

        Ok(())
    }
}

fn validate_base_url(url: &str) -> Result<(), DomainSearchError> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(DomainSearchError::config(format!(
            "Invalid API base URL '{}'. It must start with http:// or https://",
            url
        )))
    }
}

fn validate_duration(field: &str, value: Option<&str>) -> Result<(), DomainSearchError> {
    match value {
        Some(raw) if parse_duration_string(raw).is_none() => {
            Err(DomainSearchError::config(format!(
                "Invalid duration '{}' for {}. Use a non-zero value like '300ms', '15s', '2m'",
                raw, field
            )))
        }
        _ => Ok(()),
    }
}

/// Environment variable configuration that mirrors CLI options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub api_url: Option<String>,
    pub timeout: Option<Duration>,
    pub debounce: Option<Duration>,
    pub include_pricing: Option<bool>,
    pub config: Option<String>,
}

impl EnvConfig {
    /// Layer environment settings onto `config`.
    pub fn apply_to(&self, mut config: SearchConfig) -> SearchConfig {
        if let Some(url) = &self.api_url {
            config = config.with_api_base_url(url.clone());
        }
        if let Some(timeout) = self.timeout {
            config = config.with_request_timeout(timeout);
        }
        if let Some(debounce) = self.debounce {
            config = config.with_debounce(debounce);
        }
        if let Some(include) = self.include_pricing {
            config = config.with_include_pricing(include);
        }
        config
    }
}

/// Load configuration from `KE_*` environment variables.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config(verbose: bool) -> EnvConfig {
    load_env_with(verbose, |name| env::var(name).ok())
}

fn load_env_with(verbose: bool, var: impl Fn(&str) -> Option<String>) -> EnvConfig {
    let mut env_config = EnvConfig::default();

    if let Some(url) = var("KE_API_URL") {
        match validate_base_url(&url) {
            Ok(()) => {
                if verbose {
                    tracing::info!(value = %url, "using KE_API_URL");
                }
                env_config.api_url = Some(url.trim().to_string());
            }
            Err(_) => tracing::warn!(value = %url, "invalid KE_API_URL, expected http(s) URL"),
        }
    }

    for (name, slot) in [
        ("KE_TIMEOUT", &mut env_config.timeout),
        ("KE_DEBOUNCE", &mut env_config.debounce),
    ] {
        if let Some(raw) = var(name) {
            match parse_duration_string(&raw) {
                Some(duration) => {
                    if verbose {
                        tracing::info!(name, value = %raw, "using environment override");
                    }
                    *slot = Some(duration);
                }
                None => tracing::warn!(
                    name,
                    value = %raw,
                    "invalid duration, use a format like '300ms', '15s', '2m'"
                ),
            }
        }
    }

    if let Some(raw) = var("KE_INCLUDE_PRICING") {
        match parse_bool(&raw) {
            Some(value) => env_config.include_pricing = Some(value),
            None => tracing::warn!(value = %raw, "invalid KE_INCLUDE_PRICING, use true/false"),
        }
    }

    if let Some(path) = var("KE_CONFIG") {
        if !path.trim().is_empty() {
            env_config.config = Some(path);
        }
    }

    env_config
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a duration like "300ms", "5s", "2m" or bare seconds.
///
/// Zero durations are rejected.
pub fn parse_duration_string(raw: &str) -> Option<Duration> {
    let raw = raw.trim().to_lowercase();

    let duration = if let Some(ms) = raw.strip_suffix("ms") {
        Duration::from_millis(ms.trim().parse().ok()?)
    } else if let Some(secs) = raw.strip_suffix('s') {
        Duration::from_secs(secs.trim().parse().ok()?)
    } else if let Some(mins) = raw.strip_suffix('m') {
        Duration::from_secs(mins.trim().parse::<u64>().ok()?.checked_mul(60)?)
    } else {
        Duration::from_secs(raw.parse().ok()?)
    };

    (!duration.is_zero()).then_some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_parse_duration_string() {
        assert_eq!(parse_duration_string("300ms"), Some(Duration::from_millis(300)));
        assert_eq!(parse_duration_string("15s"), Some(Duration::from_secs(15)));
        assert_eq!(parse_duration_string("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration_string(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration_string("0s"), None);
        assert_eq!(parse_duration_string("soon"), None);
    }

    #[test]
    fn test_load_valid_config() {
        let temp_file = write_config(
            r#"
[api]
base_url = "https://api.example.ke/api"
timeout = "10s"

[cache]
pricing_ttl = "30m"

[search]
debounce = "250ms"
include_pricing = false

[[extensions]]
ext = ".co.ke"
description = "Companies"
popular = true

[[extensions]]
ext = "or.ke"
"#,
        );

        let manager = ConfigManager::new(false);
        let config = manager.load_file(temp_file.path()).unwrap();

        let search = config.apply_to(SearchConfig::default());
        assert_eq!(search.api_base_url, "https://api.example.ke/api");
        assert_eq!(search.request_timeout, Duration::from_secs(10));
        assert_eq!(search.pricing_ttl, Duration::from_secs(30 * 60));
        assert_eq!(search.availability_ttl, Duration::from_secs(120));
        assert_eq!(search.debounce, Duration::from_millis(250));
        assert!(!search.include_pricing);

        let extensions = config.extension_descriptors().unwrap();
        assert_eq!(extensions.len(), 2);
        assert!(extensions[0].popular);
        assert_eq!(extensions[1].ext, "or.ke");
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let temp_file = write_config("[api]\ntimeout = \"forever\"\n");
        let result = ConfigManager::new(false).load_file(temp_file.path());
        assert!(matches!(result, Err(DomainSearchError::Config { .. })));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let temp_file = write_config("[api]\nbase_url = \"ftp://registry.ke\"\n");
        assert!(ConfigManager::new(false).load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_invalid_extension_rejected() {
        let temp_file = write_config("[[extensions]]\next = \"co ke\"\n");
        assert!(ConfigManager::new(false).load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigManager::new(false).load_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(DomainSearchError::File { .. })));
    }

    #[test]
    fn test_merge_configs() {
        let manager = ConfigManager::new(false);

        let lower = FileConfig {
            api: Some(ApiConfig {
                base_url: Some("http://lower".to_string()),
                timeout: Some("5s".to_string()),
            }),
            search: Some(SearchSection {
                debounce: Some("500ms".to_string()),
                include_pricing: None,
            }),
            ..Default::default()
        };

        let higher = FileConfig {
            api: Some(ApiConfig {
                base_url: Some("http://higher".to_string()),
                timeout: None,
            }),
            ..Default::default()
        };

        let merged = manager.merge_configs(lower, higher);
        let api = merged.api.unwrap();

        assert_eq!(api.base_url.as_deref(), Some("http://higher")); // Higher wins
        assert_eq!(api.timeout.as_deref(), Some("5s")); // Lower preserved
        assert_eq!(merged.search.unwrap().debounce.as_deref(), Some("500ms"));
    }

    #[test]
    fn test_env_config() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("KE_API_URL", "https://api.example.ke"),
            ("KE_TIMEOUT", "20s"),
            ("KE_DEBOUNCE", "not-a-duration"),
            ("KE_INCLUDE_PRICING", "no"),
        ]);
        let env_config = load_env_with(false, |name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(env_config.api_url.as_deref(), Some("https://api.example.ke"));
        assert_eq!(env_config.timeout, Some(Duration::from_secs(20)));
        assert_eq!(env_config.debounce, None);
        assert_eq!(env_config.include_pricing, Some(false));

        let config = env_config.apply_to(SearchConfig::default());
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert!(!config.include_pricing);
    }
}
