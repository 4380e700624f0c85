//! KE Domain CLI Application
//!
//! Search, price and check `.ke` domain names from the terminal. A thin
//! front end over ke-domain-lib: one-shot searches, direct availability
//! and pricing lookups, and an interactive search-as-you-type mode.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use futures::future::join_all;
use ke_domain_lib::{
    load_env_config, parse_duration_string, AvailabilityResult, Catalog, ConfigManager,
    DomainSearch, ExtensionDescriptor, FileConfig, SearchConfig, SearchPhase, Suggestion,
};
use serde::Serialize;
use std::process;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for ke-domain
#[derive(Parser, Debug, Default)]
#[command(name = "ke-domain")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search, price and check .ke domain names")]
#[command(
    long_about = "Search, price and check .ke domain names.\n\nA query is expanded across every .ke extension, checked for availability in one batch, and ranked with available and popular extensions first."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Name to search for, e.g. "mybrand" or "mybrand.co.ke"
    #[arg(value_name = "QUERY", help_heading = "Search")]
    pub query: Option<String>,

    /// Check specific domains (comma-separated or multiple --check flags)
    #[arg(long = "check", value_name = "DOMAIN", value_delimiter = ',', action = clap::ArgAction::Append, help_heading = "Lookups")]
    pub check: Vec<String>,

    /// Show the price table for extensions (comma-separated or repeated)
    #[arg(long = "price", value_name = "EXT", value_delimiter = ',', action = clap::ArgAction::Append, help_heading = "Lookups")]
    pub price: Vec<String>,

    /// List the extension catalog and exit
    #[arg(long = "list-extensions", help_heading = "Lookups")]
    pub list_extensions: bool,

    /// Read queries from stdin as you type; blank line searches now, :q quits
    #[arg(short = 'i', long = "interactive", help_heading = "Search")]
    pub interactive: bool,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Registrar API base URL
    #[arg(long = "api-url", value_name = "URL", help_heading = "Configuration")]
    pub api_url: Option<String>,

    /// Per-request timeout, e.g. "10s"
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Configuration")]
    pub timeout: Option<String>,

    /// Use a specific config file instead of discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Do not request pricing with availability checks
    #[arg(long = "no-pricing", help_heading = "Configuration")]
    pub no_pricing: bool,

    /// Show debug logging on stderr
    #[arg(short = 'v', long = "verbose", help_heading = "Debugging")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Logging goes to stderr; `RUST_LOG` overrides the verbosity flag.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "ke_domain=debug,ke_domain_lib=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    // --list-extensions is self-contained, skip other validation
    if args.list_extensions {
        return Ok(());
    }

    let modes = [
        args.query.is_some(),
        !args.check.is_empty(),
        !args.price.is_empty(),
        args.interactive,
    ]
    .iter()
    .filter(|&&x| x)
    .count();

    if modes == 0 {
        return Err(
            "You must specify a QUERY, --check DOMAIN, --price EXT, or --interactive".to_string(),
        );
    }
    if modes > 1 {
        return Err(
            "Use only one of: QUERY, --check, --price, --interactive".to_string(),
        );
    }

    if args.interactive && args.json {
        return Err("Cannot use --json with --interactive".to_string());
    }

    if let Some(timeout) = &args.timeout {
        if parse_duration_string(timeout).is_none() {
            return Err(format!(
                "Invalid timeout '{}'. Use a format like '5s', '30s', '2m'",
                timeout
            ));
        }
    }

    if let Some(url) = &args.api_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("Invalid --api-url '{}': must be http(s)", url));
        }
    }

    Ok(())
}

/// Build the effective configuration with proper precedence.
///
/// 1. CLI arguments
/// 2. Environment variables (KE_*)
/// 3. Explicit config file (--config or KE_CONFIG), or discovered files:
///    ./ke-domain.toml, ~/.ke-domain.toml, ~/.config/ke-domain/config.toml
/// 4. Built-in defaults
fn build_config(
    args: &Args,
) -> Result<(SearchConfig, Option<Vec<ExtensionDescriptor>>), Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);
    let env_config = load_env_config(args.verbose);

    let explicit = args.config.clone().or_else(|| env_config.config.clone());
    let file_config = match explicit {
        Some(path) => {
            tracing::debug!(path = %path, "using explicit config file");
            config_manager
                .load_file(&path)
                .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?
        }
        None => config_manager.discover_and_load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "config discovery failed, using defaults");
            FileConfig::default()
        }),
    };

    let mut config = file_config.apply_to(SearchConfig::default());
    config = env_config.apply_to(config);
    config = apply_cli_args_to_config(config, args);

    Ok((config, file_config.extension_descriptors()))
}

/// CLI arguments override both environment variables and config files.
fn apply_cli_args_to_config(mut config: SearchConfig, args: &Args) -> SearchConfig {
    if let Some(url) = &args.api_url {
        config = config.with_api_base_url(url.clone());
    }
    if let Some(timeout) = args.timeout.as_deref().and_then(parse_duration_string) {
        config = config.with_request_timeout(timeout);
    }
    // Only override when the flag is passed; false would clobber config/env.
    if args.no_pricing {
        config = config.with_include_pricing(false);
    }
    config
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let (config, extensions) = build_config(&args)?;
    let catalog = match extensions {
        Some(descriptors) => Catalog::from_descriptors(descriptors),
        None => Catalog::kenya(),
    };

    tracing::debug!(api = %config.api_base_url, timeout = ?config.request_timeout, "configuration resolved");

    if args.list_extensions {
        return list_extensions(&catalog, args.json);
    }

    let search = DomainSearch::with_catalog(config, catalog)?;

    if !args.check.is_empty() {
        run_check(&search, &args.check, args.json).await
    } else if !args.price.is_empty() {
        run_price(&search, &args.price, args.json).await
    } else if args.interactive {
        run_interactive(&search).await
    } else if let Some(query) = &args.query {
        run_search(&search, query, args.json).await
    } else {
        Ok(())
    }
}

fn list_extensions(catalog: &Catalog, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let extensions = catalog.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&extensions)?);
    } else {
        ui::print_extensions(&extensions);
    }
    Ok(())
}

/// JSON shape of one suggestion.
#[derive(Debug, Serialize)]
struct SuggestionJson<'a> {
    domain: String,
    extension: &'a str,
    popular: bool,
    available: Option<bool>,
    price: Option<f64>,
    price_display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pricing: Option<&'a ke_domain_lib::PricingRecord>,
}

impl<'a> From<&'a Suggestion> for SuggestionJson<'a> {
    fn from(s: &'a Suggestion) -> Self {
        Self {
            domain: s.domain(),
            extension: &s.extension.ext,
            popular: s.extension.popular,
            available: s.available,
            price: s.price(),
            price_display: s.price_display().to_string(),
            pricing: s.pricing.as_ref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchJson<'a> {
    query: &'a str,
    label: &'a str,
    suggestions: Vec<SuggestionJson<'a>>,
}

/// One-shot search: load catalog pricing, generate, print.
async fn run_search(
    search: &DomainSearch,
    query: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let label = search.generator().normalize_query(query)?;
    let start = Instant::now();

    let spinner = (!json).then(|| {
        ui::Spinner::start(format!(
            "Searching {} across {} extensions...",
            label,
            search.catalog().len()
        ))
    });

    search.load_catalog_pricing().await;
    let suggestions = search.generate(query).await;

    if let Some(spinner) = spinner {
        spinner.stop().await;
    }

    if suggestions.is_empty() {
        return Err(format!("No suggestions could be generated for '{}'", query).into());
    }

    if json {
        let output = SearchJson {
            query,
            label: &label,
            suggestions: suggestions.iter().map(SuggestionJson::from).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    ui::print_header(&label, suggestions.len());
    ui::print_suggestions(&suggestions);
    let available = suggestions
        .iter()
        .filter(|s| s.available == Some(true))
        .count();
    ui::print_summary(suggestions.len(), available, start.elapsed());
    Ok(())
}

/// Availability for explicit domains, printed in input order.
async fn run_check(
    search: &DomainSearch,
    domains: &[String],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let results = search.check_batch(domains).await;

    let mut ordered: Vec<AvailabilityResult> = Vec::new();
    for domain in domains {
        let key = ke_domain_lib::normalize_domain(domain)
            .unwrap_or_else(|| domain.trim().to_ascii_lowercase());
        if ordered.iter().any(|r| r.domain == key) {
            continue;
        }
        let result = results
            .get(&key)
            .cloned()
            .unwrap_or_else(|| AvailabilityResult::unknown(key));
        ordered.push(result);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&ordered)?);
    } else {
        for result in &ordered {
            ui::print_availability(result);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct PriceJson {
    extension: String,
    pricing: Option<ke_domain_lib::PricingRecord>,
    price_display: String,
}

async fn run_price(
    search: &DomainSearch,
    extensions: &[String],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let lookups = extensions.iter().map(|ext| async move {
        let key = ke_domain_lib::normalize_extension(ext);
        let pricing = search.get_pricing(&key).await;
        (key, pricing)
    });
    let prices = join_all(lookups).await;

    if json {
        let output: Vec<PriceJson> = prices
            .into_iter()
            .map(|(extension, pricing)| PriceJson {
                price_display: ke_domain_lib::PriceDisplay::for_pricing(pricing.as_ref())
                    .to_string(),
                extension,
                pricing,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        for (extension, pricing) in &prices {
            ui::print_pricing(extension, pricing.as_ref());
        }
    }
    Ok(())
}

/// Interactive mode: each stdin line is the full text of the search box.
async fn run_interactive(search: &DomainSearch) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = search.orchestrator();
    let mut states = orchestrator.subscribe();

    println!(
        "{}",
        console::style("Type a name and press enter. Blank line searches now, :q quits.").dim()
    );

    let renderer = tokio::spawn(async move {
        let mut last: Option<(SearchPhase, String)> = None;
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            let key = (state.phase, state.query.clone());
            if last.as_ref() == Some(&key) {
                continue;
            }
            ui::print_search_state(&state);
            last = Some(key);
        }
    });

    let pricing = search.clone();
    tokio::spawn(async move {
        pricing.load_catalog_pricing().await;
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == ":q" {
            break;
        }
        if line.is_empty() {
            if !orchestrator.search_now() {
                tracing::debug!("nothing to search");
            }
        } else {
            orchestrator.input(line);
        }
    }

    // Piped input ends before the last search settles; wait for it.
    let mut states = orchestrator.subscribe();
    let budget = search.config().debounce + search.config().request_timeout * 2;
    if tokio::time::timeout(budget, states.wait_for(|s| !s.is_loading()))
        .await
        .is_err()
    {
        tracing::debug!(budget = ?budget, "last search still running at end of input");
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    renderer.abort();
    Ok(())
}
