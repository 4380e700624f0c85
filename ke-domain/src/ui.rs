//! Terminal display logic for the ke-domain CLI.
//!
//! Colored suggestion lines, price tables, extension listings, the
//! spinner and summaries. Uses only the `console` crate.

use console::{pad_str, style, Alignment, Term};
use ke_domain_lib::{
    AvailabilityResult, AvailabilityStatus, ExtensionDescriptor, PriceDisplay, PricingRecord,
    SearchState, Suggestion, TermLength,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DOMAIN_WIDTH: usize = 28;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr so stdout stays clean.
///
/// Does nothing when stderr is not a terminal.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    pub fn start(message: String) -> Self {
        let running = Arc::new(AtomicBool::new(true));

        let handle = Term::stderr().is_term().then(|| {
            let running = Arc::clone(&running);
            tokio::spawn(async move {
                let term = Term::stderr();
                let mut idx = 0usize;
                while running.load(Ordering::Relaxed) {
                    let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                    let _ = term.clear_line();
                    let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                    idx += 1;
                    tokio::time::sleep(Duration::from_millis(80)).await;
                }
                let _ = term.clear_line();
            })
        });

        Self { running, handle }
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

pub fn print_header(label: &str, extension_count: usize) {
    println!(
        "{} {} {}",
        style("ke-domain").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "· {} across {} extension{}",
            label,
            extension_count,
            plural(extension_count)
        ))
        .dim(),
    );
    println!();
}

// ── Suggestions ──────────────────────────────────────────────────────────────

/// One suggestion: domain, status and first-year price.
pub fn print_suggestion(suggestion: &Suggestion) {
    let domain = suggestion.domain();
    let padded = pad_str(&domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));

    let status = match suggestion.available {
        _ if suggestion.is_loading => style("CHECKING ").dim(),
        Some(true) => style("AVAILABLE").green().bold(),
        Some(false) | None => style("TAKEN    ").red().bold(),
    };

    let popular = if suggestion.extension.popular {
        style("★").yellow().to_string()
    } else {
        " ".to_string()
    };

    println!(
        "  {} {}  {}  {}",
        popular,
        style(&padded).white(),
        status,
        format_price(&suggestion.price_display()),
    );
}

pub fn print_suggestions(suggestions: &[Suggestion]) {
    for suggestion in suggestions {
        print_suggestion(suggestion);
    }
}

/// Render an orchestrator state in interactive mode.
pub fn print_search_state(state: &SearchState) {
    use ke_domain_lib::SearchPhase;

    match state.phase {
        SearchPhase::Idle | SearchPhase::Debouncing => {}
        SearchPhase::Searching => {
            println!(
                "{} {}",
                style("Searching").cyan(),
                style(format!(
                    "'{}' across {} extension{}...",
                    state.query,
                    state.suggestions.len(),
                    plural(state.suggestions.len())
                ))
                .dim(),
            );
        }
        SearchPhase::Resolved => {
            print_suggestions(&state.suggestions);
            let available = state
                .suggestions
                .iter()
                .filter(|s| s.available == Some(true))
                .count();
            println!(
                "  {}",
                style(format!(
                    "{} of {} available",
                    available,
                    state.suggestions.len()
                ))
                .dim()
            );
            println!();
        }
        SearchPhase::Errored => {
            let message = state.error.as_deref().unwrap_or("Search failed");
            println!("{} {}", style("✗").red().bold(), style(message).red());
            println!();
        }
    }
}

// ── Availability ─────────────────────────────────────────────────────────────

pub fn print_availability(result: &AvailabilityResult) {
    let padded = pad_str(&result.domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));
    let status = match result.status {
        AvailabilityStatus::Available => style("AVAILABLE").green().bold(),
        AvailabilityStatus::Taken => style("TAKEN").red().bold(),
        AvailabilityStatus::Unknown => style("UNKNOWN").yellow(),
    };

    let price = result
        .pricing
        .as_ref()
        .map(|p| format!("  {}", format_price(&p.display_price())))
        .unwrap_or_default();

    println!("  {}  {}{}", style(&padded).white(), status, price);
}

// ── Pricing ──────────────────────────────────────────────────────────────────

/// Price table for one extension, or a contact line if none is published.
pub fn print_pricing(extension: &str, pricing: Option<&PricingRecord>) {
    println!("{}", style(format!(".{}", extension)).bold());

    let Some(pricing) = pricing else {
        println!("  {}", style("Contact for pricing").yellow());
        println!();
        return;
    };

    if pricing.setup_fee > 0.0 {
        println!(
            "  {} {} {:.2}",
            style("Setup fee").dim(),
            pricing.currency,
            pricing.setup_fee
        );
    }

    for term in TermLength::ALL {
        let registration = pricing.registration_price(term);
        let renewal = pricing.renewal_price(term);
        if registration.is_none() && renewal.is_none() {
            continue;
        }

        let cell = |price: Option<f64>| match price {
            Some(p) => format!("{} {:>10.2}", pricing.currency, p),
            None => format!("{:>14}", "-"),
        };
        println!(
            "  {:>2} yr{}  register {}  renew {}",
            term.years(),
            if term.years() == 1 { " " } else { "s" },
            cell(registration),
            cell(renewal),
        );
    }

    if pricing.registration_price(TermLength::OneYear).is_none() {
        println!("  {}", style("Contact for pricing").yellow());
    }
    println!();
}

// ── Extensions ───────────────────────────────────────────────────────────────

pub fn print_extensions(extensions: &[ExtensionDescriptor]) {
    println!();
    println!("{}", style("Available .ke extensions:").yellow().bold());
    println!();

    for ext in extensions {
        let marker = if ext.popular {
            style("★").yellow().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "  {} {}  {}",
            marker,
            style(format!("{:<10}", ext.ext)).green().bold(),
            ext.description,
        );
        if !ext.eligibility.is_empty() {
            println!(
                "    {}",
                style(format!("{:<10}  Eligibility: {}", "", ext.eligibility)).dim()
            );
        }
    }

    println!();
    println!("Use: ke-domain <name>");
}

// ── Summary ──────────────────────────────────────────────────────────────────

pub fn print_summary(total: usize, available: usize, duration: Duration) {
    println!();
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} suggestion{} in {:.1}s  {}  {}  {}  {}",
        style(total).bold(),
        plural(total),
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} available", available)).green(),
        style("|").dim(),
        style(format!("{} taken", total - available)).red(),
    );
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn format_price(price: &PriceDisplay) -> String {
    match price {
        PriceDisplay::Amount { estimated, .. } if *estimated => {
            style(price.to_string()).yellow().to_string()
        }
        PriceDisplay::Amount { .. } => style(price.to_string()).cyan().to_string(),
        PriceDisplay::ContactForPricing => style(price.to_string()).dim().to_string(),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
