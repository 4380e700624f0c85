//! Debounced search session.
//!
//! The orchestrator owns the visible search state and moves it through
//! `Idle → Debouncing → Searching → Resolved | Errored`. Every call to
//! [`SearchOrchestrator::input`] starts a new cycle; a search only publishes
//! its outcome if its cycle is still the current one and the query it ran
//! for still matches the input. Superseded network calls are not cancelled,
//! they finish in the background and warm the cache.
//!
//! Methods that schedule work must be called from within a tokio runtime.

use crate::suggest::SuggestionGenerator;
use crate::types::{SearchConfig, Suggestion};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchPhase {
    #[default]
    Idle,
    Debouncing,
    Searching,
    Resolved,
    Errored,
}

/// Everything a front end needs to render the search box and result list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub phase: SearchPhase,
    /// Current input, trimmed
    pub query: String,
    /// Skeleton while searching, ranked list once resolved
    pub suggestions: Vec<Suggestion>,
    /// User-facing message when errored
    pub error: Option<String>,
    pub resolved_at: Option<Instant>,
}

impl SearchState {
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, SearchPhase::Debouncing | SearchPhase::Searching)
    }
}

#[derive(Debug)]
struct Inner {
    generator: SuggestionGenerator,
    debounce: Duration,
    min_len: usize,
    freshness: Duration,
    state: watch::Sender<SearchState>,
    cycle: AtomicU64,
    debounce_task: Mutex<Option<JoinHandle<()>>>,
}

/// Debounce state machine over a [`SuggestionGenerator`].
#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    inner: Arc<Inner>,
}

impl SearchOrchestrator {
    pub fn new(generator: SuggestionGenerator, config: &SearchConfig) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            inner: Arc::new(Inner {
                generator,
                debounce: config.debounce,
                min_len: config.min_query_len,
                freshness: config.result_freshness,
                state,
                cycle: AtomicU64::new(0),
                debounce_task: Mutex::new(None),
            }),
        }
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    /// Handle a keystroke: the full current text of the search box.
    ///
    /// Queries shorter than the minimum length reset to `Idle`. Anything
    /// else (re)starts the debounce timer.
    pub fn input(&self, query: &str) {
        let query = query.trim().to_string();
        let cycle = self.begin_cycle();

        if query.chars().count() < self.inner.min_len {
            self.inner.state.send_replace(SearchState {
                query,
                ..SearchState::default()
            });
            return;
        }

        self.inner.state.send_modify(|s| {
            s.phase = SearchPhase::Debouncing;
            s.query = query.clone();
            s.error = None;
        });

        let this = self.clone();
        let deadline = Instant::now() + self.inner.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            this.start_search(cycle, query);
        });
        *self.debounce_slot() = Some(handle);
    }

    /// Search the current query immediately, skipping the debounce.
    ///
    /// Returns false without doing anything when the query is too short or
    /// the same query already has fresh results.
    pub fn search_now(&self) -> bool {
        let (query, fresh) = {
            let state = self.inner.state.borrow();
            let fresh = state.phase == SearchPhase::Resolved
                && state
                    .resolved_at
                    .is_some_and(|at| at.elapsed() < self.inner.freshness);
            (state.query.clone(), fresh)
        };

        if query.chars().count() < self.inner.min_len {
            return false;
        }
        if fresh {
            tracing::debug!(query = %query, "results still fresh, not searching again");
            return false;
        }

        let cycle = self.begin_cycle();
        self.start_search(cycle, query);
        true
    }

    /// Reset to an empty `Idle` state and drop any pending debounce.
    pub fn clear(&self) {
        self.begin_cycle();
        self.inner.state.send_replace(SearchState::default());
    }

    fn debounce_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .debounce_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Abort the pending debounce and return the new cycle number.
    fn begin_cycle(&self) -> u64 {
        if let Some(handle) = self.debounce_slot().take() {
            handle.abort();
        }
        self.inner.cycle.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, cycle: u64) -> bool {
        self.inner.cycle.load(Ordering::SeqCst) == cycle
    }

    fn start_search(&self, cycle: u64, query: String) {
        let skeleton = self
            .inner
            .generator
            .skeleton(&query)
            .map(|(_, suggestions)| suggestions)
            .unwrap_or_default();

        let started = self.inner.state.send_if_modified(|s| {
            if !self.is_current(cycle) {
                return false;
            }
            s.phase = SearchPhase::Searching;
            s.query = query.clone();
            s.suggestions = skeleton;
            s.error = None;
            s.resolved_at = None;
            true
        });
        if !started {
            return;
        }

        tracing::debug!(query = %query, cycle, "search started");

        let generator = self.inner.generator.clone();
        let this = self.clone();
        tokio::spawn(async move {
            let search_query = query.clone();
            // Inner task so a panic in generation surfaces as a JoinError.
            let outcome =
                tokio::spawn(async move { generator.generate(&search_query).await }).await;
            this.finish(cycle, &query, outcome);
        });
    }

    fn finish(&self, cycle: u64, query: &str, outcome: Result<Vec<Suggestion>, JoinError>) {
        self.inner.state.send_if_modified(|s| {
            if !self.is_current(cycle) || s.query != query || s.phase != SearchPhase::Searching {
                tracing::debug!(query, cycle, "discarding stale search result");
                return false;
            }

            match outcome {
                Ok(suggestions) if !suggestions.is_empty() => {
                    s.phase = SearchPhase::Resolved;
                    s.suggestions = suggestions;
                    s.error = None;
                    s.resolved_at = Some(Instant::now());
                }
                Ok(_) => {
                    s.phase = SearchPhase::Errored;
                    s.suggestions.clear();
                    s.error = Some(format!("No suggestions could be generated for '{}'", query));
                }
                Err(e) => {
                    tracing::warn!(query, error = %e, "search task failed");
                    s.phase = SearchPhase::Errored;
                    s.suggestions.clear();
                    s.error = Some("Search failed, please try again".to_string());
                }
            }
            true
        });
    }
}
