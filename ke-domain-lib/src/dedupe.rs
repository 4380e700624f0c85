//! In-flight request deduplication.
//!
//! [`RequestDeduplicator`] keeps a registry of pending operations keyed by a
//! request key. A caller that arrives while an operation for its key is
//! still pending joins that operation instead of starting a second network
//! call. The registry entry is removed as soon as the operation settles, on
//! success, failure or panic, so a later call starts fresh.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type SharedOp<T> = Shared<BoxFuture<'static, T>>;
type Registry<T> = Arc<Mutex<HashMap<String, Flight<T>>>>;

/// Whether a key currently has an operation in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    Idle,
    Pending,
}

/// A registered operation.
///
/// `id` tells generations apart so a settling operation never removes a
/// newer entry that reused its key.
struct Flight<T: Clone> {
    id: u64,
    op: SharedOp<T>,
}

impl<T: Clone> Flight<T> {
    fn is_settled(&self) -> bool {
        self.op.peek().is_some()
    }
}

/// Removes the registry entry when the wrapped operation finishes or unwinds.
struct SettleGuard<T: Clone> {
    registry: Registry<T>,
    key: String,
    id: u64,
}

impl<T: Clone> Drop for SettleGuard<T> {
    fn drop(&mut self) {
        let mut flights = lock(&self.registry);
        if flights.get(&self.key).is_some_and(|f| f.id == self.id) {
            flights.remove(&self.key);
        }
    }
}

fn lock<T: Clone>(registry: &Registry<T>) -> MutexGuard<'_, HashMap<String, Flight<T>>> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

/// Single-flight registry for operations producing `T`.
pub struct RequestDeduplicator<T: Clone> {
    flights: Registry<T>,
    next_id: AtomicU64,
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `factory`'s operation for `key`, or join the one already pending.
    ///
    /// `factory` is only invoked when no operation for `key` is in flight.
    /// It is called with the registry locked, so it must only build the
    /// future, not drive it.
    pub async fn dedupe<F, Fut>(&self, key: &str, factory: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let op = {
            let mut flights = lock(&self.flights);

            match flights.get(key) {
                Some(flight) if !flight.is_settled() => {
                    tracing::debug!(key, "joining in-flight request");
                    flight.op.clone()
                }
                _ => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let guard = SettleGuard {
                        registry: Arc::clone(&self.flights),
                        key: key.to_string(),
                        id,
                    };
                    let operation = factory();
                    let op = async move {
                        let _guard = guard;
                        operation.await
                    }
                    .boxed()
                    .shared();

                    flights.insert(
                        key.to_string(),
                        Flight {
                            id,
                            op: op.clone(),
                        },
                    );
                    op
                }
            }
        };

        op.await
    }

    pub fn state(&self, key: &str) -> FlightState {
        match lock(&self.flights).get(key) {
            Some(flight) if !flight.is_settled() => FlightState::Pending,
            _ => FlightState::Idle,
        }
    }

    /// Number of keys with an operation still pending.
    pub fn in_flight(&self) -> usize {
        lock(&self.flights)
            .values()
            .filter(|f| !f.is_settled())
            .count()
    }
}

impl<T> Default for RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> std::fmt::Debug for RequestDeduplicator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = lock(&self.flights).keys().cloned().collect();
        f.debug_struct("RequestDeduplicator")
            .field("in_flight", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_invocation() {
        let dedupe: RequestDeduplicator<u32> = RequestDeduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let call = || {
            let calls = Arc::clone(&calls);
            dedupe.dedupe("pricing:co.ke", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                42
            })
        };

        let (a, b, c) = tokio::join!(call(), call(), call());

        assert_eq!((a, b, c), (42, 42, 42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedupe.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_settled_key_starts_fresh() {
        let dedupe: RequestDeduplicator<usize> = RequestDeduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for expected in 1..=3 {
            let calls = Arc::clone(&calls);
            let value = dedupe
                .dedupe("k", move || async move { calls.fetch_add(1, Ordering::SeqCst) + 1 })
                .await;
            assert_eq!(value, expected);
            assert_eq!(dedupe.state("k"), FlightState::Idle);
        }
    }

    #[tokio::test]
    async fn test_failure_also_clears_registry() {
        let dedupe: RequestDeduplicator<Result<u32, String>> = RequestDeduplicator::new();

        let first = dedupe
            .dedupe("k", || async { Err("boom".to_string()) })
            .await;
        assert!(first.is_err());
        assert_eq!(dedupe.in_flight(), 0);

        let second = dedupe.dedupe("k", || async { Ok(1) }).await;
        assert_eq!(second, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_do_not_share() {
        let dedupe: RequestDeduplicator<&'static str> = RequestDeduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |key: &'static str| {
            let calls = Arc::clone(&calls);
            dedupe.dedupe(key, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                key
            })
        };

        let (a, b) = tokio::join!(run("a"), run("b"));
        assert_eq!((a, b), ("a", "b"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_reports_pending() {
        let dedupe = Arc::new(RequestDeduplicator::<u8>::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<u8>();

        let handle = {
            let dedupe = Arc::clone(&dedupe);
            tokio::spawn(async move {
                dedupe
                    .dedupe("slow", move || async move { rx.await.unwrap_or(0) })
                    .await
            })
        };

        tokio::task::yield_now().await;
        assert_eq!(dedupe.state("slow"), FlightState::Pending);
        assert_eq!(dedupe.in_flight(), 1);

        tx.send(9).unwrap();
        assert_eq!(handle.await.unwrap(), 9);
        assert_eq!(dedupe.state("slow"), FlightState::Idle);
    }

    #[test]
    fn test_joiner_drives_abandoned_request() {
        use tokio_test::{assert_pending, assert_ready_eq, task};

        let dedupe: RequestDeduplicator<u8> = RequestDeduplicator::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<u8>();

        let mut first = task::spawn(dedupe.dedupe("k", move || async move {
            rx.await.unwrap_or(0)
        }));
        assert_pending!(first.poll());
        drop(first);
        assert_eq!(dedupe.state("k"), FlightState::Pending);

        // The factory is not invoked; the pending operation is joined.
        let mut second = task::spawn(dedupe.dedupe("k", || async { 0 }));
        assert_pending!(second.poll());

        tx.send(7).unwrap();
        assert!(second.is_woken());
        assert_ready_eq!(second.poll(), 7);
        assert_eq!(dedupe.state("k"), FlightState::Idle);
    }
}
