//! Collapse concurrent requests for the same key into one execution.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};

type Flight<T> = Shared<BoxFuture<'static, T>>;

/// A table of in-flight futures keyed by `K`.
///
/// The first caller for a key starts the work, later callers for the same
/// key await the same shared future until it completes. Once completed the
/// key is released, so the next call starts a fresh execution.
pub struct SingleFlight<K, T: Clone> {
    in_flight: Mutex<HashMap<K, Flight<T>>>,
}

impl<K, T: Clone> Debug for SingleFlight<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.len())
            .finish()
    }
}

impl<K, T: Clone> Default for SingleFlight<K, T> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, T: Clone> SingleFlight<K, T> {
    /// Number of keys with an execution in progress.
    pub fn len(&self) -> usize {
        self.in_flight
            .lock()
            .expect("single flight mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the execution for `key`, starting it with `start` if none is in
    /// flight.
    ///
    /// `start` is only invoked by the caller that initiates the execution.
    pub async fn run(&self, key: K, start: impl FnOnce() -> BoxFuture<'static, T>) -> T {
        let flight = {
            let mut in_flight = self.in_flight.lock().expect("single flight mutex poisoned");
            in_flight
                .entry(key.clone())
                .or_insert_with(|| start().shared())
                .clone()
        };

        let output = flight.clone().await;

        let mut in_flight = self.in_flight.lock().expect("single flight mutex poisoned");
        if in_flight
            .get(&key)
            .is_some_and(|current| current.ptr_eq(&flight))
        {
            in_flight.remove(&key);
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn counting_start(
        counter: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce() -> BoxFuture<'static, u32> + use<> {
        let counter = Arc::clone(counter);
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                value
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn concurrent_runs_share_one_execution() {
        let flights = SingleFlight::<u32, u32>::new();
        let executions = Arc::new(AtomicUsize::new(0));

        let (a, b, c) = tokio::join!(
            flights.run(1, counting_start(&executions, 10)),
            flights.run(1, counting_start(&executions, 20)),
            flights.run(1, counting_start(&executions, 30)),
        );

        assert_eq!((a, b, c), (10, 10, 10));
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert!(flights.is_empty());
    }

    #[tokio::test]
    async fn different_keys_run_independently() {
        let flights = SingleFlight::<u32, u32>::new();
        let executions = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            flights.run(1, counting_start(&executions, 10)),
            flights.run(2, counting_start(&executions, 20)),
        );

        assert_eq!((a, b), (10, 20));
        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn completed_key_runs_again() {
        let flights = SingleFlight::<u32, u32>::new();
        let executions = Arc::new(AtomicUsize::new(0));

        assert_eq!(flights.run(1, counting_start(&executions, 10)).await, 10);
        assert_eq!(flights.run(1, counting_start(&executions, 20)).await, 20);
        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }
}
