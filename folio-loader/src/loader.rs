//! Batch loader implementation.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, join_all};
use tokio::sync::watch;

/// What a batch fetch function returns.
///
/// `Err` fails every key of the batch with the same error. `Ok` must hold one
/// entry per requested key, in request order.
pub type BatchResult<V, E> = Result<Vec<Result<V, E>>, E>;

type FetchFn<K, V, E> = dyn Fn(Vec<K>) -> BoxFuture<'static, BatchResult<V, E>> + Send + Sync;

type Outcome<V, E> = Arc<Vec<Result<V, LoadError<E>>>>;

/// Error delivered to a single `load` call.
#[derive(Debug, thiserror::Error)]
pub enum LoadError<E> {
    /// The fetch function reported an error for this key or for the batch.
    #[error("{0}")]
    Fetch(Arc<E>),

    /// The fetch function returned a different number of results than keys.
    #[error("bug in loader: fetch returned {results} results for {keys} keys")]
    ArityMismatch { keys: usize, results: usize },

    /// The fetch task ended without delivering results.
    #[error("batch fetch aborted before delivering results")]
    Aborted,
}

impl<E> Clone for LoadError<E> {
    fn clone(&self) -> Self {
        match self {
            LoadError::Fetch(e) => LoadError::Fetch(Arc::clone(e)),
            LoadError::ArityMismatch { keys, results } => LoadError::ArityMismatch {
                keys: *keys,
                results: *results,
            },
            LoadError::Aborted => LoadError::Aborted,
        }
    }
}

/// Batching window configuration.
#[derive(Debug, Clone, Copy)]
pub struct LoaderConfig {
    /// How long the first key of a batch waits for company.
    pub max_wait: Duration,
    /// Close the batch once it holds this many keys. `0` means unlimited.
    pub max_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(2),
            max_size: 0,
        }
    }
}

impl LoaderConfig {
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal state
// ─────────────────────────────────────────────────────────────────────────────

/// A key's position in a dispatched (or soon to be dispatched) batch.
struct Slot<V, E> {
    rx: watch::Receiver<Option<Outcome<V, E>>>,
    pos: usize,
}

impl<V, E> Clone for Slot<V, E> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            pos: self.pos,
        }
    }
}

struct Batch<K, V, E> {
    id: u64,
    keys: Vec<K>,
    tx: watch::Sender<Option<Outcome<V, E>>>,
}

struct State<K, V, E> {
    cache: HashMap<K, Slot<V, E>>,
    batch: Option<Batch<K, V, E>>,
    last_batch_id: u64,
}

struct Inner<K, V, E> {
    fetch: Box<FetchFn<K, V, E>>,
    config: LoaderConfig,
    state: Mutex<State<K, V, E>>,
}

impl<K, V, E> Inner<K, V, E> {
    fn lock(&self) -> MutexGuard<'_, State<K, V, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loader
// ─────────────────────────────────────────────────────────────────────────────

/// Batching, deduplicating loader.
///
/// Create one per request and drop it afterwards; the cache lives as long as
/// the loader. Cloning is cheap and clones share batches and cache.
pub struct Loader<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> Clone for Loader<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> fmt::Debug for Loader<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<K, V, E> Loader<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Creates a loader with a 2ms window and no size limit.
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BatchResult<V, E>> + Send + 'static,
    {
        Self::with_config(LoaderConfig::default(), fetch)
    }

    pub fn with_config<F, Fut>(config: LoaderConfig, fetch: F) -> Self
    where
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BatchResult<V, E>> + Send + 'static,
    {
        let fetch: Box<FetchFn<K, V, E>> = Box::new(move |keys| Box::pin(fetch(keys)));
        Self {
            inner: Arc::new(Inner {
                fetch,
                config,
                state: Mutex::new(State {
                    cache: HashMap::new(),
                    batch: None,
                    last_batch_id: 0,
                }),
            }),
        }
    }

    /// Loads one key, waiting for its batch to be fetched.
    pub async fn load(&self, key: K) -> Result<V, LoadError<E>> {
        let slot = self.register(key);
        resolve(slot).await
    }

    /// Loads many keys; results are positional.
    pub async fn load_many(&self, keys: Vec<K>) -> Vec<Result<V, LoadError<E>>> {
        let slots: Vec<_> = keys.into_iter().map(|key| self.register(key)).collect();
        join_all(slots.into_iter().map(resolve)).await
    }

    /// Loads many keys, failing with the first error if any key failed.
    pub async fn try_load_many(&self, keys: Vec<K>) -> Result<Vec<V>, LoadError<E>> {
        self.load_many(keys).await.into_iter().collect()
    }

    /// Seeds the cache with a known value. Keys already present are left alone.
    pub fn prime(&self, key: K, value: V) {
        let mut state = self.inner.lock();
        if state.cache.contains_key(&key) {
            return;
        }
        let (_tx, rx) = watch::channel(Some(Arc::new(vec![Ok(value)])));
        state.cache.insert(key, Slot { rx, pos: 0 });
    }

    /// Forgets a key so the next `load` fetches it again.
    pub fn clear(&self, key: &K) {
        self.inner.lock().cache.remove(key);
    }

    pub fn clear_all(&self) {
        self.inner.lock().cache.clear();
    }

    /// Finds or creates the cache slot for `key`, closing the batch when full.
    fn register(&self, key: K) -> Slot<V, E> {
        let (slot, full) = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;

            if let Some(slot) = state.cache.get(&key) {
                return slot.clone();
            }

            let last_batch_id = &mut state.last_batch_id;
            let batch = state.batch.get_or_insert_with(|| {
                *last_batch_id += 1;
                let (tx, _rx) = watch::channel(None);
                Batch {
                    id: *last_batch_id,
                    keys: Vec::new(),
                    tx,
                }
            });
            if batch.keys.is_empty() {
                self.spawn_timer(batch.id);
            }

            let slot = Slot {
                rx: batch.tx.subscribe(),
                pos: batch.keys.len(),
            };
            batch.keys.push(key.clone());

            let max_size = self.inner.config.max_size;
            let full = if max_size > 0 && batch.keys.len() >= max_size {
                state.batch.take()
            } else {
                None
            };

            state.cache.insert(key, slot.clone());
            (slot, full)
        };

        if let Some(batch) = full {
            dispatch(&self.inner, batch);
        }
        slot
    }

    fn spawn_timer(&self, batch_id: u64) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.config.max_wait).await;
            let batch = {
                let mut state = inner.lock();
                // Already closed by the size limit if the open batch is another one.
                let due = state.batch.as_ref().is_some_and(|b| b.id == batch_id);
                if due { state.batch.take() } else { None }
            };
            if let Some(batch) = batch {
                dispatch(&inner, batch);
            }
        });
    }
}

/// Runs the fetch function for a closed batch and publishes the outcome.
fn dispatch<K, V, E>(inner: &Arc<Inner<K, V, E>>, batch: Batch<K, V, E>)
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        let Batch { id, keys, tx } = batch;
        let count = keys.len();
        tracing::debug!(batch_id = id, keys = count, "dispatching loader batch");

        let result = (inner.fetch)(keys).await;
        tx.send_replace(Some(Arc::new(settle(count, result))));
    });
}

fn settle<V, E>(count: usize, result: BatchResult<V, E>) -> Vec<Result<V, LoadError<E>>> {
    match result {
        Err(e) => {
            let e = Arc::new(e);
            (0..count)
                .map(|_| Err(LoadError::Fetch(Arc::clone(&e))))
                .collect()
        }
        Ok(values) if values.len() != count => {
            tracing::error!(
                keys = count,
                results = values.len(),
                "loader fetch returned mismatched result count"
            );
            let err = LoadError::ArityMismatch {
                keys: count,
                results: values.len(),
            };
            (0..count).map(|_| Err(err.clone())).collect()
        }
        Ok(values) => values
            .into_iter()
            .map(|r| r.map_err(|e| LoadError::Fetch(Arc::new(e))))
            .collect(),
    }
}

async fn resolve<V, E>(slot: Slot<V, E>) -> Result<V, LoadError<E>>
where
    V: Clone,
{
    let Slot { mut rx, pos } = slot;
    let outcome = match rx.wait_for(Option::is_some).await {
        Ok(value) => (*value).clone(),
        Err(_) => return Err(LoadError::Aborted),
    };
    match outcome.as_ref().and_then(|results| results.get(pos)) {
        Some(result) => result.clone(),
        None => Err(LoadError::Aborted),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    type Calls = Arc<Mutex<Vec<Vec<i64>>>>;

    fn recording_loader(config: LoaderConfig) -> (Loader<i64, String, String>, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);
        let loader = Loader::with_config(config, move |keys: Vec<i64>| {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().unwrap().push(keys.clone());
                Ok(keys.into_iter().map(|k| Ok(format!("v{k}"))).collect())
            }
        });
        (loader, calls)
    }

    #[tokio::test]
    async fn test_single_load() {
        let (loader, calls) = recording_loader(LoaderConfig::default());
        assert_eq!(loader.load(7).await.unwrap(), "v7");
        assert_eq!(*calls.lock().unwrap(), vec![vec![7]]);
    }

    #[tokio::test]
    async fn test_concurrent_same_key_fetches_once() {
        let (loader, calls) = recording_loader(LoaderConfig::default());

        let (a, b, c, d, e) = tokio::join!(
            loader.load(1),
            loader.load(1),
            loader.load(1),
            loader.load(1),
            loader.load(1)
        );
        for r in [a, b, c, d, e] {
            assert_eq!(r.unwrap(), "v1");
        }
        assert_eq!(*calls.lock().unwrap(), vec![vec![1]]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tasks_same_key_fetches_once() {
        let (loader, calls) = recording_loader(
            LoaderConfig::default().max_wait(Duration::from_millis(20)),
        );

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.load(42).await })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), "v42");
        }
        assert_eq!(*calls.lock().unwrap(), vec![vec![42]]);
    }

    #[tokio::test]
    async fn test_cached_after_dispatch() {
        let (loader, calls) = recording_loader(LoaderConfig::default());
        loader.load(3).await.unwrap();
        loader.load(3).await.unwrap();
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_keys_batched_in_first_seen_order() {
        let (loader, calls) = recording_loader(LoaderConfig::default());
        let results = loader.load_many(vec![5, 3, 5, 9]).await;
        let values: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec!["v5", "v3", "v5", "v9"]);
        assert_eq!(*calls.lock().unwrap(), vec![vec![5, 3, 9]]);
    }

    #[tokio::test]
    async fn test_size_limit_closes_batch() {
        let (loader, calls) = recording_loader(
            LoaderConfig::default()
                .max_size(2)
                .max_wait(Duration::from_millis(20)),
        );

        let (a, b, c) = tokio::join!(loader.load(1), loader.load(2), loader.load(3));
        assert_eq!(a.unwrap(), "v1");
        assert_eq!(b.unwrap(), "v2");
        assert_eq!(c.unwrap(), "v3");

        // Give the stale timer of the first batch a chance to fire.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(*calls.lock().unwrap(), vec![vec![1, 2], vec![3]]);
    }

    #[tokio::test]
    async fn test_arity_mismatch_fails_every_key() {
        let loader: Loader<i64, String, String> =
            Loader::new(|_keys: Vec<i64>| async move { Ok(vec![Ok("only".to_string())]) });

        let results = loader.load_many(vec![1, 2, 3]).await;
        for r in results {
            assert!(matches!(
                r,
                Err(LoadError::ArityMismatch {
                    keys: 3,
                    results: 1
                })
            ));
        }
    }

    #[tokio::test]
    async fn test_batch_error_applies_to_all() {
        let loader: Loader<i64, String, String> =
            Loader::new(|_keys: Vec<i64>| async move { Err("backend down".to_string()) });

        let (a, b) = tokio::join!(loader.load(1), loader.load(2));
        for r in [a, b] {
            match r {
                Err(LoadError::Fetch(e)) => assert_eq!(*e, "backend down"),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_per_key_errors_are_positional() {
        let loader: Loader<i64, i64, String> = Loader::new(|keys: Vec<i64>| async move {
            Ok(keys
                .into_iter()
                .map(|k| {
                    if k % 2 == 0 {
                        Ok(k * 10)
                    } else {
                        Err(format!("odd {k}"))
                    }
                })
                .collect())
        });

        let results = loader.load_many(vec![1, 2, 3, 4]).await;
        assert!(matches!(&results[0], Err(LoadError::Fetch(e)) if **e == "odd 1"));
        assert_eq!(results[1].as_ref().unwrap(), &20);
        assert!(matches!(&results[2], Err(LoadError::Fetch(e)) if **e == "odd 3"));
        assert_eq!(results[3].as_ref().unwrap(), &40);

        assert!(loader.try_load_many(vec![2, 3]).await.is_err());
        assert_eq!(loader.try_load_many(vec![2, 4]).await.unwrap(), vec![20, 40]);
    }

    #[tokio::test]
    async fn test_prime_skips_fetch() {
        let (loader, calls) = recording_loader(LoaderConfig::default());
        loader.prime(11, "primed".to_string());
        assert_eq!(loader.load(11).await.unwrap(), "primed");
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_refetches() {
        let (loader, calls) = recording_loader(LoaderConfig::default());
        loader.load(4).await.unwrap();
        loader.clear(&4);
        loader.load(4).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec![vec![4], vec![4]]);
    }

    #[tokio::test]
    async fn test_panicking_fetch_aborts_waiters() {
        let loader: Loader<i64, String, String> = Loader::new(|keys: Vec<i64>| async move {
            if !keys.is_empty() {
                panic!("fetch exploded");
            }
            Ok(Vec::new())
        });
        assert!(matches!(loader.load(1).await, Err(LoadError::Aborted)));
    }
}
