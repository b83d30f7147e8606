//! # Folio Loader
//!
//! A request-scoped batching loader. Many independent `load(key)` calls made
//! while handling one request are coalesced into a few calls of a
//! user-supplied batch fetch function.
//!
//! ## Semantics
//!
//! - The first new key opens a batch and starts a `max_wait` timer.
//! - Later new keys join the open batch until the timer fires or the batch
//!   reaches `max_size` keys, whichever comes first.
//! - Every key is fetched at most once per loader; repeated and concurrent
//!   loads of the same key share one result.
//!
//! ```no_run
//! # async fn example() {
//! use folio_loader::Loader;
//!
//! let loader: Loader<i64, String, String> = Loader::new(|ids: Vec<i64>| async move {
//!     Ok(ids.into_iter().map(|id| Ok(format!("user-{id}"))).collect())
//! });
//!
//! let (a, b) = tokio::join!(loader.load(1), loader.load(2));
//! assert_eq!(a.unwrap(), "user-1");
//! assert_eq!(b.unwrap(), "user-2");
//! # }
//! ```

mod loader;

pub use loader::{BatchResult, LoadError, Loader, LoaderConfig};
