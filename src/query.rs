//! Async query and mutation state for views.
//!
//! Inspired by TanStack Query, `Query<T>` encapsulates async data fetching,
//! loading states and error handling, and `Mutation<T>` does the same for a
//! single write. Both run their future on the tokio runtime and hand the
//! result back through a channel that the view polls on each tick.
//!
//! # Example
//!
//! ```ignore
//! let client = wishlist_client.clone();
//! let mut query = Query::new(move || {
//!     let client = client.clone();
//!     async move { client.list_wishlists().await.map_err(|e| e.to_string()) }
//! });
//!
//! // Start fetching
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use tokio::sync::mpsc;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is fetching and has no data yet
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A boxed future that returns a Result<T, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async query for data fetching with state management.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure)
/// - Loading/success/error states
/// - Async result handling via channels
///
/// A refetch keeps the previous data visible until the new result arrives;
/// only the first load shows as `Loading`.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It will be called
  /// each time `fetch()` or `refetch()` is invoked.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
    }
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Get the data if the query succeeded.
  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  /// Check if the query is loading for the first time.
  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Check if a fetch is in flight (first load or background refetch).
  pub fn is_fetching(&self) -> bool {
    self.receiver.is_some()
  }

  /// Check if the query failed.
  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Get the error message if the query failed.
  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start fetching data if not already fetching.
  pub fn fetch(&mut self) {
    if self.is_fetching() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, even if already fetching or data exists.
  pub fn refetch(&mut self) {
    // Cancel any pending fetch by dropping the receiver
    self.receiver = None;
    self.start_fetch();
  }

  /// Apply a local change to the loaded data.
  ///
  /// Returns false when there is no data to update.
  pub fn update_data(&mut self, f: impl FnOnce(&mut T)) -> bool {
    match &mut self.state {
      QueryState::Success(data) => {
        f(data);
        true
      }
      _ => false,
    }
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    // Try to receive without blocking
    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        self.state = QueryState::Error("Query was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }

  /// Internal: start the fetch operation
  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    if !matches!(self.state, QueryState::Success(_)) {
      self.state = QueryState::Loading;
    }

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("fetching", &self.receiver.is_some())
      .finish_non_exhaustive()
  }
}

/// A single in-flight write.
///
/// Unlike `Query`, a mutation is started with its own future each time and
/// reports its outcome once through `poll`.
pub struct Mutation<T> {
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
}

impl<T> Default for Mutation<T> {
  fn default() -> Self {
    Self { receiver: None }
  }
}

impl<T: Send + 'static> Mutation<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Check if a write is in flight.
  pub fn is_pending(&self) -> bool {
    self.receiver.is_some()
  }

  /// Start a write. Returns false (and drops `future`) if one is already pending.
  pub fn start<Fut>(&mut self, future: Fut) -> bool
  where
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    if self.is_pending() {
      return false;
    }
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
    true
  }

  /// Poll for the outcome of the pending write.
  pub fn poll(&mut self) -> Option<Result<T, String>> {
    let receiver = self.receiver.as_mut()?;
    match receiver.try_recv() {
      Ok(result) => {
        self.receiver = None;
        Some(result)
      }
      Err(mpsc::error::TryRecvError::Empty) => None,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.receiver = None;
        Some(Err("Mutation was cancelled".to_string()))
      }
    }
  }
}

/// Writes keyed by the row they touch.
///
/// Writes to different keys are independent and run side by side. A second
/// write to a key whose first write is still pending is refused.
pub struct MutationSet<K, T> {
  pending: HashMap<K, Mutation<T>>,
}

impl<K, T> Default for MutationSet<K, T> {
  fn default() -> Self {
    Self {
      pending: HashMap::new(),
    }
  }
}

impl<K: Eq + Hash + Clone, T: Send + 'static> MutationSet<K, T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_pending(&self, key: &K) -> bool {
    self.pending.contains_key(key)
  }

  /// Start a write for `key`. Returns false (and drops `future`) if `key` is busy.
  pub fn start<Fut>(&mut self, key: K, future: Fut) -> bool
  where
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    self.pending.entry(key).or_default().start(future)
  }

  /// Collect every write that finished since the last poll.
  pub fn poll(&mut self) -> Vec<(K, Result<T, String>)> {
    let mut finished = Vec::new();
    self.pending.retain(|key, mutation| match mutation.poll() {
      Some(result) => {
        finished.push((key.clone(), result));
        false
      }
      None => mutation.is_pending(),
    });
    finished
  }
}
