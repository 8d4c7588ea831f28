//! Async requests driven from the UI loop.
//!
//! A `Query<T>` owns a fetcher closure. `fetch()` spawns it on the runtime
//! and `poll()`, called on every tick, moves the result into the query's
//! state. Views render from `state()` and never await anything themselves.
//!
//! ```ignore
//! let session = session.clone();
//! let mut query = Query::new(move || {
//!   let session = session.clone();
//!   async move { session.inventory().await.map_err(|e| e.to_string()) }
//! });
//! query.fetch();
//!
//! // on tick
//! query.poll();
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Not started
  Idle,
  Loading,
  Success(T),
  /// Failed; holds the message shown to the user
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
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

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a query. The fetcher runs once per `fetch()`/`refetch()`.
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

  /// A query for a single action (an upload, a commit) that starts
  /// immediately.
  pub fn start<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    let mut query = Self::new(fetcher);
    query.fetch();
    query
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start fetching unless a fetch is already in flight.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Start a new fetch, discarding the result of any fetch in flight.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start_fetch();
  }

  /// Take the finished result out of the query, leaving it idle.
  pub fn take(&mut self) -> Option<Result<T, String>> {
    match std::mem::replace(&mut self.state, QueryState::Idle) {
      QueryState::Success(data) => Some(Ok(data)),
      QueryState::Error(e) => Some(Err(e)),
      other => {
        self.state = other;
        None
      }
    }
  }

  /// Collect the result of a pending fetch. Returns `true` when the state
  /// changed.
  pub fn poll(&mut self) -> bool {
    let Some(receiver) = &mut self.receiver else {
      return false;
    };

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
        self.state = QueryState::Error("Request was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let future = (self.fetcher)();
    tokio::spawn(async move {
      // The receiver is gone when the query was refetched or dropped.
      let _ = tx.send(future.await);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}
