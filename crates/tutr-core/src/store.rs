//! The `RecordStore` trait and its subscription primitive.
//!
//! The trait is implemented by storage backends (e.g. `tutr-store-sqlite`).
//! Higher layers (`tutr-market`, `tutr-api`) depend on this abstraction, not
//! on any concrete backend.
//!
//! A store is a tree of JSON values addressed by [`RecordPath`]. `null` and
//! empty objects are indistinguishable from absence.

use std::future::Future;

use serde_json::Value;
use tokio::sync::watch;

use crate::{key::Key, path::RecordPath};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Coarse classification every backend error maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
  /// Network, I/O, or lock trouble; the same call may succeed later.
  Unavailable,
  /// A [`WriteBatch`] guard did not hold; nothing was written.
  PreconditionFailed,
  /// The request itself is malformed (e.g. overlapping batch paths).
  Rejected,
  /// Stored data could not be decoded.
  Corrupt,
}

pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> StoreErrorKind;
}

// ─── Batches ─────────────────────────────────────────────────────────────────

/// A set of writes applied atomically, optionally conditional on guards.
///
/// Either every guard holds and every write lands, or the store is left
/// untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
  writes: Vec<(RecordPath, Option<Value>)>,
  guards: Vec<(RecordPath, Option<Value>)>,
}

impl WriteBatch {
  pub fn new() -> Self { Self::default() }

  /// Replace the value at `path` (and everything below it).
  pub fn set(mut self, path: RecordPath, value: Value) -> Self {
    self.writes.push((path, Some(value)));
    self
  }

  pub fn remove(mut self, path: RecordPath) -> Self {
    self.writes.push((path, None));
    self
  }

  /// Require the current value at `path` to equal `expected` (`None` meaning
  /// absent) at commit time.
  pub fn guard(mut self, path: RecordPath, expected: Option<Value>) -> Self {
    self.guards.push((path, expected));
    self
  }

  pub fn writes(&self) -> &[(RecordPath, Option<Value>)] { &self.writes }

  pub fn guards(&self) -> &[(RecordPath, Option<Value>)] { &self.guards }

  /// No writes and no guards. A guard-only batch is still checked on commit.
  pub fn is_empty(&self) -> bool { self.writes.is_empty() && self.guards.is_empty() }

  /// The first pair of write paths where one contains the other.
  pub fn overlapping_paths(&self) -> Option<(&RecordPath, &RecordPath)> {
    self.writes.iter().enumerate().find_map(|(i, (a, _))| {
      self.writes[i + 1..]
        .iter()
        .find(|(b, _)| a.overlaps(b))
        .map(|(b, _)| (a, b))
    })
  }
}

// ─── Subscriptions ───────────────────────────────────────────────────────────

/// The full value at a watched path, as of one delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
  pub value:    Option<Value>,
  /// Bumped on every delivery to this subscription.
  pub revision: u64,
}

/// A refresh that failed. Distinct from the path simply being absent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("subscription refresh failed: {message}")]
pub struct WatchFault {
  pub message: String,
}

pub type Delivery = Result<Snapshot, WatchFault>;

/// Live view of one path. The current value is available immediately; later
/// values arrive whenever a committed write changes it.
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) releases the
/// registration.
#[derive(Debug)]
pub struct Subscription {
  path:     RecordPath,
  receiver: watch::Receiver<Delivery>,
}

impl Subscription {
  pub fn new(path: RecordPath, receiver: watch::Receiver<Delivery>) -> Self {
    Self { path, receiver }
  }

  pub fn path(&self) -> &RecordPath { &self.path }

  /// The latest delivery, marking it as seen.
  pub fn current(&mut self) -> Delivery { self.receiver.borrow_and_update().clone() }

  /// Wait for the next delivery. `None` once the store has shut down.
  pub async fn changed(&mut self) -> Option<Delivery> {
    self.receiver.changed().await.ok()?;
    Some(self.current())
  }

  pub fn unsubscribe(self) {}
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a hierarchical, path-addressed, real-time record store.
///
/// Per-path writes are ordered; writes to several paths are only atomic when
/// issued as one [`WriteBatch`].
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait RecordStore: Send + Sync {
  type Error: StoreError;

  /// A fresh, unique key that sorts after every key this store generated
  /// before.
  fn generate_key(&self) -> Key;

  /// Read the whole value at `path`; `None` if absent.
  fn get(
    &self,
    path: RecordPath,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + '_;

  /// Replace the value at `path`. Writing `null` removes it.
  fn set(
    &self,
    path: RecordPath,
    value: Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn remove(
    &self,
    path: RecordPath,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Store `value` under a freshly generated child key of `parent`.
  fn push(
    &self,
    parent: RecordPath,
    value: Value,
  ) -> impl Future<Output = Result<Key, Self::Error>> + Send + '_;

  /// Apply a batch atomically.
  fn commit(
    &self,
    batch: WriteBatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Start watching `path`.
  fn watch(
    &self,
    path: RecordPath,
  ) -> impl Future<Output = Result<Subscription, Self::Error>> + Send + '_;
}
