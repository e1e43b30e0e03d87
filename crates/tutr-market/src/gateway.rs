//! Timeout-bounded access to the record store.

use std::{future::Future, sync::Arc, time::Duration};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tutr_core::{
  key::Key,
  path::RecordPath,
  store::{RecordStore, Subscription, WriteBatch},
};

use crate::{Error, Result};

/// Every store call made by the services goes through here, so that a hung
/// store surfaces as [`Error::Timeout`] instead of suspending the caller
/// forever.
pub struct Gateway<S> {
  store:      Arc<S>,
  op_timeout: Duration,
}

impl<S> Clone for Gateway<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), op_timeout: self.op_timeout }
  }
}

impl<S: RecordStore> Gateway<S> {
  pub fn new(store: Arc<S>, op_timeout: Duration) -> Self { Self { store, op_timeout } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn op_timeout(&self) -> Duration { self.op_timeout }

  pub fn generate_key(&self) -> Key { self.store.generate_key() }

  async fn bounded<T>(
    &self,
    operation: &'static str,
    call: impl Future<Output = Result<T, S::Error>>,
  ) -> Result<T> {
    match tokio::time::timeout(self.op_timeout, call).await {
      Ok(result) => result.map_err(Error::store),
      Err(_) => {
        tracing::warn!(operation, after = ?self.op_timeout, "store call timed out");
        Err(Error::Timeout { operation, after: self.op_timeout })
      }
    }
  }

  pub async fn get(&self, path: RecordPath) -> Result<Option<Value>> {
    self.bounded("get", self.store.get(path)).await
  }

  /// Read and decode the record at `path`.
  pub async fn read<T: DeserializeOwned>(&self, path: RecordPath) -> Result<Option<T>> {
    let label = path.to_string();
    self
      .get(path)
      .await?
      .map(|value| decode(&label, value))
      .transpose()
  }

  pub async fn commit(&self, batch: WriteBatch) -> Result<()> {
    self.bounded("commit", self.store.commit(batch)).await
  }

  pub async fn push(&self, parent: RecordPath, value: Value) -> Result<Key> {
    self.bounded("push", self.store.push(parent, value)).await
  }

  pub async fn watch(&self, path: RecordPath) -> Result<Subscription> {
    self.bounded("watch", self.store.watch(path)).await
  }
}

pub(crate) fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T> {
  serde_json::from_value(value)
    .map_err(|source| Error::Corrupt { path: path.to_owned(), source })
}

pub(crate) fn encode<T: Serialize>(record: &T) -> Result<Value> {
  serde_json::to_value(record).map_err(|e| Error::Core(e.into()))
}
