//! [`SqliteStore`], the SQLite implementation of [`RecordStore`].

use std::{
  path::Path,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::Utc;
use rand_core::OsRng;
use rusqlite::Connection;
use serde_json::Value;
use tokio::sync::watch;
use tutr_core::{
  key::{Key, PushKeyGenerator},
  path::RecordPath,
  store::{Delivery, RecordStore, Snapshot, Subscription, WatchFault, WriteBatch},
};

use crate::{
  Error, Result,
  encode::{Row, assemble, flatten, normalize},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A record store backed by a single SQLite file.
///
/// Clones share the connection and the watcher registry.
#[derive(Clone)]
pub struct SqliteStore {
  conn:     tokio_rusqlite::Connection,
  watchers: Arc<Mutex<Vec<Watcher>>>,
  keys:     Arc<Mutex<PushKeyGenerator>>,
}

struct Watcher {
  path:     RecordPath,
  revision: u64,
  sender:   watch::Sender<Delivery>,
}

/// A batch write with its value already split into rows.
struct PreparedWrite {
  path: RecordPath,
  rows: Vec<Row>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self {
      conn,
      watchers: Arc::default(),
      keys: Arc::default(),
    })
  }

  /// Number of live subscriptions. Dropped handles are pruned on the next
  /// write.
  pub fn watcher_count(&self) -> usize {
    lock(&self.watchers)
      .iter()
      .filter(|w| !w.sender.is_closed())
      .count()
  }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Connection-thread helpers ───────────────────────────────────────────────

fn read_rows(conn: &Connection, path: &RecordPath) -> rusqlite::Result<Vec<Row>> {
  let map_row =
    |row: &rusqlite::Row<'_>| -> rusqlite::Result<Row> { Ok((row.get(0)?, row.get(1)?)) };
  if path.is_root() {
    let mut stmt =
      conn.prepare_cached("SELECT path, value_json FROM nodes ORDER BY path")?;
    let rows = stmt.query_map([], map_row)?.collect();
    return rows;
  }
  let mut stmt = conn.prepare_cached(
    "SELECT path, value_json FROM nodes
     WHERE path = ?1 OR (path >= ?1 || '/' AND path < ?1 || '0')
     ORDER BY path",
  )?;
  let rows = stmt
    .query_map(rusqlite::params![path.to_string()], map_row)?
    .collect();
  rows
}

fn read_value(conn: &Connection, path: &RecordPath) -> Result<Option<Value>> {
  let rows =
    read_rows(conn, path).map_err(|e| Error::Database(tokio_rusqlite::Error::from(e)))?;
  assemble(path, rows)
}

/// Replace everything at and below the write path. Writing a value also
/// replaces any leaf above it; a removal leaves ancestors alone.
fn apply_write(conn: &Connection, write: &PreparedWrite) -> rusqlite::Result<()> {
  if write.path.is_root() {
    conn.execute("DELETE FROM nodes", [])?;
  } else {
    conn.execute(
      "DELETE FROM nodes
       WHERE path = ?1 OR (path >= ?1 || '/' AND path < ?1 || '0')",
      rusqlite::params![write.path.to_string()],
    )?;
    if !write.rows.is_empty() {
      for ancestor in write.path.ancestors() {
        conn.execute(
          "DELETE FROM nodes WHERE path = ?1",
          rusqlite::params![ancestor.to_string()],
        )?;
      }
    }
  }

  let mut insert =
    conn.prepare_cached("INSERT INTO nodes (path, value_json) VALUES (?1, ?2)")?;
  for (path, json) in &write.rows {
    insert.execute(rusqlite::params![path, json])?;
  }
  Ok(())
}

/// Push fresh values to every watcher whose path overlaps a changed path.
fn notify(conn: &Connection, watchers: &Mutex<Vec<Watcher>>, changed: &[RecordPath]) {
  let mut watchers = lock(watchers);
  watchers.retain(|w| !w.sender.is_closed());

  let affected = watchers
    .iter_mut()
    .filter(|w| changed.iter().any(|path| path.overlaps(&w.path)));
  for watcher in affected {
    let next = watcher.revision + 1;
    let value = match read_value(conn, &watcher.path) {
      Ok(value) => value,
      Err(err) => {
        tracing::warn!(path = %watcher.path, error = %err, "watch refresh failed");
        let fault = WatchFault { message: err.to_string() };
        watcher.sender.send_modify(|current| *current = Err(fault));
        watcher.revision = next;
        continue;
      }
    };
    let modified = watcher.sender.send_if_modified(|current| match current {
      Ok(snapshot) if snapshot.value == value => false,
      _ => {
        *current = Ok(Snapshot { value, revision: next });
        true
      }
    });
    if modified {
      watcher.revision = next;
    }
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  fn generate_key(&self) -> Key {
    lock(&self.keys).next_key(Utc::now().timestamp_millis(), &mut OsRng)
  }

  async fn get(&self, path: RecordPath) -> Result<Option<Value>> {
    let value = self
      .conn
      .call(move |conn| Ok(read_value(conn, &path)?))
      .await?;
    Ok(value)
  }

  async fn set(&self, path: RecordPath, value: Value) -> Result<()> {
    self.commit(WriteBatch::new().set(path, value)).await
  }

  async fn remove(&self, path: RecordPath) -> Result<()> {
    self.commit(WriteBatch::new().remove(path)).await
  }

  async fn push(&self, parent: RecordPath, value: Value) -> Result<Key> {
    let key = self.generate_key();
    self.set(parent.join(&key), value).await?;
    Ok(key)
  }

  async fn commit(&self, batch: WriteBatch) -> Result<()> {
    if batch.is_empty() {
      return Ok(());
    }
    if let Some((a, b)) = batch.overlapping_paths() {
      return Err(Error::OverlappingWrites(a.clone(), b.clone()));
    }

    let writes = batch
      .writes()
      .iter()
      .map(|(path, value)| {
        let rows = match value {
          Some(value) => flatten(path, value)?,
          None => Vec::new(),
        };
        Ok(PreparedWrite { path: path.clone(), rows })
      })
      .collect::<Result<Vec<_>>>()?;
    let guards: Vec<(RecordPath, Option<Value>)> = batch
      .guards()
      .iter()
      .map(|(path, expected)| (path.clone(), expected.clone().and_then(normalize)))
      .collect();

    let watchers = Arc::clone(&self.watchers);
    let write_count = writes.len();
    let failed_guard = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for (path, expected) in &guards {
          if read_value(&tx, path)? != *expected {
            return Ok(Some(path.clone()));
          }
        }
        for write in &writes {
          apply_write(&tx, write)?;
        }
        tx.commit()?;

        let changed: Vec<RecordPath> = writes.into_iter().map(|w| w.path).collect();
        notify(conn, &watchers, &changed);
        Ok(None)
      })
      .await?;

    match failed_guard {
      Some(path) => Err(Error::PreconditionFailed(path)),
      None => {
        tracing::debug!(writes = write_count, "committed batch");
        Ok(())
      }
    }
  }

  async fn watch(&self, path: RecordPath) -> Result<Subscription> {
    let watchers = Arc::clone(&self.watchers);
    let watched = path.clone();
    let receiver = self
      .conn
      .call(move |conn| {
        let value = read_value(conn, &watched)?;
        let (sender, receiver) = watch::channel(Ok(Snapshot { value, revision: 0 }));
        lock(&watchers).push(Watcher { path: watched, revision: 0, sender });
        Ok(receiver)
      })
      .await?;
    Ok(Subscription::new(path, receiver))
  }
}
