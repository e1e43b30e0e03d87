//! Error type for `tutr-store-sqlite`.

use thiserror::Error;
use tutr_core::{
  path::RecordPath,
  store::{StoreError, StoreErrorKind},
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] tutr_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// Stored rows do not form a tree (e.g. a leaf with descendants).
  #[error("corrupt record tree at {0:?}")]
  CorruptTree(String),

  #[error("guard on {0} did not hold")]
  PreconditionFailed(RecordPath),

  #[error("batch writes {0} and {1} overlap")]
  OverlappingWrites(RecordPath, RecordPath),

  #[error("only objects can be written at the root")]
  ScalarAtRoot,
}

/// Errors raised inside a connection closure travel back boxed in
/// [`tokio_rusqlite::Error::Other`]; unwrap them here.
impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Other(boxed) => match boxed.downcast::<Error>() {
        Ok(inner) => *inner,
        Err(other) => Self::Database(tokio_rusqlite::Error::Other(other)),
      },
      other => Self::Database(other),
    }
  }
}

impl From<Error> for tokio_rusqlite::Error {
  fn from(err: Error) -> Self { tokio_rusqlite::Error::Other(Box::new(err)) }
}

impl StoreError for Error {
  fn kind(&self) -> StoreErrorKind {
    match self {
      Self::Database(_) => StoreErrorKind::Unavailable,
      Self::Json(_) | Self::CorruptTree(_) => StoreErrorKind::Corrupt,
      Self::PreconditionFailed(_) => StoreErrorKind::PreconditionFailed,
      Self::Core(_) | Self::OverlappingWrites(..) | Self::ScalarAtRoot => {
        StoreErrorKind::Rejected
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
