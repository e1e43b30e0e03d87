//! Error types for `tutr-core`.
//!
//! Everything here is a validation failure detected locally, before any
//! store access.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid key {key:?}: {reason}")]
  InvalidKey { key: String, reason: &'static str },

  #[error("{0} must not be empty")]
  MissingField(&'static str),

  #[error("message must not be empty")]
  EmptyMessage,

  #[error("invalid date {0:?}, expected YYYY-MM-DD")]
  InvalidDate(String),

  #[error("invalid time {0:?}, expected HH:MM")]
  InvalidTime(String),

  #[error("price must be greater than zero")]
  InvalidPrice,

  #[error("invalid email address: {0:?}")]
  InvalidEmail(String),

  #[error("password must be at least {0} characters")]
  WeakPassword(usize),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
