//! Error types for `tutr-market`.
//!
//! Every failure a service can produce is an [`Error`]; [`Error::class`]
//! tells callers whether it was their input, a missing record, a conflict, or
//! a store problem worth retrying. Replica disagreements are not errors; they
//! are reported as [`ConsistencyWarning`]s.

use std::time::Duration;

use thiserror::Error;
use tutr_core::{
  key::{ChatId, OfferId, SessionId, UserId},
  session::SessionStatus,
  store::{StoreError, StoreErrorKind, WatchFault},
};

use crate::sessions::ReplicaLocation;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] tutr_core::Error),

  #[error("tutor {0} not found")]
  TutorNotFound(UserId),

  #[error("student {0} not found")]
  StudentNotFound(UserId),

  #[error("user {0} not found")]
  UserNotFound(UserId),

  #[error("session {0} not found")]
  SessionNotFound(SessionId),

  #[error("offer {0} not found")]
  OfferNotFound(OfferId),

  #[error("chat {0} not found")]
  ChatNotFound(ChatId),

  #[error("user {responder} is not the tutor of session {session_id}")]
  NotSessionTutor { session_id: SessionId, responder: UserId },

  #[error("user {user} is not a participant of chat {chat_id}")]
  NotChatParticipant { chat_id: ChatId, user: UserId },

  #[error("session {session_id} is already {status}")]
  AlreadyResolved { session_id: SessionId, status: SessionStatus },

  #[error("session {0} kept changing while being updated")]
  Contended(SessionId),

  #[error("user {0} is already registered")]
  AlreadyRegistered(UserId),

  /// The id is present in both the student and the tutor collection.
  #[error("user {0} is registered as both student and tutor")]
  RoleConflict(UserId),

  #[error("email {0} is already in use")]
  EmailTaken(String),

  #[error("invalid email or password")]
  InvalidCredentials,

  #[error("{operation} timed out after {after:?}")]
  Timeout { operation: &'static str, after: Duration },

  #[error("store error: {source}")]
  Store {
    kind:   StoreErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("record at {path} could not be decoded: {source}")]
  Corrupt {
    path:   String,
    #[source]
    source: serde_json::Error,
  },

  #[error(transparent)]
  Watch(#[from] WatchFault),

  #[error("subscription closed")]
  SubscriptionClosed,

  #[error("the global session list is disabled")]
  GlobalReplicaDisabled,

  #[error("password hashing failed: {0}")]
  PasswordHash(String),
}

/// What kind of failure an [`Error`] is, independent of the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  /// Bad input, detected before anything was written.
  Validation,
  NotFound,
  /// The caller may not do this.
  Forbidden,
  /// The record's current state does not allow the operation.
  Conflict,
  /// Store unavailable, timed out, or contended; retrying may succeed.
  Transient,
  Fatal,
}

impl Error {
  pub(crate) fn store<E: StoreError>(err: E) -> Self {
    Self::Store { kind: err.kind(), source: Box::new(err) }
  }

  pub fn class(&self) -> ErrorClass {
    match self {
      Self::Core(_) => ErrorClass::Validation,
      Self::TutorNotFound(_)
      | Self::StudentNotFound(_)
      | Self::UserNotFound(_)
      | Self::SessionNotFound(_)
      | Self::OfferNotFound(_)
      | Self::ChatNotFound(_) => ErrorClass::NotFound,
      Self::NotSessionTutor { .. }
      | Self::NotChatParticipant { .. }
      | Self::InvalidCredentials => ErrorClass::Forbidden,
      Self::AlreadyResolved { .. }
      | Self::AlreadyRegistered(_)
      | Self::EmailTaken(_) => ErrorClass::Conflict,
      Self::Contended(_)
      | Self::Timeout { .. }
      | Self::Watch(_)
      | Self::SubscriptionClosed => ErrorClass::Transient,
      Self::Store { kind, .. } => match kind {
        StoreErrorKind::Unavailable => ErrorClass::Transient,
        StoreErrorKind::PreconditionFailed => ErrorClass::Conflict,
        StoreErrorKind::Rejected => ErrorClass::Validation,
        StoreErrorKind::Corrupt => ErrorClass::Fatal,
      },
      Self::RoleConflict(_)
      | Self::Corrupt { .. }
      | Self::GlobalReplicaDisabled
      | Self::PasswordHash(_) => ErrorClass::Fatal,
    }
  }

  pub fn is_retryable(&self) -> bool { self.class() == ErrorClass::Transient }

  /// A guarded write lost against a concurrent writer.
  pub(crate) fn is_precondition_failed(&self) -> bool {
    matches!(
      self,
      Self::Store { kind: StoreErrorKind::PreconditionFailed, .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Consistency warnings ────────────────────────────────────────────────────

/// A disagreement between the replicas of one session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyWarning {
  #[error("session {session_id} has no {location} replica")]
  MissingReplica { session_id: SessionId, location: ReplicaLocation },

  #[error("session {session_id}: {location} replica disagrees on {fields:?}")]
  DivergentFields {
    session_id: SessionId,
    location:   ReplicaLocation,
    fields:     Vec<&'static str>,
  },

  #[error("session {session_id}: {location} replica is {found}, expected {expected}")]
  StatusMismatch {
    session_id: SessionId,
    location:   ReplicaLocation,
    expected:   SessionStatus,
    found:      SessionStatus,
  },
}
