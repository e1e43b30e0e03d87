//! The session repository: creation, transitions, and the read model.
//!
//! A session is stored as identical replicas under the tutor
//! (`tutors/{tutorId}/sessions/{id}`), the student
//! (`students/{studentId}/sessions/{id}`), and, when enabled, the global list
//! (`sessions/{id}`). This module is the only writer of those paths.
//!
//! Every write to the replicas is one atomic [`WriteBatch`] carrying the full
//! record, so replicas can only disagree if something else wrote to them. The
//! tutor's replica is authoritative: transitions are guarded on its status
//! and [`SessionRepository::reconcile`] repairs the others from it.

use std::fmt;

use chrono::Utc;
use tutr_core::{
  chat::{MessageRecord, session_request_notice},
  key::{SessionId, UserId},
  path::{RecordPath, scheme},
  session::{Decision, Session, SessionRecord, SessionRequest, SessionStatus, Transition},
  store::{RecordStore, WriteBatch},
  user::{Role, User},
};

use crate::{
  ConsistencyWarning, Error, Feed, MessagingChannel, Result, UserDirectory,
  feed::{Filter, collect_entries},
  gateway::{Gateway, encode},
  messaging::inbox,
};

/// How many times a transition re-reads after losing a race.
const MAX_ATTEMPTS: usize = 3;

// ─── Replicas ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicaLocation {
  Tutor,
  Student,
  Global,
}

impl ReplicaLocation {
  pub fn path(self, session_id: &SessionId, record: &SessionRecord) -> RecordPath {
    match self {
      Self::Tutor => scheme::user_session(Role::Tutor, &record.tutor_id, session_id),
      Self::Student => {
        scheme::user_session(Role::Student, &record.student_id, session_id)
      }
      Self::Global => scheme::global_session(session_id),
    }
  }
}

impl fmt::Display for ReplicaLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Tutor => "tutor",
      Self::Student => "student",
      Self::Global => "global",
    })
  }
}

/// Every replica of one session as currently stored.
#[derive(Debug, Clone)]
pub struct ReplicaReport {
  pub session_id: SessionId,
  /// The tutor replica, or the global one if the tutor replica is missing.
  pub canonical:  SessionRecord,
  pub replicas:   Vec<(ReplicaLocation, Option<SessionRecord>)>,
  pub warnings:   Vec<ConsistencyWarning>,
}

impl ReplicaReport {
  pub fn is_consistent(&self) -> bool { self.warnings.is_empty() }

  pub fn replica(&self, location: ReplicaLocation) -> Option<&SessionRecord> {
    self
      .replicas
      .iter()
      .find(|(l, _)| *l == location)
      .and_then(|(_, r)| r.as_ref())
  }
}

fn compare(
  session_id: &SessionId,
  location: ReplicaLocation,
  canonical: &SessionRecord,
  replica: Option<&SessionRecord>,
) -> Vec<ConsistencyWarning> {
  let Some(replica) = replica else {
    return vec![ConsistencyWarning::MissingReplica {
      session_id: session_id.clone(),
      location,
    }];
  };
  let mut warnings = Vec::new();
  let fields = canonical.divergent_fields(replica);
  if !fields.is_empty() {
    warnings.push(ConsistencyWarning::DivergentFields {
      session_id: session_id.clone(),
      location,
      fields,
    });
  }
  if replica.status != canonical.status {
    warnings.push(ConsistencyWarning::StatusMismatch {
      session_id: session_id.clone(),
      location,
      expected: canonical.status,
      found: replica.status,
    });
  }
  warnings
}

// ─── Repository ──────────────────────────────────────────────────────────────

pub struct SessionRepository<S> {
  gateway:        Gateway<S>,
  users:          UserDirectory<S>,
  messaging:      MessagingChannel<S>,
  global_replica: bool,
}

impl<S> Clone for SessionRepository<S> {
  fn clone(&self) -> Self {
    Self {
      gateway:        self.gateway.clone(),
      users:          self.users.clone(),
      messaging:      self.messaging.clone(),
      global_replica: self.global_replica,
    }
  }
}

impl<S: RecordStore> SessionRepository<S> {
  pub fn new(
    gateway: Gateway<S>,
    users: UserDirectory<S>,
    messaging: MessagingChannel<S>,
    global_replica: bool,
  ) -> Self {
    Self { gateway, users, messaging, global_replica }
  }

  fn locations(&self) -> &'static [ReplicaLocation] {
    if self.global_replica {
      &[ReplicaLocation::Tutor, ReplicaLocation::Student, ReplicaLocation::Global]
    } else {
      &[ReplicaLocation::Tutor, ReplicaLocation::Student]
    }
  }

  /// Add a write of the full record to every replica location.
  fn write_replicas(
    &self,
    mut batch: WriteBatch,
    session_id: &SessionId,
    record: &SessionRecord,
  ) -> Result<WriteBatch> {
    let value = encode(record)?;
    for location in self.locations() {
      batch = batch.set(location.path(session_id, record), value.clone());
    }
    Ok(batch)
  }

  // ── Creation ──────────────────────────────────────────────────────────────

  /// Create a pending session and write it to every replica at once.
  ///
  /// Validation and participant lookups happen before anything is written.
  /// The tutor is then sent a notice in their inbox; failing to deliver it is
  /// logged and does not fail the request.
  pub async fn request_session(&self, request: SessionRequest) -> Result<SessionId> {
    request.validate()?;
    self.users.tutor(&request.tutor_id).await?;
    let student = self.users.student(&request.student_id).await?;

    let session_id: SessionId = self.gateway.generate_key().into();
    let record = SessionRecord::pending(request, Utc::now());
    let batch = self.write_replicas(WriteBatch::new(), &session_id, &record)?;
    self.gateway.commit(batch).await?;

    tracing::info!(
      session = %session_id,
      tutor = %record.tutor_id,
      student = %record.student_id,
      "session requested"
    );
    self.notify_tutor(&student, &record).await;
    Ok(session_id)
  }

  async fn notify_tutor(&self, student: &User, record: &SessionRecord) {
    let text = session_request_notice(student.display_name(), record);
    let delivered = match MessageRecord::new(text, Utc::now()) {
      Ok(message) => {
        let message = message
          .from_sender(student.id().clone(), Some(student.display_name().to_owned()));
        self.messaging.notify(&inbox(&record.tutor_id), message).await.map(drop)
      }
      Err(err) => Err(err.into()),
    };
    if let Err(err) = delivered {
      tracing::warn!(tutor = %record.tutor_id, error = %err, "session notice not delivered");
    }
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Accept or reject a pending session as its tutor.
  ///
  /// Repeating the decision already taken succeeds without writing; the
  /// opposite decision fails with [`Error::AlreadyResolved`]. The write is
  /// guarded on the tutor replica still being `pending`, so of two racing
  /// responses exactly one lands and the other is re-evaluated.
  pub async fn respond_to_session(
    &self,
    session_id: &SessionId,
    responder: &UserId,
    decision: Decision,
  ) -> Result<SessionStatus> {
    for _ in 0..MAX_ATTEMPTS {
      let record = self.tutor_replica(session_id, responder).await?;
      if &record.tutor_id != responder {
        return Err(Error::NotSessionTutor {
          session_id: session_id.clone(),
          responder:  responder.clone(),
        });
      }

      let target = match record.status.apply(decision) {
        Transition::Advance(target) => target,
        Transition::Unchanged(status) => {
          tracing::debug!(session = %session_id, %status, "decision already applied");
          return Ok(status);
        }
        Transition::Refused(status) => {
          return Err(Error::AlreadyResolved { session_id: session_id.clone(), status });
        }
      };

      let mut updated = record;
      updated.status = target;
      updated.responded_at = Some(Utc::now());
      let guard = WriteBatch::new().guard(
        scheme::user_session_status(Role::Tutor, responder, session_id),
        Some(encode(&SessionStatus::Pending)?),
      );
      let batch = self.write_replicas(guard, session_id, &updated)?;

      match self.gateway.commit(batch).await {
        Ok(()) => {
          tracing::info!(session = %session_id, status = %target, "session resolved");
          return Ok(target);
        }
        Err(err) if err.is_precondition_failed() => {
          tracing::debug!(session = %session_id, "session changed concurrently, re-reading");
        }
        Err(err) => return Err(err),
      }
    }
    Err(Error::Contended(session_id.clone()))
  }

  async fn tutor_replica(
    &self,
    session_id: &SessionId,
    responder: &UserId,
  ) -> Result<SessionRecord> {
    let own = scheme::user_session(Role::Tutor, responder, session_id);
    if let Some(record) = self.gateway.read(own).await? {
      return Ok(record);
    }
    // The student of the session gets a clearer error than "not found".
    let as_student = scheme::user_session(Role::Student, responder, session_id);
    if self.gateway.get(as_student).await?.is_some() {
      return Err(Error::NotSessionTutor {
        session_id: session_id.clone(),
        responder:  responder.clone(),
      });
    }
    Err(Error::SessionNotFound(session_id.clone()))
  }

  // ── Read model ────────────────────────────────────────────────────────────

  /// Live feed of the sessions in `user`'s own replica set, newest first.
  pub async fn subscribe_to_my_sessions(
    &self,
    user: &UserId,
    role: Role,
  ) -> Result<Feed<Session>> {
    let subscription = self.gateway.watch(scheme::user_sessions(role, user)).await?;
    tracing::debug!(%user, %role, "subscribed to sessions");
    Ok(Feed::new(subscription, None))
  }

  /// Live feed of the global list, narrowed to sessions `user` takes part in.
  pub async fn subscribe_global(&self, user: &UserId) -> Result<Feed<Session>> {
    if !self.global_replica {
      return Err(Error::GlobalReplicaDisabled);
    }
    let subscription = self.gateway.watch(scheme::global_sessions()).await?;
    let user = user.clone();
    let participant: Filter<Session> =
      Box::new(move |s: &Session| s.record.is_participant(&user));
    Ok(Feed::new(subscription, Some(participant)))
  }

  /// One-shot form of [`Self::subscribe_to_my_sessions`].
  pub async fn list_my_sessions(&self, user: &UserId, role: Role) -> Result<Vec<Session>> {
    let value = self.gateway.get(scheme::user_sessions(role, user)).await?;
    Ok(collect_entries(value, None))
  }

  pub async fn get_session(
    &self,
    user: &UserId,
    role: Role,
    session_id: &SessionId,
  ) -> Result<Session> {
    let record = self
      .gateway
      .read(scheme::user_session(role, user, session_id))
      .await?
      .ok_or_else(|| Error::SessionNotFound(session_id.clone()))?;
    Ok(Session { session_id: session_id.clone(), record })
  }

  // ── Consistency ───────────────────────────────────────────────────────────

  /// Read every replica of a session and report how they disagree.
  pub async fn inspect_replicas(
    &self,
    session_id: &SessionId,
    tutor: &UserId,
  ) -> Result<ReplicaReport> {
    let tutor_replica: Option<SessionRecord> = self
      .gateway
      .read(scheme::user_session(Role::Tutor, tutor, session_id))
      .await?;
    let global: Option<SessionRecord> = if self.global_replica {
      self.gateway.read(scheme::global_session(session_id)).await?
    } else {
      None
    };

    let canonical = tutor_replica
      .clone()
      .or_else(|| global.clone().filter(|r| &r.tutor_id == tutor))
      .ok_or_else(|| Error::SessionNotFound(session_id.clone()))?;
    let student_replica: Option<SessionRecord> = self
      .gateway
      .read(scheme::user_session(Role::Student, &canonical.student_id, session_id))
      .await?;

    let mut replicas = vec![
      (ReplicaLocation::Tutor, tutor_replica),
      (ReplicaLocation::Student, student_replica),
    ];
    if self.global_replica {
      replicas.push((ReplicaLocation::Global, global));
    }
    let warnings = replicas
      .iter()
      .flat_map(|(location, replica)| {
        compare(session_id, *location, &canonical, replica.as_ref())
      })
      .collect();

    Ok(ReplicaReport { session_id: session_id.clone(), canonical, replicas, warnings })
  }

  /// Rewrite every replica from the canonical record. Returns the warnings
  /// that were repaired; an empty list means nothing needed doing.
  pub async fn reconcile(
    &self,
    session_id: &SessionId,
    tutor: &UserId,
  ) -> Result<Vec<ConsistencyWarning>> {
    let report = self.inspect_replicas(session_id, tutor).await?;
    if report.is_consistent() {
      return Ok(Vec::new());
    }

    let expected_status = match report.replica(ReplicaLocation::Tutor) {
      Some(record) => Some(encode(&record.status)?),
      None => None,
    };
    let guard = WriteBatch::new().guard(
      scheme::user_session_status(Role::Tutor, tutor, session_id),
      expected_status,
    );
    let batch = self.write_replicas(guard, session_id, &report.canonical)?;
    self.gateway.commit(batch).await?;

    for warning in &report.warnings {
      tracing::warn!(%warning, "repaired session replica");
    }
    Ok(report.warnings)
  }
}
