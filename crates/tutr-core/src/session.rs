//! Sessions: booking requests between one student and one tutor.
//!
//! One logical session is stored as identical replicas under the tutor, the
//! student, and optionally the global `sessions` list. The session id is the
//! key of every replica and is not repeated inside the record.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  key::{SessionId, UserId},
};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
  Pending,
  Accepted,
  Rejected,
}

/// A tutor's answer to a pending request.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Decision {
  Accept,
  Reject,
}

impl Decision {
  pub fn target(self) -> SessionStatus {
    match self {
      Self::Accept => SessionStatus::Accepted,
      Self::Reject => SessionStatus::Rejected,
    }
  }
}

/// What applying a [`Decision`] to a status would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  /// `pending` moves to a terminal status.
  Advance(SessionStatus),
  /// Already in the requested terminal status; nothing to write.
  Unchanged(SessionStatus),
  /// Already in the other terminal status; terminal states are final.
  Refused(SessionStatus),
}

impl SessionStatus {
  pub fn is_terminal(self) -> bool { !matches!(self, Self::Pending) }

  pub fn apply(self, decision: Decision) -> Transition {
    let target = decision.target();
    match self {
      Self::Pending => Transition::Advance(target),
      current if current == target => Transition::Unchanged(current),
      current => Transition::Refused(current),
    }
  }
}

// ─── Slot normalisation ──────────────────────────────────────────────────────

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (the UTC calendar date is
/// taken).
pub fn normalize_date(raw: &str) -> Result<NaiveDate> {
  let trimmed = raw.trim();
  NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
    .or_else(|_| {
      DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.with_timezone(&Utc).date_naive())
    })
    .map_err(|_| Error::InvalidDate(raw.to_owned()))
}

/// Accepts `HH:MM`, `HH:MM:SS`, or an RFC 3339 timestamp (the UTC wall-clock
/// time is taken). Seconds are dropped.
pub fn normalize_time(raw: &str) -> Result<NaiveTime> {
  let trimmed = raw.trim();
  let parsed = NaiveTime::parse_from_str(trimmed, "%H:%M")
    .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
    .or_else(|_| {
      DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.with_timezone(&Utc).time())
    })
    .map_err(|_| Error::InvalidTime(raw.to_owned()))?;
  NaiveTime::from_hms_opt(parsed.hour(), parsed.minute(), 0)
    .ok_or_else(|| Error::InvalidTime(raw.to_owned()))
}

/// `HH:MM` on the wire.
mod hhmm {
  use chrono::NaiveTime;
  use serde::{Deserialize, Deserializer, Serializer, de};

  pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&t.format("%H:%M"))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
    let raw = String::deserialize(d)?;
    super::normalize_time(&raw).map_err(de::Error::custom)
  }
}

// ─── Request ─────────────────────────────────────────────────────────────────

/// A validated request from a student, before it is assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
  pub student_id: UserId,
  pub tutor_id:   UserId,
  pub date:       NaiveDate,
  pub time:       NaiveTime,
  pub message:    String,
}

impl SessionRequest {
  /// Build a request from raw form input, normalising the slot.
  pub fn new(
    student_id: &str,
    tutor_id: &str,
    date: &str,
    time: &str,
    message: &str,
  ) -> Result<Self> {
    let request = Self {
      student_id: UserId::new(student_id)?,
      tutor_id:   UserId::new(tutor_id)?,
      date:       normalize_date(date)?,
      time:       normalize_time(time)?,
      message:    message.to_owned(),
    };
    request.validate()?;
    Ok(request)
  }

  pub fn validate(&self) -> Result<()> {
    if self.message.trim().is_empty() {
      return Err(Error::EmptyMessage);
    }
    Ok(())
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// The payload written to every replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
  pub student_id:   UserId,
  pub tutor_id:     UserId,
  pub date:         NaiveDate,
  #[serde(with = "hhmm")]
  pub time:         NaiveTime,
  pub message:      String,
  pub status:       SessionStatus,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub created_at:   DateTime<Utc>,
  #[serde(
    default,
    with = "chrono::serde::ts_milliseconds_option",
    skip_serializing_if = "Option::is_none"
  )]
  pub responded_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
  pub fn pending(request: SessionRequest, created_at: DateTime<Utc>) -> Self {
    Self {
      student_id: request.student_id,
      tutor_id: request.tutor_id,
      date: request.date,
      time: request.time,
      message: request.message,
      status: SessionStatus::Pending,
      created_at,
      responded_at: None,
    }
  }

  /// Names of the immutable fields on which `self` and `other` disagree.
  pub fn divergent_fields(&self, other: &Self) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if self.student_id != other.student_id {
      fields.push("studentId");
    }
    if self.tutor_id != other.tutor_id {
      fields.push("tutorId");
    }
    if self.date != other.date {
      fields.push("date");
    }
    if self.time != other.time {
      fields.push("time");
    }
    if self.message != other.message {
      fields.push("message");
    }
    if self.created_at != other.created_at {
      fields.push("createdAt");
    }
    fields
  }

  pub fn is_participant(&self, user: &UserId) -> bool {
    &self.student_id == user || &self.tutor_id == user
  }

  /// Canonical `YYYY-MM-DD`.
  pub fn date_label(&self) -> String { self.date.format("%Y-%m-%d").to_string() }

  /// Canonical 24-hour `HH:MM`.
  pub fn time_label(&self) -> String { self.time.format("%H:%M").to_string() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub session_id: SessionId,
  #[serde(flatten)]
  pub record:     SessionRecord,
}

impl Session {
  /// Newest first; ties broken by id, which sorts in creation order.
  pub fn newest_first(a: &Self, b: &Self) -> Ordering {
    b.record
      .created_at
      .cmp(&a.record.created_at)
      .then_with(|| b.session_id.cmp(&a.session_id))
  }
}
