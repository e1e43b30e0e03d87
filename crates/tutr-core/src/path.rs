//! Record paths and the logical path scheme of the marketplace.
//!
//! A [`RecordPath`] is a sequence of [`Key`]s. The root path has no keys and
//! renders as the empty string; every other path renders as its keys joined by
//! `/`.

use std::fmt;

use crate::{
  Result,
  key::{ChatId, Key, MessageId, OfferId, SessionId, UserId},
  user::Role,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordPath {
  keys: Vec<Key>,
}

impl RecordPath {
  pub fn root() -> Self { Self::default() }

  /// Parse a `/`-separated path. Leading and trailing slashes are ignored;
  /// empty segments in the middle are rejected.
  pub fn parse(raw: &str) -> Result<Self> {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
      return Ok(Self::root());
    }
    let keys = trimmed
      .split('/')
      .map(Key::new)
      .collect::<Result<Vec<_>>>()?;
    Ok(Self { keys })
  }

  /// Append a validated key.
  pub fn join(&self, key: &Key) -> Self {
    let mut keys = self.keys.clone();
    keys.push(key.clone());
    Self { keys }
  }

  /// Append a raw segment, validating it.
  pub fn child(&self, segment: &str) -> Result<Self> {
    Ok(self.join(&Key::new(segment)?))
  }

  pub fn parent(&self) -> Option<Self> {
    let (_, rest) = self.keys.split_last()?;
    Some(Self { keys: rest.to_vec() })
  }

  pub fn last(&self) -> Option<&Key> { self.keys.last() }

  pub fn keys(&self) -> &[Key] { &self.keys }

  pub fn is_root(&self) -> bool { self.keys.is_empty() }

  pub fn depth(&self) -> usize { self.keys.len() }

  /// Strictly above `other` in the tree.
  pub fn is_ancestor_of(&self, other: &Self) -> bool {
    self.keys.len() < other.keys.len() && other.keys.starts_with(&self.keys)
  }

  /// Equal to, above, or below `other`: a write at one is visible at the
  /// other.
  pub fn overlaps(&self, other: &Self) -> bool {
    self == other || self.is_ancestor_of(other) || other.is_ancestor_of(self)
  }

  /// Every proper ancestor, root first, excluding the root itself.
  pub fn ancestors(&self) -> impl Iterator<Item = RecordPath> + '_ {
    (1..self.keys.len()).map(|n| Self { keys: self.keys[..n].to_vec() })
  }

  /// Keys of `self` below `ancestor`, or `None` if `ancestor` is not a prefix.
  pub fn strip_prefix(&self, ancestor: &Self) -> Option<&[Key]> {
    self.keys.strip_prefix(ancestor.keys.as_slice())
  }

  /// Build a path from schema constants. Only for literals known to be valid
  /// keys.
  fn fixed(segments: &[&'static str]) -> Self {
    Self {
      keys: segments.iter().map(|s| Key::trusted(s)).collect(),
    }
  }

  fn with(mut self, key: &Key) -> Self {
    self.keys.push(key.clone());
    self
  }
}

impl fmt::Display for RecordPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, key) in self.keys.iter().enumerate() {
      if i > 0 {
        f.write_str("/")?;
      }
      f.write_str(key.as_str())?;
    }
    Ok(())
  }
}

// ─── Path scheme ─────────────────────────────────────────────────────────────

/// The logical locations every component reads and writes.
pub mod scheme {
  use super::*;

  pub const STUDENTS: &str = "students";
  pub const TUTORS: &str = "tutors";
  pub const OFFERS: &str = "offers";
  pub const SESSIONS: &str = "sessions";
  pub const CHATS: &str = "chats";
  pub const MESSAGES: &str = "messages";
  pub const ACCOUNTS: &str = "accounts";
  pub const ACCOUNT_EMAILS: &str = "accountEmails";
  pub const PARTICIPANTS: &str = "participants";
  pub const STATUS: &str = "status";

  /// `students` or `tutors`.
  pub fn collection(role: Role) -> RecordPath {
    match role {
      Role::Student => RecordPath::fixed(&[STUDENTS]),
      Role::Tutor => RecordPath::fixed(&[TUTORS]),
    }
  }

  /// `students/{id}` or `tutors/{id}`.
  pub fn profile(role: Role, user: &UserId) -> RecordPath {
    collection(role).with(user.key())
  }

  /// `students/{id}/sessions` or `tutors/{id}/sessions`.
  pub fn user_sessions(role: Role, user: &UserId) -> RecordPath {
    profile(role, user).with(&Key::trusted(SESSIONS))
  }

  /// `students/{studentId}/sessions/{sessionId}` or the tutor equivalent.
  pub fn user_session(role: Role, user: &UserId, id: &SessionId) -> RecordPath {
    user_sessions(role, user).with(id.key())
  }

  /// The `status` field of a user-scoped session replica.
  pub fn user_session_status(role: Role, user: &UserId, id: &SessionId) -> RecordPath {
    user_session(role, user, id).with(&Key::trusted(STATUS))
  }

  /// `sessions`
  pub fn global_sessions() -> RecordPath { RecordPath::fixed(&[SESSIONS]) }

  /// `sessions/{sessionId}`
  pub fn global_session(id: &SessionId) -> RecordPath {
    global_sessions().with(id.key())
  }

  /// `offers`
  pub fn offers() -> RecordPath { RecordPath::fixed(&[OFFERS]) }

  /// `offers/{offerId}`
  pub fn offer(id: &OfferId) -> RecordPath { offers().with(id.key()) }

  /// `chats/{chatId}`
  pub fn chat(id: &ChatId) -> RecordPath {
    RecordPath::fixed(&[CHATS]).with(id.key())
  }

  /// `chats/{chatId}/participants`, a set of user ids mapped to `true`.
  pub fn chat_participants(id: &ChatId) -> RecordPath {
    chat(id).with(&Key::trusted(PARTICIPANTS))
  }

  /// `chats/{chatId}/messages`
  pub fn chat_messages(id: &ChatId) -> RecordPath {
    chat(id).with(&Key::trusted(MESSAGES))
  }

  /// `chats/{chatId}/messages/{messageId}`
  pub fn chat_message(chat_id: &ChatId, id: &MessageId) -> RecordPath {
    chat_messages(chat_id).with(id.key())
  }

  /// `chats`
  pub fn chats() -> RecordPath { RecordPath::fixed(&[CHATS]) }

  /// `accounts/{userId}`
  pub fn account(user: &UserId) -> RecordPath {
    RecordPath::fixed(&[ACCOUNTS]).with(user.key())
  }

  /// `accountEmails/{emailKey}`
  pub fn account_email(email_key: &Key) -> RecordPath {
    RecordPath::fixed(&[ACCOUNT_EMAILS]).with(email_key)
  }
}
