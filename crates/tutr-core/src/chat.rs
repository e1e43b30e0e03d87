//! Chat messages, including the session-request notice sent to tutors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  key::{ChatId, MessageId, UserId},
  session::SessionRecord,
};

/// Marks the start and end of a highlighted banner inside message text.
pub const HIGHLIGHT: &str = "**";

/// The stored record at `chats/{chatId}/messages/{messageId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
  pub text:        String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sender_id:   Option<UserId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sender_name: Option<String>,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub timestamp:   DateTime<Utc>,
}

impl MessageRecord {
  pub fn new(text: impl Into<String>, timestamp: DateTime<Utc>) -> Result<Self> {
    let text = text.into();
    if text.trim().is_empty() {
      return Err(Error::EmptyMessage);
    }
    Ok(Self { text, sender_id: None, sender_name: None, timestamp })
  }

  pub fn from_sender(mut self, id: UserId, name: Option<String>) -> Self {
    self.sender_id = Some(id);
    self.sender_name = name;
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub message_id: MessageId,
  #[serde(flatten)]
  pub record:     MessageRecord,
}

/// A chat as listed in a user's overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
  pub chat_id:      ChatId,
  /// Empty for an inbox.
  pub participants: Vec<UserId>,
  pub latest:       Option<ChatMessage>,
}

impl ChatSummary {
  /// A participant, or the owner of the inbox.
  pub fn includes(&self, user: &UserId) -> bool {
    self.chat_id.as_str() == user.as_str() || self.participants.contains(user)
  }
}

/// Text of the message a tutor receives when a student requests a session.
pub fn session_request_notice(student_name: &str, session: &SessionRecord) -> String {
  format!(
    "{HIGHLIGHT}{student_name} requested a session on {} at {}. You can accept \
     the request under My Profile -> Upcoming Sessions.{HIGHLIGHT}\n\n{}",
    session.date_label(),
    session.time_label(),
    session.message,
  )
}

/// Split a leading `**banner**` from the rest of the text.
///
/// Returns `(None, text)` when the text does not start with a complete banner.
pub fn split_highlight(text: &str) -> (Option<&str>, &str) {
  let Some(rest) = text.strip_prefix(HIGHLIGHT) else {
    return (None, text);
  };
  match rest.split_once(HIGHLIGHT) {
    Some((banner, body)) => (Some(banner), body.trim_start_matches('\n')),
    None => (None, text),
  }
}
