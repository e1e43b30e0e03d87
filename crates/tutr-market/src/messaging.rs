//! Append-only chats.
//!
//! A chat started between two users records its participants. A user's id is
//! also the id of their inbox chat, which is where session-request notices
//! land; only its owner may read it.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::json;
use tutr_core::{
  chat::{ChatMessage, ChatSummary, MessageRecord},
  key::{ChatId, MessageId, UserId},
  path::scheme,
  store::{RecordStore, WriteBatch},
  user::User,
};

use crate::{
  Error, Feed, Result, UserDirectory,
  feed::{Filter, collect_entries},
  gateway::{Gateway, encode},
};

pub struct MessagingChannel<S> {
  gateway: Gateway<S>,
  users:   UserDirectory<S>,
}

impl<S> Clone for MessagingChannel<S> {
  fn clone(&self) -> Self {
    Self { gateway: self.gateway.clone(), users: self.users.clone() }
  }
}

/// The inbox chat owned by `user`.
pub fn inbox(user: &UserId) -> ChatId { ChatId::from(user.key().clone()) }

fn member_of(user: &UserId) -> Filter<ChatSummary> {
  let user = user.clone();
  Box::new(move |chat| chat.includes(&user))
}

impl<S: RecordStore> MessagingChannel<S> {
  pub fn new(gateway: Gateway<S>, users: UserDirectory<S>) -> Self { Self { gateway, users } }

  /// Open a new chat between two registered users.
  pub async fn start_chat(&self, initiator: &UserId, recipient: &UserId) -> Result<ChatId> {
    self.users.resolve(recipient).await?;

    let chat_id: ChatId = self.gateway.generate_key().into();
    let participants = json!({ initiator.as_str(): true, recipient.as_str(): true });
    self
      .gateway
      .commit(WriteBatch::new().set(scheme::chat_participants(&chat_id), participants))
      .await?;

    tracing::debug!(chat = %chat_id, %initiator, %recipient, "chat started");
    Ok(chat_id)
  }

  /// Append a message from `sender`.
  pub async fn send(&self, chat_id: &ChatId, sender: &User, text: &str) -> Result<ChatMessage> {
    let record = MessageRecord::new(text, Utc::now())?
      .from_sender(sender.id().clone(), Some(sender.display_name().to_owned()));
    self.check_access(chat_id, sender.id()).await?;
    self.append(chat_id, record).await
  }

  /// Append a message without an access check. Used for system notices.
  pub async fn notify(&self, chat_id: &ChatId, record: MessageRecord) -> Result<ChatMessage> {
    self.append(chat_id, record).await
  }

  /// Every message in the chat, oldest first.
  pub async fn history(&self, chat_id: &ChatId, reader: &UserId) -> Result<Vec<ChatMessage>> {
    self.check_access(chat_id, reader).await?;
    let value = self.gateway.get(scheme::chat_messages(chat_id)).await?;
    Ok(collect_entries(value, None))
  }

  pub async fn subscribe(&self, chat_id: &ChatId, reader: &UserId) -> Result<Feed<ChatMessage>> {
    self.check_access(chat_id, reader).await?;
    let subscription = self.gateway.watch(scheme::chat_messages(chat_id)).await?;
    Ok(Feed::new(subscription, None))
  }

  /// Every chat `user` takes part in with its newest message, most recently
  /// active first. The inbox is listed once it holds a message.
  pub async fn list_chats(&self, user: &UserId) -> Result<Vec<ChatSummary>> {
    let value = self.gateway.get(scheme::chats()).await?;
    Ok(collect_entries(value, Some(&member_of(user))))
  }

  /// Live version of [`MessagingChannel::list_chats`].
  pub async fn subscribe_chats(&self, user: &UserId) -> Result<Feed<ChatSummary>> {
    let subscription = self.gateway.watch(scheme::chats()).await?;
    Ok(Feed::new(subscription, Some(member_of(user))))
  }

  async fn append(&self, chat_id: &ChatId, record: MessageRecord) -> Result<ChatMessage> {
    let key = self
      .gateway
      .push(scheme::chat_messages(chat_id), encode(&record)?)
      .await?;
    let message_id = MessageId::from(key);
    Ok(ChatMessage { message_id, record })
  }

  async fn check_access(&self, chat_id: &ChatId, user: &UserId) -> Result<()> {
    if chat_id.as_str() == user.as_str() {
      return Ok(());
    }
    let participants: BTreeMap<String, bool> = self
      .gateway
      .read(scheme::chat_participants(chat_id))
      .await?
      .ok_or_else(|| Error::ChatNotFound(chat_id.clone()))?;
    if participants.get(user.as_str()).copied().unwrap_or(false) {
      Ok(())
    } else {
      Err(Error::NotChatParticipant { chat_id: chat_id.clone(), user: user.clone() })
    }
  }
}
