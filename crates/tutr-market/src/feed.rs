//! Live, ordered collections built on store subscriptions.
//!
//! The store delivers the whole collection on every change. A [`Feed`]
//! decodes each delivery into a sorted `Vec<T>` and, for consumers that want
//! incremental updates, diffs it against the previous one.

use std::{cmp::Ordering, collections::BTreeMap, fmt::Debug};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tutr_core::{
  chat::{ChatMessage, ChatSummary},
  key::{ChatId, Key, MessageId, OfferId, SessionId, UserId},
  offer::Offer,
  session::Session,
  store::Subscription,
};

use crate::{Error, Result};

/// A record that lives as one child of a watched collection.
pub trait FeedItem: Clone + Debug + PartialEq + Send + Sync + 'static {
  type Id: Clone + Debug + Ord + Send + Sync + 'static;

  /// Decode the child stored under `key`.
  fn from_entry(key: Key, value: Value) -> serde_json::Result<Self>;

  fn id(&self) -> &Self::Id;

  /// Display order of the collection.
  fn order(a: &Self, b: &Self) -> Ordering;
}

impl FeedItem for Session {
  type Id = SessionId;

  fn from_entry(key: Key, value: Value) -> serde_json::Result<Self> {
    Ok(Self { session_id: key.into(), record: serde_json::from_value(value)? })
  }

  fn id(&self) -> &SessionId { &self.session_id }

  fn order(a: &Self, b: &Self) -> Ordering { Session::newest_first(a, b) }
}

impl FeedItem for Offer {
  type Id = OfferId;

  fn from_entry(key: Key, value: Value) -> serde_json::Result<Self> {
    Ok(Self { offer_id: key.into(), record: serde_json::from_value(value)? })
  }

  fn id(&self) -> &OfferId { &self.offer_id }

  fn order(a: &Self, b: &Self) -> Ordering {
    newest_first(a.record.created_at, b.record.created_at, &a.offer_id, &b.offer_id)
  }
}

impl FeedItem for ChatMessage {
  type Id = MessageId;

  fn from_entry(key: Key, value: Value) -> serde_json::Result<Self> {
    Ok(Self { message_id: key.into(), record: serde_json::from_value(value)? })
  }

  fn id(&self) -> &MessageId { &self.message_id }

  /// Oldest first, like a conversation.
  fn order(a: &Self, b: &Self) -> Ordering {
    newest_first(a.record.timestamp, b.record.timestamp, &a.message_id, &b.message_id)
      .reverse()
  }
}

/// The stored shape of `chats/{chatId}`.
#[derive(Deserialize)]
struct StoredChat {
  #[serde(default)]
  participants: BTreeMap<UserId, bool>,
  messages:     Option<Value>,
}

impl FeedItem for ChatSummary {
  type Id = ChatId;

  fn from_entry(key: Key, value: Value) -> serde_json::Result<Self> {
    let stored: StoredChat = serde_json::from_value(value)?;
    let participants = stored
      .participants
      .into_iter()
      .filter_map(|(id, member)| member.then_some(id))
      .collect();
    let latest = collect_entries::<ChatMessage>(stored.messages, None).pop();
    Ok(Self { chat_id: key.into(), participants, latest })
  }

  fn id(&self) -> &ChatId { &self.chat_id }

  /// Most recent message first; chats without messages last.
  fn order(a: &Self, b: &Self) -> Ordering {
    match (&a.latest, &b.latest) {
      (Some(x), Some(y)) => {
        newest_first(x.record.timestamp, y.record.timestamp, &a.chat_id, &b.chat_id)
      }
      (Some(_), None) => Ordering::Less,
      (None, Some(_)) => Ordering::Greater,
      (None, None) => a.chat_id.cmp(&b.chat_id),
    }
  }
}

fn newest_first<I: Ord>(a: DateTime<Utc>, b: DateTime<Utc>, a_id: &I, b_id: &I) -> Ordering {
  b.cmp(&a).then_with(|| b_id.cmp(a_id))
}

pub type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Decode every child of a collection value, skipping ones that do not
/// decode, and sort them.
pub(crate) fn collect_entries<T: FeedItem>(
  value: Option<Value>,
  filter: Option<&Filter<T>>,
) -> Vec<T> {
  let Some(Value::Object(children)) = value else {
    return Vec::new();
  };
  let mut items: Vec<T> = children
    .into_iter()
    .filter_map(|(raw_key, child)| {
      let key = match Key::new(raw_key.as_str()) {
        Ok(key) => key,
        Err(err) => {
          tracing::warn!(key = %raw_key, error = %err, "skipping entry with invalid key");
          return None;
        }
      };
      match T::from_entry(key, child) {
        Ok(item) => Some(item),
        Err(err) => {
          tracing::warn!(key = %raw_key, error = %err, "skipping undecodable entry");
          None
        }
      }
    })
    .filter(|item| filter.is_none_or(|keep| keep(item)))
    .collect();
  items.sort_by(T::order);
  items
}

// ─── Changes ─────────────────────────────────────────────────────────────────

/// The difference between two consecutive deliveries of a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedChange<T: FeedItem> {
  pub added:   Vec<T>,
  pub updated: Vec<T>,
  pub removed: Vec<T::Id>,
}

impl<T: FeedItem> FeedChange<T> {
  pub fn between(previous: &[T], current: &[T]) -> Self {
    let mut added = Vec::new();
    let mut updated = Vec::new();
    for item in current {
      match previous.iter().find(|old| old.id() == item.id()) {
        None => added.push(item.clone()),
        Some(old) if old != item => updated.push(item.clone()),
        Some(_) => {}
      }
    }
    let removed = previous
      .iter()
      .filter(|old| !current.iter().any(|item| item.id() == old.id()))
      .map(|old| old.id().clone())
      .collect();
    Self { added, updated, removed }
  }

  pub fn is_empty(&self) -> bool {
    self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
  }
}

// ─── Feed ────────────────────────────────────────────────────────────────────

/// A live, ordered view of one collection.
///
/// Dropping the feed (or calling [`Feed::unsubscribe`]) releases the
/// underlying store subscription.
pub struct Feed<T: FeedItem> {
  subscription: Subscription,
  filter:       Option<Filter<T>>,
  last:         Vec<T>,
}

impl<T: FeedItem> Feed<T> {
  pub(crate) fn new(subscription: Subscription, filter: Option<Filter<T>>) -> Self {
    Self { subscription, filter, last: Vec::new() }
  }

  /// The most recent snapshot.
  pub fn current(&mut self) -> Result<Vec<T>> {
    let snapshot = self.subscription.current()?;
    Ok(self.remember(snapshot.value))
  }

  /// Wait for the next delivery and return the whole collection.
  pub async fn next(&mut self) -> Result<Vec<T>> {
    let snapshot = self
      .subscription
      .changed()
      .await
      .ok_or(Error::SubscriptionClosed)??;
    Ok(self.remember(snapshot.value))
  }

  /// Wait until the collection differs from the last snapshot returned, and
  /// return what changed.
  pub async fn next_change(&mut self) -> Result<FeedChange<T>> {
    loop {
      let previous = std::mem::take(&mut self.last);
      let current = self.next().await;
      let current = match current {
        Ok(current) => current,
        Err(err) => {
          self.last = previous;
          return Err(err);
        }
      };
      let change = FeedChange::between(&previous, &current);
      if !change.is_empty() {
        return Ok(change);
      }
    }
  }

  pub fn unsubscribe(self) { self.subscription.unsubscribe(); }

  fn remember(&mut self, value: Option<Value>) -> Vec<T> {
    let items = collect_entries(value, self.filter.as_ref());
    self.last = items.clone();
    items
  }
}
