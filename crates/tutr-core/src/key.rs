//! Path keys, typed identifiers, and ordered push-key generation.
//!
//! Every identifier that ends up inside a [`RecordPath`](crate::path::RecordPath)
//! is a [`Key`]: a single, validated path segment. Typed wrappers
//! ([`UserId`], [`SessionId`], ...) keep the different kinds of keys apart at
//! compile time while sharing the same validation.

use std::{fmt, str::FromStr};

use rand_core::RngCore;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound on the byte length of a single key.
pub const MAX_KEY_LEN: usize = 768;

// ─── Key ─────────────────────────────────────────────────────────────────────

/// A single validated path segment.
///
/// Non-empty, at most [`MAX_KEY_LEN`] bytes, and free of `. # $ [ ] /` and
/// ASCII control characters.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Key(String);

impl Key {
  pub fn new(raw: impl Into<String>) -> Result<Self> {
    let raw = raw.into();
    match invalid_reason(&raw) {
      Some(reason) => Err(Error::InvalidKey { key: raw, reason }),
      None => Ok(Self(raw)),
    }
  }

  /// Wrap a literal already known to be a valid key.
  pub(crate) fn trusted(raw: &str) -> Self { Self(raw.to_owned()) }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn into_string(self) -> String { self.0 }
}

fn invalid_reason(raw: &str) -> Option<&'static str> {
  if raw.is_empty() {
    Some("key is empty")
  } else if raw.len() > MAX_KEY_LEN {
    Some("key is longer than 768 bytes")
  } else if raw.contains(['.', '#', '$', '[', ']', '/']) {
    Some("key contains one of . # $ [ ] /")
  } else if raw.chars().any(|c| c.is_ascii_control()) {
    Some("key contains a control character")
  } else {
    None
  }
}

impl TryFrom<String> for Key {
  type Error = Error;

  fn try_from(raw: String) -> Result<Self> { Self::new(raw) }
}

impl From<Key> for String {
  fn from(key: Key) -> Self { key.0 }
}

impl FromStr for Key {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::new(s) }
}

impl AsRef<str> for Key {
  fn as_ref(&self) -> &str { &self.0 }
}

impl fmt::Display for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Typed identifiers ───────────────────────────────────────────────────────

macro_rules! typed_key {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(Key);

    impl $name {
      pub fn new(raw: impl Into<String>) -> Result<Self> {
        Key::new(raw).map(Self)
      }

      pub fn as_str(&self) -> &str { self.0.as_str() }

      pub fn key(&self) -> &Key { &self.0 }
    }

    impl From<Key> for $name {
      fn from(key: Key) -> Self { Self(key) }
    }

    impl FromStr for $name {
      type Err = Error;

      fn from_str(s: &str) -> Result<Self> { Self::new(s) }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
      }
    }
  };
}

typed_key!(
  /// Opaque identifier issued by the identity provider.
  UserId
);
typed_key!(
  /// Store-generated push key shared by every replica of one session.
  SessionId
);
typed_key!(OfferId);
typed_key!(ChatId);
typed_key!(MessageId);

// ─── Push keys ───────────────────────────────────────────────────────────────

/// Alphabet in ASCII order, so that lexical order of keys follows generation
/// order.
const PUSH_CHARS: &[u8; 64] =
  b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Generates 20-character, lexically ordered, unique keys.
///
/// The first 8 characters encode the millisecond timestamp, the remaining 12
/// are random. Within one millisecond (or when the clock steps backwards) the
/// random tail of the previous key is incremented instead of redrawn.
#[derive(Debug, Default)]
pub struct PushKeyGenerator {
  last_millis: Option<i64>,
  last_random: [u8; 12],
}

impl PushKeyGenerator {
  pub fn new() -> Self { Self::default() }

  pub fn next_key(&mut self, now_millis: i64, rng: &mut impl RngCore) -> Key {
    let millis = match self.last_millis {
      Some(last) if now_millis <= last => {
        self.increment_random();
        last
      }
      _ => {
        rng.fill_bytes(&mut self.last_random);
        for b in &mut self.last_random {
          *b &= 63;
        }
        now_millis.max(0)
      }
    };
    self.last_millis = Some(millis);

    let mut out = [0u8; 20];
    let mut ts = millis as u64;
    for slot in out[..8].iter_mut().rev() {
      *slot = PUSH_CHARS[(ts % 64) as usize];
      ts /= 64;
    }
    for (slot, r) in out[8..].iter_mut().zip(self.last_random) {
      *slot = PUSH_CHARS[r as usize];
    }

    // Every byte comes from PUSH_CHARS, which is ASCII and key-safe.
    Key(out.iter().map(|&b| b as char).collect())
  }

  fn increment_random(&mut self) {
    for r in self.last_random.iter_mut().rev() {
      if *r == 63 {
        *r = 0;
      } else {
        *r += 1;
        break;
      }
    }
  }
}
