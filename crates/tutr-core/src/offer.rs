//! Tutoring offers posted to the public directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  key::{OfferId, UserId},
};

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
pub enum OfferKind {
  Group,
  Individual,
}

/// Input to the offer directory; the id, creator, and timestamp are assigned
/// on creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOffer {
  #[serde(rename = "type")]
  pub kind:        OfferKind,
  pub university:  String,
  pub study_line:  String,
  #[serde(default)]
  pub exam:        Option<String>,
  /// Hourly price in whole currency units.
  pub price:       u32,
  pub description: String,
}

impl NewOffer {
  pub fn validate(&self) -> Result<()> {
    for (field, value) in [
      ("university", &self.university),
      ("study line", &self.study_line),
      ("description", &self.description),
    ] {
      if value.trim().is_empty() {
        return Err(Error::MissingField(field));
      }
    }
    if self.price == 0 {
      return Err(Error::InvalidPrice);
    }
    Ok(())
  }
}

/// The stored record at `offers/{offerId}`; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRecord {
  #[serde(rename = "type")]
  pub kind:        OfferKind,
  pub university:  String,
  pub study_line:  String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exam:        Option<String>,
  pub price:       u32,
  pub description: String,
  pub created_by:  UserId,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub created_at:  DateTime<Utc>,
}

impl OfferRecord {
  pub fn new(input: NewOffer, created_by: UserId, created_at: DateTime<Utc>) -> Self {
    Self {
      kind: input.kind,
      university: input.university.trim().to_owned(),
      study_line: input.study_line.trim().to_owned(),
      exam: input
        .exam
        .map(|e| e.trim().to_owned())
        .filter(|e| !e.is_empty()),
      price: input.price,
      description: input.description.trim().to_owned(),
      created_by,
      created_at,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
  pub offer_id: OfferId,
  #[serde(flatten)]
  pub record:   OfferRecord,
}
