//! The public offer directory.

use chrono::Utc;
use tutr_core::{
  key::{OfferId, UserId},
  offer::{NewOffer, Offer, OfferRecord},
  path::scheme,
  store::{RecordStore, WriteBatch},
};

use crate::{
  Error, Feed, Result, UserDirectory,
  feed::collect_entries,
  gateway::{Gateway, encode},
};

pub struct OfferDirectory<S> {
  gateway: Gateway<S>,
  users:   UserDirectory<S>,
}

impl<S> Clone for OfferDirectory<S> {
  fn clone(&self) -> Self {
    Self { gateway: self.gateway.clone(), users: self.users.clone() }
  }
}

impl<S: RecordStore> OfferDirectory<S> {
  pub fn new(gateway: Gateway<S>, users: UserDirectory<S>) -> Self { Self { gateway, users } }

  /// Post an offer. The creator must be a registered student or tutor.
  pub async fn create(&self, creator: &UserId, input: NewOffer) -> Result<Offer> {
    input.validate()?;
    self.users.resolve(creator).await?;

    let offer_id: OfferId = self.gateway.generate_key().into();
    let record = OfferRecord::new(input, creator.clone(), Utc::now());
    let path = scheme::offer(&offer_id);
    self
      .gateway
      .commit(WriteBatch::new().guard(path.clone(), None).set(path, encode(&record)?))
      .await?;

    tracing::info!(offer = %offer_id, creator = %creator, "offer created");
    Ok(Offer { offer_id, record })
  }

  pub async fn get(&self, id: &OfferId) -> Result<Offer> {
    let record: OfferRecord = self
      .gateway
      .read(scheme::offer(id))
      .await?
      .ok_or_else(|| Error::OfferNotFound(id.clone()))?;
    Ok(Offer { offer_id: id.clone(), record })
  }

  /// Every offer, newest first.
  pub async fn list(&self) -> Result<Vec<Offer>> {
    let value = self.gateway.get(scheme::offers()).await?;
    Ok(collect_entries(value, None))
  }

  pub async fn list_by(&self, creator: &UserId) -> Result<Vec<Offer>> {
    let mut offers = self.list().await?;
    offers.retain(|offer| &offer.record.created_by == creator);
    Ok(offers)
  }

  pub async fn subscribe(&self) -> Result<Feed<Offer>> {
    let subscription = self.gateway.watch(scheme::offers()).await?;
    Ok(Feed::new(subscription, None))
  }
}
