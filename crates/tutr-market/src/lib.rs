//! Marketplace services over any [`tutr_core::store::RecordStore`].
//!
//! The [`SessionRepository`] owns the lifecycle of tutoring-session requests:
//! the fan-out write to every replica, status transitions, and the live read
//! model for both participants. The other services are thin: a user
//! directory, an offer directory, a messaging channel, and a store-backed
//! identity provider.
//!
//! Every store call goes through a [`Gateway`], which bounds it with the
//! configured operation timeout.

pub mod config;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod identity;
pub mod market;
pub mod messaging;
pub mod offers;
pub mod sessions;
pub mod users;

pub use config::MarketConfig;
pub use error::{ConsistencyWarning, Error, ErrorClass, Result};
pub use feed::{Feed, FeedChange, FeedItem};
pub use gateway::Gateway;
pub use identity::StoreIdentity;
pub use market::Market;
pub use messaging::MessagingChannel;
pub use offers::OfferDirectory;
pub use sessions::{ReplicaLocation, ReplicaReport, SessionRepository};
pub use users::UserDirectory;

#[cfg(test)]
mod tests;
