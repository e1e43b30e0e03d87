//! [`Market`], every service wired to one store.

use std::sync::Arc;

use tutr_core::{
  store::RecordStore,
  user::{Profile, Role, User},
};

use crate::{
  Gateway, MarketConfig, MessagingChannel, OfferDirectory, Result, SessionRepository,
  StoreIdentity, UserDirectory, users::registration,
};

pub struct Market<S> {
  config:    MarketConfig,
  users:     UserDirectory<S>,
  offers:    OfferDirectory<S>,
  messaging: MessagingChannel<S>,
  sessions:  SessionRepository<S>,
  identity:  Arc<StoreIdentity<S>>,
}

impl<S> Clone for Market<S> {
  fn clone(&self) -> Self {
    Self {
      config:    self.config.clone(),
      users:     self.users.clone(),
      offers:    self.offers.clone(),
      messaging: self.messaging.clone(),
      sessions:  self.sessions.clone(),
      identity:  Arc::clone(&self.identity),
    }
  }
}

impl<S: RecordStore> Market<S> {
  pub fn new(store: Arc<S>, config: MarketConfig) -> Self {
    let gateway = Gateway::new(store, config.op_timeout());
    let users = UserDirectory::new(gateway.clone());
    let offers = OfferDirectory::new(gateway.clone(), users.clone());
    let messaging = MessagingChannel::new(gateway.clone(), users.clone());
    let sessions = SessionRepository::new(
      gateway.clone(),
      users.clone(),
      messaging.clone(),
      config.global_replica,
    );
    let identity = Arc::new(StoreIdentity::new(gateway));
    Self { config, users, offers, messaging, sessions, identity }
  }

  pub fn config(&self) -> &MarketConfig { &self.config }

  pub fn users(&self) -> &UserDirectory<S> { &self.users }

  pub fn offers(&self) -> &OfferDirectory<S> { &self.offers }

  pub fn messaging(&self) -> &MessagingChannel<S> { &self.messaging }

  pub fn sessions(&self) -> &SessionRepository<S> { &self.sessions }

  pub fn identity(&self) -> &StoreIdentity<S> { &self.identity }

  /// Create credentials and the matching profile in one commit, so a failed
  /// sign-up never leaves the email claimed by an account without a profile.
  pub async fn create_account(
    &self,
    email: &str,
    password: &str,
    role: Role,
    profile: Profile,
  ) -> Result<User> {
    profile.validate()?;
    let id = self
      .identity
      .create_account_with(email, password, |id, batch| {
        registration(batch, id, role, &profile)
      })
      .await?;
    tracing::info!(user = %id, %role, "registered user");
    Ok(User::new(role, id, profile))
  }

  /// Check credentials and resolve the user they belong to.
  pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
    let id = self.identity.verify_credentials(email, password).await?;
    self.users.resolve(&id).await
  }
}
