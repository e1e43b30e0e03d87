//! An [`IdentityProvider`] whose accounts live in the record store.
//!
//! `accounts/{userId}` holds the email and argon2 PHC hash;
//! `accountEmails/{emailKey}` maps the normalised email (with `.` replaced by
//! `,`, since keys cannot contain dots) back to the user id.

use std::sync::{PoisonError, RwLock};

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use chrono::{DateTime, Utc};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use tutr_core::{
  identity::{IdentityProvider, check_password, normalize_email},
  key::{Key, UserId},
  path::scheme,
  store::{RecordStore, WriteBatch},
};
use uuid::Uuid;

use crate::{
  Error, Result,
  gateway::{Gateway, encode},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
  email:         String,
  password_hash: String,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  created_at:    DateTime<Utc>,
}

pub struct StoreIdentity<S> {
  gateway: Gateway<S>,
  current: RwLock<Option<UserId>>,
}

fn email_key(email: &str) -> Result<Key> { Ok(Key::new(email.replace('.', ","))?) }

impl<S: RecordStore> StoreIdentity<S> {
  pub fn new(gateway: Gateway<S>) -> Self { Self { gateway, current: RwLock::new(None) } }

  /// Check credentials without touching the signed-in state. Used to
  /// authenticate individual requests.
  pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<UserId> {
    let email = normalize_email(email).map_err(|_| Error::InvalidCredentials)?;
    let index = email_key(&email).map_err(|_| Error::InvalidCredentials)?;
    let user_id: UserId = self
      .gateway
      .read(scheme::account_email(&index))
      .await?
      .ok_or(Error::InvalidCredentials)?;
    let account: AccountRecord = self
      .gateway
      .read(scheme::account(&user_id))
      .await?
      .ok_or(Error::InvalidCredentials)?;

    let parsed = PasswordHash::new(&account.password_hash)
      .map_err(|e| Error::PasswordHash(e.to_string()))?;
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .map_err(|_| Error::InvalidCredentials)?;
    Ok(user_id)
  }

  /// Create an account without signing it in.
  pub async fn create_account(&self, email: &str, password: &str) -> Result<UserId> {
    self.create_account_with(email, password, |_, batch| Ok(batch)).await
  }

  /// Create an account, letting `extend` add writes that must land in the
  /// same commit as the credentials.
  pub(crate) async fn create_account_with<F>(
    &self,
    email: &str,
    password: &str,
    extend: F,
  ) -> Result<UserId>
  where
    F: FnOnce(&UserId, WriteBatch) -> Result<WriteBatch>,
  {
    let email = normalize_email(email)?;
    check_password(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| Error::PasswordHash(e.to_string()))?
      .to_string();

    let user_id = UserId::new(Uuid::new_v4().simple().to_string())?;
    let index = scheme::account_email(&email_key(&email)?);
    let record = AccountRecord { email: email.clone(), password_hash, created_at: Utc::now() };
    let batch = WriteBatch::new()
      .guard(index.clone(), None)
      .set(index, encode(&user_id)?)
      .set(scheme::account(&user_id), encode(&record)?);
    let batch = extend(&user_id, batch)?;

    match self.gateway.commit(batch).await {
      Ok(()) => {
        tracing::info!(user = %user_id, "account created");
        Ok(user_id)
      }
      Err(err) if err.is_precondition_failed() => Err(Error::EmailTaken(email)),
      Err(err) => Err(err),
    }
  }

  fn set_current(&self, user: Option<UserId>) {
    *self.current.write().unwrap_or_else(PoisonError::into_inner) = user;
  }
}

impl<S: RecordStore> IdentityProvider for StoreIdentity<S> {
  type Error = Error;

  async fn sign_up<'a>(&'a self, email: &'a str, password: &'a str) -> Result<UserId> {
    let user_id = self.create_account(email, password).await?;
    self.set_current(Some(user_id.clone()));
    Ok(user_id)
  }

  async fn sign_in<'a>(&'a self, email: &'a str, password: &'a str) -> Result<UserId> {
    let user_id = self.verify_credentials(email, password).await?;
    self.set_current(Some(user_id.clone()));
    Ok(user_id)
  }

  fn sign_out(&self) { self.set_current(None); }

  fn current_user_id(&self) -> Option<UserId> {
    self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
  }
}
