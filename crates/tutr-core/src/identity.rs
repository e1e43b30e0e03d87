//! The identity provider seam.
//!
//! The rest of the system treats a signed-in user as nothing more than an
//! opaque [`UserId`]; how credentials are checked is the provider's business.

use std::future::Future;

use crate::{Error, Result, key::UserId};

/// Shortest password a provider accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Email/password authentication issuing stable user ids.
pub trait IdentityProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create an account and sign it in.
  fn sign_up<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<UserId, Self::Error>> + Send + 'a;

  /// Check credentials and make the account the current user.
  fn sign_in<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<UserId, Self::Error>> + Send + 'a;

  fn sign_out(&self);

  /// The signed-in user, if any.
  fn current_user_id(&self) -> Option<UserId>;
}

/// Lower-cased, trimmed email; rejects anything without a local part and a
/// domain.
///
/// Emails are indexed under a key with `.` spelled as `,`, so commas and the
/// characters a key can never hold are refused here.
pub fn normalize_email(raw: &str) -> Result<String> {
  let email = raw.trim().to_lowercase();
  if email.chars().any(|c| matches!(c, ',' | '#' | '$' | '[' | ']' | '/') || c.is_control()) {
    return Err(Error::InvalidEmail(raw.to_owned()));
  }
  match email.split_once('@') {
    Some((local, domain))
      if !local.is_empty() && domain.contains('.') && !domain.contains('@') =>
    {
      Ok(email)
    }
    _ => Err(Error::InvalidEmail(raw.to_owned())),
  }
}

pub fn check_password(password: &str) -> Result<()> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(Error::WeakPassword(MIN_PASSWORD_LEN));
  }
  Ok(())
}
