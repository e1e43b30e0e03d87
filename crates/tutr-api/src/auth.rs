//! HTTP Basic-auth extractor resolving the caller through the identity
//! provider.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use tutr_core::{store::RecordStore, user::User};

use crate::{AppState, error::ApiError};

/// The authenticated caller, with their registered profile.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Pull `(email, password)` out of a `Basic` authorization header.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val.strip_prefix("Basic ").ok_or(ApiError::Unauthorized)?;
  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

  let (email, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((email.to_owned(), password.to_owned()))
}

impl<S: RecordStore + 'static> FromRequestParts<AppState<S>> for CurrentUser {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let (email, password) = basic_credentials(&parts.headers)?;
    match state.market.authenticate(&email, &password).await {
      Ok(user) => Ok(CurrentUser(user)),
      // An account whose profile was never registered cannot act either.
      Err(tutr_market::Error::InvalidCredentials | tutr_market::Error::UserNotFound(_)) => {
        tracing::debug!(%email, "rejected credentials");
        Err(ApiError::Unauthorized)
      }
      Err(err) => Err(err.into()),
    }
  }
}
