//! Sign-up and user lookup.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::Deserialize;
use tutr_core::{
  key::UserId,
  store::RecordStore,
  user::{Profile, Role, User},
};

use crate::{ApiJson, AppState, Result, auth::CurrentUser};

#[derive(Debug, Deserialize)]
pub struct NewAccount {
  pub email:    String,
  pub password: String,
  pub role:     Role,
  pub profile:  Profile,
}

/// `POST /accounts`
pub async fn create<S: RecordStore + 'static>(
  State(state): State<AppState<S>>,
  ApiJson(input): ApiJson<NewAccount>,
) -> Result<(StatusCode, Json<User>)> {
  let user = state
    .market
    .create_account(&input.email, &input.password, input.role, input.profile)
    .await?;
  Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /me`
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> { Json(user) }

/// `GET /users/{id}`
pub async fn user<S: RecordStore + 'static>(
  State(state): State<AppState<S>>,
  _caller: CurrentUser,
  Path(id): Path<String>,
) -> Result<Json<User>> {
  let id: UserId = id.parse()?;
  Ok(Json(state.market.users().resolve(&id).await?))
}
