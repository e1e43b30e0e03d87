//! The public offer board.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use tutr_core::{
  key::OfferId,
  offer::{NewOffer, Offer},
  store::RecordStore,
};

use crate::{ApiJson, AppState, Result, auth::CurrentUser};

/// `GET /offers`
pub async fn list<S: RecordStore + 'static>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Offer>>> {
  Ok(Json(state.market.offers().list().await?))
}

/// `POST /offers`
pub async fn create<S: RecordStore + 'static>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  ApiJson(input): ApiJson<NewOffer>,
) -> Result<(StatusCode, Json<Offer>)> {
  let offer = state.market.offers().create(user.id(), input).await?;
  Ok((StatusCode::CREATED, Json(offer)))
}

/// `GET /offers/{id}`
pub async fn get<S: RecordStore + 'static>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Json<Offer>> {
  let id: OfferId = id.parse()?;
  Ok(Json(state.market.offers().get(&id).await?))
}
