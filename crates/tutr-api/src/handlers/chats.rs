//! Chats between users, including each user's inbox.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tutr_core::{
  chat::{ChatMessage, ChatSummary},
  key::{ChatId, UserId},
  store::RecordStore,
};

use crate::{ApiJson, AppState, Result, auth::CurrentUser};

#[derive(Debug, Deserialize)]
pub struct NewChat {
  pub recipient: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Started {
  pub chat_id: ChatId,
}

#[derive(Debug, Deserialize)]
pub struct NewMessage {
  pub text: String,
}

/// `GET /chats`: the caller's chats, most recently active first.
pub async fn list<S: RecordStore + 'static>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ChatSummary>>> {
  Ok(Json(state.market.messaging().list_chats(user.id()).await?))
}

/// `POST /chats`
pub async fn start<S: RecordStore + 'static>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  ApiJson(input): ApiJson<NewChat>,
) -> Result<(StatusCode, Json<Started>)> {
  let recipient: UserId = input.recipient.parse()?;
  let chat_id = state.market.messaging().start_chat(user.id(), &recipient).await?;
  Ok((StatusCode::CREATED, Json(Started { chat_id })))
}

/// `GET /chats/{id}/messages`
pub async fn history<S: RecordStore + 'static>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>> {
  let chat_id: ChatId = id.parse()?;
  Ok(Json(state.market.messaging().history(&chat_id, user.id()).await?))
}

/// `POST /chats/{id}/messages`
pub async fn send<S: RecordStore + 'static>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
  ApiJson(input): ApiJson<NewMessage>,
) -> Result<(StatusCode, Json<ChatMessage>)> {
  let chat_id: ChatId = id.parse()?;
  let message = state.market.messaging().send(&chat_id, &user, &input.text).await?;
  Ok((StatusCode::CREATED, Json(message)))
}
