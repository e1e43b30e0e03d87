//! Session requests and responses.
//!
//! The caller's role decides which replica set they read: students see the
//! sessions they requested, tutors the ones requested from them.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tutr_core::{
  key::SessionId,
  session::{Decision, Session, SessionRequest, SessionStatus},
  store::RecordStore,
  user::User,
};

use crate::{ApiError, ApiJson, AppState, Result, auth::CurrentUser};

#[derive(Debug, Deserialize)]
pub struct NewSession {
  pub tutor_id: String,
  pub date:     String,
  pub time:     String,
  pub message:  String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Requested {
  pub session_id: SessionId,
}

#[derive(Debug, Deserialize)]
pub struct Respond {
  pub decision: Decision,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Responded {
  pub session_id: SessionId,
  pub status:     SessionStatus,
}

/// `GET /sessions`
pub async fn list<S: RecordStore + 'static>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Session>>> {
  let sessions = state
    .market
    .sessions()
    .list_my_sessions(user.id(), user.role())
    .await?;
  Ok(Json(sessions))
}

/// `POST /sessions`
pub async fn request<S: RecordStore + 'static>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  ApiJson(input): ApiJson<NewSession>,
) -> Result<(StatusCode, Json<Requested>)> {
  let User::Student(student) = &user else {
    return Err(ApiError::Forbidden("only students can request sessions"));
  };
  let request = SessionRequest::new(
    student.id.as_str(),
    &input.tutor_id,
    &input.date,
    &input.time,
    &input.message,
  )?;
  let session_id = state.market.sessions().request_session(request).await?;
  Ok((StatusCode::CREATED, Json(Requested { session_id })))
}

/// `POST /sessions/{id}/respond`
pub async fn respond<S: RecordStore + 'static>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
  ApiJson(input): ApiJson<Respond>,
) -> Result<Json<Responded>> {
  let session_id: SessionId = id.parse()?;
  let status = state
    .market
    .sessions()
    .respond_to_session(&session_id, user.id(), input.decision)
    .await?;
  Ok(Json(Responded { session_id, status }))
}
