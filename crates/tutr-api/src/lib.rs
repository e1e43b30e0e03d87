//! JSON REST API for the tutoring marketplace.
//!
//! Exposes an axum [`Router`] over a [`Market`] backed by any
//! [`RecordStore`]. Requests authenticate with HTTP Basic credentials
//! (email and password) checked by the market's identity provider.

pub mod auth;
pub mod error;
pub mod handlers;


pub use error::{ApiError, Result};

use axum::{
  Router,
  extract::FromRequest,
  routing::{get, post},
};
use tutr_core::store::RecordStore;
use tutr_market::Market;

use handlers::{accounts, chats, offers, sessions};

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub market: Market<S>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self { Self { market: self.market.clone() } }
}

impl<S> AppState<S> {
  pub fn new(market: Market<S>) -> Self { Self { market } }
}

/// `Json` whose rejections render as [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build an axum [`Router`] for the API.
pub fn router<S: RecordStore + 'static>(state: AppState<S>) -> Router {
  Router::new()
    .route("/accounts",               post(accounts::create::<S>))
    .route("/me",                     get(accounts::me))
    .route("/users/{id}",             get(accounts::user::<S>))
    .route("/offers",                 get(offers::list::<S>).post(offers::create::<S>))
    .route("/offers/{id}",            get(offers::get::<S>))
    .route("/sessions",               get(sessions::list::<S>).post(sessions::request::<S>))
    .route("/sessions/{id}/respond",  post(sessions::respond::<S>))
    .route("/chats",                  get(chats::list::<S>).post(chats::start::<S>))
    .route("/chats/{id}/messages",    get(chats::history::<S>).post(chats::send::<S>))
    .with_state(state)
}
