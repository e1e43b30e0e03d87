//! Core types and trait definitions for the tutoring marketplace.
//!
//! Nothing here knows about HTTP or SQLite. Identifiers, record paths, the
//! data model, and the [`store::RecordStore`] and
//! [`identity::IdentityProvider`] traits live here so that stores and
//! services can be swapped independently.

// Trait methods spell out `Send` futures where callers need them.
#![allow(async_fn_in_trait)]

pub mod chat;
pub mod error;
pub mod identity;
pub mod key;
pub mod offer;
pub mod path;
pub mod session;
pub mod store;
pub mod user;

pub use error::{Error, Result};
