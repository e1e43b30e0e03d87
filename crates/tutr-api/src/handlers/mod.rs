//! Request handlers, one module per resource.

pub mod accounts;
pub mod chats;
pub mod offers;
pub mod sessions;
