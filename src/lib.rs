//! # mini-cms-client
//!
//! Client-side session and navigation layer for the Mini CMS.
//!
//! The pieces are built leaf-first and wired by ownership rather than
//! globals: an [`api::ApiClient`] bound to the API base URL, a
//! [`session::SessionStore`] that owns the token and feeds it to that client,
//! and a [`router::Router`] whose guards consult the store on every
//! navigation.

pub mod api;
pub mod config;
pub mod news;
pub mod router;
pub mod session;
pub mod storage;

#[cfg(test)]
mod test_helpers;
