//! Library crate for photo-reveal-back: a shared photo board whose sections are
//! revealed by scanning printed QR codes.

pub mod config;
/// Persistence: the game store trait and its backends.
pub mod dao;
/// Request and response payloads.
pub mod dto;
/// Domain and HTTP error types.
pub mod error;
/// HTTP routes.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// Shared runtime state and the store adapter.
pub mod state;
pub mod sync;
