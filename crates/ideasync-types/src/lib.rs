//! Shared types for ideasync.
//!
//! `models` holds the domain entities the application reasons about,
//! `api` the wire shapes of the hosted backend's auth API, and `events`
//! the auth change notifications fanned out by the backend client.

pub mod api;
pub mod events;
pub mod models;
