//! Typed client for the hosted backend.
//!
//! The backend speaks two HTTP dialects: an auth API under `/auth/v1`
//! (sign-up, password and refresh grants, user lookup) and a table API
//! under `/rest/v1` with PostgREST-style filters. [`AuthClient`] owns the
//! session and fans out [`AuthEvent`](ideasync_types::events::AuthEvent)s;
//! [`DataClient`] issues table queries with the current access token and
//! maps every row through [`rows`] before handing it out.

pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod http;
pub mod rest;
pub mod rows;

pub use auth::{AuthBackend, AuthClient, SessionSnapshot, SessionStorage, SessionTokens, SignUpOutcome};
pub use config::BackendConfig;
pub use data::{DataBackend, DataClient, NewMessage};
pub use error::{BackendError, Result};
