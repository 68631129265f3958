//! In-process stand-in for the hosted backend, used by integration tests.
//!
//! Serves the auth and table endpoints the client talks to on an ephemeral
//! localhost port, with in-memory tables and per-table row policies.
//!
//! ```no_run
//! # async fn demo() -> std::io::Result<()> {
//! let server = ideasync_mock::MockBackend::start().await?;
//! println!("{} {}", server.url(), server.anon_key());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::{
    Router,
    routing::{get, post},
};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::state::{MockState, MockStateInner, Row};

pub const ANON_KEY: &str = "mock-anon-key";

pub struct MockBackend {
    state: MockState,
    url: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockBackend {
    /// Start with sign-ups confirmed immediately.
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(false).await
    }

    /// Start with optional email confirmation: when required, sign-up
    /// returns no session and sign-in fails until [`confirm_email`] runs.
    ///
    /// [`confirm_email`]: Self::confirm_email
    pub async fn start_with(require_confirmation: bool) -> std::io::Result<Self> {
        let state: MockState = Arc::new(MockStateInner::new(
            ANON_KEY.to_string(),
            Uuid::new_v4().to_string(),
            require_confirmation,
        ));

        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let url = format!("http://{}/", local_addr);

        let app = router(state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!("Mock backend error: {}", e);
            }
        });

        Ok(Self {
            state,
            url,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn anon_key(&self) -> &str {
        &self.state.anon_key
    }

    /// Mark the account confirmed and return the fragment of the link the
    /// confirmation email would have carried.
    pub fn confirm_email(&self, email: &str) -> Option<String> {
        let mut store = self.state.store();
        let user_id = {
            let user = store
                .users
                .values_mut()
                .find(|u| u.email.eq_ignore_ascii_case(email))?;
            user.confirmed_at = Some(Utc::now());
            user.id
        };
        let tokens = auth::issue_session(&self.state.jwt_secret, &mut store, user_id).ok()?;
        Some(auth::confirmation_fragment(&tokens))
    }

    /// Lifetime of access tokens issued from now on.
    pub fn set_access_ttl(&self, secs: i64) {
        self.state.store().access_ttl_secs = secs;
    }

    /// Answer every request with 503 until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Seed a row directly, bypassing policies. Returns false for unknown
    /// tables or non-object values.
    pub fn insert_row(&self, table: &str, row: Value) -> bool {
        let Value::Object(row) = row else {
            return false;
        };
        let mut store = self.state.store();
        match store.table_mut(table) {
            Some(rows) => {
                rows.push(row);
                true
            }
            None => false,
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .store()
            .table(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of refresh tokens still redeemable for `user_id`.
    pub fn live_refresh_tokens(&self, user_id: Uuid) -> usize {
        self.state
            .store()
            .refresh_tokens
            .values()
            .filter(|id| **id == user_id)
            .count()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn router(state: MockState) -> Router {
    Router::new()
        .route("/auth/v1/signup", post(auth::signup))
        .route("/auth/v1/token", post(auth::token))
        .route("/auth/v1/logout", post(auth::logout))
        .route("/auth/v1/user", get(auth::get_user).put(auth::update_user))
        .route(
            "/rest/v1/{table}",
            get(rest::select)
                .post(rest::insert)
                .patch(rest::update)
                .delete(rest::delete),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::identify,
        ))
        .with_state(state)
}
