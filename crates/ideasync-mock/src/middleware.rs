use std::sync::atomic::Ordering;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use ideasync_types::api::Claims;

use crate::error::MockError;
use crate::state::MockState;

/// Who is calling. `None` means the anon key was presented.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Claims>);

/// Check the API key and resolve the bearer token into a [`Caller`].
/// The anon key is accepted as bearer and yields an anonymous caller.
pub async fn identify(State(state): State<MockState>, mut req: Request, next: Next) -> Response {
    if state.unavailable.load(Ordering::SeqCst) {
        return MockError::unavailable().into_response();
    }

    let api_key = req
        .headers()
        .get("apikey")
        .and_then(|v| v.to_str().ok());
    if api_key != Some(state.anon_key.as_str()) {
        return MockError::unauthorized("No API key found in request").into_response();
    }

    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let caller = match bearer {
        None => Caller(None),
        Some(token) if token == state.anon_key => Caller(None),
        Some(token) => match decode_claims(&state.jwt_secret, &token) {
            Ok(claims) => Caller(Some(claims)),
            Err(e) => return e.into_response(),
        },
    };

    req.extensions_mut().insert(caller);
    next.run(req).await
}

pub fn decode_claims(secret: &str, token: &str) -> Result<Claims, MockError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| MockError::unauthorized(format!("invalid JWT: {}", e)))
}
