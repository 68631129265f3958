use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use ideasync_types::api::{
    AuthUser, Claims, PasswordGrantRequest, RefreshGrantRequest, SignUpRequest, TokenResponse,
    UpdateUserRequest,
};

use crate::error::MockError;
use crate::middleware::Caller;
use crate::state::{MockState, MockUser, Store};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct GrantQuery {
    pub grant_type: String,
}

pub async fn signup(
    State(state): State<MockState>,
    Json(req): Json<SignUpRequest>,
) -> Result<impl IntoResponse, MockError> {
    let email = req.email.trim().to_ascii_lowercase();
    if !email.contains('@') {
        return Err(MockError::unprocessable("Unable to validate email address: invalid format"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(MockError::unprocessable(format!(
            "Password should be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| MockError::unprocessable(format!("hashing failed: {}", e)))?
        .to_string();

    let mut store = state.store();
    if store.user_by_email(&email).is_some() {
        return Err(MockError::unprocessable("User already registered"));
    }

    let user_id = Uuid::new_v4();
    let confirmed_at = (!store.require_confirmation).then(Utc::now);
    store.users.insert(
        user_id,
        MockUser {
            id: user_id,
            email: email.clone(),
            password_hash,
            metadata: req.data.clone(),
            confirmed_at,
        },
    );
    store.upsert_user_rows(user_id, &email, &req.data);
    debug!("Mock signup {} ({})", email, user_id);

    if store.require_confirmation {
        let user = auth_user(&store.users[&user_id]);
        return Ok(Json(serde_json::to_value(user).unwrap_or(Value::Null)));
    }

    let tokens = issue_session(&state.jwt_secret, &mut store, user_id)?;
    Ok(Json(serde_json::to_value(tokens).unwrap_or(Value::Null)))
}

pub async fn token(
    State(state): State<MockState>,
    Query(query): Query<GrantQuery>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, MockError> {
    match query.grant_type.as_str() {
        "password" => {
            let req: PasswordGrantRequest = serde_json::from_value(body)
                .map_err(|e| MockError::invalid_grant(e.to_string()))?;
            password_grant(&state, req).map(Json)
        }
        "refresh_token" => {
            let req: RefreshGrantRequest = serde_json::from_value(body)
                .map_err(|e| MockError::invalid_grant(e.to_string()))?;
            refresh_grant(&state, req).map(Json)
        }
        other => Err(MockError::invalid_grant(format!("unsupported grant type {}", other))),
    }
}

fn password_grant(state: &MockState, req: PasswordGrantRequest) -> Result<TokenResponse, MockError> {
    let mut store = state.store();
    let user = store
        .user_by_email(req.email.trim())
        .ok_or_else(|| MockError::invalid_grant("Invalid login credentials"))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| MockError::invalid_grant("Invalid login credentials"))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| MockError::invalid_grant("Invalid login credentials"))?;

    if user.confirmed_at.is_none() {
        return Err(MockError::invalid_grant("Email not confirmed"));
    }

    let user_id = user.id;
    issue_session(&state.jwt_secret, &mut store, user_id)
}

fn refresh_grant(state: &MockState, req: RefreshGrantRequest) -> Result<TokenResponse, MockError> {
    let mut store = state.store();
    let user_id = store
        .refresh_tokens
        .remove(&req.refresh_token)
        .ok_or_else(|| MockError::invalid_grant("Invalid Refresh Token: Refresh Token Not Found"))?;
    issue_session(&state.jwt_secret, &mut store, user_id)
}

pub async fn logout(
    State(state): State<MockState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, MockError> {
    let claims = caller.0.ok_or_else(|| MockError::unauthorized("This endpoint requires a Bearer token"))?;

    let mut store = state.store();
    store.refresh_tokens.retain(|_, uid| *uid != claims.sub);
    debug!("Mock logout {}", claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_user(
    State(state): State<MockState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, MockError> {
    let claims = caller.0.ok_or_else(|| MockError::unauthorized("This endpoint requires a Bearer token"))?;

    let store = state.store();
    let user = store
        .users
        .get(&claims.sub)
        .ok_or_else(|| MockError::unauthorized("User from sub claim in JWT does not exist"))?;
    Ok(Json(auth_user(user)))
}

pub async fn update_user(
    State(state): State<MockState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, MockError> {
    let claims = caller.0.ok_or_else(|| MockError::unauthorized("This endpoint requires a Bearer token"))?;

    let mut store = state.store();
    let (email, metadata) = {
        let user = store
            .users
            .get_mut(&claims.sub)
            .ok_or_else(|| MockError::unauthorized("User from sub claim in JWT does not exist"))?;
        if req.data.name.is_some() {
            user.metadata.name = req.data.name.clone();
        }
        if req.data.role.is_some() {
            user.metadata.role = req.data.role.clone();
        }
        (user.email.clone(), user.metadata.clone())
    };
    store.upsert_user_rows(claims.sub, &email, &metadata);

    Ok(Json(auth_user(&store.users[&claims.sub])))
}

pub fn auth_user(user: &MockUser) -> AuthUser {
    AuthUser {
        id: user.id,
        email: Some(user.email.clone()),
        user_metadata: user.metadata.clone(),
        email_confirmed_at: user.confirmed_at,
    }
}

pub fn issue_session(secret: &str, store: &mut Store, user_id: Uuid) -> Result<TokenResponse, MockError> {
    let user = store
        .users
        .get(&user_id)
        .ok_or_else(|| MockError::invalid_grant("User not found"))?;

    let now = Utc::now();
    let expires_at = now + Duration::seconds(store.access_ttl_secs);
    let access_token = create_token(secret, user, expires_at.timestamp() as usize)?;
    let refresh_token = Uuid::new_v4().simple().to_string();
    let auth_user = auth_user(user);

    store.refresh_tokens.insert(refresh_token.clone(), user_id);

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "bearer".to_string(),
        expires_in: store.access_ttl_secs,
        expires_at: Some(expires_at.timestamp()),
        user: auth_user,
    })
}

fn create_token(secret: &str, user: &MockUser, exp: usize) -> Result<String, MockError> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: "authenticated".to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| MockError::invalid_grant(format!("token encoding failed: {}", e)))
}

/// Query-string style fragment a confirmation link would carry.
pub fn confirmation_fragment(tokens: &TokenResponse) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    serializer
        .append_pair("access_token", &tokens.access_token)
        .append_pair("refresh_token", &tokens.refresh_token)
        .append_pair("expires_in", &tokens.expires_in.to_string())
        .append_pair("token_type", &tokens.token_type)
        .append_pair("type", "signup");
    if let Some(expires_at) = tokens.expires_at {
        serializer.append_pair("expires_at", &expires_at.to_string());
    }
    serializer.finish()
}
