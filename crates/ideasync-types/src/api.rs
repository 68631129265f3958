use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// Access token claims. Issued by the backend, only ever inspected by the
/// test stand-in; the client treats tokens as opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

// -- Users --

/// Free-form metadata attached to the auth user at sign-up. The role is kept
/// as a raw string so a malformed value does not poison the whole payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

// -- Auth requests --

#[derive(Debug, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub data: UserMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordGrantRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshGrantRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub data: UserMetadata,
}

// -- Auth responses --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Sign-up either yields a session straight away or, when the backend
/// requires email confirmation, only the pending user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(TokenResponse),
    PendingConfirmation(AuthUser),
}

/// Error payloads differ between the auth and table APIs; every field is
/// optional and `message` picks the most descriptive one present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub fn message(&self) -> Option<String> {
        self.error_description
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.message.clone())
            .or_else(|| self.error.clone())
    }
}

// -- Session --

/// `now + secs`, or `None` when that falls outside the representable range.
pub fn expiry_after(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(secs).and_then(|delta| now.checked_add_signed(delta))
}

/// Backend-issued proof of authentication plus the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

impl Session {
    pub fn from_token_response(resp: TokenResponse, now: DateTime<Utc>) -> Self {
        let expires_at = resp
            .expires_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .or_else(|| expiry_after(now, resp.expires_in))
            .unwrap_or(if resp.expires_in > 0 { DateTime::<Utc>::MAX_UTC } else { now });

        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            expires_at,
            user: resp.user,
        }
    }

    /// Expired, or close enough to expiry that a request could race it.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now < Duration::seconds(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_up_response_distinguishes_pending_user() {
        let id = Uuid::new_v4();
        let pending = serde_json::json!({
            "id": id,
            "email": "a@x.com",
            "user_metadata": { "name": "Ann", "role": "founder" }
        });
        match serde_json::from_value::<SignUpResponse>(pending).unwrap() {
            SignUpResponse::PendingConfirmation(user) => assert_eq!(user.id, id),
            other => panic!("expected pending user, got {:?}", other),
        }

        let session = serde_json::json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": id }
        });
        assert!(matches!(
            serde_json::from_value::<SignUpResponse>(session).unwrap(),
            SignUpResponse::Session(_)
        ));
    }

    #[test]
    fn error_body_prefers_description() {
        let body: ApiErrorBody = serde_json::from_value(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        }))
        .unwrap();
        assert_eq!(body.message().as_deref(), Some("Invalid login credentials"));

        let rest: ApiErrorBody =
            serde_json::from_value(serde_json::json!({ "message": "duplicate key" })).unwrap();
        assert_eq!(rest.message().as_deref(), Some("duplicate key"));
    }

    #[test]
    fn session_expiry_falls_back_to_expires_in() {
        let now = Utc::now();
        let resp = TokenResponse {
            access_token: "a".into(),
            refresh_token: "r".into(),
            token_type: "bearer".into(),
            expires_in: 3600,
            expires_at: None,
            user: AuthUser {
                id: Uuid::new_v4(),
                email: None,
                user_metadata: UserMetadata::default(),
                email_confirmed_at: None,
            },
        };
        let session = Session::from_token_response(resp, now);
        assert_eq!(session.expires_at, now + Duration::seconds(3600));
        assert!(!session.needs_refresh(now));
        assert!(session.needs_refresh(now + Duration::seconds(3590)));
    }

    #[test]
    fn huge_expires_in_does_not_overflow() {
        let now = Utc::now();
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: None,
            user_metadata: UserMetadata::default(),
            email_confirmed_at: None,
        };
        let resp = |expires_in| TokenResponse {
            access_token: "a".into(),
            refresh_token: "r".into(),
            token_type: "bearer".into(),
            expires_in,
            expires_at: None,
            user: user.clone(),
        };

        let far = Session::from_token_response(resp(i64::MAX), now);
        assert!(!far.needs_refresh(now));
        let past = Session::from_token_response(resp(i64::MIN), now);
        assert!(past.needs_refresh(now));

        assert_eq!(expiry_after(now, 10_000_000_000_000), None);
        assert_eq!(expiry_after(now, 60), Some(now + Duration::seconds(60)));
    }
}
