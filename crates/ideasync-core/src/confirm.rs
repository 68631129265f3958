//! Handling of the link a confirmation email points at. The backend puts
//! the outcome in the URL fragment, query-string encoded.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use ideasync_backend::SessionTokens;
use ideasync_types::api::expiry_after;

use crate::routes::Route;
use crate::session::SessionSynchronizer;

const GENERIC_FAILURE: &str = "The confirmation link is invalid or has expired.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Not an email confirmation at all; go elsewhere.
    Redirect(Route),
    Verified,
    Failed(String),
}

fn param(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.clone())
}

fn expiry(pairs: &[(String, String)], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(at) = param(pairs, "expires_at").and_then(|v| v.parse::<i64>().ok()) {
        return DateTime::<Utc>::from_timestamp(at, 0);
    }
    param(pairs, "expires_in")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| expiry_after(now, secs))
}

/// Act on a confirmation fragment (with or without the leading `#`).
/// A valid token pair becomes the current session.
pub async fn confirm_email(session: &SessionSynchronizer, fragment: &str) -> ConfirmOutcome {
    let fragment = fragment.trim_start_matches('#');
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(fragment.as_bytes())
        .into_owned()
        .collect();

    if param(&pairs, "type").as_deref() == Some("recovery") {
        return ConfirmOutcome::Redirect(Route::ResetPassword);
    }

    if let Some(access_token) = param(&pairs, "access_token") {
        let tokens = SessionTokens {
            access_token,
            refresh_token: param(&pairs, "refresh_token").unwrap_or_default(),
            expires_at: expiry(&pairs, Utc::now()),
        };
        return match session.install(tokens).await {
            Ok(()) => {
                info!("Email confirmed, session installed");
                ConfirmOutcome::Verified
            }
            Err(e) => {
                warn!("Confirmation tokens rejected: {}", e);
                ConfirmOutcome::Failed(e.user_message())
            }
        };
    }

    match param(&pairs, "error_description") {
        Some(description) => ConfirmOutcome::Failed(description),
        None => ConfirmOutcome::Failed(GENERIC_FAILURE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(s: &str) -> Vec<(String, String)> {
        url::form_urlencoded::parse(s.as_bytes()).into_owned().collect()
    }

    #[test]
    fn expiry_prefers_absolute_timestamp() {
        let now = Utc::now();
        let at = expiry(&pairs("expires_at=1700000000&expires_in=60"), now).unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);

        let relative = expiry(&pairs("expires_in=60"), now).unwrap();
        assert_eq!(relative, now + chrono::Duration::seconds(60));

        assert!(expiry(&pairs("token_type=bearer"), now).is_none());
    }

    #[test]
    fn out_of_range_expiry_is_treated_as_absent() {
        let now = Utc::now();
        assert!(expiry(&pairs("access_token=x&expires_in=9223372036854775807"), now).is_none());
        assert!(expiry(&pairs("access_token=x&expires_in=10000000000000"), now).is_none());
        assert!(expiry(&pairs("access_token=x&expires_in=-9223372036854775808"), now).is_none());
        assert!(expiry(&pairs("access_token=x&expires_at=9223372036854775807"), now).is_none());
    }

    #[test]
    fn empty_values_count_as_missing() {
        let p = pairs("access_token=&error_description=Email+link+is+invalid");
        assert_eq!(param(&p, "access_token"), None);
        assert_eq!(param(&p, "error_description").as_deref(), Some("Email link is invalid"));
    }
}
