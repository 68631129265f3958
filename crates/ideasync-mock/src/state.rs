use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use ideasync_types::api::UserMetadata;

pub type Row = Map<String, Value>;

pub type MockState = Arc<MockStateInner>;

pub struct MockStateInner {
    pub anon_key: String,
    pub jwt_secret: String,
    /// When set every request is answered with 503.
    pub unavailable: AtomicBool,
    inner: Mutex<Store>,
}

pub struct MockUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub metadata: UserMetadata,
    pub confirmed_at: Option<DateTime<Utc>>,
}

pub struct Store {
    pub require_confirmation: bool,
    pub access_ttl_secs: i64,
    pub users: HashMap<Uuid, MockUser>,
    /// refresh token -> user id; tokens are single use
    pub refresh_tokens: HashMap<String, Uuid>,
    pub tables: HashMap<&'static str, Vec<Row>>,
    last_timestamp: DateTime<Utc>,
}

pub const TABLES: &[&str] = &["companies", "investments", "messages", "profiles", "user_roles"];

impl MockStateInner {
    pub fn new(anon_key: String, jwt_secret: String, require_confirmation: bool) -> Self {
        let tables = TABLES.iter().map(|t| (*t, Vec::new())).collect();
        Self {
            anon_key,
            jwt_secret,
            unavailable: AtomicBool::new(false),
            inner: Mutex::new(Store {
                require_confirmation,
                access_ttl_secs: 3600,
                users: HashMap::new(),
                refresh_tokens: HashMap::new(),
                tables,
                last_timestamp: DateTime::<Utc>::MIN_UTC,
            }),
        }
    }

    /// A panicking handler must not take the whole stand-in down with it.
    pub fn store(&self) -> MutexGuard<'_, Store> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Store {
    pub fn user_by_email(&self, email: &str) -> Option<&MockUser> {
        self.users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    /// Strictly increasing timestamps so `order=created_at` is total.
    pub fn next_timestamp(&mut self) -> String {
        let mut now = Utc::now();
        if now <= self.last_timestamp {
            now = self.last_timestamp + Duration::microseconds(1);
        }
        self.last_timestamp = now;
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn table(&self, name: &str) -> Option<&Vec<Row>> {
        self.tables.get(name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Vec<Row>> {
        self.tables.get_mut(name)
    }

    /// Mirror of the sign-up trigger: every auth user gets a profile row and,
    /// when the role is recognised, a role row.
    pub fn upsert_user_rows(&mut self, user_id: Uuid, email: &str, metadata: &UserMetadata) {
        let id = Value::String(user_id.to_string());

        if let Some(profiles) = self.tables.get_mut("profiles") {
            profiles.retain(|row| row.get("id") != Some(&id));
            let mut row = Row::new();
            row.insert("id".into(), id.clone());
            row.insert("email".into(), Value::String(email.to_string()));
            row.insert(
                "name".into(),
                Value::String(metadata.name.clone().unwrap_or_default()),
            );
            row.insert(
                "role".into(),
                metadata.role.clone().map(Value::String).unwrap_or(Value::Null),
            );
            profiles.push(row);
        }

        let role = metadata
            .role
            .as_deref()
            .filter(|r| matches!(*r, "founder" | "investor"));
        if let (Some(role), Some(roles)) = (role, self.tables.get_mut("user_roles")) {
            roles.retain(|row| row.get("user_id") != Some(&id));
            let mut row = Row::new();
            row.insert("user_id".into(), id);
            row.insert("role".into(), Value::String(role.to_string()));
            roles.push(row);
        }
    }
}
