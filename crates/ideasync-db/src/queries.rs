use crate::models::{InvestorProfileRow, SessionRow};
use crate::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ideasync_types::api::{AuthUser, Session};
use ideasync_types::models::InvestorProfile;
use rusqlite::Connection;
use tracing::warn;
use uuid::Uuid;

impl Database {
    // -- Session cache --

    /// Replace the cached session. There is only ever one.
    pub fn store_session(&self, session: &Session) -> Result<()> {
        let user_json = serde_json::to_string(&session.user)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO session_cache (slot, access_token, refresh_token, expires_at, user_json, updated_at)
                 VALUES ('current', ?1, ?2, ?3, ?4, datetime('now'))
                 ON CONFLICT(slot) DO UPDATE SET
                    access_token = excluded.access_token,
                    refresh_token = excluded.refresh_token,
                    expires_at = excluded.expires_at,
                    user_json = excluded.user_json,
                    updated_at = excluded.updated_at",
                (
                    &session.access_token,
                    &session.refresh_token,
                    session.expires_at.to_rfc3339(),
                    &user_json,
                ),
            )?;
            Ok(())
        })
    }

    /// Load the cached session. A row that no longer parses is dropped and
    /// reported as absent; the user simply signs in again.
    pub fn load_session(&self) -> Result<Option<Session>> {
        let row = self.with_conn(query_session)?;
        let Some(row) = row else {
            return Ok(None);
        };

        match session_from_row(&row) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("Discarding unreadable cached session: {:#}", e);
                self.clear_session()?;
                Ok(None)
            }
        }
    }

    pub fn clear_session(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM session_cache", [])?;
            Ok(())
        })
    }

    // -- Investor profile drafts --

    pub fn save_investor_profile(&self, user_id: Uuid, profile: &InvestorProfile) -> Result<()> {
        let min = i64::try_from(profile.minimum_investment).context("minimum investment out of range")?;
        let max = i64::try_from(profile.maximum_investment).context("maximum investment out of range")?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO investor_profiles
                    (user_id, full_name, bio, linked_in, investment_focus, minimum_investment, maximum_investment, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
                 ON CONFLICT(user_id) DO UPDATE SET
                    full_name = excluded.full_name,
                    bio = excluded.bio,
                    linked_in = excluded.linked_in,
                    investment_focus = excluded.investment_focus,
                    minimum_investment = excluded.minimum_investment,
                    maximum_investment = excluded.maximum_investment,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    user_id.to_string(),
                    profile.full_name,
                    profile.bio,
                    profile.linked_in,
                    profile.investment_focus,
                    min,
                    max,
                ],
            )?;
            Ok(())
        })
    }

    pub fn load_investor_profile(&self, user_id: Uuid) -> Result<Option<InvestorProfile>> {
        let row = self.with_conn(|conn| query_investor_profile(conn, &user_id.to_string()))?;

        row.map(|row| -> Result<InvestorProfile> {
            Ok(InvestorProfile {
                full_name: row.full_name,
                bio: row.bio,
                linked_in: row.linked_in,
                investment_focus: row.investment_focus,
                minimum_investment: u64::try_from(row.minimum_investment)
                    .with_context(|| format!("negative minimum investment for {}", row.user_id))?,
                maximum_investment: u64::try_from(row.maximum_investment)
                    .with_context(|| format!("negative maximum investment for {}", row.user_id))?,
            })
        })
        .transpose()
    }
}

fn session_from_row(row: &SessionRow) -> Result<Session> {
    let expires_at = DateTime::parse_from_rfc3339(&row.expires_at)
        .context("bad expires_at")?
        .with_timezone(&Utc);
    let user: AuthUser = serde_json::from_str(&row.user_json).context("bad user_json")?;

    Ok(Session {
        access_token: row.access_token.clone(),
        refresh_token: row.refresh_token.clone(),
        expires_at,
        user,
    })
}

fn query_session(conn: &Connection) -> Result<Option<SessionRow>> {
    let mut stmt = conn.prepare(
        "SELECT access_token, refresh_token, expires_at, user_json FROM session_cache WHERE slot = 'current'",
    )?;

    let row = stmt
        .query_row([], |row| {
            Ok(SessionRow {
                access_token: row.get(0)?,
                refresh_token: row.get(1)?,
                expires_at: row.get(2)?,
                user_json: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_investor_profile(conn: &Connection, user_id: &str) -> Result<Option<InvestorProfileRow>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, full_name, bio, linked_in, investment_focus, minimum_investment, maximum_investment
         FROM investor_profiles WHERE user_id = ?1",
    )?;

    let row = stmt
        .query_row([user_id], |row| {
            Ok(InvestorProfileRow {
                user_id: row.get(0)?,
                full_name: row.get(1)?,
                bio: row.get(2)?,
                linked_in: row.get(3)?,
                investment_focus: row.get(4)?,
                minimum_investment: row.get(5)?,
                maximum_investment: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
