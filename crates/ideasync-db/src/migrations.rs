use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS session_cache (
            slot            TEXT PRIMARY KEY CHECK (slot = 'current'),
            access_token    TEXT NOT NULL,
            refresh_token   TEXT NOT NULL,
            expires_at      TEXT NOT NULL,
            user_json       TEXT NOT NULL,
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS investor_profiles (
            user_id             TEXT PRIMARY KEY,
            full_name           TEXT NOT NULL,
            bio                 TEXT NOT NULL,
            linked_in           TEXT NOT NULL DEFAULT '',
            investment_focus    TEXT NOT NULL,
            minimum_investment  INTEGER NOT NULL,
            maximum_investment  INTEGER NOT NULL,
            updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    debug!("Local store migrations complete");
    Ok(())
}
