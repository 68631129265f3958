use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use ideasync_backend::BackendConfig;

const DEFAULT_DB_PATH: &str = "ideasync.db";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Settings read from the environment (and `.env`, if present).
pub struct Settings {
    pub backend: BackendConfig,
    pub db_path: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("IDEASYNC_BACKEND_URL").context("IDEASYNC_BACKEND_URL is not set")?;
        let anon_key = std::env::var("IDEASYNC_ANON_KEY").context("IDEASYNC_ANON_KEY is not set")?;
        let db_path = std::env::var("IDEASYNC_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.into());
        let timeout: u64 = match std::env::var("IDEASYNC_HTTP_TIMEOUT_SECS") {
            Ok(v) => v
                .parse()
                .with_context(|| format!("IDEASYNC_HTTP_TIMEOUT_SECS must be a number of seconds, got {:?}", v))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let backend = BackendConfig::new(&url, anon_key)
            .with_context(|| format!("invalid IDEASYNC_BACKEND_URL {:?}", url))?
            .with_timeout(Duration::from_secs(timeout));

        Ok(Self {
            backend,
            db_path: PathBuf::from(db_path),
        })
    }
}
