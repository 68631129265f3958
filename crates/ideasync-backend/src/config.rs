use std::time::Duration;

use url::Url;

use crate::error::Result;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project root, always ending in `/` so relative joins keep the path.
    pub url: Url,
    /// Public (anonymous) API key sent on every request.
    pub anon_key: String,
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(url: &str, anon_key: impl Into<String>) -> Result<Self> {
        let mut url = Url::parse(url)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            url,
            anon_key: anon_key.into(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
