use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::debug;
use url::Url;

use ideasync_types::api::ApiErrorBody;

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};

/// Shared HTTP plumbing for the auth and table clients.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base: Url,
    anon_key: String,
}

impl HttpClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base: config.url.clone(),
            anon_key: config.anon_key.clone(),
        })
    }

    pub fn auth_url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(&format!("auth/v1/{}", path))?)
    }

    pub fn rest_url(&self, table: &str) -> Result<Url> {
        Ok(self.base.join(&format!("rest/v1/{}", table))?)
    }

    /// Build a request carrying the API key. Without a user token the anon
    /// key doubles as bearer, which is what row policies see as "anonymous".
    pub fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        debug!("{} {}", method, url.path());
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }
}

/// Turn a non-success response into [`BackendError::Api`] with the most
/// readable message the body offers.
pub async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .ok()
        .and_then(|body| body.message())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    Err(BackendError::api(status.as_u16(), message))
}
