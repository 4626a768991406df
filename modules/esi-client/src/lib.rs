pub mod error;
pub mod types;

pub use error::{EsiError, Result};
pub use types::{EsiConstellation, EsiIncursion, EsiName, EsiStatus, EsiSystem};

use std::time::Duration;

use async_trait::async_trait;

pub const DEFAULT_BASE_URL: &str = "https://esi.evetech.net";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("incursion-watch/", env!("CARGO_PKG_VERSION"));

/// Raw request/response access to ESI.
///
/// Callers decode the bytes themselves so a malformed body can be treated
/// as "absent" without the transport knowing about the payload types.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>>;

    async fn post_bytes(&self, path: &str, body: &serde_json::Value) -> Result<Vec<u8>>;
}

pub struct EsiClient {
    client: reqwest::Client,
    base_url: String,
}

impl EsiClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Client against the public Tranquility endpoint with the default timeout.
    pub fn tranquility() -> Result<Self> {
        Self::new(DEFAULT_BASE_URL, None)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_body(path: &str, resp: reqwest::Response) -> Result<Vec<u8>> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EsiError::api(path, status.as_u16(), &body));
        }

        Ok(resp.bytes().await?.to_vec())
    }

    /// Tranquility server status. Errors when the cluster is offline.
    pub async fn status(&self) -> Result<EsiStatus> {
        let bytes = self.get_bytes("/latest/status").await?;
        let status: EsiStatus = serde_json::from_slice(&bytes)?;
        tracing::debug!(players = status.players, "Fetched server status");
        Ok(status)
    }
}

#[async_trait]
impl RemoteFetcher for EsiClient {
    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(self.url(path)).send().await?;
        Self::read_body(path, resp).await
    }

    async fn post_bytes(&self, path: &str, body: &serde_json::Value) -> Result<Vec<u8>> {
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        Self::read_body(path, resp).await
    }
}
