// REST client for the deployment server
//
// Wraps `reqwest::Client` with base-URL handling and status/body
// decoding. Each method is one request; nothing is cached here.

use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;
use crate::types::{ContainerInfo, RefreshSnapshot, StackRecord};

const STACKS_PATH: &str = "api/stacks";
const REFRESH_STATUS_PATH: &str = "api/refresh-status";
const REFRESH_PATH: &str = "api/refresh";
const CONTAINERS_PATH: &str = "api/stacks/containers/";
const EVENTS_PATH: &str = "api/events";

/// Raw HTTP client for the deployment server's REST API.
///
/// `base_url` may carry a path prefix (`https://host/cd`); all endpoints
/// are resolved relative to it.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
        }
    }

    /// The server base URL (always ending in `/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the server's event-stream endpoint.
    pub fn events_url(&self) -> Result<Url, Error> {
        self.url(EVENTS_PATH)
    }

    // ── Endpoints ───────────────────────────────────────────────────

    /// `GET /api/stacks` -- every stack the server tracks.
    pub async fn list_stacks(&self) -> Result<Vec<StackRecord>, Error> {
        self.get_json(STACKS_PATH, "Failed to fetch stacks").await
    }

    /// `GET /api/refresh-status` -- the latest refresh summary.
    pub async fn refresh_status(&self) -> Result<RefreshSnapshot, Error> {
        self.get_json(REFRESH_STATUS_PATH, "Failed to fetch refresh status")
            .await
    }

    /// `POST /api/refresh` -- ask the server to re-read its source of truth.
    ///
    /// The outcome arrives later as a `refresh.status` event; only the
    /// acceptance of the request is reported here.
    pub async fn trigger_refresh(&self) -> Result<(), Error> {
        let url = self.url(REFRESH_PATH)?;
        debug!(url = %url, "POST");
        let resp = self.http.post(url).send().await?;
        check_status(&resp, "Failed to trigger refresh")?;
        Ok(())
    }

    /// `GET /api/stacks/containers/{path}` -- containers of one stack.
    pub async fn list_containers(&self, stack_path: &str) -> Result<Vec<ContainerInfo>, Error> {
        let relative = format!("{CONTAINERS_PATH}{}", stack_path.trim_start_matches('/'));
        self.get_json(&relative, "Failed to fetch containers").await
    }

    // ── Transport mechanics ─────────────────────────────────────────

    fn url(&self, relative: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(relative)?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        relative: &str,
        context: &'static str,
    ) -> Result<T, Error> {
        let url = self.url(relative)?;
        debug!(url = %url, "GET");

        let resp = self.http.get(url).send().await?;
        check_status(&resp, context)?;

        let body = resp.text().await?;
        trace!(bytes = body.len(), "response body received");
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

fn check_status(resp: &reqwest::Response, context: &'static str) -> Result<(), Error> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::Status {
            context,
            status: status.as_u16(),
        })
    }
}

/// Ensure the base path ends with `/` so `Url::join` appends instead of
/// replacing the last segment.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
