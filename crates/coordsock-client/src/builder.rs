//! Client builder pattern

use coordsock_core::{ClientId, CLIENT_ID_PARAM, DEFAULT_WS_PATH};
use coordsock_transport::WebSocketConfig;
use url::Url;

use crate::error::{ClientError, Result};
use crate::Client;

/// Builder for [`Client`]
pub struct ClientBuilder {
    base_url: String,
    id: Option<ClientId>,
    path: Option<String>,
    config: WebSocketConfig,
}

impl ClientBuilder {
    /// Create a new builder for a relay at `base_url` (e.g. `ws://localhost:8080`)
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            id: None,
            path: None,
            config: WebSocketConfig::default(),
        }
    }

    /// Identifier to register under
    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Endpoint path; defaults to the base URL's path, or `/ws` if it has none
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    /// Outbound queue and frame limits
    pub fn config(mut self, config: WebSocketConfig) -> Self {
        self.config = config;
        self
    }

    /// The URL the client will connect to
    pub fn url(&self) -> Result<Url> {
        let id = self.id.as_deref().ok_or(ClientError::MissingId)?;
        build_url(&self.base_url, self.path.as_deref(), id)
    }

    /// Build and connect
    pub async fn connect(self) -> Result<Client> {
        let url = self.url()?;
        let id = self.id.unwrap_or_default();
        Client::open(id, url, self.config).await
    }
}

fn build_url(base: &str, path: Option<&str>, id: &str) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base, e)))?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(ClientError::InvalidUrl(format!(
                "unsupported scheme {}",
                other
            )))
        }
    }

    match path {
        Some(path) => url.set_path(path),
        None if url.path().is_empty() || url.path() == "/" => url.set_path(DEFAULT_WS_PATH),
        None => {}
    }

    url.query_pairs_mut().clear().append_pair(CLIENT_ID_PARAM, id);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path() {
        let url = ClientBuilder::new("ws://localhost:8080").id("A").url().unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/ws?id=A");
    }

    #[test]
    fn test_base_path_kept() {
        let url = ClientBuilder::new("ws://relay.local:9000/gestures")
            .id("pen")
            .url()
            .unwrap();
        assert_eq!(url.as_str(), "ws://relay.local:9000/gestures?id=pen");
    }

    #[test]
    fn test_explicit_path_and_escaping() {
        let url = ClientBuilder::new("ws://localhost:8080")
            .id("left hand")
            .path("/custom")
            .url()
            .unwrap();
        assert_eq!(url.path(), "/custom");
        assert_eq!(url.query(), Some("id=left+hand"));
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(
            ClientBuilder::new("http://localhost:8080").id("A").url(),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            ClientBuilder::new("not a url").id("A").url(),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            ClientBuilder::new("ws://localhost:8080").url(),
            Err(ClientError::MissingId)
        ));
    }
}
