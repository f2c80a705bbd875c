//! Pinata pinning client.
//!
//! Files go through the v3 uploads API, JSON metadata through the legacy
//! `pinJSONToIPFS` endpoint, and retrieval through a (usually dedicated)
//! gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use certchain_core::error::{CertchainError, Result};
use certchain_core::traits::PinningService;
use certchain_core::types::CertificateMetadata;

use crate::cid::validate_cid;

const DEFAULT_API_URL: &str = "https://api.pinata.cloud";
const DEFAULT_UPLOADS_URL: &str = "https://uploads.pinata.cloud";
const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud";

/// Pinata client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PinataConfig {
    /// Pinning API base (pinJSONToIPFS, unpin)
    pub api_url: String,
    /// Uploads API base (v3 files)
    pub uploads_url: String,
    /// Gateway for retrieval, with or without scheme
    pub gateway_url: String,
    /// Token for dedicated gateways (`?pinataGatewayToken=`)
    pub gateway_token: Option<String>,
    /// JWT for uploads
    pub jwt: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for PinataConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            uploads_url: DEFAULT_UPLOADS_URL.into(),
            gateway_url: DEFAULT_GATEWAY_URL.into(),
            gateway_token: None,
            jwt: None,
            timeout_seconds: 30,
        }
    }
}

impl PinataConfig {
    /// Reads `PINATA_JWT`, `PINATA_GATEWAY_URL`, `PINATA_GATEWAY_TOKEN`,
    /// `PINATA_API_URL` and `PINATA_UPLOADS_URL`. Unset variables keep
    /// their defaults.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            api_url: var("PINATA_API_URL").unwrap_or(defaults.api_url),
            uploads_url: var("PINATA_UPLOADS_URL").unwrap_or(defaults.uploads_url),
            gateway_url: var("PINATA_GATEWAY_URL").unwrap_or(defaults.gateway_url),
            gateway_token: var("PINATA_GATEWAY_TOKEN"),
            jwt: var("PINATA_JWT"),
            timeout_seconds: defaults.timeout_seconds,
        }
    }

    /// Adds the JWT used for uploads.
    pub fn with_jwt(mut self, jwt: impl Into<String>) -> Self {
        self.jwt = Some(jwt.into());
        self
    }

    /// Uses a dedicated gateway.
    pub fn with_gateway(mut self, url: impl Into<String>, token: Option<String>) -> Self {
        self.gateway_url = url.into();
        self.gateway_token = token;
        self
    }

    /// Points both APIs at one base URL (mock servers, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.api_url = url.clone();
        self.uploads_url = url;
        self
    }

    /// True when uploads are possible.
    pub fn can_upload(&self) -> bool {
        self.jwt.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct V3UploadResponse {
    data: V3UploadData,
}

#[derive(Debug, Deserialize)]
struct V3UploadData {
    cid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinJsonResponse {
    ipfs_hash: String,
}

/// Pinata-backed [`PinningService`].
#[derive(Debug, Clone)]
pub struct PinataClient {
    config: PinataConfig,
    http_client: reqwest::Client,
}

impl PinataClient {
    /// Creates a client.
    pub fn new(config: PinataConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CertchainError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Client configuration.
    pub fn config(&self) -> &PinataConfig {
        &self.config
    }

    fn jwt(&self) -> Result<&str> {
        self.config
            .jwt
            .as_deref()
            .ok_or_else(|| CertchainError::ConfigError("Pinata JWT not configured".into()))
    }

    fn gateway_url(&self, cid: &str) -> String {
        let base = self.config.gateway_url.trim_end_matches('/');
        let base = if base.starts_with("http://") || base.starts_with("https://") {
            base.to_string()
        } else {
            format!("https://{}", base)
        };
        match &self.config.gateway_token {
            Some(token) => format!("{}/ipfs/{}?pinataGatewayToken={}", base, cid, token),
            None => format!("{}/ipfs/{}", base, cid),
        }
    }

    async fn failure_text(response: reqwest::Response) -> String {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        format!("status {}: {}", status, text)
    }

    /// Fetches and parses certificate metadata.
    pub async fn fetch_metadata(&self, cid: &str) -> Result<CertificateMetadata> {
        let bytes = self.fetch(cid).await?;
        serde_json::from_slice(&bytes).map_err(|e| CertchainError::IpfsDownloadFailed {
            cid: cid.to_string(),
            reason: format!("not certificate metadata: {}", e),
        })
    }
}

#[async_trait]
impl PinningService for PinataClient {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn pin_file(&self, data: Vec<u8>, name: &str) -> Result<String> {
        let jwt = self.jwt()?;

        let file_part = reqwest::multipart::Part::bytes(data)
            .file_name(name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| CertchainError::IpfsUploadFailed(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("network", "public")
            .text("name", name.to_string())
            .text("keyvalues", json!({ "type": "certchain-document" }).to_string());

        let url = format!("{}/v3/files", self.config.uploads_url.trim_end_matches('/'));
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CertchainError::IpfsUploadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CertchainError::IpfsUploadFailed(format!(
                "Upload failed with {}",
                Self::failure_text(response).await
            )));
        }

        let body: V3UploadResponse = response
            .json()
            .await
            .map_err(|e| CertchainError::IpfsUploadFailed(e.to_string()))?;

        debug!(cid = %body.data.cid, "Pinned file");
        Ok(body.data.cid)
    }

    #[instrument(skip(self, value))]
    async fn pin_json(&self, value: &Value, name: &str) -> Result<String> {
        let jwt = self.jwt()?;

        let body = json!({
            "pinataContent": value,
            "pinataMetadata": { "name": name },
        });
        let url = format!(
            "{}/pinning/pinJSONToIPFS",
            self.config.api_url.trim_end_matches('/')
        );
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(jwt)
            .json(&body)
            .send()
            .await
            .map_err(|e| CertchainError::IpfsUploadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CertchainError::IpfsUploadFailed(format!(
                "JSON pin failed with {}",
                Self::failure_text(response).await
            )));
        }

        let body: PinJsonResponse = response
            .json()
            .await
            .map_err(|e| CertchainError::IpfsUploadFailed(e.to_string()))?;

        debug!(cid = %body.ipfs_hash, "Pinned JSON");
        Ok(body.ipfs_hash)
    }

    #[instrument(skip(self))]
    async fn fetch(&self, cid: &str) -> Result<Vec<u8>> {
        validate_cid(cid)?;

        let response = self
            .http_client
            .get(self.gateway_url(cid))
            .send()
            .await
            .map_err(|e| CertchainError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CertchainError::IpfsDownloadFailed {
                cid: cid.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        debug!(cid, "Fetched from gateway");
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| CertchainError::HttpError(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn unpin(&self, cid: &str) -> Result<()> {
        let jwt = self.jwt()?;
        validate_cid(cid)?;

        let url = format!(
            "{}/pinning/unpin/{}",
            self.config.api_url.trim_end_matches('/'),
            cid
        );
        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(jwt)
            .send()
            .await
            .map_err(|e| CertchainError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CertchainError::IpfsUploadFailed(format!(
                "Unpin failed with {}",
                Self::failure_text(response).await
            )));
        }

        debug!(cid, "Unpinned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const V0: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    fn client_for(server: &MockServer) -> PinataClient {
        let config = PinataConfig::default()
            .with_base_url(server.uri())
            .with_gateway(server.uri(), Some("gw-token".into()))
            .with_jwt("test-jwt");
        PinataClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_pin_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/files"))
            .and(header("authorization", "Bearer test-jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "id": "abc", "cid": V0, "name": "diploma.pdf" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cid = client_for(&server)
            .pin_file(b"%PDF-1.7".to_vec(), "diploma.pdf")
            .await
            .unwrap();
        assert_eq!(cid, V0);
    }

    #[tokio::test]
    async fn test_pin_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinJSONToIPFS"))
            .and(body_partial_json(json!({ "pinataMetadata": { "name": "cert-1" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "IpfsHash": V0, "PinSize": 120, "Timestamp": "2024-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let cid = client_for(&server)
            .pin_json(&json!({ "name": "Rust 101" }), "cert-1")
            .await
            .unwrap();
        assert_eq!(cid, V0);
    }

    #[tokio::test]
    async fn test_upload_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid jwt"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .pin_json(&json!({}), "x")
            .await
            .unwrap_err();
        match err {
            CertchainError::IpfsUploadFailed(msg) => assert!(msg.contains("invalid jwt")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_jwt_is_config_error() {
        let client = PinataClient::new(PinataConfig::default()).unwrap();
        let err = client.pin_file(vec![1], "x").await.unwrap_err();
        assert!(matches!(err, CertchainError::ConfigError(_)));
        assert!(!client.config().can_upload());
    }

    #[tokio::test]
    async fn test_fetch_uses_gateway_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/ipfs/{}", V0)))
            .and(query_param("pinataGatewayToken", "gw-token"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .mount(&server)
            .await;

        let bytes = client_for(&server).fetch(V0).await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn test_fetch_metadata() {
        let server = MockServer::start().await;
        let metadata = CertificateMetadata::new("Rust 101", "Ferris", "Crab University");
        Mock::given(method("GET"))
            .and(path(format!("/ipfs/{}", V0)))
            .respond_with(ResponseTemplate::new(200).set_body_json(&metadata))
            .mount(&server)
            .await;

        let fetched = client_for(&server).fetch_metadata(V0).await.unwrap();
        assert_eq!(fetched, metadata);
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch(V0).await.unwrap_err();
        assert!(matches!(err, CertchainError::IpfsDownloadFailed { .. }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_cid_without_request() {
        let server = MockServer::start().await;
        let err = client_for(&server).fetch("not-a-cid").await.unwrap_err();
        assert!(matches!(err, CertchainError::InvalidIpfsCid(_)));
    }

    #[tokio::test]
    async fn test_unpin() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/pinning/unpin/{}", V0)))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).unpin(V0).await.unwrap();
    }

    #[test]
    fn test_gateway_url_without_scheme() {
        let config = PinataConfig::default().with_gateway("example.mypinata.cloud/", None);
        let client = PinataClient::new(config).unwrap();
        assert_eq!(
            client.gateway_url(V0),
            format!("https://example.mypinata.cloud/ipfs/{}", V0)
        );
    }
}
