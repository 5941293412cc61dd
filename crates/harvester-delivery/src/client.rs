use crate::queue::Transport;
use crate::{Error, Result};
use async_trait::async_trait;
use harvester_core::OutboundBatch;
use http::header::CONTENT_TYPE;
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

/// Where the receiver listens unless told otherwise
pub const DEFAULT_RECEIVER_URL: &str = "http://127.0.0.1:5055";

/// JSON-over-HTTP client for the receiver's `/rows` and `/health` endpoints
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    base: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for `base_url` (plain `http://` only)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let uri: Uri = base_url
            .parse()
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", base_url, e)))?;

        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => {
                return Err(Error::InvalidUrl(format!(
                    "{}: unsupported scheme '{}', the receiver speaks plain http",
                    base_url, other
                )));
            }
            None => {
                return Err(Error::InvalidUrl(format!("{}: missing scheme", base_url)));
            }
        }
        if uri.host().is_none() {
            return Err(Error::InvalidUrl(format!("{}: missing host", base_url)));
        }

        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            client,
            base: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Uri> {
        let url = format!("{}{}", self.base, path);
        url.parse()
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))
    }

    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Bytes> {
        // One deadline covers the headers and the whole body
        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            let body = response.into_body().collect().await?.to_bytes();
            Ok::<_, Error>((status, body))
        };
        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        if !status.is_success() {
            return Err(Error::Status(status));
        }
        Ok(body)
    }

    /// Whether the receiver answers `GET /health` with a success status
    pub async fn health(&self) -> Result<bool> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.endpoint("/health")?)
            .body(Full::new(Bytes::new()))?;

        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(Error::Status(status)) => {
                tracing::debug!("Health check returned {}", status);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_rows(&self, batch: &OutboundBatch) -> Result<()> {
        let body = serde_json::to_vec(batch)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint("/rows")?)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))?;

        tracing::debug!(
            "Posting {} row(s) for {} to {}",
            batch.rows.len(),
            batch.correlation_id,
            self.base
        );
        self.send(request).await?;
        Ok(())
    }
}
