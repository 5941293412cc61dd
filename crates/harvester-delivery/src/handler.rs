use harvester_core::OutboundBatch;
use harvester_core::table::sanitize_cid;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use serde_json::json;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Appends received rows to `<output>/<cid>.jsonl`
#[derive(Clone)]
pub struct RowStore {
    output_dir: PathBuf,
    /// Serializes appends so lines from concurrent requests never interleave
    write_lock: Arc<Mutex<()>>,
    accepted: Arc<AtomicU64>,
}

impl RowStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            write_lock: Arc::new(Mutex::new(())),
            accepted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Rows accepted since the store was created
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::SeqCst)
    }

    /// File that rows for `correlation_id` are appended to
    pub fn file_for(&self, correlation_id: &str) -> PathBuf {
        let safe = sanitize_cid(correlation_id);
        let stem = if safe.is_empty() { "scrape" } else { &safe };
        self.output_dir.join(format!("{}.jsonl", stem))
    }

    pub async fn append(&self, batch: &OutboundBatch) -> std::io::Result<usize> {
        let mut buf = Vec::new();
        for row in &batch.rows {
            serde_json::to_writer(&mut buf, row)?;
            buf.push(b'\n');
        }

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.file_for(&batch.correlation_id);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;

        self.accepted
            .fetch_add(batch.rows.len() as u64, Ordering::SeqCst);
        tracing::debug!("Appended {} row(s) to {}", batch.rows.len(), path.display());
        Ok(batch.rows.len())
    }
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Route one receiver request
pub async fn handle(
    req: Request<Incoming>,
    store: RowStore,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    tracing::debug!("Receiver request: {} {}", method, path);

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") => json_response(StatusCode::OK, json!({ "status": "ok" })),
        (Method::POST, "/rows") => receive_rows(req, &store).await,
        (_, "/health") | (_, "/rows") => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "error": "method not allowed" }),
        ),
        _ => json_response(StatusCode::NOT_FOUND, json!({ "error": "not found" })),
    };
    Ok(response)
}

async fn receive_rows(req: Request<Incoming>, store: &RowStore) -> Response<Full<Bytes>> {
    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!("Failed to read request body: {}", e);
            return json_response(StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }));
        }
    };

    let batch: OutboundBatch = match serde_json::from_slice(&body) {
        Ok(batch) => batch,
        Err(e) => {
            tracing::warn!("Rejected malformed batch: {}", e);
            return json_response(StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }));
        }
    };

    match store.append(&batch).await {
        Ok(accepted) => {
            tracing::info!(
                "Received {} row(s) for {}",
                accepted,
                batch.correlation_id
            );
            json_response(StatusCode::OK, json!({ "accepted": accepted }))
        }
        Err(e) => {
            tracing::error!("Failed to store rows: {}", e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": e.to_string() }),
            )
        }
    }
}
