//! The `/ad`, `/ping`, and `/metrics` HTTP handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes as ByteBuf;
use exchange_cache::State as CacheState;
use exchange_core::config::Config;
use exchange_core::error::OrchestratorError;
use exchange_core::metrics::Metrics;
use exchange_core::openrtb::{BidRequest, BidResponse};
use exchange_dispatch::{DispatchPool, InRequest, RequestBody};
use hyper::Request as HyperRequest;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::gzip::{gzip_compress, gzip_decompress};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: CacheState,
    pub pool: Arc<DispatchPool>,
    pub metrics: Arc<Metrics>,
}

/// Wraps the core orchestrator error so its HTTP mapping lives at the edge,
/// where `axum::response::IntoResponse` can actually be implemented for it.
pub struct ApiError(OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            OrchestratorError::RequestDecode(msg) => {
                error!(error = %msg, "request decode failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            OrchestratorError::LookupMiss(app_id) => {
                warn!(app_id, "app not found");
                (StatusCode::NOT_FOUND, format!("app not found: {app_id}"))
            }
            OrchestratorError::LookupBadKey(key) => {
                error!(key = %key, "invalid app id");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("invalid app id: {key}"))
            }
        };
        (status, body).into_response()
    }
}

/// Builds the `/ad`, `/ping`, `/metrics` router over the shared [`AppState`].
/// Shared by `main` and the integration tests so both exercise the exact
/// same route wiring.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ad", post(ad))
        .route("/ping", get(ping))
        .route("/metrics", get(metrics))
        .with_state(state)
}

pub async fn ping() -> &'static str {
    "pong"
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// `POST /ad` — decode, look up, fan out, collect, select, respond. See the
/// module-level docs for the state-machine this walks through.
pub async fn ad(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let decompressed =
        gzip_decompress(&body).map_err(|err| OrchestratorError::RequestDecode(err.to_string()))?;
    let request: BidRequest = serde_json::from_slice(&decompressed)
        .map_err(|err| OrchestratorError::RequestDecode(err.to_string()))?;

    let app_ref = request
        .app
        .as_ref()
        .ok_or_else(|| OrchestratorError::RequestDecode("missing app".to_string()))?;
    let app_id: i64 = app_ref
        .id
        .parse()
        .map_err(|_| OrchestratorError::LookupBadKey(app_ref.id.clone()))?;

    let app = {
        let apps = state.cache.apps.load();
        apps.get(app_id).cloned()
    }
    .ok_or(OrchestratorError::LookupMiss(app_id))?;

    info!(request_id = %request.id, app_id, "ad request accepted");
    state.metrics.ad_request_total.with_label_values(&[]).inc();
    state
        .metrics
        .ad_request_per_pub_and_app_total
        .with_label_values(&[&app.publisher.id.to_string(), &app_id.to_string()])
        .inc();

    let roster = state.cache.dsps.load();
    let n = roster.len();
    let deadline = tokio::time::Instant::now() + state.config.dspio_request_timeout;

    if n == 0 {
        let empty = BidResponse::empty(&request.id);
        return Ok(json_response(&empty));
    }

    let payload = serde_json::to_vec(&request)
        .map_err(|err| OrchestratorError::RequestDecode(err.to_string()))?;
    let (reply_tx, mut reply_rx) = mpsc::channel(n);

    for (seq, dsp) in roster.iter().enumerate() {
        let compressed = gzip_compress(&payload);
        let url = if dsp.has_latency_directive() {
            format!("{}?latency={}", dsp.endpoint, dsp.latency)
        } else {
            dsp.endpoint.clone()
        };

        state
            .metrics
            .dsp_before_per_pub_total
            .with_label_values(&[&dsp.id.to_string(), &app.publisher.id.to_string()])
            .inc();

        let http_request = match HyperRequest::builder()
            .method("POST")
            .uri(url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_ENCODING, "gzip")
            .body(RequestBody::from(ByteBuf::from(compressed)))
        {
            Ok(req) => req,
            Err(err) => {
                warn!(dsp_id = dsp.id, error = %err, "failed to build outbound request; skipping DSP");
                continue;
            }
        };

        state.pool.enqueue(InRequest {
            seq,
            dsp_id: dsp.id,
            request: http_request,
            deadline,
            reply: reply_tx.clone(),
            created_at: Instant::now(),
        });

        state
            .metrics
            .dsp_after_per_pub_total
            .with_label_values(&[&dsp.id.to_string(), &app.publisher.id.to_string()])
            .inc();
    }
    drop(reply_tx);

    let mut winner: Option<BidResponse> = None;
    let collect = async {
        let mut received = 0usize;
        while received < n {
            match reply_rx.recv().await {
                Some(out) => {
                    received += 1;
                    if let Ok(bid_response) = out.result {
                        winner = Some(bid_response);
                        break;
                    }
                }
                None => break,
            }
        }
    };
    let _ = tokio::time::timeout_at(deadline, collect).await;

    let response_body = match winner {
        Some(bid) => bid,
        None => {
            debug!(request_id = %request.id, n, "fan-out produced no successful bid before the deadline");
            BidResponse::empty(&request.id)
        }
    };
    Ok(json_response(&response_body))
}

fn json_response(body: &BidResponse) -> Response {
    match serde_json::to_vec(body) {
        Ok(encoded) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            encoded,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "failed to encode bid response");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
