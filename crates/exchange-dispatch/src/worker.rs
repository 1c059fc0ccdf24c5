//! A single dispatch worker: pulls work items off the shared queue, performs
//! one HTTP round-trip through the shared transport, and reports exactly one
//! `OutResponse` per item.

use std::sync::Arc;
use std::time::Instant;

use exchange_core::error::DispatchError;
use exchange_core::metrics::Metrics;
use exchange_core::openrtb::BidResponse;
use exchange_transport::Transport;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::types::InRequest;

pub(crate) async fn run_worker(
    worker_idx: usize,
    queue: Arc<Mutex<mpsc::Receiver<InRequest>>>,
    transport: Transport,
    metrics: Arc<Metrics>,
    stop: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            _ = stop.cancelled() => return,
            item = async {
                let mut rx = queue.lock().await;
                rx.recv().await
            } => item,
        };

        let Some(item) = item else {
            return;
        };

        dispatch_one(worker_idx, item, &transport, &metrics).await;
    }
}

async fn dispatch_one(worker_idx: usize, item: InRequest, transport: &Transport, metrics: &Metrics) {
    let InRequest {
        seq,
        dsp_id,
        request,
        deadline,
        reply,
        created_at,
    } = item;

    let dsp_label = dsp_id.to_string();
    metrics.dspio_concurrency_rate.inc();
    metrics.dspio_request_total.with_label_values(&[&dsp_label]).inc();
    let started = Instant::now();

    let result = match tokio::time::timeout_at(deadline, transport.send(request)).await {
        Ok(Ok(response)) => decode_response(response).await,
        Ok(Err(err)) => Err(DispatchError::Transport(err.to_string())),
        Err(_) => Err(DispatchError::Transport("deadline-exceeded".to_string())),
    };

    metrics
        .dspio_request_duration_seconds
        .with_label_values(&[&dsp_label])
        .observe(started.elapsed().as_secs_f64());
    if let Err(err) = &result {
        metrics
            .dspio_request_error_total
            .with_label_values(&[&dsp_label])
            .inc();
        info!(seq, dsp_id, error = %err, "dispatch attempt failed");
    }
    metrics.dspio_concurrency_rate.dec();

    debug!(
        worker = worker_idx,
        seq,
        dsp_id,
        age_ms = created_at.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "dispatch attempt complete"
    );

    let _ = reply
        .send(crate::types::OutResponse {
            seq,
            dsp_id,
            result,
        })
        .await;
}

async fn decode_response(
    response: hyper::Response<hyper::body::Incoming>,
) -> Result<BidResponse, DispatchError> {
    use http_body_util::BodyExt;

    if !response.status().is_success() {
        return Err(DispatchError::Transport(format!(
            "non-2xx status: {}",
            response.status()
        )));
    }

    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|err| DispatchError::Transport(err.to_string()))?
        .to_bytes();

    serde_json::from_slice(&body).map_err(|err| DispatchError::Decode(err.to_string()))
}
