//! Work items exchanged between the orchestrator and the dispatch pool.

use std::time::Instant;

use bytes::Bytes;
use http_body_util::Full;
use hyper::Request;
use tokio::sync::mpsc;
use tokio::time::Instant as TokioInstant;

use exchange_core::error::DispatchError;
use exchange_core::openrtb::BidResponse;

pub type RequestBody = Full<Bytes>;

/// One fan-out work item: a single DSP call belonging to one ad request.
///
/// The reply channel is shared across every `InRequest` of the same ad
/// request, sized to the roster length at enqueue time so no worker ever
/// blocks on send.
pub struct InRequest {
    pub seq: usize,
    pub dsp_id: i64,
    pub request: Request<RequestBody>,
    pub deadline: TokioInstant,
    pub reply: mpsc::Sender<OutResponse>,
    pub created_at: Instant,
}

/// The outcome of one dispatch, delivered exactly once per accepted
/// `InRequest` — including the drop case, where the pool synthesizes a
/// `QueueFull` error directly without ever reaching a worker.
#[derive(Debug, Clone)]
pub struct OutResponse {
    pub seq: usize,
    pub dsp_id: i64,
    pub result: Result<BidResponse, DispatchError>,
}
