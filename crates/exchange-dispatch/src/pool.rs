//! Fixed-size worker pool with bounded-queue, drop-on-full admission.
//!
//! A true zero-capacity (rendezvous) channel isn't constructible with
//! `tokio::sync::mpsc` (minimum buffer is 1), so the pool instead uses one
//! bounded channel sized to the worker count and treats a `try_send` failure
//! — "no worker is currently polling" — as the drop condition. This keeps
//! the drop-on-full semantic without an unbounded backlog.

use std::sync::Arc;

use exchange_core::error::DispatchError;
use exchange_core::metrics::Metrics;
use exchange_transport::Transport;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::types::{InRequest, OutResponse};
use crate::worker::run_worker;

pub struct DispatchPool {
    size: usize,
    tx: mpsc::Sender<InRequest>,
    rx: Arc<AsyncMutex<mpsc::Receiver<InRequest>>>,
    transport: Transport,
    metrics: Arc<Metrics>,
    stop: CancellationToken,
    workers: std::sync::Mutex<Option<JoinSet<()>>>,
}

impl DispatchPool {
    pub fn new(size: usize, transport: Transport, metrics: Arc<Metrics>) -> Self {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel(size);
        Self {
            size,
            tx,
            rx: Arc::new(AsyncMutex::new(rx)),
            transport,
            metrics,
            stop: CancellationToken::new(),
            workers: std::sync::Mutex::new(None),
        }
    }

    /// Spawns `size` worker tasks, each pulling from the shared queue.
    pub fn start(&self) {
        let mut joins = JoinSet::new();
        for worker_idx in 0..self.size {
            let queue = self.rx.clone();
            let transport = self.transport.clone();
            let metrics = self.metrics.clone();
            let stop = self.stop.clone();
            joins.spawn(run_worker(worker_idx, queue, transport, metrics, stop));
        }
        *self.workers.lock().expect("workers mutex poisoned") = Some(joins);
    }

    /// Signals every worker to exit after its current item, if any. Does not
    /// drain the queue backlog.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Waits for every worker task to finish. Intended for the shutdown
    /// drain window.
    pub async fn join(&self) {
        let joins = self.workers.lock().expect("workers mutex poisoned").take();
        if let Some(mut joins) = joins {
            while let Some(res) = joins.join_next().await {
                if let Err(err) = res {
                    warn!(error = %err, "dispatch worker task join error");
                }
            }
        }
    }

    /// Offers a work item to the pool via a non-blocking `try_send`. On
    /// rejection (queue momentarily full), synthesizes a `QueueFull`
    /// `OutResponse` on the item's own reply channel and increments the
    /// drop counter — the caller never blocks and never loses the request.
    pub fn enqueue(&self, item: InRequest) {
        let dsp_label = item.dsp_id.to_string();
        let seq = item.seq;
        let dsp_id = item.dsp_id;
        let reply = item.reply.clone();

        if let Err(mpsc::error::TrySendError::Full(_) | mpsc::error::TrySendError::Closed(_)) =
            self.tx.try_send(item)
        {
            self.metrics
                .dspio_request_dropped_total
                .with_label_values(&[&dsp_label])
                .inc();
            warn!(seq, dsp_id, "dispatch pool full; dropping request");
            let reply_tx = reply;
            tokio::spawn(async move {
                let _ = reply_tx
                    .send(OutResponse {
                        seq,
                        dsp_id,
                        result: Err(DispatchError::QueueFull),
                    })
                    .await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use exchange_transport::TransportConfig;
    use http_body_util::Full;
    use hyper::Request;
    use std::time::{Duration, Instant};

    fn test_transport() -> Transport {
        let config = TransportConfig {
            max_idle_conns: 10,
            max_idle_conns_per_host: 10,
            idle_conn_timeout: Duration::from_secs(15),
            keep_alive: Duration::from_secs(30),
            dial_timeout: Duration::from_millis(50),
            response_header_timeout: Duration::from_millis(50),
            expect_continue_timeout: Duration::from_secs(1),
            force_http2: false,
            insecure_skip_verify: true,
            tls_session_cache: 16,
        };
        Transport::new(&config, Metrics::new().dspio_conn_dial_total)
    }

    fn item(seq: usize, reply: mpsc::Sender<OutResponse>) -> InRequest {
        InRequest {
            seq,
            dsp_id: 1001,
            request: Request::builder()
                .method("POST")
                .uri("http://127.0.0.1:1/bid")
                .body(Full::new(Bytes::new()))
                .unwrap(),
            deadline: tokio::time::Instant::now() + Duration::from_millis(50),
            reply,
            created_at: Instant::now(),
        }
    }

    /// Drains whatever `QueueFull` replies have already landed, without
    /// waiting for the channel to close — accepted-but-unconsumed items keep
    /// their own reply sender alive forever since no worker is running.
    async fn drain_available(reply_rx: &mut mpsc::Receiver<OutResponse>) -> usize {
        let mut count = 0;
        loop {
            match tokio::time::timeout(Duration::from_millis(100), reply_rx.recv()).await {
                Ok(Some(_)) => count += 1,
                Ok(None) | Err(_) => break,
            }
        }
        count
    }

    /// With no worker consuming the queue, a pool of size 1 accepts exactly
    /// one item per its routing-channel capacity and drops the rest with a
    /// synthetic `QueueFull` reply — the drop-on-full admission contract.
    #[tokio::test]
    async fn enqueue_drops_on_full_when_no_worker_is_polling() {
        let pool = DispatchPool::new(1, test_transport(), Arc::new(Metrics::new()));

        let (reply_tx, mut reply_rx) = mpsc::channel(3);
        for seq in 0..3 {
            pool.enqueue(item(seq, reply_tx.clone()));
        }
        drop(reply_tx);

        let drops = drain_available(&mut reply_rx).await;
        // Exactly one item fits the size-1 routing channel; the other two are
        // dropped with a synthetic reply.
        assert_eq!(drops, 2);
    }

    #[tokio::test]
    async fn enqueue_accepts_up_to_pool_size_without_a_worker() {
        let pool = DispatchPool::new(4, test_transport(), Arc::new(Metrics::new()));

        let (reply_tx, mut reply_rx) = mpsc::channel(4);
        for seq in 0..4 {
            pool.enqueue(item(seq, reply_tx.clone()));
        }
        drop(reply_tx);

        // None of the 4 items should be dropped: the routing channel has
        // capacity 4 and nothing has been sent to it before this call.
        let received = drain_available(&mut reply_rx).await;
        assert_eq!(received, 0, "no QueueFull replies expected when under capacity");
    }
}
