//! The shared, instrumented HTTP client used by every dispatch worker.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Response};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use prometheus::CounterVec;

use exchange_core::error::TransportError;

use crate::connector::DialCountingConnector;
use crate::tls::build_client_config;

/// Mirrors the `EXCHANGE_DSPIO_*` knobs that shape the shared transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub max_idle_conns: usize,
    pub max_idle_conns_per_host: usize,
    pub idle_conn_timeout: Duration,
    pub keep_alive: Duration,
    pub dial_timeout: Duration,
    pub response_header_timeout: Duration,
    pub expect_continue_timeout: Duration,
    pub force_http2: bool,
    pub insecure_skip_verify: bool,
    pub tls_session_cache: usize,
}

type Body = Full<Bytes>;
type LegacyClient = Client<hyper_rustls::HttpsConnector<DialCountingConnector>, Body>;

/// One shared, cloneable HTTP client, instrumented with per-host dial
/// counting. `hyper_util::client::legacy::Client` is internally pooled and
/// `Clone + Send + Sync`, so sharing it across workers is just cloning a
/// handle, not cloning a connection pool.
#[derive(Clone)]
pub struct Transport {
    client: LegacyClient,
    response_header_timeout: Duration,
}

impl Transport {
    pub fn new(config: &TransportConfig, dial_counter: CounterVec) -> Self {
        let mut base = HttpConnector::new();
        base.set_connect_timeout(Some(config.dial_timeout));
        base.set_keepalive(Some(config.keep_alive));
        base.enforce_http(false);

        let counted = DialCountingConnector::new(base, dial_counter);

        let tls_config = build_client_config(config.insecure_skip_verify, config.tls_session_cache);

        let https_builder = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http();
        let https = if config.force_http2 {
            https_builder.enable_http2().wrap_connector(counted)
        } else {
            https_builder.enable_http1().enable_http2().wrap_connector(counted)
        };

        // hyper_util's legacy client pools per-host only; `max_idle_conns`
        // (the cross-host total) and `expect_continue_timeout` have no
        // direct knob at this layer and are logged for parity with the
        // config surface rather than acted on.
        tracing::debug!(
            max_idle_conns = config.max_idle_conns,
            max_idle_conns_per_host = config.max_idle_conns_per_host,
            expect_continue_timeout = ?config.expect_continue_timeout,
            "building transport connection pool"
        );

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(config.max_idle_conns_per_host)
            .pool_idle_timeout(config.idle_conn_timeout)
            .http2_only(config.force_http2)
            .build(https);

        Self {
            client,
            response_header_timeout: config.response_header_timeout,
        }
    }

    /// Sends one request, racing the response-header wait against the
    /// configured timeout. Callers layer their own per-ad-request deadline
    /// on top of this.
    pub async fn send(
        &self,
        request: Request<Body>,
    ) -> Result<Response<hyper::body::Incoming>, TransportError> {
        let fut = self.client.request(request);
        match tokio::time::timeout(self.response_header_timeout, fut).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(TransportError::Dial(err.to_string())),
            Err(_) => Err(TransportError::Dial("response header timeout".to_string())),
        }
    }
}
