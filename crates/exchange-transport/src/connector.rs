//! A dial-counting wrapper placed below the TLS layer, so every actual TCP
//! connection — not every logical request — increments
//! `dspio_conn_dial_total{host}` exactly once.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use hyper::Uri;
use hyper_util::client::legacy::connect::HttpConnector;
use prometheus::CounterVec;
use tower::Service;

#[derive(Clone)]
pub(crate) struct DialCountingConnector {
    inner: HttpConnector,
    dials: CounterVec,
}

impl DialCountingConnector {
    pub(crate) fn new(inner: HttpConnector, dials: CounterVec) -> Self {
        Self { inner, dials }
    }
}

impl Service<Uri> for DialCountingConnector {
    type Response = <HttpConnector as Service<Uri>>::Response;
    type Error = <HttpConnector as Service<Uri>>::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let host = uri.host().unwrap_or("unknown").to_string();
        self.dials.with_label_values(&[&host]).inc();
        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(uri).await })
    }
}
