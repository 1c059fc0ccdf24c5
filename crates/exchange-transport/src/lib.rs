#![forbid(unsafe_code)]

//! Shared, instrumented HTTP transport used by every dispatch worker.
//!
//! One [`Transport`] is built once at process startup and cloned into every
//! worker; `hyper_util`'s legacy client is internally pooled and
//! thread-safe, so sharing it is just cloning a handle.

mod connector;
mod tls;
mod transport;

pub use transport::{Transport, TransportConfig};
