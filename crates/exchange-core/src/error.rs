//! Typed errors per component, matching the kinds enumerated in the spec's
//! error-handling design.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Error, Clone)]
pub enum CacheError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("decode error: {0}")]
    DecodeError(String),
    #[error("io error: {0}")]
    Io(String),
}

/// Error kind attached to a dropped or failed dispatch, as delivered on the
/// per-request `OutResponse` channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("queue full")]
    QueueFull,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("dial error: {0}")]
    Dial(String),
    #[error("tls error: {0}")]
    Tls(String),
}

/// Request-scoped errors from the `/ad` handler, mapped to HTTP statuses by
/// the orchestrator's `IntoResponse` impl.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("request decode error: {0}")]
    RequestDecode(String),
    #[error("app not found: {0}")]
    LookupMiss(i64),
    #[error("invalid app id: {0}")]
    LookupBadKey(String),
}
