#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Shared data model, configuration, error types, metrics, and OpenRTB
//! records for the ad-exchange fan-out service.

pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod openrtb;

pub use config::Config;
pub use error::{CacheError, ConfigError, DispatchError, OrchestratorError, TransportError};
pub use metrics::Metrics;
pub use model::{App, AppsSnapshot, Dsp, DspRoster, Publisher};
