#![forbid(unsafe_code)]

//! The bounded DSP dispatch worker pool (fixed-size workers, drop-on-full
//! admission, shared instrumented transport).

mod pool;
mod types;
mod worker;

pub use pool::DispatchPool;
pub use types::{InRequest, OutResponse, RequestBody};
