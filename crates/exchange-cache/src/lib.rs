#![forbid(unsafe_code)]

//! Hot configuration cache: periodically loads the apps snapshot and DSP
//! roster from their JSON sources and publishes each atomically for
//! lock-free readers.

mod cache;
mod loader;

pub use cache::{Cache, State, initial_load};
