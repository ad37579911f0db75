//! Async runtime adapters.

pub mod tokio_bridge;

pub use tokio_bridge::{acquire_async, run_blocking};
