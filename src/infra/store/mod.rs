//! Store backends behind the [`StoreBackend`](crate::core::StoreBackend) seam.

pub mod memory;
pub mod schema;

pub use memory::{MemoryConnection, MemoryStore};
