//! User and travel-log storage

pub mod memory;
pub mod models;
pub mod traits;

pub use memory::MemoryStore;
pub use models::*;
pub use traits::{StoreError, StoreResult, TravelStore, UserStore};
