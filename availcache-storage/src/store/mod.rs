//! Key-value stores the cache engines run on.
//!
//! The engines only need four primitives: read, atomic add-if-absent,
//! unconditional put and delete. TTLs travel in whole minutes.

pub mod lmdb_backend;
pub mod memory;
pub mod traits;

pub use lmdb_backend::{LmdbStore, LmdbStoreError};
pub use memory::InMemoryStore;
pub use traits::{CacheStore, StoreResult};
