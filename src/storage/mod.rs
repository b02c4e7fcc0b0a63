// Persistence layer - per-guild key-value storage
pub mod store;

#[cfg(test)]
pub mod memory;

pub use store::{get_typed, set_typed, write_atomic, FileStore, KvStore, StoreError};
