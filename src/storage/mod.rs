//! Storage Engine Module
//!
//! The in-memory store shared by all connections: a sharded map from key to
//! payload and optional absolute expiry.
//!
//! ## Features
//!
//! - **Sharded Storage**: independent shards reduce lock contention
//! - **RwLock**: multiple concurrent readers, exclusive writers
//! - **Millisecond TTLs**: `set` takes a TTL in milliseconds, `0` = no expiry
//! - **Lazy Expiry**: expired keys are removed by the read that finds them
//!
//! ## Example
//!
//! ```
//! use snapkv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.set(Bytes::from("session"), Bytes::from("token123"), 60_000);
//! assert_eq!(engine.get(b"session"), Some(Bytes::from("token123")));
//! ```

pub mod engine;

pub use engine::{Entry, StorageEngine, StorageStats};
