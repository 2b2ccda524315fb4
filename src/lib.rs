//! # SnapKV - An In-Memory Key-Value Server with Snapshot Fallback
//!
//! SnapKV speaks a small Redis-style line protocol over TCP. Writes live in
//! memory with optional millisecond expiry; reads that miss memory fall back
//! to a Redis RDB snapshot file on disk.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              SnapKV                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                        ┌──────────────────────┼──────────────────┐      │
//! │                        ▼                      ▼                  ▼      │
//! │  ┌──────────────────────────────────┐  ┌────────────┐  ┌─────────────┐  │
//! │  │          StorageEngine           │  │  Snapshot  │  │ServerConfig │  │
//! │  │  ┌────────┐ ┌────────┐ ┌──────┐  │  │  Reader    │  │ (dir, file) │  │
//! │  │  │Shard 0 │ │Shard 1 │ │...N  │  │  │ (RDB file) │  │             │  │
//! │  │  └────────┘ └────────┘ └──────┘  │  └────────────┘  └─────────────┘  │
//! │  └──────────────────────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `ECHO message` (replied lowercased)
//! - `SET key value [PX milliseconds]`
//! - `GET key`
//! - `KEYS pattern` (pattern ignored; lists the snapshot's live keys)
//! - `CONFIG GET dir|dbfilename`
//!
//! A command that fails is logged and gets no reply at all.
//!
//! ## Module Overview
//!
//! - [`protocol`]: line reader, request framing and reply encoding
//! - [`storage`]: sharded in-memory store with lazy expiry
//! - [`snapshot`]: RDB snapshot decoder and byte dump
//! - [`commands`]: command dispatch
//! - [`connection`]: per-client tasks and the accept loop
//! - [`config`]: startup flags

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod snapshot;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandError, CommandHandler};
pub use config::ServerConfig;
pub use connection::{accept_loop, handle_connection, ConnectionStats};
pub use protocol::{LineReader, ProtocolError, Reply, Request};
pub use snapshot::{SnapshotError, SnapshotReader};
pub use storage::StorageEngine;

/// The default port SnapKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host SnapKV binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// The default snapshot file name
pub const DEFAULT_DB_FILENAME: &str = "dump.rdb";

/// Version of SnapKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
