//! Connection Handler Module
//!
//! One async task per client. Tasks share the store through the
//! [`CommandHandler`](crate::commands::CommandHandler) and never talk to each
//! other.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TCP Listener (accept_loop)                  │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept(), spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read lines  │───>│ Frame array │───>│ Execute cmd │      │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘      │
//! │                                               │ Ok          │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send reply  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use snapkv::commands::CommandHandler;
//! use snapkv::config::ServerConfig;
//! use snapkv::connection::{accept_loop, ConnectionStats};
//! use snapkv::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! # async fn run() -> std::io::Result<()> {
//! let handler = CommandHandler::new(
//!     Arc::new(StorageEngine::new()),
//!     Arc::new(ServerConfig::default()),
//! );
//! let listener = TcpListener::bind("127.0.0.1:6379").await?;
//! accept_loop(listener, handler, Arc::new(ConnectionStats::new())).await;
//! # Ok(())
//! # }
//! ```

pub mod handler;

pub use handler::{
    accept_loop, handle_connection, ConnectionError, ConnectionHandler, ConnectionStats,
};
