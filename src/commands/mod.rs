//! Command Handler Module
//!
//! The dispatch side of the protocol engine. It receives decoded requests,
//! executes them against the store (falling back to the snapshot on misses),
//! and returns the reply to write.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  LineReader     │  (protocol module)
//! └────────┬────────┘
//!          │ Request
//!          ▼
//! ┌─────────────────┐      miss      ┌─────────────────┐
//! │ CommandHandler  │ ─────────────> │ Snapshot file   │
//! │  (this module)  │                │ (snapshot mod)  │
//! └────────┬────────┘                └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;

pub use handler::{CommandError, CommandHandler};
