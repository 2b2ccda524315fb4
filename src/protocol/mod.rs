//! Line Protocol Implementation
//!
//! The wire side of the protocol engine: reading CRLF-terminated lines and
//! array requests from a connection, and encoding replies.
//!
//! ## Modules
//!
//! - `reader`: `LineReader`, `Request` and `ProtocolError`
//! - `reply`: the `Reply` enum and its serialization
//!
//! ## Example
//!
//! ```
//! # tokio_test::block_on(async {
//! use snapkv::protocol::{LineReader, Reply};
//!
//! let mut reader = LineReader::new(&b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n"[..]);
//! let request = reader.read_request().await.unwrap().unwrap();
//! assert_eq!(request.args()[0], "hello");
//!
//! let reply = Reply::simple(request.args()[0].clone());
//! assert_eq!(reply.serialize(), b"+hello\r\n");
//! # })
//! ```

pub mod reader;
pub mod reply;

pub use reader::{LineReader, ProtocolError, Request, MAX_LINE_LENGTH};
pub use reply::Reply;
