//! Command Handler Module
//!
//! Executes decoded requests against the store and the snapshot and builds
//! the reply for each.
//!
//! ## Supported Commands
//!
//! - `PING` - Replies `PONG`
//! - `ECHO message` - Replies with the message, lower-cased
//! - `SET key value [PX milliseconds]` - Set a key, optionally with a TTL
//! - `GET key` - Memory first, then the snapshot
//! - `KEYS pattern` - Every key in the snapshot database (pattern ignored)
//! - `CONFIG GET dir|dbfilename` - Startup configuration
//!
//! ## Errors
//!
//! `execute` returns a [`CommandError`] instead of an error reply. The
//! connection logs it and writes nothing back.

use crate::config::ServerConfig;
use crate::protocol::{Reply, Request};
use crate::snapshot::{
    load_database, unix_time_ms, SnapshotError, SnapshotMap, SnapshotReader,
};
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised while executing a single command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The request array had no elements
    #[error("empty request")]
    EmptyRequest,

    /// The command name is not one the server knows
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// A required argument is missing
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    /// An argument that must be an integer is not
    #[error("value is not an integer: '{0}'")]
    InvalidInteger(String),

    /// `CONFIG GET` for a parameter the server does not expose
    #[error("unknown config key '{0}'")]
    UnknownConfigKey(String),

    /// `CONFIG` with a subcommand other than `GET`
    #[error("unknown CONFIG subcommand '{0}'")]
    UnknownConfigSubcommand(String),

    /// The snapshot could not be decoded
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

fn lossy(b: &[u8]) -> String {
    String::from_utf8_lossy(b).into_owned()
}

/// Executes requests for one connection.
///
/// Cloning is cheap; every clone shares the same store and configuration.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
    config: Arc<ServerConfig>,
}

impl CommandHandler {
    /// Creates a new command handler over the shared store and configuration.
    pub fn new(storage: Arc<StorageEngine>, config: Arc<ServerConfig>) -> Self {
        Self { storage, config }
    }

    /// Executes a request and returns the reply to send.
    pub fn execute(&self, request: &Request) -> Result<Reply, CommandError> {
        let name = request.name().ok_or(CommandError::EmptyRequest)?;
        let cmd = name.to_ascii_uppercase();
        let args = request.args();

        match cmd.as_slice() {
            b"PING" => Ok(Reply::pong()),
            b"ECHO" => self.cmd_echo(args),
            b"SET" => self.cmd_set(request.len(), args),
            b"GET" => self.cmd_get(args),
            b"KEYS" => self.cmd_keys(args),
            b"CONFIG" => self.cmd_config(args),
            _ => Err(CommandError::UnknownCommand(lossy(name))),
        }
    }

    /// Decodes the configured database from the snapshot file, fresh each call.
    ///
    /// Both snapshot loaders use blocking `std::fs` reads on the calling
    /// connection task.
    fn load_snapshot(&self) -> Result<SnapshotMap, SnapshotError> {
        load_database(self.config.snapshot_path(), self.config.db, unix_time_ms())
    }

    /// Like `load_snapshot`, but entries decoded before a failure stay in `out`.
    fn load_snapshot_into(&self, out: &mut SnapshotMap) -> Result<(), SnapshotError> {
        SnapshotReader::open(self.config.snapshot_path())?.read_database_into(
            self.config.db,
            unix_time_ms(),
            out,
        )
    }

    /// ECHO message
    fn cmd_echo(&self, args: &[Bytes]) -> Result<Reply, CommandError> {
        let message = args.first().ok_or(CommandError::WrongArity("ECHO"))?;
        Ok(Reply::simple(message.to_ascii_lowercase()))
    }

    /// SET key value [PX milliseconds]
    ///
    /// The option pair is only looked at when the request has exactly five
    /// elements. Any option name other than `PX` is accepted and ignored.
    fn cmd_set(&self, declared: usize, args: &[Bytes]) -> Result<Reply, CommandError> {
        let [key, value, rest @ ..] = args else {
            return Err(CommandError::WrongArity("SET"));
        };

        let mut ttl_ms = 0;
        if declared == 5 {
            if let [option, option_value, ..] = rest {
                if option.eq_ignore_ascii_case(b"PX") {
                    let ms: i64 = std::str::from_utf8(option_value)
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| CommandError::InvalidInteger(lossy(option_value)))?;
                    ttl_ms = u64::try_from(ms).unwrap_or(0);
                } else {
                    debug!(option = %lossy(option), "Ignoring SET option");
                }
            }
        }

        self.storage.set(key.clone(), value.clone(), ttl_ms);
        Ok(Reply::ok())
    }

    /// GET key
    ///
    /// A store miss falls back to the snapshot. A decode failure is not an
    /// error: entries read before it are still searched.
    fn cmd_get(&self, args: &[Bytes]) -> Result<Reply, CommandError> {
        let key = args.first().ok_or(CommandError::WrongArity("GET"))?;

        if let Some(value) = self.storage.get(key) {
            return Ok(Reply::bulk(value));
        }

        let mut snapshot = SnapshotMap::new();
        if let Err(e) = self.load_snapshot_into(&mut snapshot) {
            debug!(key = %lossy(key), error = %e, "Snapshot fallback failed");
        }

        match snapshot.remove(key) {
            Some(entry) => {
                debug!(key = %lossy(key), "Key found in snapshot");
                Ok(Reply::bulk(entry.value))
            }
            None => Ok(Reply::null()),
        }
    }

    /// KEYS pattern
    ///
    /// The pattern is read but not matched: every live key of the snapshot
    /// database is returned. Keys held only in memory are not listed.
    fn cmd_keys(&self, args: &[Bytes]) -> Result<Reply, CommandError> {
        if args.is_empty() {
            return Err(CommandError::WrongArity("KEYS"));
        }

        let mut keys: Vec<Bytes> = self.load_snapshot()?.into_keys().collect();
        keys.sort();

        Ok(Reply::bulk_array(keys))
    }

    /// CONFIG GET parameter
    fn cmd_config(&self, args: &[Bytes]) -> Result<Reply, CommandError> {
        let [subcommand, rest @ ..] = args else {
            return Err(CommandError::WrongArity("CONFIG"));
        };

        if !subcommand.eq_ignore_ascii_case(b"GET") {
            return Err(CommandError::UnknownConfigSubcommand(lossy(subcommand)));
        }

        let name = rest.first().ok_or(CommandError::WrongArity("CONFIG GET"))?;
        let (name, value) = std::str::from_utf8(name)
            .ok()
            .and_then(|n| self.config.get(n))
            .ok_or_else(|| CommandError::UnknownConfigKey(lossy(name)))?;

        Ok(Reply::bulk_array([Bytes::from_static(name.as_bytes()), value]))
    }
}
