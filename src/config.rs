//! Server Configuration
//!
//! Startup settings parsed from the command line, with `PORT` from the
//! environment. The same values answer `CONFIG GET` at runtime.

use crate::{DEFAULT_DB_FILENAME, DEFAULT_HOST, DEFAULT_PORT};
use bytes::Bytes;
use clap::Parser;
use std::path::PathBuf;

/// Server configuration
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "snapkv",
    version,
    about = "In-memory key-value server with RDB snapshot fallback"
)]
pub struct ServerConfig {
    /// Directory containing the snapshot file
    #[arg(short = 'd', long, default_value = ".")]
    pub dir: String,

    /// Snapshot file name inside `dir`
    #[arg(short = 'f', long, default_value = DEFAULT_DB_FILENAME)]
    pub dbfilename: String,

    /// Database index to read from the snapshot
    #[arg(short = 'n', long = "db", default_value_t = 0)]
    pub db: u8,

    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dir: ".".to_string(),
            dbfilename: DEFAULT_DB_FILENAME.to_string(),
            db: 0,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Full path of the snapshot file, `<dir>/<dbfilename>`.
    pub fn snapshot_path(&self) -> PathBuf {
        let dir = if self.dir.is_empty() { "." } else { &self.dir };
        PathBuf::from(dir).join(&self.dbfilename)
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Looks up a runtime-visible parameter by name (case-insensitive).
    ///
    /// Returns the canonical name with its value, or `None` if unknown.
    pub fn get(&self, name: &str) -> Option<(&'static str, Bytes)> {
        if name.eq_ignore_ascii_case("dir") {
            Some(("dir", Bytes::from(self.dir.clone())))
        } else if name.eq_ignore_ascii_case("dbfilename") {
            Some(("dbfilename", Bytes::from(self.dbfilename.clone())))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["snapkv"]).unwrap();
        assert_eq!(config.dbfilename, "dump.rdb");
        assert_eq!(config.db, 0);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.snapshot_path(), Path::new("./dump.rdb"));
    }

    #[test]
    fn test_flags() {
        let config = ServerConfig::try_parse_from([
            "snapkv",
            "--dir",
            "/tmp/redis-files",
            "--dbfilename",
            "snap.rdb",
            "-n",
            "3",
            "--port",
            "6380",
        ])
        .unwrap();

        assert_eq!(config.db, 3);
        assert_eq!(config.port, 6380);
        assert_eq!(config.bind_address(), "0.0.0.0:6380");
        assert_eq!(config.snapshot_path(), Path::new("/tmp/redis-files/snap.rdb"));
    }

    #[test]
    fn test_dir_with_trailing_separator() {
        let config =
            ServerConfig::try_parse_from(["snapkv", "-d", "/data/", "-f", "x.rdb"]).unwrap();
        assert_eq!(config.snapshot_path(), Path::new("/data/x.rdb"));
    }

    #[test]
    fn test_malformed_db_index_rejected() {
        assert!(ServerConfig::try_parse_from(["snapkv", "-n", "zero"]).is_err());
        assert!(ServerConfig::try_parse_from(["snapkv", "-n", "300"]).is_err());
    }

    #[test]
    fn test_get_parameter() {
        let config = ServerConfig {
            dir: "/tmp/data".to_string(),
            ..Default::default()
        };

        assert_eq!(config.get("dir"), Some(("dir", Bytes::from("/tmp/data"))));
        assert_eq!(
            config.get("DBFILENAME"),
            Some(("dbfilename", Bytes::from("dump.rdb")))
        );
        assert_eq!(config.get("maxmemory"), None);
    }
}
