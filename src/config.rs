//! Server configuration from command-line flags and environment variables.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Lead import server.
#[derive(Debug, Clone, Parser)]
#[command(name = "leadsheetd", version, about)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "LEADSHEET_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Directory holding lead sheets and action runs.
    #[arg(long, env = "LEADSHEET_DATA_DIR", default_value = "database")]
    pub data_dir: PathBuf,

    /// JSON file overriding the built-in field alias table.
    #[arg(long = "fields", env = "LEADSHEET_FIELDS")]
    pub fields_file: Option<PathBuf>,

    /// Sessions file written by the identity provider [default: <data-dir>/sessions.json]
    #[arg(long = "sessions", env = "LEADSHEET_SESSIONS")]
    pub sessions_file: Option<PathBuf>,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "LEADSHEET_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn sessions_path(&self) -> PathBuf {
        self.sessions_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("sessions.json"))
    }
}
