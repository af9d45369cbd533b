//! Command-line configuration.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tabletop_core::EngineConfig;

/// Tabletop battlemap server.
#[derive(Debug, Clone, Parser)]
#[command(name = "tabletop-server", version, about, long_about = None)]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Directory for uploaded images.
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// How far back (seconds) freshly joined players see dice rolls.
    #[arg(long, default_value_t = 10)]
    pub roll_window_secs: u64,

    /// Largest accepted request body, in bytes.
    #[arg(long, default_value_t = 8 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: PathBuf::from("./data"),
            roll_window_secs: 10,
            max_upload_bytes: 8 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Engine settings derived from the command line.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            roll_window: Duration::from_secs(self.roll_window_secs),
            ..EngineConfig::default()
        }
    }

    /// Where uploaded images are written.
    pub fn image_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }
}
