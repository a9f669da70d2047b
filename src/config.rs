//! Config module for vidfetch

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::client::ApiClient;
use crate::task::PollerConfig;

#[derive(Parser, Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the download backend
    #[clap(
        long = "backend-url",
        env = "VIDFETCH_BACKEND_URL",
        default_value = "http://127.0.0.1:8000"
    )]
    pub url: String,

    /// Seconds to wait for a TCP connection to the backend
    #[clap(long, env = "VIDFETCH_CONNECT_TIMEOUT_SECS", default_value = "10")]
    pub connect_timeout_secs: u64,
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn client(&self) -> crate::Result<ApiClient> {
        ApiClient::new(&self.url, self.connect_timeout())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct TaskConfig {
    /// Milliseconds between progress requests
    #[clap(long, env = "VIDFETCH_POLL_INTERVAL_MS", default_value = "1000")]
    pub poll_interval_ms: u64,

    /// Milliseconds to wait after 100% before retrieving the file
    #[clap(long, env = "VIDFETCH_SETTLE_DELAY_MS", default_value = "1000")]
    pub settle_delay_ms: u64,

    /// Directory downloaded videos are saved into
    #[clap(long, env = "VIDFETCH_OUTPUT_DIR", default_value_t = get_default_output_dir())]
    pub output_dir: String,
}

/// The user's download directory, or the working directory when there is none
fn get_default_output_dir() -> String {
    dirs::download_dir()
        .and_then(|path| path.to_str().map(String::from))
        .unwrap_or_else(|| ".".to_string())
}

impl TaskConfig {
    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().into()
    }
}

#[derive(Parser, Debug, Clone)]
pub struct Config {
    #[clap(flatten)]
    pub backend: BackendConfig,

    #[clap(flatten)]
    pub task: TaskConfig,
}
