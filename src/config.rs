//! Process configuration.
//!
//! Values come from flags, then the environment (a `.env` file is loaded
//! into it first by `main`).

use std::net::SocketAddr;
use std::time::Duration;

use clap::Args;

use crate::client::{GeminiClient, DEFAULT_API_BASE};

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Gemini API key. Analyses fail without it; nothing else does.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Root URL of the Gemini API
    #[arg(long, env = "GEMINI_API_BASE", default_value = DEFAULT_API_BASE, global = true)]
    pub api_base: String,

    /// Address the web UI listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000", global = true)]
    pub bind: SocketAddr,

    /// Give up on an analysis after this many seconds (0 or unset waits forever)
    #[arg(long, env = "ANALYSIS_TIMEOUT_SECS", global = true)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|&s| s > 0).map(Duration::from_secs)
    }

    pub fn client(&self) -> GeminiClient {
        GeminiClient::new(self.api_key.clone()).with_api_base(&self.api_base)
    }
}
