use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use crate::config::ApiConfig;

/// Build the HTTP client used for generation calls and image downloads
pub fn build(api: &ApiConfig) -> Result<Client> {
    Client::builder()
        .timeout(api.timeout()) // Generation can take a while
        .connect_timeout(api.connect_timeout())
        .pool_max_idle_per_host(5)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .user_agent(concat!("aipainter/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}
