//! Configuration management for Tabscope

use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Debugger endpoint host (HTTP discovery + WebSocket commands)
    pub debugger_host: String,

    /// Debugger endpoint port
    pub debugger_port: u16,

    /// Realtime channel WebSocket URL
    pub channel_url: String,

    /// Channel topic this instance answers on
    pub channel_target: String,

    /// Ack timeout for gateway calls in milliseconds
    pub ack_timeout_ms: u64,

    /// Response timeout for gateway calls in milliseconds
    pub response_timeout_ms: u64,

    /// Token budget for a single tree page
    pub tree_page_token_budget: usize,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debugger_host: "127.0.0.1".to_string(),
            debugger_port: 9222,
            channel_url: "ws://localhost:8787/realtime".to_string(),
            channel_target: "tabscope".to_string(),
            ack_timeout_ms: 10_000,
            response_timeout_ms: 30_000,
            tree_page_token_budget: 4096,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(host) = env::var("TABSCOPE_DEBUGGER_HOST") {
            config.debugger_host = host;
        }

        if let Ok(port) = env::var("TABSCOPE_DEBUGGER_PORT") {
            config.debugger_port = port
                .parse()
                .map_err(|_| Error::configuration("Invalid TABSCOPE_DEBUGGER_PORT"))?;
        }

        if let Ok(url) = env::var("TABSCOPE_CHANNEL_URL") {
            config.channel_url = url;
        }

        if let Ok(target) = env::var("TABSCOPE_CHANNEL_TARGET") {
            config.channel_target = target;
        }

        if let Ok(ack) = env::var("TABSCOPE_ACK_TIMEOUT_MS") {
            config.ack_timeout_ms = ack
                .parse()
                .map_err(|_| Error::configuration("Invalid TABSCOPE_ACK_TIMEOUT_MS"))?;
        }

        if let Ok(response) = env::var("TABSCOPE_RESPONSE_TIMEOUT_MS") {
            config.response_timeout_ms = response
                .parse()
                .map_err(|_| Error::configuration("Invalid TABSCOPE_RESPONSE_TIMEOUT_MS"))?;
        }

        if let Ok(budget) = env::var("TABSCOPE_TREE_PAGE_TOKENS") {
            config.tree_page_token_budget = budget
                .parse()
                .map_err(|_| Error::configuration("Invalid TABSCOPE_TREE_PAGE_TOKENS"))?;
        }

        if let Ok(log_level) = env::var("TABSCOPE_LOG_LEVEL") {
            config.log_level = log_level;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Debugger HTTP discovery endpoint
    pub fn debugger_http_endpoint(&self) -> String {
        format!("http://{}:{}", self.debugger_host, self.debugger_port)
    }
}
