use std::{env, net::SocketAddr};

use anyhow::Result;

use crate::courtlistener::DEFAULT_BASE_URL;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub courtlistener_base_url: String,
    pub courtlistener_token: Option<String>,
    pub upstream_timeout_secs: u64,
    pub upstream_max_attempts: u32,
    pub mcp_response_budget_bytes: usize,
    pub mcp_rate_limit_per_minute: u32,
    pub mcp_rate_limit_burst: u32,
    pub mcp_dev_log_payloads: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bind_raw =
            env::var("CASELAW_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_addr = bind_raw
            .trim()
            .trim_matches('"')
            .trim_matches('\'')
            .parse::<SocketAddr>()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080)));

        let courtlistener_base_url = env::var("COURTLISTENER_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        // Optional by contract: without a token the upstream serves at its
        // lower unauthenticated rate ceiling, so startup must not fail.
        let courtlistener_token = env::var("COURTLISTENER_API_TOKEN")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        if courtlistener_token.is_none() {
            eprintln!(
                "[caselaw-research-api] COURTLISTENER_API_TOKEN not set. Continuing unauthenticated at the reduced rate ceiling."
            );
        }

        let upstream_timeout_secs = env::var("CASELAW_UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let upstream_max_attempts = env::var("CASELAW_UPSTREAM_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);

        let mcp_response_budget_bytes = env::var("CASELAW_MCP_RESPONSE_BUDGET_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(64 * 1024);

        let mcp_rate_limit_per_minute = env::var("CASELAW_MCP_RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(120);

        let mcp_rate_limit_burst = env::var("CASELAW_MCP_RATE_LIMIT_BURST")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(60);

        let mcp_dev_log_payloads = env::var("CASELAW_MCP_DEV_LOG_PAYLOADS")
            .ok()
            .map(|v| {
                matches!(
                    v.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            })
            .unwrap_or(false);

        Ok(Self {
            bind_addr,
            courtlistener_base_url,
            courtlistener_token,
            upstream_timeout_secs,
            upstream_max_attempts,
            mcp_response_budget_bytes,
            mcp_rate_limit_per_minute,
            mcp_rate_limit_burst,
            mcp_dev_log_payloads,
        })
    }
}
