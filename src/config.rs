use crate::chain::ReconnectPolicy;
use crate::dispatcher::DestinationConfig;
use crate::network::Network;
use crate::poap_api;
use alloy_primitives::Address;
use anyhow::{Context, Result, anyhow};
use std::str::FromStr;
use std::time::Duration;

pub const POAP_CONTRACT_ADDRESS: &str = "0x22C1f6050E56d2876009903609a2cC3fEf83B415";

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub destinations: Vec<DestinationConfig>,
    pub xdai_ws_url: String,
    pub mainnet_ws_url: String,
    pub poap_api_url: String,
    pub poap_api_key: Option<String>,
    pub contract_address: Address,
    pub slack_webhook_url: Option<String>,
    pub lookup_throttle: Duration,
    pub reconnect: ReconnectPolicy,
    pub channel_refresh_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &str| get(key).with_context(|| format!("{key} must be set in .env"));

        let discord_token = require("DISCORD_TOKEN")?;
        let destinations = parse_destinations(&require("DISCORD_CHANNEL_NAME")?)
            .context("Invalid DISCORD_CHANNEL_NAME")?;
        let xdai_ws_url = require("XDAI_WS_PROVIDER")?;
        let mainnet_ws_url = require("MAINNET_WS_PROVIDER")?;

        let contract_address_str =
            get("POAP_CONTRACT_ADDRESS").unwrap_or_else(|| POAP_CONTRACT_ADDRESS.to_string());
        let contract_address = Address::from_str(contract_address_str.trim())
            .context("Invalid POAP_CONTRACT_ADDRESS format")?;

        let defaults = ReconnectPolicy::default();
        let lookup_throttle_ms = parse_or(get("LOOKUP_THROTTLE_MS"), "LOOKUP_THROTTLE_MS", 5000)?;
        let reconnect_attempts = parse_or(
            get("WS_RECONNECT_ATTEMPTS"),
            "WS_RECONNECT_ATTEMPTS",
            defaults.max_attempts,
        )?;
        let reconnect_delay_ms = parse_or(
            get("WS_RECONNECT_DELAY_MS"),
            "WS_RECONNECT_DELAY_MS",
            defaults.delay.as_millis() as u64,
        )?;
        let refresh_secs = parse_or(get("CHANNEL_REFRESH_SECS"), "CHANNEL_REFRESH_SECS", 300)?;
        let poap_api_url =
            get("POAP_API_URL").unwrap_or_else(|| poap_api::DEFAULT_API_URL.to_string());

        Ok(Config {
            discord_token,
            destinations,
            xdai_ws_url,
            mainnet_ws_url,
            poap_api_url,
            poap_api_key: get("POAP_API_KEY"),
            contract_address,
            slack_webhook_url: get("SLACK_WEBHOOK_URL"),
            lookup_throttle: Duration::from_millis(lookup_throttle_ms),
            reconnect: ReconnectPolicy {
                max_attempts: reconnect_attempts,
                delay: Duration::from_millis(reconnect_delay_ms),
            },
            channel_refresh_interval: Duration::from_secs(refresh_secs),
        })
    }

    pub fn ws_url(&self, network: Network) -> &str {
        match network {
            Network::XDai => &self.xdai_ws_url,
            Network::Mainnet => &self.mainnet_ws_url,
        }
    }
}

/// Parses a comma-separated destination list such as `poap-feed,mints:MINT`.
pub fn parse_destinations(raw: &str) -> Result<Vec<DestinationConfig>> {
    let destinations = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| DestinationConfig::from_str(entry).map_err(|e| anyhow!(e)))
        .collect::<Result<Vec<_>>>()?;

    if destinations.is_empty() {
        anyhow::bail!("At least one channel name must be provided");
    }
    Ok(destinations)
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("{key} must be a number, got '{raw}'")),
        None => Ok(default),
    }
}
