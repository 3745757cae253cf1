use anyhow::Result;
use poap_feed::chain::ChainSubscriber;
use poap_feed::config::Config;
use poap_feed::discord::DiscordClient;
use poap_feed::dispatcher::{Dispatcher, WebhookSink};
use poap_feed::metadata::Enricher;
use poap_feed::network::Network;
use poap_feed::poap_api::PoapApiClient;
use poap_feed::retry::RetryPolicy;
use poap_feed::slack::SlackWebhook;
use poap_feed::watcher::{EventWatcher, Pipeline};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting to listen POAP events");

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("Contract address: {:?}", config.contract_address);
    info!(
        "Channels: {} destination(s) configured",
        config.destinations.len()
    );

    let discord = Arc::new(DiscordClient::new(&config.discord_token, RetryPolicy::default())?);
    if let Err(e) = discord.refresh_channels().await {
        warn!("Initial channel refresh failed: {:#}", e);
    }
    if !config.channel_refresh_interval.is_zero() {
        tokio::spawn(refresh_channels(discord.clone(), config.channel_refresh_interval));
    }

    let api = Arc::new(PoapApiClient::new(
        &config.poap_api_url,
        config.poap_api_key.clone(),
        RetryPolicy::default(),
    )?);

    let mint_webhook: Option<Arc<dyn WebhookSink>> = match &config.slack_webhook_url {
        Some(url) => {
            info!("Slack mint webhook enabled");
            let webhook: Arc<dyn WebhookSink> =
                Arc::new(SlackWebhook::new(url, RetryPolicy::default())?);
            Some(webhook)
        }
        None => None,
    };

    let pipeline = Arc::new(Pipeline::new(
        Enricher::new(api, config.lookup_throttle),
        Dispatcher::new(config.destinations.clone(), discord, mint_webhook),
    ));

    let mut handles = Vec::new();
    for network in Network::ALL {
        let subscriber = ChainSubscriber::new(config.ws_url(network), config.reconnect);
        let watcher = EventWatcher::new(network, pipeline.clone());
        let contract = config.contract_address;
        handles.push(tokio::spawn(async move {
            watcher.subscribe(&subscriber, contract).await
        }));
    }

    for (network, handle) in Network::ALL.into_iter().zip(handles) {
        match handle.await {
            Ok(Ok(())) => info!("{} watcher stopped", network),
            Ok(Err(e)) => error!("{} watcher died: {:#}", network, e),
            Err(e) => error!("{} watcher task panicked: {}", network, e),
        }
    }

    anyhow::bail!("All subscriptions ended")
}

async fn refresh_channels(discord: Arc<DiscordClient>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately and startup already refreshed.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = discord.refresh_channels().await {
            warn!("Channel refresh failed: {:#}", e);
        }
    }
}
