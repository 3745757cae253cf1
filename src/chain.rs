use crate::events::{Transfer, TransferEvent, decode_transfer_event};
use crate::network::Network;
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use alloy_primitives::{Address, B256};
use anyhow::{Context, Result};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::time::Duration;
use tracing::info;

/// Lifecycle and data notices produced by one subscription.
#[derive(Debug)]
pub enum ChainNotice {
    Connected(B256),
    Transfer(TransferEvent),
    /// A previously delivered log was removed by a reorg.
    Changed(Log),
    Error(anyhow::Error),
}

impl ChainNotice {
    pub fn from_log(log: Log, network: Network) -> Self {
        if log.removed {
            return ChainNotice::Changed(log);
        }
        match decode_transfer_event(&log, network) {
            Ok(event) => ChainNotice::Transfer(event),
            Err(e) => ChainNotice::Error(e.context("Failed to decode transfer log")),
        }
    }

    /// Maps a raw subscription item; items the transport could not parse as a
    /// log become errors instead of disappearing.
    pub fn from_item(item: serde_json::Result<Log>, network: Network) -> Self {
        match item {
            Ok(log) => Self::from_log(log, network),
            Err(e) => ChainNotice::Error(
                anyhow::Error::new(e).context(format!("Unreadable {network} subscription item")),
            ),
        }
    }
}

/// Websocket reconnect settings handed to the transport.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            delay: Duration::from_secs(5),
        }
    }
}

pub struct ChainSubscriber {
    url: String,
    reconnect: ReconnectPolicy,
}

impl ChainSubscriber {
    pub fn new(url: &str, reconnect: ReconnectPolicy) -> Self {
        Self {
            url: url.to_string(),
            reconnect,
        }
    }

    pub async fn subscribe(
        &self,
        network: Network,
        contract: Address,
    ) -> Result<ChainSubscription> {
        let ws = WsConnect::new(self.url.clone())
            .with_max_retries(self.reconnect.max_attempts)
            .with_retry_interval(self.reconnect.delay);
        let provider = ProviderBuilder::new()
            .connect_ws(ws)
            .await
            .with_context(|| format!("Failed to connect to {network} websocket"))?
            .erased();

        let filter = Filter::new()
            .address(contract)
            .event_signature(Transfer::SIGNATURE_HASH);
        let subscription = provider
            .subscribe_logs(&filter)
            .await
            .with_context(|| format!("Failed to subscribe to {network} transfer logs"))?;
        let id = *subscription.local_id();
        info!("Subscribed to {} - {:?}", network, contract);

        Ok(ChainSubscription {
            network,
            id,
            provider,
            logs: subscription.into_result_stream().boxed(),
        })
    }
}

/// Live subscription. Holds the provider so the websocket stays open for as
/// long as the log stream is polled.
pub struct ChainSubscription {
    network: Network,
    id: B256,
    provider: DynProvider,
    logs: BoxStream<'static, serde_json::Result<Log>>,
}

impl ChainSubscription {
    pub fn into_notices(self) -> impl Stream<Item = ChainNotice> + Send {
        let network = self.network;
        let id = self.id;
        let connected = stream::once(async move { ChainNotice::Connected(id) });
        let state = (self.provider, self.logs);
        let logs = stream::unfold(state, move |(provider, mut logs)| async move {
            let item = logs.next().await?;
            Some((ChainNotice::from_item(item, network), (provider, logs)))
        });
        connected.chain(logs)
    }
}
