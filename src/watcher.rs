use crate::chain::{ChainNotice, ChainSubscriber};
use crate::classifier::{Action, classify};
use crate::dedup::DedupFilter;
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::events::TransferEvent;
use crate::formatter::format_notification;
use crate::metadata::Enricher;
use crate::network::Network;
use alloy_primitives::{Address, B256};
use anyhow::{Result, bail};
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Stateless stages shared by every watcher.
pub struct Pipeline {
    pub enricher: Enricher,
    pub dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn new(enricher: Enricher, dispatcher: Dispatcher) -> Self {
        Self {
            enricher,
            dispatcher,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered(Action, DispatchReport),
    Duplicate,
    /// Metadata was missing or unusable.
    Suppressed,
}

/// Transfers one watcher enriches and dispatches at the same time.
pub const MAX_IN_FLIGHT: usize = 32;

/// Drives one network subscription. Each transfer is handled on its own task
/// so a slow lookup never holds up the log stream. Dedup state is shared by
/// those tasks and only best-effort while handlers overlap.
#[derive(Clone)]
pub struct EventWatcher {
    network: Network,
    pipeline: Arc<Pipeline>,
    dedup: Arc<Mutex<DedupFilter>>,
    permits: Arc<Semaphore>,
}

impl EventWatcher {
    pub fn new(network: Network, pipeline: Arc<Pipeline>) -> Self {
        Self {
            network,
            pipeline,
            dedup: Arc::new(Mutex::new(DedupFilter::new())),
            permits: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
        }
    }

    /// Subscribes to transfers of `contract` and processes them until the
    /// transport gives up. Always returns an error: a finished subscription is
    /// dead and has to be restarted from outside.
    pub async fn subscribe(&self, subscriber: &ChainSubscriber, contract: Address) -> Result<()> {
        info!("Subscribing to {} - {:?}", self.network, contract);
        let subscription = subscriber.subscribe(self.network, contract).await?;
        let handled = self.run(subscription.into_notices()).await;
        bail!(
            "{} subscription ended after {} transfer(s)",
            self.network,
            handled
        )
    }

    /// Consumes notices until the stream ends, waits for the transfers still
    /// in flight and returns how many transfers were handled.
    pub async fn run<S>(&self, notices: S) -> usize
    where
        S: Stream<Item = ChainNotice>,
    {
        pin_mut!(notices);
        let mut handled = 0;
        let mut tasks = JoinSet::new();

        while let Some(notice) = notices.next().await {
            match notice {
                ChainNotice::Connected(id) => {
                    info!("Connected to {} - {:?}", self.network, id);
                }
                ChainNotice::Changed(log) => {
                    info!(
                        "Changed on {} - tx {:?} removed",
                        self.network, log.transaction_hash
                    );
                }
                ChainNotice::Error(e) => {
                    error!("Error on {} - {:#}", self.network, e);
                }
                ChainNotice::Transfer(event) => {
                    handled += 1;
                    let watcher = self.clone();
                    tasks.spawn(async move { watcher.relay(event).await });
                }
            }
            while let Some(done) = tasks.try_join_next() {
                self.reap(done);
            }
        }

        warn!(
            "{} notice stream closed, waiting for {} transfer(s) in flight",
            self.network,
            tasks.len()
        );
        while let Some(done) = tasks.join_next().await {
            self.reap(done);
        }
        handled
    }

    async fn relay(&self, event: TransferEvent) {
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };
        let hash = event.transaction_hash;
        match self.handle_event(event).await {
            Ok(outcome) => debug!("{} tx {:?}: {:?}", self.network, hash, outcome),
            Err(e) => error!("Failed to relay {} tx {:?}: {:#}", self.network, hash, e),
        }
    }

    fn reap(&self, done: Result<(), JoinError>) {
        if let Err(e) = done {
            error!("{} transfer task failed: {}", self.network, e);
        }
    }

    pub async fn handle_event(&self, event: TransferEvent) -> Result<Outcome> {
        info!(
            "TokenId: {}, to: {}, tx: {:?}",
            event.token_id, event.to_address, event.transaction_hash
        );
        let action = classify(event.from_address, event.to_address);

        if self.is_duplicate(&event.transaction_hash).await {
            return Ok(Outcome::Duplicate);
        }

        let Some(info) = self.pipeline.enricher.lookup(event.token_id).await else {
            return Ok(Outcome::Suppressed);
        };
        // An overlapping handler may have delivered the same tx during lookup.
        if self.is_duplicate(&event.transaction_hash).await {
            return Ok(Outcome::Duplicate);
        }

        let payload = format_notification(
            action,
            event.token_id,
            &info,
            event.to_address,
            event.network,
            Utc::now(),
        );
        let report = self.pipeline.dispatcher.dispatch(action, &payload).await;
        if report.all_failed() {
            bail!("every destination rejected '{}' ({})", payload.title, report);
        }

        self.dedup.lock().await.mark_delivered(event.transaction_hash);
        Ok(Outcome::Delivered(action, report))
    }

    async fn is_duplicate(&self, hash: &B256) -> bool {
        let duplicate = self.dedup.lock().await.is_duplicate(hash);
        if duplicate {
            debug!("Skipping repeated tx {:?}", hash);
        }
        duplicate
    }
}
