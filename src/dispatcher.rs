use crate::classifier::Action;
use crate::formatter::NotificationPayload;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type ChannelId = String;

/// Primary chat delivery. Channels are looked up by name at delivery time.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn resolve(&self, name: &str) -> Option<ChannelId>;

    async fn send(&self, channel: &ChannelId, payload: &NotificationPayload) -> anyhow::Result<()>;
}

/// Secondary delivery of a flat payload, used for mints only.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn post(&self, action: Action, payload: &NotificationPayload) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationConfig {
    pub name: String,
    /// Empty means every action is delivered.
    pub allowed_actions: HashSet<Action>,
}

impl DestinationConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allowed_actions: HashSet::new(),
        }
    }

    pub fn with_actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.allowed_actions.extend(actions);
        self
    }

    pub fn accepts(&self, action: Action) -> bool {
        self.allowed_actions.is_empty() || self.allowed_actions.contains(&action)
    }
}

/// Parses `name` or `name:MINT|BURN`.
impl FromStr for DestinationConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, actions) = match s.split_once(':') {
            Some((name, actions)) => (name.trim(), Some(actions)),
            None => (s.trim(), None),
        };
        if name.is_empty() {
            return Err(format!("Destination '{s}' has no channel name"));
        }

        let mut destination = DestinationConfig::new(name);
        if let Some(actions) = actions {
            for action in actions.split('|').filter(|a| !a.trim().is_empty()) {
                destination.allowed_actions.insert(Action::from_str(action)?);
            }
        }
        Ok(destination)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DispatchReport {
    /// True when deliveries were attempted and none of them went through.
    pub fn all_failed(&self) -> bool {
        self.failed > 0 && self.delivered == 0
    }
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delivered={}, skipped={}, failed={}",
            self.delivered, self.skipped, self.failed
        )
    }
}

pub struct Dispatcher {
    destinations: Vec<DestinationConfig>,
    transport: Arc<dyn ChatTransport>,
    mint_webhook: Option<Arc<dyn WebhookSink>>,
}

impl Dispatcher {
    pub fn new(
        destinations: Vec<DestinationConfig>,
        transport: Arc<dyn ChatTransport>,
        mint_webhook: Option<Arc<dyn WebhookSink>>,
    ) -> Self {
        Self {
            destinations,
            transport,
            mint_webhook,
        }
    }

    pub async fn dispatch(&self, action: Action, payload: &NotificationPayload) -> DispatchReport {
        let mut report = DispatchReport::default();

        for destination in &self.destinations {
            if !destination.accepts(action) {
                debug!("Destination {} does not take {} events", destination.name, action);
                report.skipped += 1;
                continue;
            }

            let Some(channel) = self.transport.resolve(&destination.name).await else {
                debug!("Channel {} not found, skipping", destination.name);
                report.skipped += 1;
                continue;
            };

            match self.transport.send(&channel, payload).await {
                Ok(()) => {
                    info!("Sent '{}' to #{}", payload.title, destination.name);
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!("Failed to send '{}' to #{}: {:#}", payload.title, destination.name, e);
                    report.failed += 1;
                }
            }
        }

        if action == Action::Mint {
            if let Some(webhook) = &self.mint_webhook {
                if let Err(e) = webhook.post(action, payload).await {
                    warn!("Mint webhook failed for '{}': {:#}", payload.title, e);
                }
            }
        }

        report
    }
}
