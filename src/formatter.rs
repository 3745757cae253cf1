use crate::classifier::Action;
use crate::metadata::TokenInfo;
use crate::network::Network;
use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};

const GALLERY_URL: &str = "https://poap.gallery/event";
const SCAN_URL: &str = "https://app.poap.xyz/scan";
const UTM_QUERY: &str = "?utm_share=discordfeed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub label: String,
    pub value: String,
    pub inline: bool,
}

impl Field {
    fn inline(label: &str, value: String) -> Self {
        Self {
            label: label.to_string(),
            value,
            inline: true,
        }
    }
}

/// Transport-agnostic notification; every destination renders it its own way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: String,
    pub color: u32,
    pub fields: Vec<Field>,
    pub link_url: String,
    pub image_url: String,
    pub author_label: String,
    pub author_link_url: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReputationTier {
    Newcomer,
    Regular,
    Collector,
    Veteran,
    Legend,
}

impl ReputationTier {
    pub fn for_score(score: u64) -> Self {
        match score {
            0..=5 => ReputationTier::Newcomer,
            6..=10 => ReputationTier::Regular,
            11..=20 => ReputationTier::Collector,
            21..=50 => ReputationTier::Veteran,
            _ => ReputationTier::Legend,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ReputationTier::Newcomer => "🆕",
            ReputationTier::Regular => "🟢",
            ReputationTier::Collector => "🟡",
            ReputationTier::Veteran => "🔴",
            ReputationTier::Legend => "🔥",
        }
    }
}

pub fn format_notification(
    action: Action,
    token_id: U256,
    info: &TokenInfo,
    recipient: Address,
    network: Network,
    timestamp: DateTime<Utc>,
) -> NotificationPayload {
    let tier = ReputationTier::for_score(info.reputation_score);
    let author_label = info
        .alias
        .clone()
        .unwrap_or_else(|| recipient.to_string().to_lowercase());

    NotificationPayload {
        title: format!("{}: {}", action, info.event_name),
        color: network.color(),
        fields: vec![
            Field::inline(
                "POAP Power",
                format!("{} {}", tier.emoji(), info.reputation_score),
            ),
            Field::inline("Token ID", format!("#{token_id}")),
            Field::inline("Event ID", format!("#{}", info.event_id)),
        ],
        link_url: format!("{}/{}/{}", GALLERY_URL, info.event_id, UTM_QUERY),
        image_url: info.image_url.clone(),
        author_label,
        author_link_url: format!("{SCAN_URL}/{recipient}/{UTM_QUERY}"),
        timestamp,
    }
}
