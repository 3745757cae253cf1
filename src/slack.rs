use crate::classifier::Action;
use crate::dispatcher::WebhookSink;
use crate::formatter::NotificationPayload;
use crate::http;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Slack workflow webhook. Workflow variables have to be flat strings.
pub struct SlackWebhook {
    http: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl SlackWebhook {
    pub fn new(url: &str, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            http: http::build_client()?,
            url: url.to_string(),
            retry,
        })
    }
}

pub fn flat_payload(action: Action, payload: &NotificationPayload) -> Value {
    let mut body = Map::new();
    body.insert("action".into(), action.as_str().into());
    body.insert("title".into(), payload.title.clone().into());
    body.insert("event_url".into(), payload.link_url.clone().into());
    body.insert("image_url".into(), payload.image_url.clone().into());
    body.insert("owner".into(), payload.author_label.clone().into());
    body.insert("owner_url".into(), payload.author_link_url.clone().into());
    body.insert("timestamp".into(), payload.timestamp.to_rfc3339().into());
    for field in &payload.fields {
        body.insert(field_key(&field.label), field.value.clone().into());
    }
    Value::Object(body)
}

fn field_key(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

#[async_trait]
impl WebhookSink for SlackWebhook {
    async fn post(&self, action: Action, payload: &NotificationPayload) -> Result<()> {
        let body = flat_payload(action, payload);
        http::send_with_retry(&self.retry, "Slack webhook", || {
            self.http.post(&self.url).json(&body)
        })
        .await
        .context("Failed to post to Slack webhook")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::Field;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_flat_payload() {
        let payload = NotificationPayload {
            title: "MINT: Devcon".to_string(),
            color: 0x48a9a9,
            fields: vec![
                Field {
                    label: "POAP Power".to_string(),
                    value: "🆕 3".to_string(),
                    inline: true,
                },
                Field {
                    label: "Token ID".to_string(),
                    value: "#42".to_string(),
                    inline: true,
                },
            ],
            link_url: "https://poap.gallery/event/7/?utm_share=discordfeed".to_string(),
            image_url: "http://img".to_string(),
            author_label: "0xabc".to_string(),
            author_link_url: "https://app.poap.xyz/scan/0xabc/?utm_share=discordfeed".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        };

        let body = flat_payload(Action::Mint, &payload);
        assert_eq!(body["action"], "MINT");
        assert_eq!(body["title"], "MINT: Devcon");
        assert_eq!(body["poap_power"], "🆕 3");
        assert_eq!(body["token_id"], "#42");
        assert_eq!(body["owner"], "0xabc");
        assert_eq!(body["timestamp"], "2024-01-01T12:00:00+00:00");
        assert!(body.as_object().unwrap().values().all(Value::is_string));
    }
}
