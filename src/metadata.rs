use crate::http::HttpError;
use alloy_primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub event: Option<EventResponse>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventResponse {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub image_url: Option<String>,
}

/// Remote lookups backing the enricher.
#[async_trait]
pub trait MetadataApi: Send + Sync {
    async fn token(&self, token_id: U256) -> Result<TokenResponse, HttpError>;

    /// Number of POAPs held by `address`.
    async fn scan_count(&self, address: &str) -> Result<u64, HttpError>;

    async fn alias(&self, address: &str) -> Result<Option<String>, HttpError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub event_id: u64,
    pub event_name: String,
    pub image_url: String,
    pub owner_address: Option<String>,
    pub reputation_score: u64,
    pub alias: Option<String>,
}

/// Hard-required part of a lookup. Building it is the only step that can make
/// the whole lookup come back empty.
#[derive(Debug)]
struct RequiredFields {
    event_id: u64,
    event_name: String,
    image_url: String,
    owner_address: Option<String>,
}

impl RequiredFields {
    fn from_response(response: TokenResponse) -> Option<Self> {
        let event = response.event?;
        let event_id = event.id.filter(|id| *id != 0)?;
        let event_name = event.name.filter(|name| !name.is_empty())?;
        let image_url = event.image_url.filter(|url| !url.trim().is_empty())?;
        Some(Self {
            event_id,
            event_name,
            image_url,
            owner_address: response.owner.filter(|owner| !owner.is_empty()),
        })
    }

    fn complete(self, reputation_score: u64, alias: Option<String>) -> TokenInfo {
        TokenInfo {
            event_id: self.event_id,
            event_name: self.event_name,
            image_url: self.image_url,
            owner_address: self.owner_address,
            reputation_score,
            alias,
        }
    }
}

pub struct Enricher {
    api: Arc<dyn MetadataApi>,
    throttle: Duration,
}

impl Enricher {
    pub fn new(api: Arc<dyn MetadataApi>, throttle: Duration) -> Self {
        Self { api, throttle }
    }

    pub async fn lookup(&self, token_id: U256) -> Option<TokenInfo> {
        if !self.throttle.is_zero() {
            sleep(self.throttle).await;
        }

        let response = match self.api.token(token_id).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to fetch token {}: {}", token_id, e);
                return None;
            }
        };

        let Some(required) = RequiredFields::from_response(response) else {
            warn!("Token {} has incomplete event metadata, skipping", token_id);
            return None;
        };

        let (reputation_score, alias) = match required.owner_address.as_deref() {
            Some(owner) => {
                let score = self
                    .api
                    .scan_count(owner)
                    .await
                    .unwrap_or_else(|e| soft_default("scan count", owner, e));
                let alias = self
                    .api
                    .alias(owner)
                    .await
                    .unwrap_or_else(|e| soft_default("alias", owner, e))
                    .filter(|alias| !alias.is_empty());
                (score, alias)
            }
            None => {
                debug!("Token {} has no owner, skipping holder lookups", token_id);
                (0, None)
            }
        };

        Some(required.complete(reputation_score, alias))
    }
}

fn soft_default<T: Default>(what: &str, address: &str, error: HttpError) -> T {
    warn!("Failed to fetch {} for {}: {}, using default", what, address, error);
    T::default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn status_error(code: u16) -> HttpError {
        HttpError::Status {
            status: StatusCode::from_u16(code).unwrap(),
            url: "https://api.poap.xyz".to_string(),
        }
    }

    /// In-memory API. `None` in a slot makes that call fail with a 500, and a
    /// token id in `stalled` never gets an answer.
    #[derive(Default)]
    pub(crate) struct FakeApi {
        pub token: Option<TokenResponse>,
        pub stalled: Option<U256>,
        pub scan_count: Option<u64>,
        pub alias: Option<Option<String>>,
        pub token_calls: AtomicUsize,
        pub holder_calls: AtomicUsize,
    }

    impl FakeApi {
        pub(crate) fn devcon(reputation: u64) -> Self {
            Self {
                token: Some(TokenResponse {
                    event: Some(EventResponse {
                        id: Some(7),
                        name: Some("Devcon".to_string()),
                        image_url: Some("http://img".to_string()),
                    }),
                    owner: Some("0x0000000000000000000000000000000000000abc".to_string()),
                }),
                scan_count: Some(reputation),
                alias: Some(None),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl MetadataApi for FakeApi {
        async fn token(&self, token_id: U256) -> Result<TokenResponse, HttpError> {
            self.token_calls.fetch_add(1, Ordering::SeqCst);
            if self.stalled == Some(token_id) {
                futures::future::pending::<()>().await;
            }
            self.token.clone().ok_or_else(|| status_error(500))
        }

        async fn scan_count(&self, _address: &str) -> Result<u64, HttpError> {
            self.holder_calls.fetch_add(1, Ordering::SeqCst);
            self.scan_count.ok_or_else(|| status_error(500))
        }

        async fn alias(&self, _address: &str) -> Result<Option<String>, HttpError> {
            self.holder_calls.fetch_add(1, Ordering::SeqCst);
            self.alias.clone().ok_or_else(|| status_error(404))
        }
    }

    fn enricher(api: FakeApi) -> Enricher {
        Enricher::new(Arc::new(api), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_lookup_full_success() {
        let mut api = FakeApi::devcon(3);
        api.alias = Some(Some("vitalik.eth".to_string()));

        let info = enricher(api).lookup(U256::from(42)).await.unwrap();
        assert_eq!(info.event_id, 7);
        assert_eq!(info.event_name, "Devcon");
        assert_eq!(info.image_url, "http://img");
        assert_eq!(info.reputation_score, 3);
        assert_eq!(info.alias.as_deref(), Some("vitalik.eth"));
    }

    #[tokio::test]
    async fn test_primary_failure_is_absent() {
        let api = FakeApi {
            token: None,
            ..FakeApi::devcon(3)
        };
        assert!(enricher(api).lookup(U256::from(42)).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_event_fields_is_absent() {
        for event in [
            EventResponse {
                id: None,
                name: Some("Devcon".into()),
                image_url: Some("http://img".into()),
            },
            EventResponse {
                id: Some(7),
                name: None,
                image_url: Some("http://img".into()),
            },
            EventResponse {
                id: Some(7),
                name: Some("Devcon".into()),
                image_url: Some(String::new()),
            },
            EventResponse {
                id: Some(7),
                name: Some("Devcon".into()),
                image_url: Some("  ".into()),
            },
        ] {
            let api = FakeApi {
                token: Some(TokenResponse {
                    event: Some(event),
                    owner: Some("0xabc".into()),
                }),
                ..FakeApi::devcon(3)
            };
            assert!(enricher(api).lookup(U256::from(1)).await.is_none());
        }
    }

    #[tokio::test]
    async fn test_soft_failures_default() {
        let api = FakeApi {
            scan_count: None,
            alias: None,
            ..FakeApi::devcon(3)
        };

        let info = enricher(api).lookup(U256::from(42)).await.unwrap();
        assert_eq!(info.reputation_score, 0);
        assert_eq!(info.alias, None);
    }

    #[tokio::test]
    async fn test_alias_failure_keeps_score() {
        let api = FakeApi {
            alias: None,
            ..FakeApi::devcon(12)
        };

        let info = enricher(api).lookup(U256::from(42)).await.unwrap();
        assert_eq!(info.reputation_score, 12);
        assert_eq!(info.alias, None);
    }

    #[tokio::test]
    async fn test_missing_owner_skips_holder_lookups() {
        let mut api = FakeApi::devcon(9);
        if let Some(token) = api.token.as_mut() {
            token.owner = None;
        }
        let api = Arc::new(api);

        let info = Enricher::new(api.clone(), Duration::ZERO)
            .lookup(U256::from(42))
            .await
            .unwrap();
        assert_eq!(info.reputation_score, 0);
        assert_eq!(info.owner_address, None);
        assert_eq!(api.holder_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_waits_for_throttle_before_first_call() {
        let api = Arc::new(FakeApi::devcon(3));
        let enricher = Enricher::new(api.clone(), Duration::from_secs(5));
        let start = tokio::time::Instant::now();

        let lookup = tokio::spawn(async move { enricher.lookup(U256::from(42)).await });
        sleep(Duration::from_secs(4)).await;
        assert_eq!(api.token_calls.load(Ordering::SeqCst), 0);

        let info = lookup.await.unwrap();
        assert!(info.is_some());
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(api.token_calls.load(Ordering::SeqCst), 1);
    }
}
