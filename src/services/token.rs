//! OAuth2 client-credentials token acquisition and caching.
//!
//! The token is cached with its expiry and refreshed shortly before it
//! lapses. The refresh path is single-flighted: the async mutex is held
//! across the exchange, so concurrent callers hitting an expired cache await
//! one in-flight request instead of each issuing their own.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{info, warn};

use crate::config::EnvironmentConfig;
use crate::error::ApiError;
use crate::services::tls::{TlsAgentFactory, TlsMode};

/// Requested grant scope. The provider issues cob/cobv read+write and pix
/// read+write under one client-credentials token.
pub const TOKEN_SCOPE: &str = "cob.write cob.read cobv.write cobv.read pix.write pix.read";

/// Refresh this long before the reported expiry to avoid racing it.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// A freshly exchanged token with its reported lifetime.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: u64,
}

/// Seam for the actual network exchange, so callers and tests can count and
/// fake token requests.
pub trait TokenExchange: Send + Sync {
    fn exchange(&self) -> impl Future<Output = Result<TokenGrant, ApiError>> + Send;
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Cached token state: EMPTY (`None`) or VALID until `expires_at`.
pub struct TokenManager<E: TokenExchange> {
    exchange: E,
    safety_margin: Duration,
    cache: Mutex<Option<CachedToken>>,
}

impl<E: TokenExchange> TokenManager<E> {
    pub fn new(exchange: E) -> Self {
        Self::with_safety_margin(exchange, SAFETY_MARGIN)
    }

    pub fn with_safety_margin(exchange: E, safety_margin: Duration) -> Self {
        Self {
            exchange,
            safety_margin,
            cache: Mutex::new(None),
        }
    }

    /// Return the cached token, or perform one exchange if the cache is
    /// empty or past its validity window.
    pub async fn get_token(&self) -> Result<String, ApiError> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
            info!("cached token expired, refreshing");
        }

        let grant = self.exchange.exchange().await?;
        let lifetime =
            Duration::from_secs(grant.expires_in).saturating_sub(self.safety_margin);
        let expires_at = Instant::now() + lifetime;

        info!(
            expires_in_secs = grant.expires_in,
            "token acquired and cached"
        );
        *cache = Some(CachedToken {
            token: grant.access_token.clone(),
            expires_at,
        });
        Ok(grant.access_token)
    }

    /// Drop the cached token, forcing the next call to exchange again.
    /// Used when a downstream call answers 401.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    172_800 // the provider's 48h default
}

/// Real token exchange against the provider's OAuth endpoint, retrying with
/// escalating TLS leniency up to the configured attempt budget.
pub struct HttpTokenExchange {
    agents: std::sync::Arc<TlsAgentFactory>,
    token_url: String,
    client_id: String,
    client_secret: String,
    retry_attempts: usize,
}

impl HttpTokenExchange {
    pub fn new(agents: std::sync::Arc<TlsAgentFactory>, config: &EnvironmentConfig) -> Self {
        Self {
            agents,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            retry_attempts: config.retry_attempts.max(1),
        }
    }
}

impl TokenExchange for HttpTokenExchange {
    fn exchange(&self) -> impl Future<Output = Result<TokenGrant, ApiError>> + Send {
        self.exchange_with_retry()
    }
}

impl HttpTokenExchange {
    async fn exchange_with_retry(&self) -> Result<TokenGrant, ApiError> {
        let mut delays = ExponentialBackoff::from_millis(500)
            .max_delay(Duration::from_secs(5))
            .map(jitter);
        let mut last_err = ApiError::Auth {
            message: "token exchange not attempted".into(),
            sugestao: None,
        };

        for attempt in 1..=self.retry_attempts {
            let mode = TlsMode::ladder(attempt, self.agents.has_ca(), self.agents.env());
            let client = self.agents.client_for(mode)?;

            let result = client
                .post(&self.token_url)
                .basic_auth(&self.client_id, Some(&self.client_secret))
                .form(&[
                    ("grant_type", "client_credentials"),
                    ("scope", TOKEN_SCOPE),
                ])
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    let parsed: TokenResponse = response.json().await.map_err(|e| {
                        ApiError::Auth {
                            message: format!("malformed token response: {e}"),
                            sugestao: None,
                        }
                    })?;
                    return Ok(TokenGrant {
                        access_token: parsed.access_token,
                        expires_in: parsed.expires_in,
                    });
                }
                Ok(response) if response.status().is_client_error() => {
                    // Bad credentials or scope: more attempts will not help.
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    let sugestao = if body.contains("scope") {
                        Some(format!("verify the client is granted '{TOKEN_SCOPE}'"))
                    } else {
                        None
                    };
                    return Err(ApiError::Auth {
                        message: format!("token endpoint answered {status}: {body}"),
                        sugestao,
                    });
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    warn!(attempt, status, "token endpoint error, will retry");
                    last_err = ApiError::Auth {
                        message: format!("token endpoint answered {status}"),
                        sugestao: None,
                    };
                }
                Err(e) => {
                    warn!(attempt, error = %e, "token exchange transport failure");
                    last_err = ApiError::Auth {
                        message: format!("token exchange failed: {e}"),
                        sugestao: None,
                    };
                }
            }

            if attempt < self.retry_attempts {
                if let Some(delay) = delays.next() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExchange {
        calls: AtomicUsize,
        expires_in: u64,
    }

    impl TokenExchange for CountingExchange {
        fn exchange(&self) -> impl Future<Output = Result<TokenGrant, ApiError>> + Send {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let expires_in = self.expires_in;
            async move {
                Ok(TokenGrant {
                    access_token: format!("token-{n}"),
                    expires_in,
                })
            }
        }
    }

    fn manager(expires_in: u64, margin: Duration) -> TokenManager<CountingExchange> {
        TokenManager::with_safety_margin(
            CountingExchange {
                calls: AtomicUsize::new(0),
                expires_in,
            },
            margin,
        )
    }

    #[tokio::test]
    async fn sequential_gets_within_validity_hit_the_cache() {
        let manager = manager(3600, Duration::from_secs(60));
        for _ in 0..5 {
            assert_eq!(manager.get_token().await.unwrap(), "token-1");
        }
        assert_eq!(manager.exchange.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expiry_triggers_exactly_one_new_exchange() {
        // Margin equals lifetime, so the token is stale immediately.
        let manager = manager(1, Duration::from_secs(1));
        assert_eq!(manager.get_token().await.unwrap(), "token-1");
        assert_eq!(manager.get_token().await.unwrap(), "token-2");
        assert_eq!(manager.exchange.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_a_refresh() {
        let manager = manager(3600, Duration::from_secs(60));
        assert_eq!(manager.get_token().await.unwrap(), "token-1");
        manager.invalidate().await;
        assert_eq!(manager.get_token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        use std::sync::Arc;

        let manager = Arc::new(manager(3600, Duration::from_secs(60)));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = Arc::clone(&manager);
            handles.push(tokio::spawn(async move { m.get_token().await.unwrap() }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), "token-1");
        }
        assert_eq!(manager.exchange.calls.load(Ordering::SeqCst), 1);
    }
}
