//! Retrying HTTP layer for the provider's REST API.
//!
//! Every outbound call runs inside an explicit bounded loop: transient
//! failures (5xx, no response, TLS trust errors) consume retry budget with
//! exponential backoff, a 401 forces exactly one token refresh without
//! consuming budget, and any other 4xx is terminal. TLS trust failures
//! additionally escalate the agent ladder (see [`TlsMode`]). The number of
//! HTTP calls actually made is logged and reported on every outcome.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{info, warn};

use crate::config::EnvironmentConfig;
use crate::error::ApiError;
use crate::services::metrics::PixMetrics;
use crate::services::tls::{TlsAgentFactory, TlsMode, is_tls_trust_error};
use crate::services::token::{HttpTokenExchange, TokenExchange, TokenManager};

/// Which charge resource a call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeKind {
    /// Immediate charge (`/cob`).
    Immediate,
    /// Due-date charge (`/cobv`).
    DueDate,
}

impl ChargeKind {
    pub fn resource(&self) -> &'static str {
        match self {
            ChargeKind::Immediate => "cob",
            ChargeKind::DueDate => "cobv",
        }
    }
}

/// A provider response together with the number of HTTP calls it took.
#[derive(Debug)]
pub struct RequestOutcome {
    pub status: StatusCode,
    pub body: Value,
    pub attempts: usize,
}

/// Authenticated, retrying client for the provider API.
pub struct PixClient<E: TokenExchange = HttpTokenExchange> {
    agents: Arc<TlsAgentFactory>,
    tokens: Arc<TokenManager<E>>,
    base_url: String,
    retry_attempts: usize,
    metrics: Option<PixMetrics>,
}

impl PixClient<HttpTokenExchange> {
    /// Wire up the client from startup configuration.
    pub fn from_config(
        config: &EnvironmentConfig,
        agents: Arc<TlsAgentFactory>,
        metrics: Option<PixMetrics>,
    ) -> Self {
        let exchange = HttpTokenExchange::new(Arc::clone(&agents), config);
        let tokens = Arc::new(TokenManager::new(exchange));
        Self::new(agents, tokens, config, metrics)
    }
}

impl<E: TokenExchange> PixClient<E> {
    pub fn new(
        agents: Arc<TlsAgentFactory>,
        tokens: Arc<TokenManager<E>>,
        config: &EnvironmentConfig,
        metrics: Option<PixMetrics>,
    ) -> Self {
        Self {
            agents,
            tokens,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            retry_attempts: config.retry_attempts.max(1),
            metrics,
        }
    }

    pub async fn create_immediate_charge(&self, payload: &Value) -> Result<RequestOutcome, ApiError> {
        self.send(Method::POST, "/cob", Some(payload)).await
    }

    pub async fn put_due_date_charge(
        &self,
        txid: &str,
        payload: &Value,
    ) -> Result<RequestOutcome, ApiError> {
        self.send(Method::PUT, &format!("/cobv/{txid}"), Some(payload))
            .await
    }

    pub async fn get_charge(&self, kind: ChargeKind, txid: &str) -> Result<RequestOutcome, ApiError> {
        self.send(Method::GET, &format!("/{}/{txid}", kind.resource()), None)
            .await
    }

    /// Execute one provider call under the full retry contract.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RequestOutcome, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let host = url::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        let mut delays = ExponentialBackoff::from_millis(1_000)
            .max_delay(Duration::from_secs(8))
            .map(jitter);

        let mut calls = 0usize;
        let mut failures = 0usize;
        let mut tls_step = 1usize;
        let mut refreshed = false;
        let mut last_err: Option<ApiError> = None;

        while failures < self.retry_attempts {
            let mode = TlsMode::ladder(tls_step, self.agents.has_ca(), self.agents.env());
            let client = self.agents.client_for(mode)?;
            let token = self.tokens.get_token().await?;

            calls += 1;
            let mut request = client.request(method.clone(), &url).bearer_auth(&token);
            if let Some(json) = body {
                request = request.json(json);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::UNAUTHORIZED && !refreshed {
                        // Exactly one forced refresh; does not consume the
                        // retry budget and does not change the TLS agent.
                        refreshed = true;
                        warn!(host = %host, attempt = calls, "401 from provider, forcing token refresh");
                        self.record_retry("unauthorized");
                        if let Some(metrics) = &self.metrics {
                            metrics.record_token_refresh("forced");
                        }
                        self.tokens.invalidate().await;
                        continue;
                    }

                    if status.is_server_error() {
                        failures += 1;
                        warn!(
                            host = %host,
                            method = %method,
                            status = status.as_u16(),
                            attempt = calls,
                            "provider server error"
                        );
                        self.record_retry("server_error");
                        let text = response.text().await.unwrap_or_default();
                        last_err = Some(ApiError::Upstream {
                            status: status.as_u16(),
                            body: text,
                            attempts: calls,
                        });
                        if failures < self.retry_attempts {
                            if let Some(delay) = delays.next() {
                                tokio::time::sleep(delay).await;
                            }
                        }
                        continue;
                    }

                    let text = response.text().await.unwrap_or_default();

                    if status == StatusCode::UNAUTHORIZED {
                        // Second 401 after a fresh token: credentials or
                        // scope problem, not transience.
                        self.record_outcome(&method, "unauthorized", calls);
                        let sugestao = if text.contains("scope") || text.contains("escopo") {
                            Some(
                                "verify the OAuth client is granted the cob/cobv scopes"
                                    .to_string(),
                            )
                        } else {
                            None
                        };
                        return Err(ApiError::Auth {
                            message: format!("provider rejected a fresh token: {text}"),
                            sugestao,
                        });
                    }

                    if status.is_client_error() {
                        // Terminal: validation problems never retry.
                        self.record_outcome(&method, "client_error", calls);
                        return Err(ApiError::Upstream {
                            status: status.as_u16(),
                            body: text,
                            attempts: calls,
                        });
                    }

                    let parsed = serde_json::from_str(&text).unwrap_or(Value::Null);
                    info!(
                        host = %host,
                        method = %method,
                        status = status.as_u16(),
                        attempts = calls,
                        "provider request completed"
                    );
                    self.record_outcome(&method, "success", calls);
                    return Ok(RequestOutcome {
                        status,
                        body: parsed,
                        attempts: calls,
                    });
                }
                Err(e) => {
                    failures += 1;
                    if is_tls_trust_error(&e) {
                        tls_step += 1;
                        warn!(
                            host = %host,
                            attempt = calls,
                            error = %e,
                            "TLS trust failure, escalating agent"
                        );
                        self.record_retry("tls_trust");
                    } else {
                        warn!(host = %host, attempt = calls, error = %e, "network failure");
                        self.record_retry("network");
                    }
                    last_err = Some(ApiError::Network {
                        message: e.to_string(),
                        attempts: calls,
                    });
                    if failures < self.retry_attempts {
                        if let Some(delay) = delays.next() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        self.record_outcome(&method, "retry_exhausted", calls);
        warn!(host = %host, method = %method, attempts = calls, "retry budget exhausted");
        Err(last_err.unwrap_or_else(|| ApiError::Internal("retry budget exhausted".into())))
    }

    fn record_outcome(&self, method: &Method, outcome: &str, attempts: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_upstream(method.as_str(), outcome, attempts);
        }
    }

    fn record_retry(&self, reason: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_retry(reason);
        }
    }
}
