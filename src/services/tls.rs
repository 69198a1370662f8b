//! Per-attempt TLS agent construction.
//!
//! The provider's certificate chain is flaky in homolog, so outbound calls
//! escalate through three agent configurations: strict with the provider CA,
//! strict with system roots only, and (homolog only) verification disabled.
//! Requesting the insecure mode in prod is a policy violation that fails
//! before any I/O.

use std::time::Duration;

use reqwest::{Certificate, Client, Identity};
use tracing::warn;

use crate::config::{CertificateBundle, EnvName};
use crate::error::ApiError;

/// One rung of the agent ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Client cert + provider CA, strict verification.
    StrictWithCa,
    /// Client cert only, strict verification against system roots.
    Strict,
    /// Client cert, verification disabled. Never permitted in prod.
    Insecure,
}

impl TlsMode {
    /// The mode to use for the n-th TLS escalation step (1-based). Prod
    /// never ladders past strict verification.
    pub fn ladder(step: usize, has_ca: bool, env: EnvName) -> TlsMode {
        match step {
            1 if has_ca => TlsMode::StrictWithCa,
            1 | 2 => TlsMode::Strict,
            _ if env.is_prod() => TlsMode::Strict,
            _ => TlsMode::Insecure,
        }
    }
}

/// Builds reqwest clients for each [`TlsMode`] from the loaded credentials.
pub struct TlsAgentFactory {
    identity: Option<Identity>,
    ca: Option<Certificate>,
    env: EnvName,
    verify: bool,
    timeout: Duration,
}

impl TlsAgentFactory {
    pub fn new(
        bundle: &CertificateBundle,
        env: EnvName,
        verify: bool,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        // rustls wants cert chain and key in a single PEM blob.
        let mut pem = bundle.cert_pem.clone();
        pem.push(b'\n');
        pem.extend_from_slice(&bundle.key_pem);
        let identity = Identity::from_pem(&pem)
            .map_err(|e| ApiError::CertLoad(format!("invalid client identity: {e}")))?;

        let ca = match &bundle.ca_pem {
            Some(bytes) => Some(
                Certificate::from_pem(bytes)
                    .map_err(|e| ApiError::CertLoad(format!("invalid CA bundle: {e}")))?,
            ),
            None => None,
        };

        Ok(Self {
            identity: Some(identity),
            ca,
            env,
            verify,
            timeout,
        })
    }

    /// Factory with no client identity, for tests against plain-HTTP mocks.
    pub fn without_identity(env: EnvName, timeout: Duration) -> Self {
        Self {
            identity: None,
            ca: None,
            env,
            verify: true,
            timeout,
        }
    }

    pub fn has_ca(&self) -> bool {
        self.ca.is_some()
    }

    pub fn env(&self) -> EnvName {
        self.env
    }

    /// Build a client for `mode`. When verification was relaxed for the
    /// whole environment (homolog `ssl_verify=false`), every mode resolves
    /// to the insecure agent, mirroring the provider's homolog chain.
    pub fn client_for(&self, mode: TlsMode) -> Result<Client, ApiError> {
        let effective = if !self.verify && !self.env.is_prod() {
            TlsMode::Insecure
        } else {
            mode
        };

        if effective == TlsMode::Insecure && self.env.is_prod() {
            return Err(ApiError::SecurityPolicy);
        }

        let mut builder = Client::builder().use_rustls_tls().timeout(self.timeout);

        if let Some(identity) = &self.identity {
            builder = builder.identity(identity.clone());
        }

        match effective {
            TlsMode::StrictWithCa => {
                if let Some(ca) = &self.ca {
                    builder = builder.add_root_certificate(ca.clone());
                }
            }
            TlsMode::Strict => {}
            TlsMode::Insecure => {
                warn!(
                    environment = self.env.as_str(),
                    "building TLS agent with verification disabled"
                );
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| ApiError::Internal(format!("cannot build HTTP client: {e}")))
    }
}

/// Whether a transport error is a TLS trust failure (unknown issuer,
/// untrusted or unverifiable certificate), which warrants escalating the
/// agent ladder instead of plain retry.
pub fn is_tls_trust_error(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(cause) = source {
        let text = cause.to_string();
        if text.contains("certificate")
            || text.contains("UnknownIssuer")
            || text.contains("self signed")
            || text.contains("self-signed")
        {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_escalates_and_prod_never_goes_insecure() {
        assert_eq!(
            TlsMode::ladder(1, true, EnvName::Homolog),
            TlsMode::StrictWithCa
        );
        assert_eq!(TlsMode::ladder(1, false, EnvName::Homolog), TlsMode::Strict);
        assert_eq!(TlsMode::ladder(2, true, EnvName::Homolog), TlsMode::Strict);
        assert_eq!(
            TlsMode::ladder(3, true, EnvName::Homolog),
            TlsMode::Insecure
        );
        assert_eq!(TlsMode::ladder(3, true, EnvName::Prod), TlsMode::Strict);
        assert_eq!(TlsMode::ladder(9, false, EnvName::Prod), TlsMode::Strict);
    }

    #[test]
    fn insecure_mode_in_prod_is_a_policy_error() {
        let factory =
            TlsAgentFactory::without_identity(EnvName::Prod, Duration::from_secs(5));
        let err = factory.client_for(TlsMode::Insecure).unwrap_err();
        assert!(matches!(err, ApiError::SecurityPolicy));
    }

    #[test]
    fn homolog_builds_clients_for_every_mode() {
        let factory =
            TlsAgentFactory::without_identity(EnvName::Homolog, Duration::from_secs(5));
        assert!(factory.client_for(TlsMode::StrictWithCa).is_ok());
        assert!(factory.client_for(TlsMode::Strict).is_ok());
        assert!(factory.client_for(TlsMode::Insecure).is_ok());
    }
}
