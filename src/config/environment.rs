//! Environment selection and configuration loading.
//!
//! One environment (homolog or prod) is selected per process lifetime via
//! `SICREDI_ENV` and its configuration is resolved once at startup. There is
//! no runtime environment switching; changing environments means restarting
//! with different variables.

use std::env;
use std::sync::OnceLock;

use tracing::info;

use crate::error::ApiError;

/// Which provider environment this process talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvName {
    #[default]
    Homolog,
    Prod,
}

impl EnvName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvName::Homolog => "homolog",
            EnvName::Prod => "prod",
        }
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, EnvName::Prod)
    }

    /// Read the environment selector from `SICREDI_ENV` (default: homolog).
    pub fn from_env() -> Self {
        match env::var("SICREDI_ENV").as_deref() {
            Ok("prod") => EnvName::Prod,
            _ => EnvName::Homolog,
        }
    }

    fn var_prefix(&self) -> &'static str {
        match self {
            EnvName::Homolog => "SICREDI_HOMOLOG",
            EnvName::Prod => "SICREDI_PROD",
        }
    }
}

static ACTIVE_ENV: OnceLock<EnvName> = OnceLock::new();

/// Record the environment selected at startup. First call wins.
pub fn set_active(name: EnvName) {
    let _ = ACTIVE_ENV.set(name);
}

/// The environment this process was started with. Defaults to homolog when
/// startup has not recorded one (unit tests).
pub fn active() -> EnvName {
    ACTIVE_ENV.get().copied().unwrap_or_default()
}

/// Immutable per-process provider configuration.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub name: EnvName,
    pub api_base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Receiving PIX key. Optional in homolog, mandatory in prod.
    pub pix_key: Option<String>,
    pub ssl_verify: bool,
    pub timeout_ms: u64,
    pub retry_attempts: usize,
}

impl EnvironmentConfig {
    /// Load the configuration for `name`, failing with a single error that
    /// enumerates every missing variable.
    pub fn load(name: EnvName) -> Result<Self, ApiError> {
        let prefix = name.var_prefix();
        let mut missing: Vec<String> = Vec::new();

        let mut required = |suffix: &str| -> String {
            let key = format!("{prefix}_{suffix}");
            match env::var(&key) {
                Ok(v) if !v.trim().is_empty() => v,
                _ => {
                    missing.push(key);
                    String::new()
                }
            }
        };

        let client_id = required("CLIENT_ID");
        let client_secret = required("CLIENT_SECRET");

        let pix_key = env::var(format!("{prefix}_PIX_KEY"))
            .ok()
            .filter(|v| !v.trim().is_empty());
        if name.is_prod() && pix_key.is_none() {
            missing.push(format!("{prefix}_PIX_KEY"));
        }

        if !missing.is_empty() {
            return Err(ApiError::Config(format!(
                "incomplete configuration for environment '{}', missing: {}",
                name.as_str(),
                missing.join(", ")
            )));
        }

        let (default_api, default_token) = match name {
            EnvName::Homolog => (
                "https://api-pix-h.sicredi.com.br/api/v2",
                "https://api-pix-h.sicredi.com.br/oauth/token",
            ),
            EnvName::Prod => (
                "https://api-pix.sicredi.com.br/api/v2",
                "https://api-pix.sicredi.com.br/oauth/token",
            ),
        };

        let api_base_url =
            env::var(format!("{prefix}_API_URL")).unwrap_or_else(|_| default_api.to_string());
        let token_url =
            env::var(format!("{prefix}_TOKEN_URL")).unwrap_or_else(|_| default_token.to_string());

        // Verification may be relaxed in homolog only; prod is always strict.
        let ssl_verify = if name.is_prod() {
            true
        } else {
            env::var(format!("{prefix}_SSL_VERIFY"))
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false)
        };

        let timeout_ms = env::var("SICREDI_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15_000);

        let retry_attempts = env::var("SICREDI_RETRY_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        let config = Self {
            name,
            api_base_url,
            token_url,
            client_id,
            client_secret,
            pix_key,
            ssl_verify,
            timeout_ms,
            retry_attempts,
        };
        config.log_resolved();
        Ok(config)
    }

    /// Log the resolved non-secret fields.
    fn log_resolved(&self) {
        info!(
            environment = self.name.as_str(),
            api_url = %self.api_base_url,
            pix_key_configured = self.pix_key.is_some(),
            ssl_verify = self.ssl_verify,
            timeout_ms = self.timeout_ms,
            retry_attempts = self.retry_attempts,
            "environment configuration resolved"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests below mutate process environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_vars(prefix: &str) {
        for suffix in ["CLIENT_ID", "CLIENT_SECRET", "PIX_KEY", "API_URL", "TOKEN_URL", "SSL_VERIFY"] {
            unsafe { env::remove_var(format!("{prefix}_{suffix}")) };
        }
    }

    #[test]
    fn missing_credentials_lists_every_variable() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vars("SICREDI_HOMOLOG");

        let err = EnvironmentConfig::load(EnvName::Homolog).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("SICREDI_HOMOLOG_CLIENT_ID"));
        assert!(msg.contains("SICREDI_HOMOLOG_CLIENT_SECRET"));
    }

    #[test]
    fn homolog_allows_missing_pix_key() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vars("SICREDI_HOMOLOG");
        unsafe {
            env::set_var("SICREDI_HOMOLOG_CLIENT_ID", "id");
            env::set_var("SICREDI_HOMOLOG_CLIENT_SECRET", "secret");
        }

        let config = EnvironmentConfig::load(EnvName::Homolog).unwrap();
        assert!(config.pix_key.is_none());
        assert!(!config.ssl_verify);
        assert_eq!(config.api_base_url, "https://api-pix-h.sicredi.com.br/api/v2");

        clear_vars("SICREDI_HOMOLOG");
    }

    #[test]
    fn prod_requires_pix_key_and_forces_verification() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vars("SICREDI_PROD");
        unsafe {
            env::set_var("SICREDI_PROD_CLIENT_ID", "id");
            env::set_var("SICREDI_PROD_CLIENT_SECRET", "secret");
        }

        let err = EnvironmentConfig::load(EnvName::Prod).unwrap_err();
        assert!(err.to_string().contains("SICREDI_PROD_PIX_KEY"));

        unsafe {
            env::set_var("SICREDI_PROD_PIX_KEY", "a-key");
            // Attempting to relax verification in prod has no effect.
            env::set_var("SICREDI_PROD_SSL_VERIFY", "false");
        }
        let config = EnvironmentConfig::load(EnvName::Prod).unwrap();
        assert!(config.ssl_verify);

        clear_vars("SICREDI_PROD");
    }
}
