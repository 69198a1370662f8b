//! Error taxonomy and HTTP error responses.
//!
//! Every error surfaced to an API caller carries the active environment name
//! and a timestamp. Raw provider diagnostics are included outside production
//! and withheld in production responses.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::config::environment;

/// All failure modes of the gateway.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Startup-only: missing or inconsistent environment configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Startup-only: client certificate or key could not be loaded.
    #[error("certificate error: {0}")]
    CertLoad(String),

    /// Token exchange failed or the provider rejected our credentials.
    #[error("authentication failed: {message}")]
    Auth {
        message: String,
        /// Filled when the failure looks scope-related, so callers know
        /// which grant to request.
        sugestao: Option<String>,
    },

    /// Caller-supplied data failed validation. Never retried.
    #[error("validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    /// An insecure TLS downgrade was requested in production.
    #[error("TLS verification cannot be disabled in production")]
    SecurityPolicy,

    /// The provider answered with an error status after retries were
    /// exhausted. Carries the raw provider body for diagnosis.
    #[error("provider request failed with status {status} after {attempts} attempt(s)")]
    Upstream {
        status: u16,
        body: String,
        attempts: usize,
    },

    /// No response from the provider at all (connect/timeout/TLS).
    #[error("provider unreachable after {attempts} attempt(s): {message}")]
    Network { message: String, attempts: usize },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Diagnostic detail attached to the response body outside production.
    fn detalhes(&self) -> Option<String> {
        match self {
            ApiError::Upstream { body, attempts, .. } => Some(format!(
                "provider body after {attempts} attempt(s): {body}"
            )),
            ApiError::Network { message, attempts } => {
                Some(format!("{message} ({attempts} attempt(s))"))
            }
            ApiError::Auth { message, .. } => Some(message.clone()),
            _ => None,
        }
    }

    fn sugestao(&self) -> Option<String> {
        match self {
            ApiError::Auth { sugestao, .. } => sugestao.clone(),
            _ => None,
        }
    }
}

/// JSON body returned for every error response.
#[derive(Serialize)]
struct ErrorBody {
    erro: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detalhes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sugestao: Option<String>,
    ambiente: String,
    timestamp: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Config(_) | ApiError::CertLoad(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Auth { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::SecurityPolicy => StatusCode::FORBIDDEN,
            // Provider 4xx passes through; anything else is a bad gateway.
            ApiError::Upstream { status, .. } => match StatusCode::from_u16(*status) {
                Ok(code) if code.is_client_error() => code,
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::Network { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let env = environment::active();
        let body = ErrorBody {
            erro: self.to_string(),
            detalhes: if env.is_prod() { None } else { self.detalhes() },
            sugestao: self.sugestao(),
            ambiente: env.as_str().to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let err = ApiError::validation("cpf", "must have 11 digits");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("cpf"));
    }

    #[test]
    fn security_policy_maps_to_403() {
        assert_eq!(ApiError::SecurityPolicy.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn upstream_4xx_passes_through_5xx_becomes_502() {
        let not_found = ApiError::Upstream {
            status: 404,
            body: "{}".into(),
            attempts: 1,
        };
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let broken = ApiError::Upstream {
            status: 503,
            body: "{}".into(),
            attempts: 3,
        };
        assert_eq!(broken.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn auth_carries_suggestion() {
        let err = ApiError::Auth {
            message: "invalid_scope".into(),
            sugestao: Some("request the cob.write scope".into()),
        };
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert!(err.sugestao().is_some());
    }
}
