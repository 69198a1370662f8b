//! PIX Gateway - an HTTP gateway for Sicredi PIX charges
//!
//! A small Actix Web service that fronts the Sicredi PIX API:
//! - Immediate (`cob`) and due-date (`cobv`) charge creation
//! - Charge queries with payment/overdue status
//! - Mutual-TLS client identity with a resilient trust ladder
//! - OAuth2 client-credentials token caching with single-flight refresh
//! - Bounded retries with exponential backoff and jitter
//! - Prometheus metrics and OpenAPI documentation
//!
//! ## Architecture
//!
//! The codebase is organized into focused modules:
//! - `config/` - Environment resolution and certificate loading
//! - `models/` - Request/response models and the PIX wire schema
//! - `handlers/` - HTTP request handlers for each endpoint
//! - `middleware/` - Custom middleware for cross-cutting concerns
//! - `services/` - Token management, the provider client, and charge building
//!
//! ## Quick Start
//!
//! ```no_run
//! use pix_gateway::{CertificateBundle, EnvName, EnvironmentConfig};
//!
//! fn main() -> Result<(), pix_gateway::ApiError> {
//!     let env = EnvName::from_env();
//!     let config = EnvironmentConfig::load(env)?;
//!     let certs = CertificateBundle::load(&CertificateBundle::default_dir(), env)?;
//!     // Build the client and run the server
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

// Re-export commonly used types and functions for convenience
pub use config::{CertificateBundle, EnvName, EnvironmentConfig, environment};
pub use error::ApiError;
pub use handlers::{
    consultar_pix, consultar_pix_vencimento, create_openapi_spec, gerar_pix, gerar_pix_lote,
    gerar_pix_vencimento, get_metrics, health, ping, version,
};
pub use middleware::RequestIdMiddleware;
pub use models::{
    Amount, ConsultarPixResponse, GerarPixLoteRequest, GerarPixLoteResponse, GerarPixRequest,
    GerarPixResponse, GerarPixVencimentoRequest, HealthResponse, LoteItemRequest, PagamentoInput,
    PingResponse, RawJson, VersionResponse,
};
pub use services::{
    ChargeKind, ChargeService, HttpTokenExchange, PixClient, PixMetrics, TlsAgentFactory, TlsMode,
    TokenExchange, TokenGrant, TokenManager,
};
