//! Business logic and core services.
//!
//! Token caching, the retrying provider client, charge building, and
//! metrics collection live here.

pub mod charge;
pub mod metrics;
pub mod pix_client;
pub mod tls;
pub mod token;

pub use charge::*;
pub use metrics::*;
pub use pix_client::*;
pub use tls::*;
pub use token::*;
