//! HTTP request handlers for API endpoints.
//!
//! This module contains all the HTTP request handlers that process
//! incoming requests and generate responses.

pub mod batch;
pub mod charge;
pub mod health;
pub mod metrics;
pub mod openapi;
pub mod version;

pub use batch::*;
pub use charge::*;
pub use health::*;
pub use metrics::*;
pub use openapi::*;
pub use version::*;
