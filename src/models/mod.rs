//! Data models for the PIX gateway.
//!
//! `api` holds the upstream request/response shapes; `pix` holds the
//! provider's wire schema for cob/cobv resources.

pub mod api;
pub mod pix;

pub use api::*;
pub use pix::*;
