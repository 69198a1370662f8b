//! Configuration structures and loading utilities.
//!
//! Everything here is resolved once at process start and treated as
//! immutable for the process lifetime. Changing environments means
//! restarting the process with different variables.

pub mod certificates;
pub mod environment;

pub use certificates::*;
pub use environment::*;
