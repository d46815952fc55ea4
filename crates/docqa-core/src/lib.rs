//! docqa-core
//!
//! Domain types, the error taxonomy, backend traits, configuration and the
//! chunker shared by every other `docqa-*` crate.

pub mod chunker;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
