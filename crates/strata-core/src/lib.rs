//! # strata-core
//!
//! Shared vocabulary for the Strata workspace: the unified error type and the
//! serialization formats a configuration source may be written in.

pub mod error;
pub mod format;

pub use error::{Result, StrataError};
pub use format::ConfigFormat;
