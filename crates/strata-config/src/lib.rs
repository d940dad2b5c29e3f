//! # strata-config
//!
//! Layered configuration loading. A configuration instance reads an entry
//! file, follows its `include:` chain, decrypts files that carry the
//! encrypted suffix, merges everything so the entry file wins, and can watch
//! the resolved files to hot-reload the merged view.
//!
//! All access to the merged settings goes through one read/write lock per
//! [`Config`] instance.

pub mod cast;
pub mod config;
pub mod crypto;
pub mod loader;
pub mod options;
pub mod remote;
pub mod resolver;
pub mod store;
pub mod watch;

pub use config::{Config, DEFAULT_CONFIG_FILE_NAME};
pub use crypto::{AesReader, is_encrypted};
pub use loader::{LoadMode, load_one, merge_chain};
pub use options::{DEFAULT_ENCRYPTED_SUFFIX, LoadOptions, WatchCallback};
pub use remote::ConfigServerClient;
pub use resolver::{INCLUDE_KEY, resolve_chain};
pub use store::Store;

pub use strata_core::{ConfigFormat, Result, StrataError};
