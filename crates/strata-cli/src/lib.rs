//! # strata-cli
//!
//! Command-line interface for the Strata configuration loader.
//!
//! ## Commands
//!
//! - `strata get` — Print one resolved value
//! - `strata dump` — Print every resolved setting
//! - `strata keys` — List every leaf key
//! - `strata watch` — Follow reloads until Ctrl-C
//! - `strata encrypt` / `strata decrypt` — Seal or open a config file
//! - `strata remote` — Load from a config server

pub mod commands;

pub use commands::Cli;
