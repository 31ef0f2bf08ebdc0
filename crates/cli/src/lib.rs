//! `templater-cli` library crate.
//!
//! Re-exports configuration and the run loop for testing. The
//! binary entrypoint lives in `main.rs`.

pub mod config;
pub mod run;
