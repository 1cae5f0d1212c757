//! chq - run ClickHouse queries in a pinned container and capture CSV output.
//!
//! This library exposes the core modules for use by the binary and in
//! integration tests.

pub mod client;
pub mod config;
pub mod error;
pub mod image;
pub mod logging;
pub mod pin;
pub mod runtime;
pub mod secrets;
pub mod shell;
