//! Shell command construction.
//!
//! Quoting lives in [`quote`]; [`ShellCommand`] assembles the client command
//! line that embeds the connection parameters and the credential.

mod command;
mod quote;

pub use command::{ShellCommand, CLICKHOUSE_CLIENT_TEMPLATE, REDACTED};
pub use quote::{quote, squotef};
