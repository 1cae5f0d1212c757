//! Command-line argument parsing for chq.

use chq::config::{Config, ConnectionConfig, ConnectionProfile};
use chq::error::{ChqError, Result};
use chq::secrets::SecretRef;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Run ClickHouse queries in a pinned container and capture the result as CSV.
#[derive(Parser, Debug)]
#[command(name = "chq")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a SQL query and write the result as CSV
    Csv(CsvArgs),

    /// Resolve the current digest-pinned reference of the base image
    Pin(PinArgs),
}

#[derive(Args, Debug)]
pub struct CsvArgs {
    /// SQL query; read from stdin when omitted or "-"
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// ClickHouse host
    #[arg(short = 'H', long, value_name = "HOST")]
    pub host: Option<String>,

    /// ClickHouse port [default: 9000]
    #[arg(
        short = 'p',
        long,
        value_name = "PORT",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub port: Option<u16>,

    /// ClickHouse user
    #[arg(short = 'U', long, value_name = "USER")]
    pub user: Option<String>,

    /// Password reference: env:NAME, file:PATH, keyring:KEY or plain:VALUE
    #[arg(long, value_name = "REF")]
    pub password: Option<SecretRef>,

    /// Use named connection from config
    #[arg(short = 'c', long, value_name = "NAME")]
    pub connection: Option<String>,

    /// Write the CSV to this file instead of stdout
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PinArgs {
    /// Repository to resolve (defaults to the configured repository)
    #[arg(long, value_name = "REPOSITORY")]
    pub repository: Option<String>,

    /// Store the resolved pin in the config file
    #[arg(long)]
    pub write: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }
}

impl CsvArgs {
    /// Returns the connection settings given on the command line only.
    pub fn to_connection_profile(&self) -> ConnectionProfile {
        ConnectionProfile {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }

    /// Resolves the final connection with precedence:
    /// 1. CLI arguments (highest)
    /// 2. Named connection from config, or the default connection
    /// 3. Environment variables
    pub fn resolve_connection(&self, config: &Config) -> Result<ConnectionConfig> {
        let mut profile = match self.connection.as_deref() {
            Some(name) => config.get_connection(Some(name)).cloned().ok_or_else(|| {
                ChqError::config(format!("Connection '{}' not found in config file", name))
            })?,
            None => config.get_connection(None).cloned().unwrap_or_default(),
        };

        profile.merge(&self.to_connection_profile());
        profile.apply_env_defaults();
        profile.into_config()
    }

    /// Returns the inline query, or None if it should be read from stdin.
    pub fn inline_query(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| *q != "-")
    }
}
