//! CLI module for zabbix-pingdom
//!
//! サブコマンドなしで起動した場合は `serve` と同じ動作になる。

pub mod check;
pub mod serve;

use clap::{Parser, Subcommand};

/// Zabbix → Pingdom health-check adapter
#[derive(Parser, Debug)]
#[command(name = "zabbix-pingdom")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    ZABBIX_USERNAME         Zabbix username (required)
    ZABBIX_PASSWORD         Zabbix password (required)
    ZABBIX_JSON_API_URL     Zabbix JSON-RPC endpoint (required)
    ACCEPTABLE_ITEM_AGE     Maximum age of the last value in minutes (default: 2)
    DEBUG                   Enable debug logging (default: false)
    HOST                    Bind address (default: 0.0.0.0)
    PORT                    Listen port (default: 38888)
    ZABBIX_CACHE_TTL_SECS   Session and id cache window (default: 600)
    ZABBIX_TIMEOUT_SECS     Per request timeout (default: 10)
    ZABBIX_MAX_CONCURRENCY  Max outstanding Zabbix requests (default: 16)
    RUST_LOG                Log filter, overrides DEBUG
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve(serve::ServeArgs),
    /// Run a single check and print the XML verdict
    Check(check::CheckArgs),
}
