//! Configuration management via environment variables
//!
//! 起動時に一度だけ読み込み、プロセス終了まで不変。必須値の欠落や不正値は
//! 変数名付きの`ConfigError`として報告し、サーバーは起動しない。

use crate::common::error::ConfigError;
use crate::common::types::ZabbixCredentials;
use reqwest::Url;
use std::str::FromStr;
use std::time::Duration;

/// Zabbixユーザー名
pub const ENV_ZABBIX_USERNAME: &str = "ZABBIX_USERNAME";
/// Zabbixパスワード
pub const ENV_ZABBIX_PASSWORD: &str = "ZABBIX_PASSWORD";
/// Zabbix JSON-RPC エンドポイント
pub const ENV_ZABBIX_JSON_API_URL: &str = "ZABBIX_JSON_API_URL";
/// 許容する最終値の経過時間（分）
pub const ENV_ACCEPTABLE_ITEM_AGE: &str = "ACCEPTABLE_ITEM_AGE";
/// デバッグログ
pub const ENV_DEBUG: &str = "DEBUG";
/// リッスンポート
pub const ENV_PORT: &str = "PORT";
/// バインドアドレス
pub const ENV_HOST: &str = "HOST";
/// キャッシュ有効期間（秒）
pub const ENV_CACHE_TTL_SECS: &str = "ZABBIX_CACHE_TTL_SECS";
/// バックエンド呼び出しのタイムアウト（秒）
pub const ENV_TIMEOUT_SECS: &str = "ZABBIX_TIMEOUT_SECS";
/// バックエンドへの同時呼び出し上限
pub const ENV_MAX_CONCURRENCY: &str = "ZABBIX_MAX_CONCURRENCY";

/// デフォルトの許容経過時間（分）
pub const DEFAULT_ACCEPTABLE_ITEM_AGE_MINUTES: u32 = 2;
/// デフォルトのリッスンポート
pub const DEFAULT_PORT: u16 = 38888;
/// デフォルトのバインドアドレス
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// デフォルトのキャッシュ有効期間: 10分
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;
/// デフォルトのタイムアウト
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// デフォルトの同時呼び出し上限
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Get an environment variable
///
/// Unset and non-UTF-8 values both read as `None`.
pub fn get_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// `true/1/yes/on`（大文字小文字を区別しない）を真とみなす
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Look up `name` and parse it, falling back to `default` when unset
///
/// A value that is present but does not parse is a configuration error,
/// never silently replaced by the default.
pub fn get_parsed_or<T, F>(
    lookup: &F,
    name: &'static str,
    default: T,
    reason: &'static str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
            reason,
        }),
    }
}

fn require<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).ok_or(ConfigError::Missing(name))
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Zabbix JSON-RPC endpoint
    pub zabbix_url: Url,
    /// Zabbix login
    pub credentials: ZabbixCredentials,
    /// 最終値がこの分数より古ければ `VALUE_TOO_OLD`
    pub acceptable_item_age_minutes: u32,
    /// デバッグログ有効
    pub debug: bool,
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// セッション・ID キャッシュの共有有効期間
    pub cache_ttl: Duration,
    /// バックエンド呼び出し1回あたりのタイムアウト
    pub backend_timeout: Duration,
    /// バックエンドへの同時呼び出し上限
    pub max_concurrency: usize,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(get_env)
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = require(&lookup, ENV_ZABBIX_USERNAME)?;
        let password = require(&lookup, ENV_ZABBIX_PASSWORD)?;
        let raw_url = require(&lookup, ENV_ZABBIX_JSON_API_URL)?;
        let zabbix_url = Url::parse(raw_url.trim()).map_err(|_| ConfigError::Invalid {
            name: ENV_ZABBIX_JSON_API_URL,
            value: raw_url.clone(),
            reason: "not a URL",
        })?;

        let acceptable_item_age_minutes = get_parsed_or(
            &lookup,
            ENV_ACCEPTABLE_ITEM_AGE,
            DEFAULT_ACCEPTABLE_ITEM_AGE_MINUTES,
            "not an integer",
        )?;

        let debug = lookup(ENV_DEBUG).map(|v| is_truthy(&v)).unwrap_or(false);

        let port = get_parsed_or(&lookup, ENV_PORT, DEFAULT_PORT, "not an integer")?;
        let host = lookup(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());

        let cache_ttl_secs: u64 = get_parsed_or(
            &lookup,
            ENV_CACHE_TTL_SECS,
            DEFAULT_CACHE_TTL_SECS,
            "not an integer",
        )?;
        let timeout_secs: u64 = get_parsed_or(
            &lookup,
            ENV_TIMEOUT_SECS,
            DEFAULT_TIMEOUT_SECS,
            "not an integer",
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_TIMEOUT_SECS,
                value: "0".to_string(),
                reason: "must be positive",
            });
        }
        let max_concurrency: usize = get_parsed_or(
            &lookup,
            ENV_MAX_CONCURRENCY,
            DEFAULT_MAX_CONCURRENCY,
            "not an integer",
        )?;
        if max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_MAX_CONCURRENCY,
                value: "0".to_string(),
                reason: "must be positive",
            });
        }

        Ok(Self {
            zabbix_url,
            credentials: ZabbixCredentials::new(username, password),
            acceptable_item_age_minutes,
            debug,
            host,
            port,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            backend_timeout: Duration::from_secs(timeout_secs),
            max_concurrency,
        })
    }

    /// `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
