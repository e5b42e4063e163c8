//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! # プローブへの公開範囲
//!
//! `PipelineError`の詳細はサーバーログにのみ出力し、Pingdomへのレスポンスは
//! 常に`ERROR_DURING_PROCESSING`固定とする。`kind()`はログ集計用の安定した識別子。

use axum::http::StatusCode;
use thiserror::Error;

/// Configuration error
///
/// 起動時に検出され、サーバーはリッスンを開始しない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Required environment variable is missing
    #[error("{0} ENV variable is not set!")]
    Missing(&'static str),

    /// Environment variable has an unusable value
    #[error("{name} ENV variable is set to invalid value ({reason}): {value}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Raw value as found in the environment
        value: String,
        /// Short description of the expected format
        reason: &'static str,
    },
}

/// Zabbix backend error
///
/// トランスポート/プロトコルレベルの失敗。自動リトライはしない。
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Connection or I/O failure
    #[error("Zabbix request {method} failed: {message}")]
    Transport {
        /// JSON-RPC method
        method: &'static str,
        /// Underlying error text
        message: String,
    },

    /// Non-success HTTP status
    #[error("Zabbix request {method} returned HTTP {status}")]
    Status {
        /// JSON-RPC method
        method: &'static str,
        /// HTTP status code
        status: u16,
    },

    /// JSON-RPC error object in the response
    #[error("Zabbix API error for {method} ({code}): {message} {data}")]
    Rpc {
        /// JSON-RPC method
        method: &'static str,
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
        /// Additional error detail
        data: String,
    },

    /// Per-call timeout elapsed
    #[error("Zabbix request {method} timed out after {secs}s")]
    Timeout {
        /// JSON-RPC method
        method: &'static str,
        /// Configured timeout in seconds
        secs: u64,
    },

    /// Response envelope could not be decoded
    #[error("Invalid response for {method}: {message}")]
    InvalidResponse {
        /// JSON-RPC method
        method: &'static str,
        /// Decoding error text
        message: String,
    },
}

/// Domain level lookup failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// host.get returned no host for the name
    #[error("Host not found: {0}")]
    HostNotFound(String),

    /// The host exists but has no item with the exact name
    #[error("Item id for the given name was not present in the answer: host={host}, item={item}")]
    ItemNotFound {
        /// Host name
        host: String,
        /// Item name
        item: String,
    },

    /// Expected fields were missing from a backend answer
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// history.get returned no record
    #[error("No history for item {item} on host {host}")]
    NoHistory {
        /// Host name
        host: String,
        /// Item name
        item: String,
    },
}

/// Lookup pipeline error
///
/// `Clone` so that one failed resolution can be handed to every request
/// that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Backend error
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Lookup error
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl PipelineError {
    /// ログ出力用の分類名
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Backend(BackendError::Transport { .. }) => "backend_transport",
            Self::Backend(BackendError::Status { .. }) => "backend_status",
            Self::Backend(BackendError::Rpc { .. }) => "backend_rpc",
            Self::Backend(BackendError::Timeout { .. }) => "backend_timeout",
            Self::Backend(BackendError::InvalidResponse { .. }) => "backend_invalid_response",
            Self::Lookup(LookupError::HostNotFound(_)) => "host_not_found",
            Self::Lookup(LookupError::ItemNotFound { .. }) => "item_not_found",
            Self::Lookup(LookupError::MalformedResponse(_)) => "malformed_response",
            Self::Lookup(LookupError::NoHistory { .. }) => "no_history",
        }
    }

    /// Returns the HTTP status code for this error.
    ///
    /// Every pipeline failure is reported to the probe as unavailable.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Result type alias (pipeline)
pub type PipelineResult<T> = Result<T, PipelineError>;
