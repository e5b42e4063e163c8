//! Zabbix JSON-RPC 2.0 クライアント
//!
//! - 1回の呼び出しごとにタイムアウトを適用
//! - 同時呼び出し数をセマフォで制限

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::debug;

use super::{HistoryRecord, HostRecord, ZabbixApi};
use crate::common::error::BackendError;
use crate::common::types::{ApiVersion, ResolvedIds, Session, ZabbixCredentials};
use crate::config::AppConfig;

/// history.get の `history` パラメータ（0 = numeric float）
pub const HISTORY_TYPE_NUMERIC_FLOAT: u8 = 0;

const JSON_RPC_CONTENT_TYPE: &str = "application/json-rpc";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: String,
}

/// Zabbix JSON-RPC client
pub struct ZabbixClient {
    http: Client,
    url: Url,
    credentials: ZabbixCredentials,
    timeout: Duration,
    limiter: Arc<Semaphore>,
    next_id: AtomicU64,
}

impl ZabbixClient {
    /// 新しいクライアントを作成
    pub fn new(
        url: Url,
        credentials: ZabbixCredentials,
        timeout: Duration,
        max_concurrency: usize,
    ) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport {
                method: "client.build",
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            url,
            credentials,
            timeout,
            limiter: Arc::new(Semaphore::new(max_concurrency.max(1))),
            next_id: AtomicU64::new(1),
        })
    }

    /// 設定から作成
    pub fn from_config(config: &AppConfig) -> Result<Self, BackendError> {
        Self::new(
            config.zabbix_url.clone(),
            config.credentials.clone(),
            config.backend_timeout,
            config.max_concurrency,
        )
    }

    /// JSON-RPC 呼び出し
    async fn call<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
        session: Option<&Session>,
    ) -> Result<R, BackendError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| BackendError::Transport {
                method,
                message: e.to_string(),
            })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let result = tokio::time::timeout(self.timeout, self.send(method, id, params, session))
            .await
            .map_err(|_| BackendError::Timeout {
                method,
                secs: self.timeout.as_secs(),
            })?;

        debug!(
            method,
            id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Zabbix API call finished"
        );

        let value = result?;
        serde_json::from_value(value).map_err(|e| BackendError::InvalidResponse {
            method,
            message: e.to_string(),
        })
    }

    async fn send(
        &self,
        method: &'static str,
        id: u64,
        params: Value,
        session: Option<&Session>,
    ) -> Result<Value, BackendError> {
        let mut body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let mut request = self
            .http
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, JSON_RPC_CONTENT_TYPE);
        if let Some(session) = session {
            if session.auth_in_body() {
                body["auth"] = Value::String(session.token().to_string());
            } else {
                request = request.bearer_auth(session.token());
            }
        }

        let response = request
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| self.transport_error(method, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                method,
                status: status.as_u16(),
            });
        }

        let envelope: RpcResponse =
            response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse {
                    method,
                    message: e.to_string(),
                })?;

        if let Some(error) = envelope.error {
            return Err(BackendError::Rpc {
                method,
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        envelope
            .result
            .ok_or_else(|| BackendError::InvalidResponse {
                method,
                message: "response has neither result nor error".to_string(),
            })
    }

    fn transport_error(&self, method: &'static str, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                method,
                secs: self.timeout.as_secs(),
            }
        } else {
            BackendError::Transport {
                method,
                message: err.to_string(),
            }
        }
    }
}

impl std::fmt::Debug for ZabbixClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZabbixClient")
            .field("url", &self.url.as_str())
            .field("credentials", &self.credentials)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl ZabbixApi for ZabbixClient {
    async fn api_version(&self) -> Result<ApiVersion, BackendError> {
        let raw: String = self.call("apiinfo.version", json!([]), None).await?;
        Ok(ApiVersion::parse(&raw))
    }

    async fn login(&self, version: &ApiVersion) -> Result<Session, BackendError> {
        let mut params = serde_json::Map::new();
        params.insert(
            version.login_user_field().to_string(),
            Value::String(self.credentials.username().to_string()),
        );
        params.insert(
            "password".to_string(),
            Value::String(self.credentials.password().to_string()),
        );

        let token: String = self
            .call("user.login", Value::Object(params), None)
            .await?;
        Ok(Session::for_version(token, version))
    }

    async fn get_host(
        &self,
        session: &Session,
        host_name: &str,
    ) -> Result<Vec<HostRecord>, BackendError> {
        self.call(
            "host.get",
            json!({
                "output": ["hostid"],
                "selectItems": ["itemid", "name"],
                "filter": { "host": [host_name] },
            }),
            Some(session),
        )
        .await
    }

    async fn last_history(
        &self,
        session: &Session,
        ids: &ResolvedIds,
    ) -> Result<Vec<HistoryRecord>, BackendError> {
        self.call(
            "history.get",
            json!({
                "output": "extend",
                "history": HISTORY_TYPE_NUMERIC_FLOAT,
                "hostids": ids.host_id.0,
                "itemids": ids.item_id.0,
                "sortfield": "clock",
                "sortorder": "DESC",
                "limit": 1,
            }),
            Some(session),
        )
        .await
    }
}
