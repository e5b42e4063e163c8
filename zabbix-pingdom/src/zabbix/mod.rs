//! Zabbix バックエンド
//!
//! パイプラインが必要とする4つの呼び出しを`ZabbixApi` traitとして抽象化する。
//! 本番実装は JSON-RPC over HTTP の [`ZabbixClient`]。

pub mod client;

pub use client::ZabbixClient;

use async_trait::async_trait;
use serde::Deserialize;

use crate::common::error::BackendError;
use crate::common::types::{ApiVersion, HostId, ItemId, ResolvedIds, Session};

/// host.get の1要素
///
/// フィールド欠落の判定はパイプライン側で行うため全て`Option`。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HostRecord {
    /// ホスト ID
    #[serde(default)]
    pub hostid: Option<HostId>,
    /// `selectItems` で要求したアイテム一覧
    #[serde(default)]
    pub items: Option<Vec<ItemRecord>>,
}

/// ホストに属するアイテム
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemRecord {
    /// アイテム ID
    #[serde(default)]
    pub itemid: Option<ItemId>,
    /// アイテム名
    #[serde(default)]
    pub name: Option<String>,
}

/// history.get の1要素
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HistoryRecord {
    /// 記録時刻（Unix 秒）。Zabbix は文字列で返す
    #[serde(default)]
    pub clock: Option<serde_json::Value>,
}

impl HistoryRecord {
    /// `clock` を秒として解釈
    pub fn clock_secs(&self) -> Option<i64> {
        match self.clock.as_ref()? {
            serde_json::Value::String(s) => s.trim().parse().ok(),
            serde_json::Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

/// Zabbix API 呼び出し
#[async_trait]
pub trait ZabbixApi: Send + Sync {
    /// `apiinfo.version`（認証不要）
    async fn api_version(&self) -> Result<ApiVersion, BackendError>;

    /// `user.login`
    async fn login(&self, version: &ApiVersion) -> Result<Session, BackendError>;

    /// `host.get`（ホスト名で絞り込み、アイテムの`itemid`と`name`を要求）
    async fn get_host(
        &self,
        session: &Session,
        host_name: &str,
    ) -> Result<Vec<HostRecord>, BackendError>;

    /// `history.get`（clock降順で1件）
    async fn last_history(
        &self,
        session: &Session,
        ids: &ResolvedIds,
    ) -> Result<Vec<HistoryRecord>, BackendError>;
}
