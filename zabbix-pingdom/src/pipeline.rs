//! 4段階のルックアップパイプライン
//!
//! 接続確認 → 認証 → ID 解決 → 最終値取得 の順に実行し、最初の失敗で打ち切る。
//! 各段階の出力型が次の段階の入力になるため、段階の飛ばしや入れ替えはできない。

use std::sync::Arc;

use tracing::debug;

use crate::cache::{Connection, ZabbixCache};
use crate::common::error::{LookupError, PipelineResult};
use crate::common::types::{ResolvedIds, Session};
use crate::zabbix::{HostRecord, ZabbixApi};

/// プローブ対象（ホスト名とアイテム名）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// Zabbix のホスト名
    pub host_name: String,
    /// ホストに属するアイテム名（完全一致）
    pub item_name: String,
}

impl ProbeTarget {
    /// 対象を作成
    pub fn new(host_name: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
            item_name: item_name.into(),
        }
    }
}

/// 段階1の出力
pub struct Connected {
    target: ProbeTarget,
    connection: Connection,
}

/// 段階2の出力
pub struct Authenticated {
    target: ProbeTarget,
    session: Session,
}

/// 段階3の出力
pub struct Resolved {
    target: ProbeTarget,
    session: Session,
    ids: ResolvedIds,
}

/// 段階4の出力
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastValue {
    /// 対象
    pub target: ProbeTarget,
    /// 解決済み ID
    pub ids: ResolvedIds,
    /// 最終値の記録時刻（Unix 秒）
    pub clock: i64,
}

/// ルックアップパイプライン
pub struct LookupPipeline {
    api: Arc<dyn ZabbixApi>,
    cache: Arc<ZabbixCache>,
}

impl LookupPipeline {
    /// バックエンドとキャッシュからパイプラインを作成
    pub fn new(api: Arc<dyn ZabbixApi>, cache: Arc<ZabbixCache>) -> Self {
        Self { api, cache }
    }

    /// キャッシュ
    pub fn cache(&self) -> &ZabbixCache {
        &self.cache
    }

    /// 全段階を実行
    pub async fn run(&self, target: ProbeTarget) -> PipelineResult<LastValue> {
        let connected = self.ensure_connectivity(target).await?;
        let authenticated = self.authenticate(connected).await?;
        let resolved = self.resolve_identifiers(authenticated).await?;
        self.fetch_last_value(resolved).await
    }

    /// 段階1: 接続確認（キャッシュが有効ならバックエンドを呼ばない）
    pub async fn ensure_connectivity(&self, target: ProbeTarget) -> PipelineResult<Connected> {
        let connection = self.cache.connect(self.api.as_ref()).await?;
        Ok(Connected { target, connection })
    }

    /// 段階2: 認証
    pub async fn authenticate(&self, connected: Connected) -> PipelineResult<Authenticated> {
        let Connected { target, connection } = connected;
        let session = self
            .cache
            .authenticate(self.api.as_ref(), connection)
            .await?;
        Ok(Authenticated { target, session })
    }

    /// 段階3: ホスト ID とアイテム ID の解決
    pub async fn resolve_identifiers(
        &self,
        authenticated: Authenticated,
    ) -> PipelineResult<Resolved> {
        let Authenticated { target, session } = authenticated;
        let ids = self
            .cache
            .get_or_resolve_ids(&target.host_name, &target.item_name, || {
                self.resolve_from_backend(&session, &target)
            })
            .await?;
        Ok(Resolved {
            target,
            session,
            ids,
        })
    }

    async fn resolve_from_backend(
        &self,
        session: &Session,
        target: &ProbeTarget,
    ) -> PipelineResult<ResolvedIds> {
        let hosts = self.api.get_host(session, &target.host_name).await?;
        Ok(select_ids(&hosts, target)?)
    }

    /// 段階4: 最終値の記録時刻を取得
    pub async fn fetch_last_value(&self, resolved: Resolved) -> PipelineResult<LastValue> {
        let Resolved {
            target,
            session,
            ids,
        } = resolved;

        debug!(
            host = %target.host_name,
            item = %target.item_name,
            "Doing Zabbix history request to get the last item value"
        );
        let history = self.api.last_history(&session, &ids).await?;
        let record = history.first().ok_or_else(|| LookupError::NoHistory {
            host: target.host_name.clone(),
            item: target.item_name.clone(),
        })?;
        let clock = record.clock_secs().ok_or_else(|| {
            LookupError::MalformedResponse(format!(
                "history record for item {} has no usable clock",
                ids.item_id
            ))
        })?;

        Ok(LastValue { target, ids, clock })
    }
}

/// host.get の応答から対象のホスト ID とアイテム ID を選ぶ
///
/// 先頭のホストのみを見る。アイテム名は完全一致。
fn select_ids(hosts: &[HostRecord], target: &ProbeTarget) -> Result<ResolvedIds, LookupError> {
    let host = hosts
        .first()
        .ok_or_else(|| LookupError::HostNotFound(target.host_name.clone()))?;
    let host_id = host.hostid.clone().ok_or_else(|| {
        LookupError::MalformedResponse(format!("host {} has no hostid", target.host_name))
    })?;
    let items = host.items.as_ref().ok_or_else(|| {
        LookupError::MalformedResponse(format!("host {} has no items", target.host_name))
    })?;
    let item = items
        .iter()
        .find(|item| item.name.as_deref() == Some(target.item_name.as_str()))
        .ok_or_else(|| LookupError::ItemNotFound {
            host: target.host_name.clone(),
            item: target.item_name.clone(),
        })?;
    let item_id = item.itemid.clone().ok_or_else(|| {
        LookupError::MalformedResponse(format!(
            "item {} on host {} has no itemid",
            target.item_name, target.host_name
        ))
    })?;

    Ok(ResolvedIds { host_id, item_id })
}
