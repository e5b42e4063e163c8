//! Zabbix → Pingdom health-check adapter
//!
//! Pingdom の HTTP custom check から呼ばれ、Zabbix のアイテムの最終値が
//! 十分に新しいかを XML で返す。

#![warn(missing_docs)]

/// 共通型定義
pub mod common;

/// HTTP フロントドア
pub mod api;

/// セッション・ID キャッシュ
pub mod cache;

/// CLIインターフェース
pub mod cli;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// 最終値の鮮度判定
pub mod freshness;

/// ロギング初期化ユーティリティ
pub mod logging;

/// ルックアップパイプライン
pub mod pipeline;

/// axumサーバー起動・シャットダウンハンドリング
pub mod server;

/// Cooperative shutdown
pub mod shutdown;

/// Zabbix JSON-RPC クライアント
pub mod zabbix;

use std::sync::Arc;
use std::time::Duration;

use crate::cache::ZabbixCache;
use crate::common::error::{BackendError, PipelineResult};
use crate::config::AppConfig;
use crate::freshness::Freshness;
use crate::pipeline::{LookupPipeline, ProbeTarget};
use crate::shutdown::ShutdownController;
use crate::zabbix::{ZabbixApi, ZabbixClient};

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// ルックアップパイプライン（キャッシュを含む）
    pub pipeline: Arc<LookupPipeline>,
    /// 最終値の許容経過時間（分）
    pub acceptable_item_age_minutes: u32,
    /// シャットダウン制御
    pub shutdown: ShutdownController,
}

impl AppState {
    /// 任意のバックエンドから状態を組み立てる
    pub fn new(
        api: Arc<dyn ZabbixApi>,
        cache_ttl: Duration,
        acceptable_item_age_minutes: u32,
    ) -> Self {
        let cache = Arc::new(ZabbixCache::new(cache_ttl));
        Self {
            pipeline: Arc::new(LookupPipeline::new(api, cache)),
            acceptable_item_age_minutes,
            shutdown: ShutdownController::default(),
        }
    }

    /// 設定から本番用の状態を組み立てる
    pub fn from_config(config: &AppConfig) -> Result<Self, BackendError> {
        let client = ZabbixClient::from_config(config)?;
        Ok(Self::new(
            Arc::new(client),
            config.cache_ttl,
            config.acceptable_item_age_minutes,
        ))
    }

    /// パイプラインを実行し、最終値の鮮度を判定する
    pub async fn check(&self, target: ProbeTarget) -> PipelineResult<Freshness> {
        let last = self.pipeline.run(target).await?;
        let now = chrono::Utc::now().timestamp();
        Ok(freshness::evaluate(
            last.clock,
            now,
            self.acceptable_item_age_minutes,
        ))
    }
}
