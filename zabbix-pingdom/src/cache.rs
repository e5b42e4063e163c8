//! Zabbix セッション・ID キャッシュ
//!
//! 認証済みセッションと、ホスト名/アイテム名から解決した ID を TTL 付きで保持する。
//!
//! - 有効期間はレコード全体で1つ（エントリごとの時計は持たない）。セッション更新
//!   でもID解決でも再設定される
//! - セッション更新はレコードを丸ごと置き換える（IDマップは空になる）
//! - 期限切れは読み出し時にのみ判定し、能動的な掃除はしない
//!
//! # 同時実行
//!
//! - セッション更新はシングルフライト。更新スロットを保持したリクエストだけが
//!   `apiinfo.version` → `user.login` を呼び、他は待機後に更新済みレコードを読む
//! - ID 解決はホスト名ごとのシングルフライト。アイテムのキーはホスト名を含むため、
//!   同一アイテムの解決も同じロックで直列化される
//! - 待機中に先行リクエストが失敗した場合、待機者は同じエラーを受け取り、
//!   バックエンドを呼び直さない。失敗後に到着したリクエストは新たに更新を行う
//! - レコードの読み出しは1回のロック取得で行うスナップショット

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

use crate::common::error::{BackendError, PipelineError, PipelineResult};
use crate::common::types::{ApiVersion, HostId, ItemId, ResolvedIds, Session};
use crate::zabbix::ZabbixApi;

/// アイテム ID のキャッシュキー（ホスト名, アイテム名）
type ItemKey = (String, String);

/// セッション更新の失敗を記録するキー
const SESSION_FLIGHT: &str = "session";

#[derive(Debug, Default)]
struct CacheRecord {
    session: Option<Session>,
    refreshed_at: Option<Instant>,
    host_ids: HashMap<String, HostId>,
    item_ids: HashMap<ItemKey, ItemId>,
}

impl CacheRecord {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.refreshed_at
            .map(|at| now.duration_since(at) < ttl)
            .unwrap_or(false)
    }
}

/// キャッシュの状態（ログ・テスト用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// 有効期間内か
    pub fresh: bool,
    /// セッションを保持しているか
    pub has_session: bool,
    /// キャッシュ済みホスト数
    pub hosts: usize,
    /// キャッシュ済みアイテム数
    pub items: usize,
}

/// `connect` の結果
pub enum Connection {
    /// 有効期間内のセッションがあった
    Cached(Session),
    /// 更新スロットを確保し、API バージョンを取得済み
    Refreshing(SessionRefresh),
}

/// 進行中のセッション更新
///
/// Dropping it without committing releases the slot, leaves the cache
/// untouched and records no outcome, so the next waiter refreshes itself.
pub struct SessionRefresh {
    version: ApiVersion,
    _slot: OwnedMutexGuard<()>,
}

#[derive(Debug)]
struct FlightLog<E> {
    completed: u64,
    failures: HashMap<String, (u64, E)>,
}

/// シングルフライトの単位
///
/// 完了したフライトの通し番号と、キーごとの直近の失敗を持つ。待機者は待機開始時の
/// 通し番号より後に記録された失敗だけを受け取る。
struct Flight<E> {
    lock: Arc<AsyncMutex<()>>,
    log: Mutex<FlightLog<E>>,
}

impl<E: Clone> Flight<E> {
    fn new() -> Self {
        Self {
            lock: Arc::new(AsyncMutex::new(())),
            log: Mutex::new(FlightLog {
                completed: 0,
                failures: HashMap::new(),
            }),
        }
    }

    fn log(&self) -> MutexGuard<'_, FlightLog<E>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn completed(&self) -> u64 {
        self.log().completed
    }

    fn failure_since(&self, key: &str, seen: u64) -> Option<E> {
        self.log()
            .failures
            .get(key)
            .filter(|(at, _)| *at > seen)
            .map(|(_, err)| err.clone())
    }

    fn finish(&self, key: &str, outcome: Result<(), &E>) {
        let mut log = self.log();
        log.completed += 1;
        match outcome {
            Ok(()) => {
                log.failures.remove(key);
            }
            Err(err) => {
                let at = log.completed;
                log.failures.insert(key.to_string(), (at, err.clone()));
            }
        }
    }
}

/// キーごとの非同期ロック
///
/// 使い終わったキーは最後の保持者（待機中に取り消されたものを含む）が
/// 解放時にマップから取り除く。
struct KeyedLocks<K, E> {
    slots: Mutex<HashMap<K, Arc<Flight<E>>>>,
}

impl<K: Eq + Hash + Clone, E: Clone> KeyedLocks<K, E> {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, Arc<Flight<E>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn lock(&self, key: &K) -> KeyGuard<'_, K, E> {
        let flight = self
            .slots()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Flight::new()))
            .clone();
        let seen = flight.completed();

        // cleanup runs from Drop even if the wait below is cancelled
        let mut entry = KeyGuard {
            owner: self,
            key: key.clone(),
            flight,
            seen,
            guard: None,
        };
        entry.guard = Some(entry.flight.lock.clone().lock_owned().await);
        entry
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots().len()
    }
}

struct KeyGuard<'a, K: Eq + Hash + Clone, E: Clone> {
    owner: &'a KeyedLocks<K, E>,
    key: K,
    flight: Arc<Flight<E>>,
    seen: u64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone, E: Clone> KeyGuard<'_, K, E> {
    fn failure_since_arrival(&self, key: &str) -> Option<E> {
        self.flight.failure_since(key, self.seen)
    }

    fn finish(&self, key: &str, outcome: Result<(), &E>) {
        self.flight.finish(key, outcome);
    }
}

impl<K: Eq + Hash + Clone, E: Clone> Drop for KeyGuard<'_, K, E> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.owner.slots();
        // map + this guard: nobody else holds or waits on the key
        if Arc::strong_count(&self.flight) == 2 {
            slots.remove(&self.key);
        }
    }
}

/// セッション・ID キャッシュ
pub struct ZabbixCache {
    ttl: Duration,
    record: Mutex<CacheRecord>,
    session_flight: Flight<BackendError>,
    host_locks: KeyedLocks<String, PipelineError>,
}

impl ZabbixCache {
    /// 共有有効期間 `ttl` のキャッシュを作成
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            record: Mutex::new(CacheRecord::default()),
            session_flight: Flight::new(),
            host_locks: KeyedLocks::new(),
        }
    }

    fn record(&self) -> MutexGuard<'_, CacheRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached_session(&self) -> Option<Session> {
        let record = self.record();
        if record.is_fresh(Instant::now(), self.ttl) {
            record.session.clone()
        } else {
            None
        }
    }

    fn cached_ids(&self, host_name: &str, item_name: &str) -> Option<ResolvedIds> {
        let record = self.record();
        if !record.is_fresh(Instant::now(), self.ttl) {
            return None;
        }
        let host_id = record.host_ids.get(host_name)?;
        let item_id = record
            .item_ids
            .get(&(host_name.to_string(), item_name.to_string()))?;
        Some(ResolvedIds {
            host_id: host_id.clone(),
            item_id: item_id.clone(),
        })
    }

    /// 接続確認
    ///
    /// 有効なセッションがあればそれを返す。なければ更新スロットを確保し、
    /// 他のリクエストが更新済みでないことを確かめてから `apiinfo.version` を呼ぶ。
    /// 待機中に先行の更新が失敗していれば、そのエラーを返す。
    pub async fn connect(&self, api: &dyn ZabbixApi) -> Result<Connection, BackendError> {
        if let Some(session) = self.cached_session() {
            debug!("Using cached Zabbix session instead of doing the Zabbix API version request");
            return Ok(Connection::Cached(session));
        }

        let seen = self.session_flight.completed();
        let slot = self.session_flight.lock.clone().lock_owned().await;
        if let Some(session) = self.cached_session() {
            debug!("Zabbix session was refreshed by a concurrent request");
            return Ok(Connection::Cached(session));
        }
        if let Some(err) = self.session_flight.failure_since(SESSION_FLIGHT, seen) {
            debug!(error = %err, "Zabbix session refresh by a concurrent request failed");
            return Err(err);
        }

        debug!("Doing Zabbix API version request");
        let version = api.api_version().await.map_err(|err| {
            self.session_flight.finish(SESSION_FLIGHT, Err(&err));
            err
        })?;
        Ok(Connection::Refreshing(SessionRefresh {
            version,
            _slot: slot,
        }))
    }

    /// 認証
    ///
    /// `Refreshing` の場合のみ `user.login` を呼び、成功したらレコードを置き換える。
    pub async fn authenticate(
        &self,
        api: &dyn ZabbixApi,
        connection: Connection,
    ) -> Result<Session, BackendError> {
        match connection {
            Connection::Cached(session) => {
                debug!("Using cached Zabbix session instead of doing the Zabbix authenticate request");
                Ok(session)
            }
            Connection::Refreshing(refresh) => {
                debug!(version = %refresh.version, "Doing Zabbix authenticate request");
                let outcome = api.login(&refresh.version).await;
                match &outcome {
                    Ok(session) => {
                        self.commit_session(session.clone());
                        self.session_flight.finish(SESSION_FLIGHT, Ok(()));
                    }
                    Err(err) => self.session_flight.finish(SESSION_FLIGHT, Err(err)),
                }
                drop(refresh);
                outcome
            }
        }
    }

    /// 有効なセッションを返す。期限切れならバージョン確認とログインをやり直す
    pub async fn get_or_refresh_session(
        &self,
        api: &dyn ZabbixApi,
    ) -> Result<Session, BackendError> {
        let connection = self.connect(api).await?;
        self.authenticate(api, connection).await
    }

    fn commit_session(&self, session: Session) {
        *self.record() = CacheRecord {
            session: Some(session),
            refreshed_at: Some(Instant::now()),
            host_ids: HashMap::new(),
            item_ids: HashMap::new(),
        };
    }

    /// ホスト ID とアイテム ID を返す。未解決なら `resolve` を1回だけ実行して保存する
    ///
    /// The item id is keyed by host name and item name together, so a hit
    /// always returns a pair that was resolved by the same `host.get`.
    /// Requests queued behind a failed resolution of the same pair get that
    /// error instead of resolving again.
    pub async fn get_or_resolve_ids<F, Fut>(
        &self,
        host_name: &str,
        item_name: &str,
        resolve: F,
    ) -> PipelineResult<ResolvedIds>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PipelineResult<ResolvedIds>>,
    {
        if let Some(ids) = self.cached_ids(host_name, item_name) {
            debug!(
                host = host_name,
                item = item_name,
                "Using cached host_id and item_id instead of doing the Zabbix host request"
            );
            return Ok(ids);
        }

        let host_guard = self.host_locks.lock(&host_name.to_string()).await;
        if let Some(ids) = self.cached_ids(host_name, item_name) {
            debug!(
                host = host_name,
                item = item_name,
                "host_id and item_id were resolved by a concurrent request"
            );
            return Ok(ids);
        }
        if let Some(err) = host_guard.failure_since_arrival(item_name) {
            debug!(
                host = host_name,
                item = item_name,
                error = %err,
                "Resolution by a concurrent request failed"
            );
            return Err(err);
        }

        debug!(
            host = host_name,
            item = item_name,
            "Doing Zabbix get host request to get host_id and item_id"
        );
        match resolve().await {
            Ok(ids) => {
                self.store_ids(host_name, item_name, &ids);
                host_guard.finish(item_name, Ok(()));
                Ok(ids)
            }
            Err(err) => {
                host_guard.finish(item_name, Err(&err));
                Err(err)
            }
        }
    }

    fn store_ids(&self, host_name: &str, item_name: &str, ids: &ResolvedIds) {
        let mut record = self.record();
        record
            .host_ids
            .insert(host_name.to_string(), ids.host_id.clone());
        record.item_ids.insert(
            (host_name.to_string(), item_name.to_string()),
            ids.item_id.clone(),
        );
        record.refreshed_at = Some(Instant::now());
    }

    /// 現在の状態
    pub fn stats(&self) -> CacheStats {
        let record = self.record();
        CacheStats {
            fresh: record.is_fresh(Instant::now(), self.ttl),
            has_session: record.session.is_some(),
            hosts: record.host_ids.len(),
            items: record.item_ids.len(),
        }
    }

    #[cfg(test)]
    fn pending_host_locks(&self) -> usize {
        self.host_locks.len()
    }
}
