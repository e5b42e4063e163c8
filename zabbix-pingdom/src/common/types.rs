//! 共通型定義
//!
//! Zabbix側の識別子・セッション・APIバージョン等のコアデータ型

use serde::{Deserialize, Serialize};
use std::fmt;

/// Zabbixのホスト ID（数値文字列）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(pub String);

/// Zabbixのアイテム ID（数値文字列）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// host.get で解決した ID の組
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIds {
    /// ホスト ID
    pub host_id: HostId,
    /// アイテム ID
    pub item_id: ItemId,
}

/// 認証済みセッション（`user.login` の戻り値）
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    auth_in_body: bool,
}

impl Session {
    /// トークンからセッションを作成（JSON-RPC `auth` フィールド方式）
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            auth_in_body: true,
        }
    }

    /// ログインしたサーバーのバージョンに合わせた送信方式でセッションを作成
    pub fn for_version(token: impl Into<String>, version: &ApiVersion) -> Self {
        Self {
            token: token.into(),
            auth_in_body: version.auth_in_body(),
        }
    }

    /// トークン
    pub fn token(&self) -> &str {
        &self.token
    }

    /// `auth` をリクエストボディに載せるか（6.4未満）
    pub fn auth_in_body(&self) -> bool {
        self.auth_in_body
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Zabbix login
#[derive(Clone)]
pub struct ZabbixCredentials {
    username: String,
    password: String,
}

impl ZabbixCredentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for ZabbixCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZabbixCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// `apiinfo.version` の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersion {
    raw: String,
    major: u32,
    minor: u32,
}

impl ApiVersion {
    /// `"6.0.21"` 形式の文字列を解釈する
    ///
    /// Unparseable components read as 0, so an odd version string still
    /// yields a usable value.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.trim().split('.');
        let mut next = || {
            parts
                .next()
                .and_then(|p| p.parse::<u32>().ok())
                .unwrap_or(0)
        };
        let major = next();
        let minor = next();
        Self {
            raw: raw.trim().to_string(),
            major,
            minor,
        }
    }

    /// 元の文字列
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Zabbix 5.4 で `user.login` の `user` が `username` に改名された
    pub fn login_user_field(&self) -> &'static str {
        if (self.major, self.minor) >= (5, 4) {
            "username"
        } else {
            "user"
        }
    }

    /// 6.4 から `Authorization: Bearer` ヘッダーが使え、7.2 で `auth` フィールドは廃止
    pub fn auth_in_body(&self) -> bool {
        (self.major, self.minor) < (6, 4)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Pingdom custom check の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// 最終値が閾値内
    Ok,
    /// 最終値が古すぎる
    ValueTooOld,
    /// パイプラインのどこかで失敗
    ErrorDuringProcessing,
}

impl ProbeStatus {
    /// XMLに載せる文字列
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::ValueTooOld => "VALUE_TOO_OLD",
            Self::ErrorDuringProcessing => "ERROR_DURING_PROCESSING",
        }
    }
}
