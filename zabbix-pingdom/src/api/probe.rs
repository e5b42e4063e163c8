//! Pingdom custom check ハンドラー
//!
//! `GET /?hostname=<host>&itemname=<item>`

use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};
use uuid::Uuid;

use crate::common::types::ProbeStatus;
use crate::freshness::Freshness;
use crate::pipeline::ProbeTarget;
use crate::AppState;

/// 必須パラメータ欠落時の本文
pub const BAD_REQUEST_BODY: &str =
    "Bad request. All of the following query parameters are required: hostname, itemname";

/// クエリパラメータ
///
/// An empty value counts as present. A repeated key keeps its first value.
#[derive(Debug, Default)]
pub struct ProbeQuery {
    /// Zabbix のホスト名
    pub hostname: Option<String>,
    /// アイテム名
    pub itemname: Option<String>,
}

impl ProbeQuery {
    /// デコード済みのキーと値の組から作成
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "hostname" => &mut query.hostname,
                "itemname" => &mut query.itemname,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }

    /// 両方揃っていれば対象を返す
    pub fn into_target(self) -> Option<ProbeTarget> {
        match (self.hostname, self.itemname) {
            (Some(host), Some(item)) => Some(ProbeTarget::new(host, item)),
            _ => None,
        }
    }
}

/// Pingdom が解釈する XML 本文
pub fn render_xml(status: ProbeStatus, response_time_ms: u128) -> String {
    format!(
        "<pingdom_http_custom_check><status>{}</status><response_time>{}</response_time></pingdom_http_custom_check>",
        status.as_str(),
        response_time_ms
    )
}

fn xml_response(code: StatusCode, status: ProbeStatus, received_at: Instant) -> Response {
    let body = render_xml(status, received_at.elapsed().as_millis());
    (code, [(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

/// GET /（および全パス）
pub async fn probe(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let received_at = Instant::now();

    let Some(target) = ProbeQuery::from_pairs(pairs).into_target() else {
        return (StatusCode::BAD_REQUEST, BAD_REQUEST_BODY).into_response();
    };

    let request_id = Uuid::new_v4();
    let host = target.host_name.clone();
    let item = target.item_name.clone();
    debug!(%request_id, host = %host, item = %item, "Probe request received");

    match state.check(target).await {
        Ok(Freshness::Fresh) => xml_response(StatusCode::OK, ProbeStatus::Ok, received_at),
        Ok(Freshness::Stale) => {
            debug!(%request_id, host = %host, item = %item, "Last value is too old");
            xml_response(StatusCode::OK, ProbeStatus::ValueTooOld, received_at)
        }
        Err(e) => {
            error!(
                %request_id,
                host = %host,
                item = %item,
                kind = e.kind(),
                error = %e,
                "Probe failed"
            );
            xml_response(e.status_code(), ProbeStatus::ErrorDuringProcessing, received_at)
        }
    }
}
