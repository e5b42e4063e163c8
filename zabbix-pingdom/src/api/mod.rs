//! HTTP フロントドア
//!
//! Pingdom は任意のパスに `?hostname=&itemname=` を付けて呼ぶため、ルートと
//! フォールバックの両方を同じハンドラーに向ける。

pub mod probe;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// ルーターを作成
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(probe::probe))
        .fallback(probe::probe)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
