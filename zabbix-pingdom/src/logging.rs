//! ロギング初期化ユーティリティ
//!
//! `RUST_LOG`が設定されていればそれを優先し、なければ`DEBUG`設定に応じて
//! `debug`または`info`を既定レベルとする。

use std::error::Error;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `DEBUG`設定に対応する既定のフィルタ
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// グローバルな tracing subscriber を設定する
///
/// Calling it twice returns an error instead of replacing the subscriber.
pub fn init(debug: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(debug)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;

    Ok(())
}
