//! check subcommand
//!
//! パイプラインを1回だけ実行し、XML を標準出力に出す。

use std::time::Instant;

use anyhow::Context;
use clap::Args;
use tracing::error;

use crate::api::probe::render_xml;
use crate::common::error::PipelineResult;
use crate::common::types::ProbeStatus;
use crate::config::AppConfig;
use crate::freshness::Freshness;
use crate::pipeline::ProbeTarget;
use crate::AppState;

/// Arguments for the check subcommand
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Zabbix host name
    #[arg(long)]
    pub hostname: String,

    /// Item name on the host (exact match)
    #[arg(long)]
    pub itemname: String,
}

/// 判定結果をステータスと終了コードに変換する
///
/// 0 = OK, 1 = VALUE_TOO_OLD, 2 = error
pub fn verdict(result: &PipelineResult<Freshness>) -> (ProbeStatus, i32) {
    match result {
        Ok(Freshness::Fresh) => (ProbeStatus::Ok, 0),
        Ok(Freshness::Stale) => (ProbeStatus::ValueTooOld, 1),
        Err(_) => (ProbeStatus::ErrorDuringProcessing, 2),
    }
}

/// Execute the check command, returning the process exit code
pub async fn execute(args: &CheckArgs, config: &AppConfig) -> Result<i32, anyhow::Error> {
    let started_at = Instant::now();
    let state = AppState::from_config(config).context("failed to create Zabbix client")?;

    let result = state
        .check(ProbeTarget::new(&args.hostname, &args.itemname))
        .await;
    if let Err(e) = &result {
        error!(
            host = %args.hostname,
            item = %args.itemname,
            kind = e.kind(),
            error = %e,
            "Check failed"
        );
    }

    let (status, code) = verdict(&result);
    println!("{}", render_xml(status, started_at.elapsed().as_millis()));
    Ok(code)
}
