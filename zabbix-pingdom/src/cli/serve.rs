//! serve サブコマンド
//!
//! HTTP サーバーを起動します。

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::config::AppConfig;
use crate::AppState;

/// serve サブコマンドの引数
///
/// 指定がなければ `HOST` / `PORT` 環境変数の値を使う。
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bind address
    #[arg(short = 'H', long)]
    pub host: Option<String>,
}

impl ServeArgs {
    /// 引数で環境変数の値を上書きする
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
    }
}

/// Execute the serve command
pub async fn execute(args: &ServeArgs, mut config: AppConfig) -> Result<(), anyhow::Error> {
    args.apply(&mut config);
    let state = AppState::from_config(&config).context("failed to create Zabbix client")?;

    info!(
        zabbix_url = %config.zabbix_url,
        acceptable_item_age = config.acceptable_item_age_minutes,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        "Starting zabbix-pingdom"
    );

    crate::server::run(state, &config.bind_addr())
        .await
        .with_context(|| format!("failed to serve on {}", config.bind_addr()))
}
