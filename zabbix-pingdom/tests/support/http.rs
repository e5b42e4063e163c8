use std::{io, net::SocketAddr, time::Duration};

use tokio::{net::TcpListener, task::JoinHandle};
use zabbix_pingdom::config::AppConfig;
use zabbix_pingdom::shutdown::ShutdownController;
use zabbix_pingdom::AppState;

/// テスト用に起動したアダプター
#[allow(dead_code)]
pub struct TestServer {
    addr: SocketAddr,
    state: AppState,
    shutdown: ShutdownController,
    handle: JoinHandle<Result<(), io::Error>>,
}

#[allow(dead_code)]
impl TestServer {
    /// サーバーがバインドしているアドレスを返す
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// アプリケーション状態（キャッシュ検査用）
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// `?hostname=&itemname=` 付きの URL
    pub fn probe_url(&self, host: &str, item: &str) -> String {
        let mut url = reqwest::Url::parse(&format!("http://{}/", self.addr)).unwrap();
        url.query_pairs_mut()
            .append_pair("hostname", host)
            .append_pair("itemname", item);
        url.to_string()
    }

    /// サーバーを停止し、バックグラウンドタスクの終了を待つ
    pub async fn stop(self) {
        self.shutdown.request_shutdown();
        let _ = self.handle.await;
    }
}

/// Zabbix の URL を指す最小構成
pub fn test_config(zabbix_uri: &str, extra: &[(&str, &str)]) -> AppConfig {
    let url = format!("{}/api_jsonrpc.php", zabbix_uri);
    let mut vars: Vec<(String, String)> = vec![
        ("ZABBIX_USERNAME".to_string(), "monitor".to_string()),
        ("ZABBIX_PASSWORD".to_string(), "secret".to_string()),
        ("ZABBIX_JSON_API_URL".to_string(), url),
        ("ZABBIX_TIMEOUT_SECS".to_string(), "2".to_string()),
    ];
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    AppConfig::from_lookup(|name| {
        vars.iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    })
    .expect("test config")
}

/// 実ポートにバインドしてアダプターを起動する
pub async fn spawn_adapter(config: &AppConfig) -> TestServer {
    let state = AppState::from_config(config).expect("create state");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = state.shutdown.clone();

    let handle = tokio::spawn({
        let state = state.clone();
        let shutdown = shutdown.clone();
        async move {
            zabbix_pingdom::server::serve(listener, state, async move { shutdown.wait().await })
                .await
        }
    });

    // 起動待ち
    tokio::time::sleep(Duration::from_millis(10)).await;

    TestServer {
        addr,
        state,
        shutdown,
        handle,
    }
}
