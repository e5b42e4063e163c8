//! Integration Test: セッション・ID キャッシュ
//!
//! wiremock の `expect` で Zabbix への呼び出し回数を検証する。

use reqwest::{Client, StatusCode};
use wiremock::MockServer;

use crate::support::http::{spawn_adapter, test_config};
use crate::support::zabbix::{mount_history, mount_host, mount_session, now_secs};

/// 有効期間内の2回目以降は history.get だけを呼ぶ
#[tokio::test]
async fn test_repeated_probes_reuse_session_and_ids() {
    let zabbix = MockServer::start().await;
    mount_session(&zabbix, "6.0.21", 1).await;
    mount_host(&zabbix, "web-1", "10084", &[("CPU load", "23296")], 1).await;
    mount_history(&zabbix, "23296", now_secs() - 30, 3).await;

    let server = spawn_adapter(&test_config(&zabbix.uri(), &[])).await;
    let client = Client::new();
    for _ in 0..3 {
        let response = client
            .get(server.probe_url("web-1", "CPU load"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let stats = server.state().pipeline.cache().stats();
    assert!(stats.fresh);
    assert_eq!(stats.hosts, 1);
    assert_eq!(stats.items, 1);

    server.stop().await;
}

/// シナリオD: 同時に来た要求でもログインは1回
#[tokio::test]
async fn test_concurrent_probes_share_one_login() {
    let zabbix = MockServer::start().await;
    mount_session(&zabbix, "6.0.21", 1).await;
    mount_host(&zabbix, "web-1", "10084", &[("CPU load", "23296")], 1).await;
    mount_history(&zabbix, "23296", now_secs() - 30, 8).await;

    let server = spawn_adapter(&test_config(&zabbix.uri(), &[])).await;
    let client = Client::new();
    let url = server.probe_url("web-1", "CPU load");

    let requests = (0..8).map(|_| {
        let client = client.clone();
        let url = url.clone();
        tokio::spawn(async move { client.get(url).send().await.unwrap().status() })
    });
    for handle in requests.collect::<Vec<_>>() {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    server.stop().await;
}

/// 別ホストの同名アイテムは別々に解決する
#[tokio::test]
async fn test_same_item_name_on_two_hosts() {
    let zabbix = MockServer::start().await;
    mount_session(&zabbix, "6.0.21", 1).await;
    mount_host(&zabbix, "web-1", "10084", &[("CPU load", "23296")], 1).await;
    mount_host(&zabbix, "web-2", "10085", &[("CPU load", "23400")], 1).await;
    mount_history(&zabbix, "23296", now_secs() - 30, 1).await;
    mount_history(&zabbix, "23400", now_secs() - 3600, 1).await;

    let server = spawn_adapter(&test_config(&zabbix.uri(), &[])).await;
    let client = Client::new();

    let first = client
        .get(server.probe_url("web-1", "CPU load"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let second = client
        .get(server.probe_url("web-2", "CPU load"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(first.contains("<status>OK</status>"));
    assert!(second.contains("<status>VALUE_TOO_OLD</status>"));
    assert_eq!(server.state().pipeline.cache().stats().items, 2);

    server.stop().await;
}
