//! Integration Test: Pingdom プローブの一連の流れ
//!
//! 実ポートのアダプター → wiremock の Zabbix JSON-RPC

use reqwest::{Client, StatusCode};
use serde_json::json;
use wiremock::MockServer;

use crate::support::http::{spawn_adapter, test_config};
use crate::support::zabbix::{
    mount_history, mount_host, mount_session, now_secs, rpc, rpc_error, rpc_result,
};

async fn get_text(client: &Client, url: &str) -> (StatusCode, Option<String>, String) {
    let response = client.get(url).send().await.expect("probe request failed");
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap();
    (status, content_type, body)
}

/// シナリオA: 61秒前の値は閾値2分で OK
#[tokio::test]
async fn test_recent_value_reports_ok() {
    let zabbix = MockServer::start().await;
    mount_session(&zabbix, "6.0.21", 1).await;
    mount_host(&zabbix, "web-1", "10084", &[("CPU load", "23296")], 1).await;
    mount_history(&zabbix, "23296", now_secs() - 61, 1).await;

    let server = spawn_adapter(&test_config(&zabbix.uri(), &[])).await;
    let (status, content_type, body) =
        get_text(&Client::new(), &server.probe_url("web-1", "CPU load")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/xml"));
    assert!(body.starts_with("<pingdom_http_custom_check><status>OK</status><response_time>"));
    assert!(body.ends_with("</response_time></pingdom_http_custom_check>"));

    server.stop().await;
}

/// シナリオB: 1時間前の値は VALUE_TOO_OLD
#[tokio::test]
async fn test_old_value_reports_value_too_old() {
    let zabbix = MockServer::start().await;
    mount_session(&zabbix, "6.0.21", 1).await;
    mount_host(&zabbix, "web-1", "10084", &[("CPU load", "23296")], 1).await;
    mount_history(&zabbix, "23296", now_secs() - 3600, 1).await;

    let server = spawn_adapter(&test_config(&zabbix.uri(), &[])).await;
    let (status, _, body) = get_text(&Client::new(), &server.probe_url("web-1", "CPU load")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<status>VALUE_TOO_OLD</status>"));

    server.stop().await;
}

/// ACCEPTABLE_ITEM_AGE を広げると同じ値が OK になる
#[tokio::test]
async fn test_threshold_comes_from_config() {
    let zabbix = MockServer::start().await;
    mount_session(&zabbix, "6.0.21", 1).await;
    mount_host(&zabbix, "web-1", "10084", &[("CPU load", "23296")], 1).await;
    mount_history(&zabbix, "23296", now_secs() - 3600, 1).await;

    let config = test_config(&zabbix.uri(), &[("ACCEPTABLE_ITEM_AGE", "90")]);
    let server = spawn_adapter(&config).await;
    let (_, _, body) = get_text(&Client::new(), &server.probe_url("web-1", "CPU load")).await;

    assert!(body.contains("<status>OK</status>"));

    server.stop().await;
}

/// パラメータ欠落は 400 で、Zabbix へは一切アクセスしない
#[tokio::test]
async fn test_missing_parameters_never_reach_zabbix() {
    let zabbix = MockServer::start().await;
    mount_session(&zabbix, "6.0.21", 0).await;

    let server = spawn_adapter(&test_config(&zabbix.uri(), &[])).await;
    let client = Client::new();
    let base = format!("http://{}", server.addr());

    for url in [
        format!("{}/", base),
        format!("{}/?hostname=web-1", base),
        format!("{}/?itemname=CPU%20load", base),
    ] {
        let (status, _, body) = get_text(&client, &url).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            "Bad request. All of the following query parameters are required: hostname, itemname"
        );
    }

    assert!(zabbix.received_requests().await.unwrap().is_empty());
    server.stop().await;
}

/// シナリオC: 存在しないアイテムは 503、history.get は呼ばない
#[tokio::test]
async fn test_unknown_item_reports_error() {
    let zabbix = MockServer::start().await;
    mount_session(&zabbix, "6.0.21", 1).await;
    mount_host(&zabbix, "web-1", "10084", &[("CPU load", "23296")], 1).await;
    rpc("history.get")
        .respond_with(rpc_result(json!([])))
        .expect(0)
        .mount(&zabbix)
        .await;

    let server = spawn_adapter(&test_config(&zabbix.uri(), &[])).await;
    let (status, content_type, body) =
        get_text(&Client::new(), &server.probe_url("web-1", "Swap usage")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(content_type.as_deref(), Some("text/xml"));
    assert!(body.contains("<status>ERROR_DURING_PROCESSING</status>"));

    server.stop().await;
}

/// 存在しないホストは 503
#[tokio::test]
async fn test_unknown_host_reports_error() {
    let zabbix = MockServer::start().await;
    mount_session(&zabbix, "6.0.21", 1).await;
    rpc("host.get")
        .respond_with(rpc_result(json!([])))
        .expect(1)
        .mount(&zabbix)
        .await;

    let server = spawn_adapter(&test_config(&zabbix.uri(), &[])).await;
    let (status, _, _) = get_text(&Client::new(), &server.probe_url("db-9", "CPU load")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    server.stop().await;
}

/// ログイン失敗以降の段階は実行されない
#[tokio::test]
async fn test_login_failure_stops_pipeline() {
    let zabbix = MockServer::start().await;
    rpc("apiinfo.version")
        .respond_with(rpc_result(json!("6.0.21")))
        .expect(1)
        .mount(&zabbix)
        .await;
    rpc("user.login")
        .respond_with(rpc_error(
            -32602,
            "Invalid params.",
            "Incorrect user name or password or account is temporarily blocked.",
        ))
        .expect(1)
        .mount(&zabbix)
        .await;
    rpc("host.get")
        .respond_with(rpc_result(json!([])))
        .expect(0)
        .mount(&zabbix)
        .await;

    let server = spawn_adapter(&test_config(&zabbix.uri(), &[])).await;
    let (status, _, body) = get_text(&Client::new(), &server.probe_url("web-1", "CPU load")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!body.contains("Incorrect user name"));
    assert!(!server.state().pipeline.cache().stats().has_session);

    server.stop().await;
}

/// Zabbix が HTTP エラーを返した場合も 503
#[tokio::test]
async fn test_backend_http_error_reports_error() {
    let zabbix = MockServer::start().await;
    rpc("apiinfo.version")
        .respond_with(wiremock::ResponseTemplate::new(502))
        .expect(1)
        .mount(&zabbix)
        .await;

    let server = spawn_adapter(&test_config(&zabbix.uri(), &[])).await;
    let (status, _, body) = get_text(&Client::new(), &server.probe_url("web-1", "CPU load")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("ERROR_DURING_PROCESSING"));
    server.stop().await;
}

/// 6.4 以降は Authorization ヘッダーでセッションを送る
#[tokio::test]
async fn test_modern_server_uses_bearer_header() {
    let zabbix = MockServer::start().await;
    mount_session(&zabbix, "7.0.3", 1).await;
    mount_host(&zabbix, "web-1", "10084", &[("CPU load", "23296")], 1).await;
    mount_history(&zabbix, "23296", now_secs() - 10, 1).await;

    let server = spawn_adapter(&test_config(&zabbix.uri(), &[])).await;
    let (status, _, _) = get_text(&Client::new(), &server.probe_url("web-1", "CPU load")).await;
    assert_eq!(status, StatusCode::OK);

    let requests = zabbix.received_requests().await.unwrap();
    let host_get = requests
        .iter()
        .find(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["method"] == "host.get"
        })
        .expect("host.get was sent");
    assert_eq!(
        host_get
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok()),
        Some(format!("Bearer {}", crate::support::zabbix::TOKEN).as_str())
    );

    server.stop().await;
}
