//! Startup against a mock backend: config, backlog, then the live stream.

use scriptdeck_client::EventChannel;
use scriptdeck_core::{BootReport, Bootstrapper, Console, NoticeKind};
use scriptdeck_types::{BufferId, ChannelEvent, ScriptCatalog, ScriptId};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    Recorder, Seen, api, fast_channel, is_log, log_frame, mount_config, mount_stream, recv_until,
    request_paths,
};

#[tokio::test]
async fn runs_config_then_backlog_then_stream() {
    let server = MockServer::start().await;
    mount_config(&server, json!({"my_portfolio_code": "ZH123", "interval": 30})).await;
    Mock::given(method("GET"))
        .and(path("/api/logs/history"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "logs": [
                {"id": 7, "timestamp": "08:59:00", "level": "info", "source": "system", "message": "backend up"},
                {"id": 8, "timestamp": "08:59:30", "level": "warning", "source": "组合跟踪", "message": "old"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_stream(&server, &[log_frame("组合跟踪", "09:00:00", "new")]).await;

    let api = api(&server);
    let connector = api.stream_connector().unwrap();
    let (mut channel, mut events) = EventChannel::new(connector, fast_channel());
    let mut console = Console::new(ScriptCatalog::builtin(), 200, Recorder::default());

    let report = Bootstrapper::default()
        .start(&api, &mut console, &mut channel)
        .await;
    assert_eq!(
        report,
        BootReport {
            config_loaded: true,
            replayed: 2,
            backlog_failed: false,
        }
    );

    for event in recv_until(&mut events, is_log("new")).await {
        console.apply(event);
    }
    channel.disconnect().await;

    let paths = request_paths(&server).await;
    assert_eq!(paths[..3], ["/api/config", "/api/logs/history", "/api/logs/stream"]);

    let follower = BufferId::Script(ScriptId::from("follower"));
    let messages: Vec<_> = console
        .buffers()
        .get(&follower)
        .unwrap()
        .iter()
        .map(|record| record.message().to_string())
        .collect();
    assert_eq!(messages, ["old", "new"]);
    assert_eq!(console.buffers().get(&BufferId::System).unwrap().len(), 1);
    assert_eq!(
        console.hooks().seen[0],
        Seen::Config(json!({"my_portfolio_code": "ZH123", "interval": 30}))
    );
}

#[tokio::test]
async fn failed_fetches_still_connect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string(format!("<html>{}</html>", "trace ".repeat(4000))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/logs/history"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "error": "数据库错误"})),
        )
        .mount(&server)
        .await;
    mount_stream(&server, &[log_frame("system", "09:00:00", "live")]).await;

    let api = api(&server);
    let connector = api.stream_connector().unwrap();
    let (mut channel, mut events) = EventChannel::new(connector, fast_channel());
    let mut console = Console::new(ScriptCatalog::builtin(), 200, Recorder::default());

    let report = Bootstrapper::default()
        .start(&api, &mut console, &mut channel)
        .await;
    assert!(!report.config_loaded);
    assert!(report.backlog_failed);
    assert_eq!(report.replayed, 0);

    let notices = console.hooks().notices();
    assert_eq!(notices.len(), 2);
    assert!(notices.iter().all(|n| n.kind == NoticeKind::Error));
    assert_eq!(
        notices[0].message,
        "failed to load configuration: HTTP 500 Internal Server Error"
    );
    assert_eq!(notices[1].message, "failed to load log history: 数据库错误");

    let seen = recv_until(&mut events, is_log("live")).await;
    assert!(matches!(seen.last(), Some(ChannelEvent::Log(_))));
    channel.disconnect().await;
}

#[tokio::test]
async fn backlog_limit_is_passed_through() {
    let server = MockServer::start().await;
    mount_config(&server, json!({})).await;
    Mock::given(method("GET"))
        .and(path("/api/logs/history"))
        .and(query_param("limit", "5"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "logs": []})),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_stream(&server, &[]).await;

    let api = api(&server);
    let connector = api.stream_connector().unwrap();
    let (mut channel, _events) = EventChannel::new(connector, fast_channel());
    let mut console = Console::new(ScriptCatalog::builtin(), 200, ());

    let report = Bootstrapper::new(5)
        .start(&api, &mut console, &mut channel)
        .await;
    assert_eq!(report.replayed, 0);
    assert!(!report.backlog_failed);
    channel.disconnect().await;
}
