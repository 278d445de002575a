//! Commands and pushes flowing through one console.

use scriptdeck_client::EventChannel;
use scriptdeck_core::{Bootstrapper, CommandError, Console, Notice, RunStatus, ScriptCommand};
use scriptdeck_types::{BufferId, ChannelEvent, ScriptCatalog, ScriptId};
use serde_json::json;
use wiremock::MockServer;

use crate::common::{
    Recorder, Seen, api, fast_channel, is_log, log_frame, mount_config, mount_history, mount_post,
    mount_stream, mount_stream_once, recv_until, status_frame,
};

#[tokio::test]
async fn started_script_changes_state_only_on_push() {
    let server = MockServer::start().await;
    mount_config(&server, json!({})).await;
    mount_history(&server, json!([])).await;
    mount_stream_once(&server, &[log_frame("system", "09:00:00", "hello")]).await;
    mount_stream(
        &server,
        &[
            status_frame(&[("follower", true)]),
            log_frame("组合跟踪", "09:00:06", "follower tick"),
        ],
    )
    .await;
    mount_post(&server, "/api/scripts/follower/start", 200, json!({"success": true})).await;

    let api = api(&server);
    let connector = api.stream_connector().unwrap();
    let (mut channel, mut events) = EventChannel::new(connector, fast_channel());
    let mut console = Console::new(ScriptCatalog::builtin(), 200, Recorder::default());
    Bootstrapper::default()
        .start(&api, &mut console, &mut channel)
        .await;

    for event in recv_until(&mut events, is_log("hello")).await {
        console.apply(event);
    }

    let follower = ScriptId::from("follower");
    console.start_script(&api, &follower).await.unwrap();
    assert_eq!(console.status("follower"), RunStatus::Unknown);
    assert_eq!(
        console.hooks().notices().last().copied(),
        Some(&Notice::success("组合跟踪 started"))
    );

    for event in recv_until(&mut events, is_log("follower tick")).await {
        console.apply(event);
    }
    channel.disconnect().await;

    assert_eq!(console.status("follower"), RunStatus::Running);
    assert!(console.hooks().seen.contains(&Seen::State(follower.clone(), true)));
    // Toggling a running script stops it.
    mount_post(&server, "/api/scripts/follower/stop", 200, json!({"success": true})).await;
    assert_eq!(
        console.toggle_script(&api, &follower).await.unwrap(),
        ScriptCommand::Stop
    );
    assert_eq!(console.status("follower"), RunStatus::Running);
}

#[tokio::test]
async fn rejection_text_reaches_the_notice_verbatim() {
    let server = MockServer::start().await;
    mount_post(
        &server,
        "/api/scripts/trader/start",
        200,
        json!({"success": false, "error": "请先配置组合代码"}),
    )
    .await;
    mount_post(
        &server,
        "/api/scripts/simulator/stop",
        401,
        json!({"success": false, "error": "请先登录"}),
    )
    .await;
    mount_post(&server, "/api/scripts/auto_track/start", 200, json!({"success": false})).await;

    let api = api(&server);
    let mut console = Console::new(ScriptCatalog::builtin(), 200, Recorder::default());

    let trader = ScriptId::from("trader");
    assert!(matches!(
        console.start_script(&api, &trader).await,
        Err(CommandError::Api(_))
    ));
    console
        .stop_script(&api, &ScriptId::from("simulator"))
        .await
        .unwrap_err();
    console
        .start_script(&api, &ScriptId::from("auto_track"))
        .await
        .unwrap_err();

    let messages: Vec<_> = console
        .hooks()
        .notices()
        .iter()
        .map(|notice| notice.message.as_str())
        .collect();
    assert_eq!(messages, ["请先配置组合代码", "请先登录", "operation failed"]);
    assert_eq!(console.status("trader"), RunStatus::Unknown);
}

#[tokio::test]
async fn system_clear_waits_for_backend() {
    let server = MockServer::start().await;
    mount_config(&server, json!({})).await;
    mount_history(
        &server,
        json!([
            {"id": 1, "timestamp": "08:00:00", "level": "info", "source": "system", "message": "a"},
            {"id": 2, "timestamp": "08:00:01", "level": "info", "source": "交易演示", "message": "b"}
        ]),
    )
    .await;
    mount_stream(&server, &[]).await;
    mount_post(&server, "/api/logs/clear", 200, json!({"success": true})).await;

    let api = api(&server);
    let connector = api.stream_connector().unwrap();
    let (mut channel, _events) = EventChannel::new(connector, fast_channel());
    let mut console = Console::new(ScriptCatalog::builtin(), 200, Recorder::default());
    Bootstrapper::default()
        .start(&api, &mut console, &mut channel)
        .await;
    channel.disconnect().await;

    console.clear(&api, &BufferId::System).await.unwrap();

    let trader = BufferId::Script(ScriptId::from("trader"));
    assert!(console.buffers().get(&BufferId::System).unwrap().is_empty());
    assert_eq!(console.buffers().get(&trader).unwrap().len(), 1);
    assert!(console.hooks().seen.contains(&Seen::Cleared(BufferId::System)));
    let cleared = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/api/logs/clear")
        .count();
    assert_eq!(cleared, 1);
}

#[tokio::test]
async fn replayed_backlog_precedes_live_lines_in_each_buffer() {
    let server = MockServer::start().await;
    mount_config(&server, json!({})).await;
    mount_history(
        &server,
        json!([
            {"id": 1, "timestamp": "08:00:00", "level": "info", "source": "模拟仓操作", "message": "h1"},
            {"id": 2, "timestamp": "08:00:01", "level": "info", "source": "未知来源", "message": "h2"}
        ]),
    )
    .await;
    mount_stream(
        &server,
        &[
            log_frame("模拟仓操作", "09:00:00", "l1"),
            log_frame("system", "09:00:01", "l2"),
        ],
    )
    .await;

    let api = api(&server);
    let connector = api.stream_connector().unwrap();
    let (mut channel, mut events) = EventChannel::new(connector, fast_channel());
    let mut console = Console::new(ScriptCatalog::builtin(), 200, Recorder::default());
    Bootstrapper::default()
        .start(&api, &mut console, &mut channel)
        .await;
    for event in recv_until(&mut events, is_log("l2")).await {
        if matches!(event, ChannelEvent::Log(_)) {
            console.apply(event);
        }
    }
    channel.disconnect().await;

    let simulator = BufferId::Script(ScriptId::from("simulator"));
    assert_eq!(
        console.hooks().appended(),
        [
            (&simulator, "h1"),
            (&BufferId::System, "h2"),
            (&simulator, "l1"),
            (&BufferId::System, "l2"),
        ]
    );
}
