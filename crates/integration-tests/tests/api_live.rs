use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use integration_tests::{payload, TestApp};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

async fn next_json<S>(stream: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<tokio_tungstenite::tungstenite::Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("timed out waiting for frame")
        .expect("stream ended")
        .expect("websocket error");
    serde_json::from_str(frame.to_text().unwrap()).unwrap()
}

async fn wait_for_subscribers(app: &TestApp, n: usize) {
    for _ in 0..100 {
        if app.hub.subscriber_count() == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {n} subscribers, have {}", app.hub.subscriber_count());
}

#[tokio::test]
async fn test_subscriber_gets_snapshot_then_live_events() {
    let app = TestApp::new().unwrap();
    let addr = serve(&app).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let initial = next_json(&mut socket).await;
    assert_eq!(initial["type"], "initial_state");
    assert_eq!(initial["messages"], Value::Array(vec![]));

    app.engine
        .submit_text("hello".into(), "10.0.0.5".into())
        .await
        .unwrap();
    app.engine
        .submit_file("report.pdf".into(), Bytes::from(payload(37)), "10.0.0.5".into())
        .await
        .unwrap();

    let first = next_json(&mut socket).await;
    assert_eq!(first["type"], "new_message");
    assert_eq!(first["message"]["type"], "text");
    assert_eq!(first["message"]["content"], "hello");
    assert_eq!(first["message"]["sender_ip"], "10.0.0.5");

    let second = next_json(&mut socket).await;
    assert_eq!(second["message"]["type"], "file");
    assert_eq!(second["message"]["content"], "report.pdf");
    assert_eq!(second["message"]["filesize"], 37);

    let listed = serde_json::to_value(app.engine.list_all()).unwrap();
    assert_eq!(listed, Value::Array(vec![first["message"].clone(), second["message"].clone()]));
}

#[tokio::test]
async fn test_late_subscriber_gets_existing_history() {
    let app = TestApp::new().unwrap();
    app.engine.submit_text("one".into(), String::new()).await.unwrap();
    app.engine.submit_text("two".into(), String::new()).await.unwrap();
    let addr = serve(&app).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let initial = next_json(&mut socket).await;
    let contents: Vec<&str> = initial["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["one", "two"]);
}

#[tokio::test]
async fn test_disconnect_unsubscribes_and_teardown_closes_sessions() {
    let app = TestApp::new().unwrap();
    let addr = serve(&app).await;

    let (mut leaving, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let (mut staying, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    next_json(&mut leaving).await;
    next_json(&mut staying).await;
    wait_for_subscribers(&app, 2).await;

    leaving.close(None).await.unwrap();
    wait_for_subscribers(&app, 1).await;

    app.engine.teardown().await;
    let end = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match staying.next().await {
                None | Some(Err(_)) => break,
                Some(Ok(frame)) if frame.is_close() => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(end.is_ok(), "session should close after teardown");
    assert_eq!(app.hub.subscriber_count(), 0);
}
