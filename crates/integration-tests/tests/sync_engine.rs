use std::collections::HashSet;
use std::sync::Arc;

use as_core::{AppError, BlobStore, Message, MessageContent, MessageKind};
use bytes::Bytes;
use futures_util::StreamExt;
use integration_tests::{payload, TestApp};

async fn download(app: &TestApp, storage_name: &str) -> Vec<u8> {
    let handle = app.streamer.open(storage_name).await.unwrap();
    let announced = handle.metadata().size_bytes;
    let mut out = Vec::new();
    let mut stream = Box::pin(handle.produce());
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(out.len() as u64, announced);
    out
}

#[tokio::test]
async fn test_text_then_file_scenario() {
    let app = TestApp::new().unwrap();
    let (mut sub, snapshot) = app.hub.subscribe();
    assert!(snapshot.is_empty());

    app.engine
        .submit_text("hello".into(), "10.0.0.5".into())
        .await
        .unwrap();
    let listed = app.engine.list_all();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].kind(), MessageKind::Text);
    assert_eq!(listed[0].content, MessageContent::Text { body: "hello".into() });
    assert_eq!(listed[0].sender_address, "10.0.0.5");

    let report = payload(37);
    app.engine
        .submit_file("report.pdf".into(), Bytes::from(report.clone()), "10.0.0.5".into())
        .await
        .unwrap();
    let listed = app.engine.list_all();
    assert_eq!(listed.len(), 2);

    let MessageContent::File { display_name, storage_name, size_bytes } = &listed[1].content else {
        panic!("second message should be a file");
    };
    assert_eq!(display_name, "report.pdf");
    assert_eq!(*size_bytes, 37);
    assert!(!storage_name.is_empty());
    assert_ne!(storage_name, "report.pdf");

    assert_eq!(download(&app, storage_name).await, report);

    let first = sub.recv().await.unwrap();
    let second = sub.recv().await.unwrap();
    assert_eq!(vec![(*first).clone(), (*second).clone()], listed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_are_all_listed_once() {
    let app = Arc::new(TestApp::new().unwrap());

    let mut tasks = Vec::new();
    for t in 0..8 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            let mut done = Vec::new();
            for i in 0..20 {
                let msg = if i % 2 == 0 {
                    app.engine
                        .submit_text(format!("{t}-{i}"), format!("10.0.0.{t}"))
                        .await
                } else {
                    app.engine
                        .submit_file(format!("f{t}-{i}.bin"), Bytes::from(payload(100 + i)), String::new())
                        .await
                };
                done.push(msg.unwrap());
            }
            done
        }));
    }

    let mut submitted = Vec::new();
    for task in tasks {
        submitted.extend(task.await.unwrap());
    }

    let listed = app.engine.list_all();
    assert_eq!(listed.len(), submitted.len());

    let ids: HashSet<_> = listed.iter().map(|m| m.id).collect();
    assert_eq!(ids.len(), listed.len());
    let submitted_ids: HashSet<_> = submitted.iter().map(|m| m.id).collect();
    assert_eq!(ids, submitted_ids);

    for pair in listed.windows(2) {
        assert!(pair[0].created_at <= pair[1].created_at);
    }
    for message in &listed {
        if let Some(name) = message.storage_name() {
            assert!(app.store.exists(name).await, "{name} missing");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_subscribe_during_writes_sees_every_message_once() {
    let app = Arc::new(TestApp::new().unwrap());

    let writer = {
        let app = app.clone();
        tokio::spawn(async move {
            for i in 0..300 {
                app.engine.submit_text(format!("m{i}"), String::new()).await.unwrap();
                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    tokio::task::yield_now().await;
    let (mut sub, snapshot) = app.hub.subscribe();
    writer.await.unwrap();

    let mut seen: Vec<Message> = snapshot;
    while let Some(m) = sub.try_recv() {
        seen.push((*m).clone());
    }
    assert_eq!(seen, app.engine.list_all());
}

#[tokio::test]
async fn test_teardown_leaves_nothing_behind() {
    let app = TestApp::new().unwrap();
    let mut names = Vec::new();
    for i in 0..3 {
        let msg = app
            .engine
            .submit_file(format!("doc{i}.txt"), Bytes::from(payload(64)), String::new())
            .await
            .unwrap();
        names.push(msg.storage_name().unwrap().to_string());
    }
    app.engine.submit_text("bye".into(), String::new()).await.unwrap();

    app.engine.teardown().await;

    assert!(app.engine.list_all().is_empty());
    for name in &names {
        assert!(!app.store.exists(name).await);
    }
    assert!(!app.store.root_path().exists());

    let late = app
        .engine
        .submit_file("late.txt".into(), Bytes::from_static(b"x"), String::new())
        .await;
    assert!(matches!(late, Err(AppError::ShuttingDown)));
    assert!(!app.store.root_path().exists());

    app.engine.teardown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_teardown_during_uploads_leaves_nothing_behind() {
    let app = Arc::new(TestApp::new().unwrap());
    let (started_tx, mut started_rx) = tokio::sync::mpsc::channel::<()>(256);
    let (release_tx, release_rx) = tokio::sync::watch::channel(false);

    // Even writers upload without pause and race the teardown; odd writers
    // finish one upload, then wait until teardown is over.
    let mut tasks = Vec::new();
    for t in 0..8 {
        let app = app.clone();
        let started = started_tx.clone();
        let mut release = release_rx.clone();
        tasks.push(tokio::spawn(async move {
            let mut outcomes = Vec::new();
            for i in 0..20 {
                if t % 2 == 1 && i == 1 {
                    let _ = release.wait_for(|go| *go).await;
                }
                let _ = started.try_send(());
                let result = app
                    .engine
                    .submit_file(format!("u{t}-{i}.bin"), Bytes::from(payload(4096 + i)), String::new())
                    .await;
                outcomes.push(result);
            }
            outcomes
        }));
    }
    drop(started_tx);

    for _ in 0..8 {
        started_rx.recv().await;
    }
    app.engine.teardown().await;
    release_tx.send(true).unwrap();

    let mut accepted = 0;
    let mut refused = 0;
    for task in tasks {
        for outcome in task.await.unwrap() {
            match outcome {
                Ok(_) => accepted += 1,
                Err(AppError::ShuttingDown) => refused += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }
    assert_eq!(accepted + refused, 160);
    assert!(refused >= 4 * 19);

    assert!(app.engine.list_all().is_empty());
    assert_eq!(app.engine.message_count(), 0);
    assert!(!app.store.root_path().exists());
    assert!(!app.engine.is_open().await);
}

#[tokio::test]
async fn test_large_download_is_byte_identical() {
    let app = TestApp::with_chunk_size(8 * 1024).unwrap();
    let data = payload(1_000_003);
    let msg = app
        .engine
        .submit_file("big.bin".into(), Bytes::from(data.clone()), String::new())
        .await
        .unwrap();

    let name = msg.storage_name().unwrap();
    let handle = app.streamer.open(name).await.unwrap();
    let mut stream = Box::pin(handle.produce());
    let mut joined = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        assert!(chunk.len() <= 8 * 1024);
        joined.extend_from_slice(&chunk);
    }
    assert_eq!(joined, data);
}

#[tokio::test]
async fn test_unknown_download_is_not_found() {
    let app = TestApp::new().unwrap();
    assert!(matches!(
        app.streamer.open("does-not-exist.txt").await,
        Err(AppError::NotFound(_))
    ));
}
