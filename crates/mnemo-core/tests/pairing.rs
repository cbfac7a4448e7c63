use std::sync::Arc;
use std::time::Duration;

use mnemo_core::pairing::{report, PairingAction, PairingListener};
use tempfile::tempdir;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;

async fn wait_for_lines(sink: &Arc<Mutex<Vec<u8>>>, expected: usize) -> String {
    for _ in 0..200 {
        let text = String::from_utf8(sink.lock().await.clone()).unwrap();
        if text.lines().count() >= expected {
            return text;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    String::from_utf8(sink.lock().await.clone()).unwrap()
}

#[tokio::test]
async fn reports_are_logged_one_line_each() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pairing.sock");
    let listener = PairingListener::bind(&path).unwrap();
    let sink = Arc::new(Mutex::new(Vec::<u8>::new()));
    let server = tokio::spawn(listener.serve(Arc::clone(&sink)));

    let mut clients = Vec::new();
    for i in 0..5 {
        let path = path.clone();
        clients.push(tokio::spawn(async move {
            report(&path, &PairingAction::new("task-9", format!("edit {i}"), "editor"))
                .await
                .unwrap();
        }));
    }
    for client in clients {
        client.await.unwrap();
    }

    let text = wait_for_lines(&sink, 5).await;
    assert_eq!(text.lines().count(), 5);
    for i in 0..5 {
        assert!(text.contains(&format!(" [LOG] Tool: editor | Action: edit {i}")));
    }
    server.abort();
}

#[tokio::test]
async fn malformed_lines_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pairing.sock");
    let listener = PairingListener::bind(&path).unwrap();
    let sink = Arc::new(Mutex::new(Vec::<u8>::new()));
    let server = tokio::spawn(listener.serve(Arc::clone(&sink)));

    let mut stream = UnixStream::connect(&path).await.unwrap();
    stream
        .write_all(b"not json\n{\"task_id\":\"t\",\"action\":\"build\",\"source\":\"ci\"}\n")
        .await
        .unwrap();
    stream.shutdown().await.unwrap();

    let text = wait_for_lines(&sink, 1).await;
    assert_eq!(text, " [LOG] Tool: ci | Action: build\n");
    server.abort();
}

#[tokio::test]
async fn bind_replaces_stale_socket_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pairing.sock");
    std::fs::write(&path, b"stale").unwrap();

    let listener = PairingListener::bind(&path).unwrap();
    assert_eq!(listener.path(), path.as_path());
}
