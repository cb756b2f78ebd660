//! 分類サービスとのHTTP通信テスト
//!
//! ローカルに1リクエストだけ応答するサーバを立てて検証

use rash_scan::classifier::{Classifier, HttpClassifier, RetryPolicy};
use rash_scan::error::RashScanError;
use rash_scan_common::ImageRef;
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const SUCCESS_BODY: &str =
    r#"{"success": true, "result": {"class": "benign-keratosis", "confidence": 0.87}}"#;

fn http_response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    )
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// ヘッダとボディを最後まで読む
async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = find(&buf, b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok());
        let complete = match content_length {
            Some(len) => buf.len() >= end + 4 + len,
            None if head.contains("transfer-encoding: chunked") => buf.ends_with(b"0\r\n\r\n"),
            None => true,
        };
        if complete {
            break;
        }
    }
    buf
}

/// 1回だけ応答して受信したリクエストを返す
async fn serve_once(listener: TcpListener, response: String) -> Vec<u8> {
    let (mut socket, _) = listener.accept().await.unwrap();
    let request = read_request(&mut socket).await;
    socket.write_all(response.as_bytes()).await.unwrap();
    socket.shutdown().await.ok();
    request
}

async fn local_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!(
        "http://{}/classify/classify-rash",
        listener.local_addr().unwrap()
    );
    (listener, url)
}

fn classifier(url: &str) -> HttpClassifier {
    HttpClassifier::new(url, Duration::from_secs(5))
        .unwrap()
        .with_retry(RetryPolicy::none())
}

/// ファイル画像はmultipartの `image` フィールドで送られる
#[tokio::test]
async fn test_multipart_upload() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("arm.jpg");
    std::fs::write(&path, b"\xFF\xD8\xFF\xE0 jpeg payload").unwrap();
    let image = ImageRef::Uri {
        path: path.display().to_string(),
        display_name: "arm.jpg".to_string(),
        mime_type: "image/jpeg".to_string(),
    };

    let (listener, url) = local_server().await;
    let server = tokio::spawn(serve_once(listener, http_response("200 OK", SUCCESS_BODY)));

    let result = classifier(&url).classify(&image).await.unwrap();
    assert_eq!(result.label, "benign-keratosis");
    assert_eq!(result.percent(), 87);

    let request = String::from_utf8_lossy(&server.await.unwrap()).to_string();
    assert!(request.starts_with("POST /classify/classify-rash "));
    assert!(request.to_lowercase().contains("content-type: multipart/form-data"));
    assert!(request.contains("name=\"image\""));
    assert!(request.contains("filename=\"arm.jpg\""));
    assert!(request.contains("jpeg payload"));
}

/// インライン画像はJSONのbase64で送られる
#[tokio::test]
async fn test_inline_json_upload() {
    let image = ImageRef::inline_from_bytes(b"web image bytes", "web.png", "image/png");
    let expected = match &image {
        ImageRef::Inline { data, .. } => data.clone(),
        _ => unreachable!(),
    };

    let (listener, url) = local_server().await;
    let server = tokio::spawn(serve_once(listener, http_response("200 OK", SUCCESS_BODY)));

    let result = classifier(&url).classify(&image).await.unwrap();
    assert_eq!(result.label, "benign-keratosis");

    let request = server.await.unwrap();
    let head_end = find(&request, b"\r\n\r\n").unwrap();
    let head = String::from_utf8_lossy(&request[..head_end]).to_lowercase();
    assert!(head.contains("content-type: application/json"));

    let body: serde_json::Value = serde_json::from_slice(&request[head_end + 4..]).unwrap();
    assert_eq!(body["image"], expected);
}

/// サーバエラーはエラー文言付きで返り、再送されない
#[tokio::test]
async fn test_server_error_not_retried() {
    let image = ImageRef::inline_from_bytes(b"bytes", "a.jpg", "image/jpeg");
    let (listener, url) = local_server().await;
    let server = tokio::spawn(serve_once(
        listener,
        http_response(
            "500 Internal Server Error",
            r#"{"success": false, "error": "model not loaded"}"#,
        ),
    ));

    let classifier = classifier(&url).with_retry(RetryPolicy {
        max_retries: 2,
        backoff: Duration::from_millis(10),
    });
    match classifier.classify(&image).await {
        Err(RashScanError::ClassificationHttp { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "model not loaded");
        }
        other => panic!("Expected ClassificationHttp, got {:?}", other),
    }
    server.await.unwrap();
}

/// 成功ステータスでもボディが不正ならパースエラー
#[tokio::test]
async fn test_malformed_success_body() {
    let image = ImageRef::inline_from_bytes(b"bytes", "a.jpg", "image/jpeg");
    let (listener, url) = local_server().await;
    let server = tokio::spawn(serve_once(
        listener,
        http_response("200 OK", r#"{"success": true}"#),
    ));

    assert!(matches!(
        classifier(&url).classify(&image).await,
        Err(RashScanError::ClassificationParse(_))
    ));
    server.await.unwrap();
}

/// 接続が切れた場合は再送して成功する
#[tokio::test]
async fn test_dropped_connection_is_retried() {
    let image = ImageRef::inline_from_bytes(b"bytes", "a.jpg", "image/jpeg");
    let (listener, url) = local_server().await;
    let server = tokio::spawn(async move {
        // 1回目は応答せずに切断
        let (mut first, _) = listener.accept().await.unwrap();
        read_request(&mut first).await;
        drop(first);
        serve_once(listener, http_response("200 OK", SUCCESS_BODY)).await
    });

    let classifier = classifier(&url).with_retry(RetryPolicy {
        max_retries: 1,
        backoff: Duration::from_millis(10),
    });
    let result = classifier.classify(&image).await.unwrap();
    assert_eq!(result.label, "benign-keratosis");
    server.await.unwrap();
}

/// 接続できない場合はネットワークエラー
#[tokio::test]
async fn test_unreachable_service() {
    let (listener, url) = local_server().await;
    drop(listener);

    let image = ImageRef::inline_from_bytes(b"bytes", "a.jpg", "image/jpeg");
    match classifier(&url).classify(&image).await {
        Err(err @ RashScanError::ClassificationNetwork(_)) => assert!(err.is_transient()),
        other => panic!("Expected ClassificationNetwork, got {:?}", other),
    }
}

/// 画像でないファイルは送信前に拒否される
#[tokio::test]
async fn test_non_image_rejected_before_send() {
    let image = ImageRef::inline_from_bytes(b"hello", "notes.txt", "text/plain");
    assert!(matches!(
        classifier("http://127.0.0.1:9/classify/classify-rash")
            .classify(&image)
            .await,
        Err(RashScanError::InvalidUpload(_))
    ));
}
