//! Exercises the Microsoft Translator client against a local HTTP server.

use mteval_core::config::Settings;
use mteval_core::translate::{TranslateError, Translator, translate_one};
use mteval_core::MicrosoftTranslator;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// What the server saw: the lowercased request head and the body.
struct Captured {
    head: String,
    body: String,
}

/// Serve a single request with `status` and `body`, reporting what was
/// received.
async fn serve_once(
    status: &'static str,
    body: &'static str,
) -> (String, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let (head, request_body) = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(split) = text.find("\r\n\r\n") {
                let head = text[..split].to_string();
                let length = head
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                let received = &text[split + 4..];
                if received.len() >= length || n == 0 {
                    break (head, received.to_string());
                }
            }
            if n == 0 {
                break (text, String::new());
            }
        };
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = tx.send(Captured {
            head: head.to_ascii_lowercase(),
            body: request_body,
        });
    });

    (format!("http://{addr}"), rx)
}

fn settings(endpoint: String) -> Settings {
    Settings {
        subscription_key: "secret-key".into(),
        region: "westeurope".into(),
        categories: vec![],
        aligner_path: None,
        endpoint,
        request_timeout_secs: 5,
        debug: false,
    }
}

#[tokio::test]
async fn posts_text_with_subscription_headers() {
    let (endpoint, seen) = serve_once(
        "200 OK",
        r#"[{"translations":[{"text":"Bonjour le monde","to":"fr"}]}]"#,
    )
    .await;
    let translator = MicrosoftTranslator::new(&settings(endpoint)).unwrap();

    let text = translate_one(&translator, "Hello world", "fr", "cat-1_general")
        .await
        .unwrap();
    assert_eq!(text, "Bonjour le monde");

    let captured = seen.await.unwrap();
    assert!(captured
        .head
        .starts_with("post /translate?api-version=3.0&to=fr&category=cat-1_general "));
    assert!(captured.head.contains("ocp-apim-subscription-key: secret-key"));
    assert!(captured.head.contains("ocp-apim-subscription-region: westeurope"));
    assert_eq!(captured.body, r#"[{"Text":"Hello world"}]"#);
}

#[tokio::test]
async fn server_error_is_reported() {
    let (endpoint, _seen) = serve_once("503 Service Unavailable", r#"{"error":"busy"}"#).await;
    let translator = MicrosoftTranslator::new(&settings(endpoint)).unwrap();
    let texts = vec!["Hello".to_string()];
    match translator.translate(&texts, "fr", "c").await {
        Err(TranslateError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert!(body.contains("busy"));
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_http_error() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let translator = MicrosoftTranslator::new(&settings(format!("http://{addr}"))).unwrap();
    let err = translate_one(&translator, "Hello", "fr", "c").await.unwrap_err();
    assert!(matches!(err, TranslateError::Http(_)));
}
