//! `ReqwestTransport` against a local HTTP server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use promptline::config::ClientConfig;
use promptline::error::{FailureCause, TerminalCause};
use promptline::prompt::{compose, RequestContext, RequestMode};
use promptline::transport::{Credential, Outcome, ReqwestTransport, TransportInvoker};
use promptline::{RequestOrchestrator, SessionState};
use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const GENERATED: &str = r#"{"candidates":[{"content":{"parts":[{"text":"redirected"}]}}]}"#;

/// Serves the replies built for the server's own url in order (the last one
/// repeats) and counts requests.
async fn serve(replies: impl FnOnce(&str) -> Vec<String>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1/generate", listener.local_addr().unwrap());
    let replies = replies(&url);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            read_request(&mut stream).await;
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let reply = &replies[n.min(replies.len() - 1)];
            let _ = stream.write_all(reply.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    (url, hits)
}

async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        let Some(header_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);
        if buf.len() >= header_end + 4 + content_length {
            return;
        }
    }
}

fn truncated(status_line: &str) -> String {
    format!("HTTP/1.1 {status_line}\r\nContent-Length: 500\r\nConnection: close\r\n\r\nhello")
}

fn invoker(url: &str) -> TransportInvoker<ReqwestTransport> {
    TransportInvoker::new(
        ReqwestTransport::build(None).unwrap(),
        Url::parse(url).unwrap(),
    )
}

async fn invoke(url: &str) -> Outcome {
    let prompt = compose(&RequestContext::new(RequestMode::Primary, "Data Engineer"));
    invoker(url).invoke(&prompt, &Credential::new("k")).await
}

#[tokio::test]
async fn truncated_client_error_body_keeps_its_status() {
    let (url, hits) = serve(|_| vec![truncated("400 Bad Request")]).await;

    assert_eq!(
        invoke(&url).await,
        Outcome::TerminalFailure(TerminalCause::ClientError)
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn truncated_success_body_is_malformed() {
    let (url, _) = serve(|_| vec![truncated("200 OK")]).await;

    assert_eq!(
        invoke(&url).await,
        Outcome::TerminalFailure(TerminalCause::MalformedResponse)
    );
}

#[tokio::test]
async fn redirects_are_not_followed() {
    let (url, hits) = serve(|url| {
        let redirect = format!(
            "HTTP/1.1 303 See Other\r\nLocation: {url}\r\nContent-Length: 0\r\n\
             Connection: close\r\n\r\n"
        );
        let ok = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
             Connection: close\r\n\r\n{GENERATED}",
            GENERATED.len()
        );
        vec![redirect, ok]
    })
    .await;

    assert_eq!(
        invoke(&url).await,
        Outcome::TerminalFailure(TerminalCause::ClientError)
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn truncated_client_error_fails_session_without_retry() {
    let (url, hits) = serve(|_| vec![truncated("403 Forbidden")]).await;
    let config =
        ClientConfig::from_toml_str(&format!("endpoint = \"{url}\"\napi_key = \"k\"")).unwrap();
    let orchestrator = RequestOrchestrator::from_config(&config).unwrap();
    let mut results = orchestrator.subscribe();

    let report = orchestrator
        .submit(RequestMode::Primary, "Data Engineer")
        .unwrap()
        .finished()
        .await
        .unwrap();

    assert_eq!(report.state, SessionState::Failed);
    let delivery = results.recv().await.unwrap();
    assert_eq!(
        delivery.result,
        Err(FailureCause::Terminal(TerminalCause::ClientError))
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
