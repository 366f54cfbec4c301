//! Integration tests for the SSE binding.
//!
//! Event streams are read with reqwest's byte stream and split into events by
//! a small parser that understands `event:`/`data:` fields and skips comments.

use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use gitmcp_http::SseTransport;
use gitmcp_transport_traits::{
    LifecycleState, SseConfig, TransportBinding, TransportMessage, handler_fn,
};
use pretty_assertions::assert_eq;
use serde_json::Value;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq, Eq)]
struct SseEvent {
    event: String,
    data: String,
}

struct SseClient {
    body: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    buffer: String,
}

impl SseClient {
    async fn connect(addr: SocketAddr) -> Self {
        let reply = reqwest::get(format!("http://{addr}/sse")).await.unwrap();
        assert_eq!(reply.status(), 200);
        assert!(
            reply.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );
        Self {
            body: reply.bytes_stream().boxed(),
            buffer: String::new(),
        }
    }

    /// Next event, or `None` once the server ends the stream.
    async fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                if let Some(event) = parse_block(&block) {
                    return Some(event);
                }
                continue;
            }
            let chunk = tokio::time::timeout(WAIT, self.body.next())
                .await
                .expect("event within timeout")?;
            self.buffer
                .push_str(std::str::from_utf8(&chunk.ok()?).unwrap());
        }
    }

    async fn endpoint(&mut self) -> String {
        let event = self.next_event().await.expect("endpoint event");
        assert_eq!(event.event, "endpoint");
        event.data
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = String::from("message");
    let mut data = Vec::new();
    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = value.to_string(),
            "data" => data.push(value.to_string()),
            _ => {}
        }
    }
    if data.is_empty() {
        None
    } else {
        Some(SseEvent {
            event,
            data: data.join("\n"),
        })
    }
}

async fn started() -> (SseTransport, SocketAddr) {
    let transport = SseTransport::new(SseConfig::new("127.0.0.1", 0));
    transport
        .start(handler_fn(|msg: TransportMessage| async move {
            match msg.as_str() {
                Some("notify") => Ok(None),
                Some("binary") => Ok(Some(TransportMessage::new(vec![0xffu8, 0xfe]))),
                _ => Ok(Some(msg)),
            }
        }))
        .await
        .expect("start");
    let addr = transport.bound_addr().expect("bound");
    (transport, addr)
}

async fn post(client: &reqwest::Client, addr: SocketAddr, endpoint: &str, body: &str) -> u16 {
    client
        .post(format!("http://{addr}{endpoint}"))
        .body(body.to_string())
        .send()
        .await
        .unwrap()
        .status()
        .as_u16()
}

#[tokio::test]
async fn test_start_reports_running_and_protocol() {
    let (transport, _addr) = started().await;
    assert!(transport.is_running());
    assert_eq!(transport.connection_info().protocol(), Some("sse"));
    transport.stop(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_endpoint_event_names_session() {
    let (transport, addr) = started().await;

    let mut client = SseClient::connect(addr).await;
    let endpoint = client.endpoint().await;
    let session_id = endpoint
        .strip_prefix("/messages?session_id=")
        .expect("endpoint format");
    assert!(!session_id.is_empty());
    assert_eq!(transport.active_sessions(), 1);

    transport.stop(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_independent_ordered_sessions() {
    let (transport, addr) = started().await;
    let http = reqwest::Client::new();

    let mut a = SseClient::connect(addr).await;
    let mut b = SseClient::connect(addr).await;
    let endpoint_a = a.endpoint().await;
    let endpoint_b = b.endpoint().await;
    assert_ne!(endpoint_a, endpoint_b);

    for n in 1..=3 {
        assert_eq!(post(&http, addr, &endpoint_a, &format!("{{\"a\":{n}}}")).await, 202);
        assert_eq!(post(&http, addr, &endpoint_b, &format!("{{\"b\":{n}}}")).await, 202);
    }
    // Notifications produce no event.
    assert_eq!(post(&http, addr, &endpoint_a, "notify").await, 202);

    for n in 1..=3 {
        let event = a.next_event().await.unwrap();
        assert_eq!(event.event, "message");
        assert_eq!(event.data, format!("{{\"a\":{n}}}"));
    }
    for n in 1..=3 {
        assert_eq!(b.next_event().await.unwrap().data, format!("{{\"b\":{n}}}"));
    }

    // Closing one client leaves the other working.
    drop(a);
    assert_eq!(post(&http, addr, &endpoint_b, "{\"b\":4}").await, 202);
    assert_eq!(b.next_event().await.unwrap().data, "{\"b\":4}");

    transport.stop(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_non_utf8_reply_rejected_not_rewritten() {
    let (transport, addr) = started().await;
    let http = reqwest::Client::new();

    let mut client = SseClient::connect(addr).await;
    let endpoint = client.endpoint().await;

    assert_eq!(post(&http, addr, &endpoint, "binary").await, 500);
    assert_eq!(post(&http, addr, &endpoint, "{\"id\":2}").await, 202);

    // Only the text reply reaches the stream.
    let event = client.next_event().await.unwrap();
    assert_eq!(event.event, "message");
    assert_eq!(event.data, "{\"id\":2}");

    transport.stop(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_message_post_errors() {
    let (transport, addr) = started().await;
    let http = reqwest::Client::new();

    assert_eq!(post(&http, addr, "/messages?session_id=nope", "{}").await, 404);
    assert_eq!(post(&http, addr, "/messages", "{}").await, 400);
    assert_eq!(post(&http, addr, "/messages?session_id=", "{}").await, 400);

    transport.stop(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_publish_and_broadcast() {
    let (transport, addr) = started().await;

    let mut a = SseClient::connect(addr).await;
    let mut b = SseClient::connect(addr).await;
    let endpoint_a = a.endpoint().await;
    b.endpoint().await;
    let session_a = endpoint_a.rsplit('=').next().unwrap().to_string();

    transport
        .publish(&session_a, "{\"only\":\"a\"}")
        .await
        .unwrap();
    assert_eq!(transport.broadcast("{\"all\":true}").await, 2);

    assert_eq!(a.next_event().await.unwrap().data, "{\"only\":\"a\"}");
    assert_eq!(a.next_event().await.unwrap().data, "{\"all\":true}");
    assert_eq!(b.next_event().await.unwrap().data, "{\"all\":true}");

    transport.stop(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_stop_ends_streams_and_health() {
    let (transport, addr) = started().await;

    let health: Value = reqwest::get(format!("http://{addr}/healthz"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["connection"]["protocol"], "sse");

    let mut client = SseClient::connect(addr).await;
    client.endpoint().await;

    tokio::time::timeout(WAIT, transport.stop(WAIT))
        .await
        .expect("graceful stop completes")
        .unwrap();
    assert_eq!(transport.state(), LifecycleState::Stopped);
    assert_eq!(client.next_event().await, None);

    transport.stop(WAIT).await.unwrap();
    assert_eq!(transport.state(), LifecycleState::Stopped);
}
