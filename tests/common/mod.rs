#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use prompter_hub::BroadcastHub;
use prompter_hub::server::api;
use serde_json::Value;
use tokio::task::JoinHandle;

pub async fn spawn_hub(hub: BroadcastHub) -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = api::serve(listener, hub).await;
    });
    (addr, handle)
}

/// Reads `data: <json>\n\n` frames off a streaming response.
pub struct SseReader {
    response: reqwest::Response,
    buffer: String,
}

impl SseReader {
    pub async fn connect(url: &str) -> Self {
        let response = reqwest::get(url).await.expect("sse connect");
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        Self {
            response,
            buffer: String::new(),
        }
    }

    pub async fn next_event(&mut self, wait: Duration) -> Option<Value> {
        tokio::time::timeout(wait, async {
            loop {
                if let Some(end) = self.buffer.find("\n\n") {
                    let frame: String = self.buffer.drain(..end + 2).collect();
                    let json = frame.strip_prefix("data: ").expect("sse data prefix").trim_end();
                    return Some(serde_json::from_str(json).expect("sse json"));
                }
                let chunk = self.response.chunk().await.ok()??;
                self.buffer.push_str(std::str::from_utf8(&chunk).expect("utf-8 frame"));
            }
        })
        .await
        .ok()
        .flatten()
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
