//! Common test utilities for sluice integration tests
//!
//! A tiny HTTP/1.1 server on a local port, plus helpers for building a
//! manager whose events land in a channel.

#![allow(dead_code)]

use sluice::model::{FormatConfig, ParserConfig, ProtocolConfig};
use sluice::{
    AdapterDescription, AdapterKind, AdapterManager, ChannelTransport, ConfigValue, Envelope,
    Settings,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// What the fixture server sends for every request.
#[derive(Clone)]
pub enum Reply {
    /// A complete response with a Content-Length
    Body { status: u16, body: Vec<u8> },
    /// Chunks written with a pause between them, then optionally held open
    Stream {
        chunks: Vec<Vec<u8>>,
        pause: Duration,
        hold_open: bool,
    },
}

pub struct HttpFixture {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl HttpFixture {
    pub async fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, reply.clone()));
            }
        });

        Self { addr, hits }
    }

    pub async fn body(body: impl Into<Vec<u8>>) -> Self {
        Self::start(Reply::Body {
            status: 200,
            body: body.into(),
        })
        .await
    }

    pub fn url(&self) -> String {
        format!("http://{}/data", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn read_request_head(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        match socket.read(&mut byte).await {
            Ok(0) | Err(_) => return,
            Ok(_) => buf.push(byte[0]),
        }
    }
}

async fn serve(mut socket: TcpStream, reply: Reply) {
    read_request_head(&mut socket).await;
    match reply {
        Reply::Body { status, body } => {
            let head = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        }
        Reply::Stream {
            chunks,
            pause,
            hold_open,
        } => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nConnection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for chunk in chunks {
                if socket.write_all(&chunk).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
                tokio::time::sleep(pause).await;
            }
            if hold_open {
                std::future::pending::<()>().await;
            }
            let _ = socket.shutdown().await;
        }
    }
}

/// Newline-delimited JSON records `{"sensor": "s<i>", "value": <i>}`.
pub fn json_lines(n: usize) -> Vec<u8> {
    (0..n)
        .map(|i| format!("{{\"sensor\":\"s{}\",\"value\":{}}}\n", i, i))
        .collect::<String>()
        .into_bytes()
}

pub fn manager() -> (AdapterManager, mpsc::Receiver<Envelope>) {
    let (transport, rx) = ChannelTransport::new(1024);
    let settings = Settings {
        stop_grace_ms: 500,
        ..Settings::default()
    };
    let manager = AdapterManager::from_settings(&settings, Arc::new(transport)).unwrap();
    (manager, rx)
}

pub fn description(
    id: &str,
    kind: AdapterKind,
    protocol: &str,
    config: Vec<ConfigValue>,
) -> AdapterDescription {
    AdapterDescription::new(
        id,
        kind,
        ProtocolConfig {
            id: protocol.to_string(),
            config,
        },
        FormatConfig {
            id: "json".to_string(),
            config: vec![],
        },
        "events",
    )
}

pub fn http_pull(id: &str, url: &str, interval_ms: u64) -> AdapterDescription {
    description(
        id,
        AdapterKind::Pull,
        "http",
        vec![
            ConfigValue::new("url", url),
            ConfigValue::new("interval", interval_ms.to_string()),
            ConfigValue::new("interval_unit", "ms"),
        ],
    )
}

pub fn with_parser(mut d: AdapterDescription, id: &str, config: Vec<ConfigValue>) -> AdapterDescription {
    d.parser = ParserConfig {
        id: id.to_string(),
        config,
    };
    d
}

/// Receive `n` envelopes or fail after `limit`.
pub async fn recv_n(rx: &mut mpsc::Receiver<Envelope>, n: usize, limit: Duration) -> Vec<Envelope> {
    tokio::time::timeout(limit, async {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            match rx.recv().await {
                Some(envelope) => out.push(envelope),
                None => break,
            }
        }
        out
    })
    .await
    .expect("timed out waiting for events")
}

/// Poll `check` until it holds or `limit` elapses.
pub async fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
