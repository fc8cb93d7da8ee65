//! In-memory protocol and provider used by unit tests

use crate::format::{DataStream, Format, JsonFormat, LineParser, Parser};
use crate::model::{AdapterKind, ConfigExtractor, ConfigurationError, PollingSettings, ProtocolConfig};
use crate::protocol::{Protocol, ProtocolDescriptor, ProtocolError, ProtocolProvider, SourceMode};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};

/// Serves a fixed body as JSON lines. Optionally fails its first fetches.
pub(crate) struct StaticProtocol {
    mode: SourceMode,
    body: Vec<u8>,
    hold_open: bool,
    hang: bool,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
    parser: Arc<dyn Parser>,
    format: Arc<dyn Format>,
}

impl StaticProtocol {
    fn build(mode: SourceMode, body: Vec<u8>, hold_open: bool) -> Self {
        Self {
            mode,
            body,
            hold_open,
            hang: false,
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            parser: Arc::new(LineParser::new()),
            format: Arc::new(JsonFormat::new()),
        }
    }

    /// Pull source polled every second.
    pub fn pull(body: Vec<u8>) -> Self {
        Self::build(SourceMode::Pull(PollingSettings::seconds(1).unwrap()), body, false)
    }

    /// Pull source with a custom cadence.
    pub fn pull_every(body: Vec<u8>, polling: PollingSettings) -> Self {
        Self::build(SourceMode::Pull(polling), body, false)
    }

    /// Stream source that closes after the body.
    pub fn stream(body: Vec<u8>) -> Self {
        Self::build(SourceMode::Stream, body, false)
    }

    /// Stream source that stays open after the body.
    pub fn open_stream(body: Vec<u8>) -> Self {
        Self::build(SourceMode::Stream, body, true)
    }

    pub fn failing_first(self, failures: usize) -> Self {
        self.failures_left.store(failures, Ordering::SeqCst);
        self
    }

    /// Every fetch blocks forever.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn with_codec(mut self, parser: Arc<dyn Parser>, format: Arc<dyn Format>) -> Self {
        self.parser = parser;
        self.format = format;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Provider id `static`: pull every second unless `mode` is `stream` or
/// `open_stream`.
pub(crate) struct StaticProvider {
    pub body: Vec<u8>,
}

impl ProtocolProvider for StaticProvider {
    fn id(&self) -> &str {
        "static"
    }

    fn declare_model(&self) -> ProtocolDescriptor {
        ProtocolDescriptor {
            id: "static".to_string(),
            label: "Static".to_string(),
            description: "Fixed in-memory body".to_string(),
            kinds: vec![AdapterKind::Pull, AdapterKind::Stream],
            parameters: vec![],
        }
    }

    fn get_instance(
        &self,
        config: &ProtocolConfig,
        parser: Arc<dyn Parser>,
        format: Arc<dyn Format>,
    ) -> Result<Arc<dyn Protocol>, ConfigurationError> {
        let body = self.body.clone();
        let protocol = match ConfigExtractor::new(&config.config).optional("mode") {
            Some("stream") => StaticProtocol::stream(body),
            Some("open_stream") => StaticProtocol::open_stream(body),
            _ => StaticProtocol::pull(body),
        };
        Ok(Arc::new(protocol.with_codec(parser, format)))
    }
}

#[async_trait]
impl Protocol for StaticProtocol {
    fn id(&self) -> &str {
        "static"
    }

    fn mode(&self) -> SourceMode {
        self.mode
    }

    fn parser(&self) -> &dyn Parser {
        self.parser.as_ref()
    }

    fn format(&self) -> &dyn Format {
        self.format.as_ref()
    }

    async fn get_data_from_endpoint(&self) -> Result<DataStream, ProtocolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProtocolError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "endpoint unavailable",
            )));
        }

        if !self.hold_open {
            return Ok(DataStream::from_bytes(self.body.clone()));
        }

        let (reader, mut writer) = tokio::io::duplex(64 * 1024);
        let body = self.body.clone();
        let feeder = tokio::spawn(async move {
            if writer.write_all(&body).await.is_ok() {
                std::future::pending::<()>().await;
            }
        });
        Ok(DataStream::from_reader(BufReader::new(reader)).with_feeder(feeder))
    }
}
