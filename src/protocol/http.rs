//! HTTP protocols: periodic GET (`http`) and a long-lived response body
//! (`http_stream`)

use super::traits::{
    interval_parameters, polling_from_config, ConfigParameter, ParameterKind, Protocol,
    ProtocolDescriptor, ProtocolError, ProtocolProvider, SourceMode,
};
use crate::config::HttpSettings;
use crate::format::{strip_bom, DataStream, Format, Parser};
use crate::model::{
    AdapterKind, ConfigExtractor, ConfigurationError, PollingSettings, ProtocolConfig,
};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::{debug, warn};

/// Buffer between the response reader task and the parser.
const STREAM_BUFFER_BYTES: usize = 64 * 1024;

fn parse_url(config: &ConfigExtractor<'_>) -> Result<Url, ConfigurationError> {
    let raw = config.single_value("url")?;
    let invalid = || ConfigurationError::Invalid {
        key: "url".to_string(),
        value: raw.to_string(),
        expected: "http(s) url",
    };
    let url = Url::parse(raw).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(invalid()),
    }
}

fn url_parameter() -> ConfigParameter {
    ConfigParameter::required(
        "url",
        "URL",
        "Endpoint to request, including scheme.",
        ParameterKind::FreeText,
    )
}

async fn send(client: &Client, url: &Url) -> Result<reqwest::Response, ProtocolError> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProtocolError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

// === http ===

/// One GET per fetch; the whole body is one stream.
pub struct HttpPullProtocol {
    url: Url,
    polling: PollingSettings,
    client: Client,
    parser: Arc<dyn Parser>,
    format: Arc<dyn Format>,
}

#[async_trait]
impl Protocol for HttpPullProtocol {
    fn id(&self) -> &str {
        "http"
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Pull(self.polling)
    }

    fn parser(&self) -> &dyn Parser {
        self.parser.as_ref()
    }

    fn format(&self) -> &dyn Format {
        self.format.as_ref()
    }

    async fn get_data_from_endpoint(&self) -> Result<DataStream, ProtocolError> {
        let body = send(&self.client, &self.url).await?.bytes().await?;
        debug!(url = %self.url, bytes = body.len(), "fetched body");
        Ok(DataStream::from_bytes(strip_bom(&body).to_vec()))
    }
}

pub struct HttpPullProvider {
    client: Client,
}

impl HttpPullProvider {
    pub fn new(settings: &HttpSettings) -> Result<Self, ProtocolError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }
}

impl ProtocolProvider for HttpPullProvider {
    fn id(&self) -> &str {
        "http"
    }

    fn declare_model(&self) -> ProtocolDescriptor {
        let mut parameters = vec![url_parameter()];
        parameters.extend(interval_parameters());
        ProtocolDescriptor {
            id: "http".to_string(),
            label: "HTTP".to_string(),
            description: "Periodically requests a resource over HTTP(S).".to_string(),
            kinds: vec![AdapterKind::Pull],
            parameters,
        }
    }

    fn get_instance(
        &self,
        config: &ProtocolConfig,
        parser: Arc<dyn Parser>,
        format: Arc<dyn Format>,
    ) -> Result<Arc<dyn Protocol>, ConfigurationError> {
        let extractor = ConfigExtractor::new(&config.config);
        let url = parse_url(&extractor)?;
        let polling = polling_from_config(&extractor)?
            .ok_or_else(|| ConfigurationError::Missing("interval".to_string()))?;
        Ok(Arc::new(HttpPullProtocol {
            url,
            polling,
            client: self.client.clone(),
            parser,
            format,
        }))
    }
}

// === http_stream ===

/// A single request whose response body is consumed as it arrives.
pub struct HttpStreamProtocol {
    url: Url,
    client: Client,
    parser: Arc<dyn Parser>,
    format: Arc<dyn Format>,
}

#[async_trait]
impl Protocol for HttpStreamProtocol {
    fn id(&self) -> &str {
        "http_stream"
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Stream
    }

    fn parser(&self) -> &dyn Parser {
        self.parser.as_ref()
    }

    fn format(&self) -> &dyn Format {
        self.format.as_ref()
    }

    async fn get_data_from_endpoint(&self) -> Result<DataStream, ProtocolError> {
        let mut response = send(&self.client, &self.url).await?;
        let (reader, mut writer) = tokio::io::duplex(STREAM_BUFFER_BYTES);
        let url = self.url.to_string();

        let feeder = tokio::spawn(async move {
            let mut first = true;
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        let bytes: &[u8] = if first { strip_bom(&chunk) } else { &chunk };
                        first = false;
                        if writer.write_all(bytes).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(url = %url, "stream closed by server");
                        break;
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "stream read failed");
                        break;
                    }
                }
            }
        });

        Ok(DataStream::from_reader(BufReader::new(reader)).with_feeder(feeder))
    }
}

pub struct HttpStreamProvider {
    client: Client,
}

impl HttpStreamProvider {
    /// The request timeout is not applied: the body is expected to stay open.
    pub fn new(settings: &HttpSettings) -> Result<Self, ProtocolError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }
}

impl ProtocolProvider for HttpStreamProvider {
    fn id(&self) -> &str {
        "http_stream"
    }

    fn declare_model(&self) -> ProtocolDescriptor {
        ProtocolDescriptor {
            id: "http_stream".to_string(),
            label: "HTTP Stream".to_string(),
            description: "Consumes a continuously-delivered HTTP response body.".to_string(),
            kinds: vec![AdapterKind::Stream],
            parameters: vec![url_parameter()],
        }
    }

    fn get_instance(
        &self,
        config: &ProtocolConfig,
        parser: Arc<dyn Parser>,
        format: Arc<dyn Format>,
    ) -> Result<Arc<dyn Protocol>, ConfigurationError> {
        let url = parse_url(&ConfigExtractor::new(&config.config))?;
        Ok(Arc::new(HttpStreamProtocol {
            url,
            client: self.client.clone(),
            parser,
            format,
        }))
    }
}
