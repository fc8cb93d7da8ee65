//! Local file protocol
//!
//! With an `interval` the file is re-read on every tick; without one it is
//! read once as a stream.

use super::traits::{
    interval_parameters, polling_from_config, ConfigParameter, ParameterKind, Protocol,
    ProtocolDescriptor, ProtocolError, ProtocolProvider, SourceMode,
};
use crate::format::{DataStream, Format, Parser};
use crate::model::{AdapterKind, ConfigExtractor, ConfigurationError, PollingSettings, ProtocolConfig};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;

pub struct FileProtocol {
    path: PathBuf,
    polling: Option<PollingSettings>,
    parser: Arc<dyn Parser>,
    format: Arc<dyn Format>,
}

#[async_trait]
impl Protocol for FileProtocol {
    fn id(&self) -> &str {
        "file"
    }

    fn mode(&self) -> SourceMode {
        match self.polling {
            Some(polling) => SourceMode::Pull(polling),
            None => SourceMode::Stream,
        }
    }

    fn parser(&self) -> &dyn Parser {
        self.parser.as_ref()
    }

    fn format(&self) -> &dyn Format {
        self.format.as_ref()
    }

    async fn get_data_from_endpoint(&self) -> Result<DataStream, ProtocolError> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(DataStream::from_reader(BufReader::new(file)))
    }
}

#[derive(Debug, Default)]
pub struct FileProvider;

impl ProtocolProvider for FileProvider {
    fn id(&self) -> &str {
        "file"
    }

    fn declare_model(&self) -> ProtocolDescriptor {
        let mut parameters = vec![ConfigParameter::required(
            "path",
            "Path",
            "File to read.",
            ParameterKind::FreeText,
        )];
        parameters.extend(interval_parameters().into_iter().map(|mut p| {
            p.required = false;
            p
        }));
        ProtocolDescriptor {
            id: "file".to_string(),
            label: "File".to_string(),
            description: "Reads records from a local file, once or on an interval.".to_string(),
            kinds: vec![AdapterKind::Pull, AdapterKind::Stream],
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
        let path = PathBuf::from(extractor.single_value("path")?);
        let polling = polling_from_config(&extractor)?;
        Ok(Arc::new(FileProtocol {
            path,
            polling,
            parser,
            format,
        }))
    }
}
