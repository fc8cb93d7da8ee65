//! Parser and Format contracts

use super::stream::DataStream;
use crate::model::{EventSchema, RawEvent};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from framing or decoding a record.
///
/// In batch paths a decode error is non-propagating: the record is skipped
/// and its siblings are still processed.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("io error while reading stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("record exceeds {limit} bytes")]
    RecordTooLarge { limit: usize },

    #[error("framing error: {0}")]
    Framing(String),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("record is not an object")]
    NotAnObject,

    #[error("record has {found} columns, expected {expected}")]
    ColumnCount { expected: usize, found: usize },

    #[error("empty record")]
    Empty,
}

/// Splits a byte stream into raw records.
#[async_trait]
pub trait Parser: Send + Sync {
    /// Stable identifier used in adapter descriptions
    fn id(&self) -> &str;

    /// Read the next framing unit.
    ///
    /// Returns one or more records, or `None` once the stream is exhausted.
    async fn next_batch(&self, stream: &mut DataStream) -> Result<Option<Vec<Vec<u8>>>, FormatError>;

    /// Read at most `n` records. Fewer are returned if the stream ends first.
    async fn parse_n_events(
        &self,
        stream: &mut DataStream,
        n: usize,
    ) -> Result<Vec<Vec<u8>>, FormatError> {
        let mut records = Vec::new();
        while records.len() < n {
            match self.next_batch(stream).await? {
                Some(batch) => records.extend(batch),
                None => break,
            }
        }
        records.truncate(n);
        Ok(records)
    }

    /// Read every remaining record.
    async fn read_all(&self, stream: &mut DataStream) -> Result<Vec<Vec<u8>>, FormatError> {
        let mut records = Vec::new();
        while let Some(batch) = self.next_batch(stream).await? {
            records.extend(batch);
        }
        Ok(records)
    }
}

/// Decodes one record into a field mapping.
pub trait Format: Send + Sync {
    /// Stable identifier used in adapter descriptions
    fn id(&self) -> &str;

    /// Decode one record.
    fn parse(&self, record: &[u8]) -> Result<RawEvent, FormatError>;

    /// Encode an event back into this format's record representation.
    fn encode(&self, event: &RawEvent) -> Result<Vec<u8>, FormatError>;

    /// Infer a schema from raw records using the encoding's native types.
    ///
    /// Any undecodable record fails the whole call.
    fn event_schema(&self, records: &[Vec<u8>]) -> Result<EventSchema, FormatError> {
        let events = records
            .iter()
            .map(|r| self.parse(r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EventSchema::infer(&events))
    }
}

/// Strip a leading UTF-8 byte order mark.
pub(crate) fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
}
