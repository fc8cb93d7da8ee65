//! Framing parsers: newline-delimited, JSON array document, length-prefixed

use super::stream::DataStream;
use super::traits::{strip_bom, FormatError, Parser};
use crate::model::{get_path, ConfigExtractor, ConfigurationError};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt};

const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;
const DEFAULT_MAX_DOCUMENT_BYTES: usize = 64 * 1024 * 1024;

/// One record per line. Blank lines are skipped.
#[derive(Debug, Clone)]
pub struct LineParser {
    skip_header: bool,
    max_record_bytes: usize,
}

impl LineParser {
    pub fn new() -> Self {
        Self {
            skip_header: false,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    /// Drop the first line of every stream (e.g. a CSV header row).
    pub fn with_skip_header(mut self, skip: bool) -> Self {
        self.skip_header = skip;
        self
    }

    pub fn with_max_record_bytes(mut self, max: usize) -> Self {
        self.max_record_bytes = max;
        self
    }

    pub fn from_config(config: &ConfigExtractor<'_>) -> Result<Self, ConfigurationError> {
        Ok(Self::new()
            .with_skip_header(config.flag("skip_header", false)?)
            .with_max_record_bytes(
                config
                    .optional_numeric("max_record_bytes")?
                    .unwrap_or(DEFAULT_MAX_RECORD_BYTES),
            ))
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Parser for LineParser {
    fn id(&self) -> &str {
        "lines"
    }

    async fn next_batch(&self, stream: &mut DataStream) -> Result<Option<Vec<Vec<u8>>>, FormatError> {
        loop {
            let mut line = Vec::new();
            // Room for a CRLF terminator after a full-length record.
            let limit = self.max_record_bytes as u64 + 2;
            let read = AsyncReadExt::take(stream.reader(), limit)
                .read_until(b'\n', &mut line)
                .await?;
            if read == 0 {
                return Ok(None);
            }

            if line.last() == Some(&b'\n') {
                line.pop();
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.len() > self.max_record_bytes {
                return Err(FormatError::RecordTooLarge {
                    limit: self.max_record_bytes,
                });
            }

            let index = stream.next_frame_index();
            if self.skip_header && index == 0 {
                continue;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(vec![line]));
        }
    }
}

/// A single JSON document holding an array of records.
///
/// With `key` set, the array is looked up at that dotted path inside a
/// top-level object. A bare object document is treated as one record.
#[derive(Debug, Clone)]
pub struct JsonArrayParser {
    key: Option<String>,
    max_bytes: usize,
}

impl JsonArrayParser {
    pub fn new() -> Self {
        Self {
            key: None,
            max_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn from_config(config: &ConfigExtractor<'_>) -> Result<Self, ConfigurationError> {
        Ok(Self {
            key: config.optional("key").map(str::to_string),
            max_bytes: config
                .optional_numeric("max_bytes")?
                .unwrap_or(DEFAULT_MAX_DOCUMENT_BYTES),
        })
    }

    fn select<'a>(&self, document: &'a Value) -> Result<&'a Value, FormatError> {
        match &self.key {
            None => Ok(document),
            Some(key) => document
                .as_object()
                .and_then(|obj| get_path(obj, key))
                .ok_or_else(|| FormatError::Framing(format!("key '{}' not found in document", key))),
        }
    }
}

impl Default for JsonArrayParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Parser for JsonArrayParser {
    fn id(&self) -> &str {
        "json_array"
    }

    async fn next_batch(&self, stream: &mut DataStream) -> Result<Option<Vec<Vec<u8>>>, FormatError> {
        if stream.frames_read() > 0 {
            return Ok(None);
        }
        let mut document = Vec::new();
        AsyncReadExt::take(stream.reader(), self.max_bytes as u64 + 1)
            .read_to_end(&mut document)
            .await?;
        stream.next_frame_index();

        if document.len() > self.max_bytes {
            return Err(FormatError::RecordTooLarge {
                limit: self.max_bytes,
            });
        }
        let body = strip_bom(&document);
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let parsed: Value = serde_json::from_slice(body)?;
        let selected = self.select(&parsed)?;
        let records = match selected {
            Value::Array(items) => items
                .iter()
                .map(serde_json::to_vec)
                .collect::<Result<Vec<_>, _>>()?,
            Value::Object(_) => vec![serde_json::to_vec(selected)?],
            _ => return Err(FormatError::Framing("expected a JSON array".to_string())),
        };
        Ok(Some(records))
    }
}

/// Binary framing: a 4-byte big-endian length followed by the payload.
#[derive(Debug, Clone)]
pub struct LengthPrefixedParser {
    max_frame_bytes: usize,
}

impl LengthPrefixedParser {
    pub fn new() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    pub fn from_config(config: &ConfigExtractor<'_>) -> Result<Self, ConfigurationError> {
        Ok(Self {
            max_frame_bytes: config
                .optional_numeric("max_frame_bytes")?
                .unwrap_or(DEFAULT_MAX_RECORD_BYTES),
        })
    }

    /// Frame a payload the way this parser expects it.
    pub fn frame(payload: &[u8]) -> Vec<u8> {
        let mut framed = Vec::with_capacity(payload.len() + 4);
        framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        framed.extend_from_slice(payload);
        framed
    }
}

impl Default for LengthPrefixedParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Parser for LengthPrefixedParser {
    fn id(&self) -> &str {
        "length_prefixed"
    }

    async fn next_batch(&self, stream: &mut DataStream) -> Result<Option<Vec<Vec<u8>>>, FormatError> {
        let mut header = [0u8; 4];
        if stream.reader().read(&mut header[..1]).await? == 0 {
            return Ok(None);
        }
        match stream.reader().read_exact(&mut header[1..]).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(FormatError::Framing(
                    "stream ended inside a frame header".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(header) as usize;
        if len > self.max_frame_bytes {
            return Err(FormatError::RecordTooLarge {
                limit: self.max_frame_bytes,
            });
        }

        let mut payload = vec![0u8; len];
        match stream.reader().read_exact(&mut payload).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(FormatError::Framing(format!(
                    "stream ended inside a {} byte frame",
                    len
                )))
            }
            Err(e) => return Err(e.into()),
        }
        stream.next_frame_index();
        Ok(Some(vec![payload]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(bytes: &[u8]) -> DataStream {
        DataStream::from_bytes(bytes.to_vec())
    }

    #[tokio::test]
    async fn lines_skip_blank_and_strip_crlf() {
        let parser = LineParser::new();
        let mut s = stream(b"a\r\n\n  \nb\nc");
        let records = parser.parse_n_events(&mut s, 10).await.unwrap();
        assert_eq!(records, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[tokio::test]
    async fn lines_return_at_most_n() {
        let parser = LineParser::new();
        let mut s = stream(b"1\n2\n3\n4\n");
        let records = parser.parse_n_events(&mut s, 2).await.unwrap();
        assert_eq!(records.len(), 2);
        let rest = parser.parse_n_events(&mut s, 10).await.unwrap();
        assert_eq!(rest, vec![b"3".to_vec(), b"4".to_vec()]);
    }

    #[tokio::test]
    async fn read_all_drains_json_array() {
        let parser = JsonArrayParser::new();
        let mut s = stream(br#"[{"a":1},{"a":2}]"#);
        let records = parser.read_all(&mut s).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(parser.read_all(&mut s).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lines_skip_header_once_per_stream() {
        let parser = LineParser::new().with_skip_header(true);
        let mut s = stream(b"name,value\nx,1\ny,2\n");
        let records = parser.parse_n_events(&mut s, 10).await.unwrap();
        assert_eq!(records, vec![b"x,1".to_vec(), b"y,2".to_vec()]);
    }

    #[tokio::test]
    async fn oversized_line_is_a_framing_error() {
        let parser = LineParser::new().with_max_record_bytes(4);
        let mut s = stream(b"abcd\nabcdefgh\n");
        assert_eq!(parser.next_batch(&mut s).await.unwrap(), Some(vec![b"abcd".to_vec()]));
        let err = parser.next_batch(&mut s).await.unwrap_err();
        assert!(matches!(err, FormatError::RecordTooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn full_length_line_with_crlf_fits() {
        let parser = LineParser::new().with_max_record_bytes(4);
        let mut s = stream(b"abcd\r\nwxyz\n");
        let records = parser.read_all(&mut s).await.unwrap();
        assert_eq!(records, vec![b"abcd".to_vec(), b"wxyz".to_vec()]);
    }

    #[tokio::test]
    async fn json_array_yields_each_element() {
        let parser = JsonArrayParser::new();
        let mut s = stream(br#"[{"a":1},{"a":2},{"a":3}]"#);
        let records = parser.parse_n_events(&mut s, 2).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], br#"{"a":2}"#.to_vec());
    }

    #[tokio::test]
    async fn json_array_under_key() {
        let parser = JsonArrayParser::new().with_key("data.items");
        let mut s = stream(br#"{"data":{"items":[{"x":true}]}}"#);
        let records = parser.parse_n_events(&mut s, 20).await.unwrap();
        assert_eq!(records, vec![br#"{"x":true}"#.to_vec()]);
    }

    #[tokio::test]
    async fn json_array_missing_key_fails() {
        let parser = JsonArrayParser::new().with_key("items");
        let mut s = stream(br#"{"other":[]}"#);
        assert!(matches!(
            parser.next_batch(&mut s).await,
            Err(FormatError::Framing(_))
        ));
    }

    #[tokio::test]
    async fn length_prefixed_frames() {
        let parser = LengthPrefixedParser::new();
        let mut bytes = LengthPrefixedParser::frame(b"one");
        bytes.extend(LengthPrefixedParser::frame(b"three"));
        let mut s = stream(&bytes);
        let records = parser.parse_n_events(&mut s, 5).await.unwrap();
        assert_eq!(records, vec![b"one".to_vec(), b"three".to_vec()]);
    }

    #[tokio::test]
    async fn truncated_frame_is_a_framing_error() {
        let parser = LengthPrefixedParser::new();
        let mut bytes = LengthPrefixedParser::frame(b"complete");
        bytes.truncate(6);
        let mut s = stream(&bytes);
        assert!(matches!(
            parser.next_batch(&mut s).await,
            Err(FormatError::Framing(_))
        ));
    }

    #[tokio::test]
    async fn partial_header_is_a_framing_error() {
        let parser = LengthPrefixedParser::new();
        let mut bytes = LengthPrefixedParser::frame(b"ok");
        bytes.extend_from_slice(&[0, 0]);
        let mut s = stream(&bytes);
        assert_eq!(parser.next_batch(&mut s).await.unwrap(), Some(vec![b"ok".to_vec()]));
        let err = parser.next_batch(&mut s).await.unwrap_err();
        assert!(matches!(err, FormatError::Framing(msg) if msg.contains("header")));
    }

    #[tokio::test]
    async fn clean_end_after_last_frame() {
        let parser = LengthPrefixedParser::new();
        let mut s = stream(&LengthPrefixedParser::frame(b"only"));
        assert_eq!(parser.read_all(&mut s).await.unwrap(), vec![b"only".to_vec()]);
    }
}
