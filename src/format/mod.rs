//! Format/Parser layer
//!
//! A `Parser` frames a byte stream into raw records; a `Format` decodes one
//! record into a `RawEvent`. Both are stateless: per-stream position lives in
//! the `DataStream`, so one parser instance can serve any number of streams.

mod delimited;
mod framing;
mod json;
mod registry;
mod stream;
mod traits;

pub use delimited::CsvFormat;
pub use framing::{JsonArrayParser, LengthPrefixedParser, LineParser};
pub use json::JsonFormat;
pub use registry::{FormatFactory, FormatRegistry, ParserFactory};
pub use stream::DataStream;
pub use traits::{Format, FormatError, Parser};
pub(crate) use traits::strip_bom;
