//! Delimited-row (CSV) format
//!
//! One record is one row. Column names come from the configured `header`;
//! without one, columns are named `field_1`, `field_2`, ... Cell values are
//! coerced to boolean, integer, or float when they parse as such.

use super::traits::{Format, FormatError};
use crate::model::{ConfigExtractor, ConfigurationError, RawEvent};
use serde_json::{Number, Value};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CsvFormat {
    delimiter: u8,
    header: Option<Vec<String>>,
}

impl CsvFormat {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            header: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn from_config(config: &ConfigExtractor<'_>) -> Result<Self, ConfigurationError> {
        let mut format = Self::new();
        if let Some(raw) = config.optional("delimiter") {
            let delimiter = match raw {
                "\\t" | "tab" => b'\t',
                d if d.len() == 1 => d.as_bytes()[0],
                other => {
                    return Err(ConfigurationError::Invalid {
                        key: "delimiter".to_string(),
                        value: other.to_string(),
                        expected: "single-byte delimiter",
                    })
                }
            };
            format = format.with_delimiter(delimiter);
        }
        if let Some(header) = config.optional("header") {
            let delimiter = format.delimiter as char;
            format = format.with_header(header.split(delimiter).map(str::trim));
        }
        Ok(format)
    }

    fn column_name(&self, index: usize) -> String {
        match &self.header {
            Some(columns) => columns[index].clone(),
            None => format!("field_{}", index + 1),
        }
    }
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self::new()
    }
}

fn coerce(cell: &str) -> Value {
    if cell.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(cell.to_string())
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl Format for CsvFormat {
    fn id(&self) -> &str {
        "csv"
    }

    fn parse(&self, record: &[u8]) -> Result<RawEvent, FormatError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .from_reader(record);

        let row = match reader.records().next() {
            Some(row) => row?,
            None => return Err(FormatError::Empty),
        };

        if let Some(columns) = &self.header {
            if columns.len() != row.len() {
                return Err(FormatError::ColumnCount {
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }

        let mut event = RawEvent::new();
        for (index, cell) in row.iter().enumerate() {
            let name = self.column_name(index);
            let cell = cell.trim();
            if cell.is_empty() {
                debug!(field = %name, "skipping empty field");
                continue;
            }
            event.insert(name, coerce(cell));
        }
        Ok(event)
    }

    fn encode(&self, event: &RawEvent) -> Result<Vec<u8>, FormatError> {
        let cells: Vec<String> = match &self.header {
            Some(columns) => columns
                .iter()
                .map(|c| event.get(c).map(render).unwrap_or_default())
                .collect(),
            None => event.values().map(render).collect(),
        };

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .from_writer(Vec::new());
        writer.write_record(&cells)?;
        let mut bytes = writer
            .into_inner()
            .map_err(|e| FormatError::Framing(e.to_string()))?;

        while bytes.last() == Some(&b'\n') || bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConfigValue;
    use serde_json::json;

    fn format() -> CsvFormat {
        CsvFormat::new().with_header(["sensor", "count", "temp", "ok"])
    }

    #[test]
    fn parses_row_with_coercion() {
        let event = format().parse(b"s1,3,21.5,true").unwrap();
        assert_eq!(event.get("sensor"), Some(&json!("s1")));
        assert_eq!(event.get("count"), Some(&json!(3)));
        assert_eq!(event.get("temp"), Some(&json!(21.5)));
        assert_eq!(event.get("ok"), Some(&json!(true)));
    }

    #[test]
    fn positional_names_without_header() {
        let event = CsvFormat::new().parse(b"a,b").unwrap();
        assert_eq!(event.get("field_1"), Some(&json!("a")));
        assert_eq!(event.get("field_2"), Some(&json!("b")));
    }

    #[test]
    fn column_count_mismatch_is_an_error() {
        assert!(matches!(
            format().parse(b"s1,3"),
            Err(FormatError::ColumnCount { expected: 4, found: 2 })
        ));
    }

    #[test]
    fn empty_cells_are_skipped() {
        let event = format().parse(b"s1,,21.5,false").unwrap();
        assert!(!event.contains_key("count"));
    }

    #[test]
    fn round_trip_preserves_primitive_values() {
        let original = json!({"sensor": "pump 7", "count": 42, "temp": 21.25, "ok": false})
            .as_object()
            .cloned()
            .unwrap();
        let f = format();
        let encoded = f.encode(&original).unwrap();
        assert_eq!(f.parse(&encoded).unwrap(), original);
    }

    #[test]
    fn config_reads_delimiter_and_header() {
        let values = vec![
            ConfigValue::new("delimiter", ";"),
            ConfigValue::new("header", "a; b"),
        ];
        let f = CsvFormat::from_config(&ConfigExtractor::new(&values)).unwrap();
        let event = f.parse(b"1;x").unwrap();
        assert_eq!(event.get("b"), Some(&json!("x")));

        let bad = vec![ConfigValue::new("delimiter", "::")];
        assert!(CsvFormat::from_config(&ConfigExtractor::new(&bad)).is_err());
    }
}
