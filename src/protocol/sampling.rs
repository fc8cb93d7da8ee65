//! Sampling a source for preview and schema guessing

use super::traits::{Protocol, ProtocolError, SourceMode};
use crate::format::{DataStream, FormatError, Parser};
use crate::guess::SchemaGuesser;
use crate::model::{GuessSchema, RawEvent};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Upper bound on how long a live stream is read while sampling.
pub const SAMPLE_TIMEOUT: Duration = Duration::from_secs(10);

async fn sample_records<P: Protocol + ?Sized>(
    protocol: &P,
    n: usize,
) -> Result<Vec<Vec<u8>>, ProtocolError> {
    let mut stream = protocol.get_data_from_endpoint().await?;
    let records = match protocol.mode() {
        SourceMode::Pull(_) => protocol.parser().parse_n_events(&mut stream, n).await?,
        SourceMode::Stream => sample_live(protocol.parser(), &mut stream, n).await?,
    };
    if records.len() < n {
        warn!(
            protocol = protocol.id(),
            requested = n,
            available = records.len(),
            "source yielded fewer records than requested"
        );
    }
    Ok(records)
}

/// Read from a live stream until `n` records arrive, it closes, or the
/// sample window elapses.
async fn sample_live(
    parser: &dyn Parser,
    stream: &mut DataStream,
    n: usize,
) -> Result<Vec<Vec<u8>>, FormatError> {
    let deadline = Instant::now() + SAMPLE_TIMEOUT;
    let mut records = Vec::new();
    while records.len() < n {
        match tokio::time::timeout_at(deadline, parser.next_batch(stream)).await {
            Ok(Ok(Some(batch))) => records.extend(batch),
            Ok(Ok(None)) => break,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                debug!(collected = records.len(), "sample window elapsed");
                break;
            }
        }
    }
    records.truncate(n);
    Ok(records)
}

/// Decode up to `n` records, skipping any that fail to decode.
pub async fn n_elements<P: Protocol + ?Sized>(
    protocol: &P,
    n: usize,
) -> Result<Vec<RawEvent>, ProtocolError> {
    let records = sample_records(protocol, n).await?;
    let format = protocol.format();
    let mut events = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match format.parse(record) {
            Ok(event) => events.push(event),
            Err(e) => warn!(protocol = protocol.id(), index, error = %e, "skipping malformed record"),
        }
    }
    Ok(events)
}

/// Fetch a sample and infer its schema.
///
/// A short sample is padded by repeating the records that did arrive, and
/// the result is marked degraded. Zero records yields an empty schema.
pub async fn guess_schema<P: Protocol + ?Sized>(
    protocol: &P,
    sample_size: usize,
) -> Result<GuessSchema, ProtocolError> {
    let records = sample_records(protocol, sample_size).await?;
    let format = protocol.format();

    let padded: Vec<Vec<u8>> = records.iter().cycle().take(sample_size).cloned().collect();
    let event_schema = format.event_schema(&padded)?;

    let samples = records
        .iter()
        .map(|r| format.parse(r))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SchemaGuesser::guess(event_schema, samples, sample_size))
}
