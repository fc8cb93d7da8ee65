//! Decode framed records and push them through the pipeline

use super::cancel::CancellationToken;
use super::stats::AdapterStats;
use crate::format::{DataStream, FormatError};
use crate::model::AdapterId;
use crate::pipeline::{AdapterPipeline, PipelineOutcome};
use crate::protocol::Protocol;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything one adapter task needs to turn bytes into delivered events.
#[derive(Clone)]
pub(crate) struct IngestContext {
    pub adapter_id: AdapterId,
    pub protocol: Arc<dyn Protocol>,
    pub pipeline: Arc<AdapterPipeline>,
    pub stats: Arc<AdapterStats>,
}

impl IngestContext {
    /// Decode and process one framed batch. Bad records are skipped.
    pub async fn process_batch(&self, records: Vec<Vec<u8>>) {
        let format = self.protocol.format();
        for record in records {
            let event = match format.parse(&record) {
                Ok(event) => event,
                Err(e) => {
                    warn!(adapter_id = %self.adapter_id, error = %e, "skipping undecodable record");
                    self.stats.record_skipped(&e.to_string());
                    continue;
                }
            };
            self.stats.record_decoded();

            let outcome = self.pipeline.process(event).await;
            if let PipelineOutcome::Failed(e) = &outcome {
                warn!(adapter_id = %self.adapter_id, error = %e, "event not delivered");
            }
            self.stats.record_outcome(&outcome);
        }
    }

    /// Read batches until the stream ends or `until` is cancelled.
    ///
    /// A framing error ends the read; records already processed stay delivered.
    pub async fn drain(
        &self,
        stream: &mut DataStream,
        until: Option<&CancellationToken>,
    ) -> Result<(), FormatError> {
        let parser = self.protocol.parser();
        loop {
            let batch = match until {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(adapter_id = %self.adapter_id, "read interrupted by stop");
                        return Ok(());
                    }
                    batch = parser.next_batch(stream) => batch?,
                },
                None => parser.next_batch(stream).await?,
            };
            match batch {
                Some(records) => self.process_batch(records).await,
                None => return Ok(()),
            }
        }
    }
}
