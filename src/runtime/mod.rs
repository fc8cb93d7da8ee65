//! Adapter runtime: one owned task per running adapter
//!
//! A runtime is created on start and destroyed on stop. Restarting an
//! adapter always builds a new runtime with a new task, token, and run id;
//! nothing from the previous run is reused.

mod cancel;
mod ingest;
mod scheduler;
mod stats;

pub use cancel::CancellationToken;
pub use scheduler::SchedulerState;
pub use stats::{AdapterStats, StatsSnapshot};

use crate::model::{AdapterDescription, AdapterId, AdapterKind};
use crate::pipeline::AdapterPipeline;
use crate::protocol::{Protocol, SourceMode};
use chrono::{DateTime, Utc};
use ingest::IngestContext;
use scheduler::StateCell;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Observable status of a running adapter.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub id: AdapterId,
    pub name: String,
    pub kind: AdapterKind,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub state: SchedulerState,
    pub finished: bool,
    pub stats: StatsSnapshot,
}

/// How a stop completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The task observed the token within the grace period
    Graceful,
    /// The task was still busy after the grace period and was aborted
    Aborted,
}

/// The live state of one started adapter.
pub struct AdapterRuntime {
    description: AdapterDescription,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    stats: Arc<AdapterStats>,
    state: Arc<StateCell>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl AdapterRuntime {
    /// Spawn the adapter's task. Must be called inside a tokio runtime.
    pub fn start(
        description: AdapterDescription,
        protocol: Arc<dyn Protocol>,
        pipeline: AdapterPipeline,
    ) -> Self {
        let run_id = Uuid::new_v4();
        let stats = Arc::new(AdapterStats::new());
        let state = Arc::new(StateCell::default());
        let token = CancellationToken::new();
        let mode = protocol.mode();

        let ctx = IngestContext {
            adapter_id: description.id.clone(),
            protocol,
            pipeline: Arc::new(pipeline),
            stats: stats.clone(),
        };

        let task_token = token.clone();
        let task_state = state.clone();
        let handle = tokio::spawn(async move {
            match mode {
                SourceMode::Pull(polling) => {
                    scheduler::run_pull(ctx, polling, task_token, &task_state).await
                }
                SourceMode::Stream => scheduler::run_stream(ctx, task_token, &task_state).await,
            }
        });

        info!(adapter_id = %description.id, run_id = %run_id, kind = %mode.kind(), "adapter started");
        Self {
            description,
            run_id,
            started_at: Utc::now(),
            stats,
            state,
            token,
            handle,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> SchedulerState {
        self.state.get()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// True once the task has exited on its own (a stream that ended).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            id: self.description.id.clone(),
            name: self.description.name.clone(),
            kind: self.description.kind,
            run_id: self.run_id,
            started_at: self.started_at,
            state: self.state(),
            finished: self.is_finished(),
            stats: self.stats(),
        }
    }

    /// Cancel, wait up to `grace` for the task, then abort it.
    ///
    /// When this returns the task is gone: no tick of this run can start.
    pub async fn stop(mut self, grace: Duration) -> StopOutcome {
        self.token.cancel();
        let outcome = match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(_) => StopOutcome::Graceful,
            Err(_) => {
                self.handle.abort();
                let _ = (&mut self.handle).await;
                self.state.set(SchedulerState::Idle);
                warn!(
                    adapter_id = %self.description.id,
                    grace_ms = grace.as_millis() as u64,
                    "adapter task aborted after grace period"
                );
                StopOutcome::Aborted
            }
        };
        info!(adapter_id = %self.description.id, run_id = %self.run_id, "adapter stopped");
        outcome
    }
}

impl Drop for AdapterRuntime {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{JsonFormat, LineParser};
    use crate::model::{FormatConfig, PollingSettings, ProtocolConfig, TimeUnit};
    use crate::pipeline::{ChannelTransport, Envelope};
    use crate::testing::StaticProtocol;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, Instant};

    const GRACE: Duration = Duration::from_secs(2);

    fn body(n: usize) -> Vec<u8> {
        (0..n)
            .map(|i| format!("{{\"n\":{i}}}\n"))
            .collect::<String>()
            .into_bytes()
    }

    fn description(kind: AdapterKind) -> AdapterDescription {
        AdapterDescription::new(
            "a1",
            kind,
            ProtocolConfig {
                id: "static".into(),
                config: vec![],
            },
            FormatConfig {
                id: "json".into(),
                config: vec![],
            },
            "events",
        )
    }

    fn start(
        kind: AdapterKind,
        protocol: Arc<StaticProtocol>,
    ) -> (AdapterRuntime, mpsc::Receiver<Envelope>) {
        let (transport, rx) = ChannelTransport::new(1024);
        let desc = description(kind);
        let pipeline = AdapterPipeline::for_adapter(&desc, Arc::new(transport)).unwrap();
        (AdapterRuntime::start(desc, protocol, pipeline), rx)
    }

    // === Scenario: pull scheduling ===

    #[tokio::test(start_paused = true)]
    async fn failing_first_tick_does_not_stop_later_ticks() {
        let protocol = Arc::new(StaticProtocol::pull(body(2)).failing_first(1));
        let (runtime, _rx) = start(AdapterKind::Pull, protocol.clone());

        sleep(Duration::from_millis(3500)).await;

        assert_eq!(protocol.calls(), 4);
        let stats = runtime.stats();
        assert_eq!(stats.ticks, 4);
        assert_eq!(stats.failed_ticks, 1);
        assert_eq!(stats.events_delivered, 6);
        assert!(stats.last_error.unwrap().contains("endpoint unavailable"));

        runtime.stop(GRACE).await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_fires_immediately() {
        let protocol = Arc::new(StaticProtocol::pull_every(
            body(1),
            PollingSettings::new(1, TimeUnit::Hours).unwrap(),
        ));
        let (runtime, mut rx) = start(AdapterKind::Pull, protocol.clone());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.topic, "events");
        assert_eq!(protocol.calls(), 1);
        runtime.stop(GRACE).await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_sleeping_tick_immediately() {
        let protocol = Arc::new(StaticProtocol::pull(body(1)));
        let (runtime, _rx) = start(AdapterKind::Pull, protocol.clone());
        sleep(Duration::from_millis(100)).await;

        let before = Instant::now();
        assert_eq!(runtime.stop(GRACE).await, StopOutcome::Graceful);
        assert!(before.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_gets_a_fresh_run_and_old_run_stays_silent() {
        let protocol = Arc::new(StaticProtocol::pull(body(1)));
        let (first, _rx1) = start(AdapterKind::Pull, protocol.clone());
        let first_run = first.run_id();
        sleep(Duration::from_millis(1500)).await;
        first.stop(GRACE).await;
        assert_eq!(protocol.calls(), 2);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(protocol.calls(), 2);

        let (second, _rx2) = start(AdapterKind::Pull, protocol.clone());
        assert_ne!(second.run_id(), first_run);
        sleep(Duration::from_millis(500)).await;
        assert_eq!(protocol.calls(), 3);
        second.stop(GRACE).await;
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_tick_is_aborted_after_grace() {
        let protocol = Arc::new(StaticProtocol::pull(body(1)).hanging());
        let (runtime, _rx) = start(AdapterKind::Pull, protocol.clone());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(runtime.state(), SchedulerState::Running);

        let before = Instant::now();
        assert_eq!(runtime.stop(GRACE).await, StopOutcome::Aborted);
        assert!(before.elapsed() >= GRACE);
    }

    /// One good line, then one longer than the 16-byte record limit.
    fn with_oversized_line(protocol: StaticProtocol) -> StaticProtocol {
        protocol.with_codec(
            Arc::new(LineParser::new().with_max_record_bytes(16)),
            Arc::new(JsonFormat::new()),
        )
    }

    const OVERSIZED: &[u8] = b"{\"n\":1}\n{\"n\":\"far too long for the limit\"}\n";

    #[tokio::test(start_paused = true)]
    async fn framing_failure_fails_the_tick_but_keeps_scheduling() {
        let protocol = Arc::new(with_oversized_line(StaticProtocol::pull(OVERSIZED.to_vec())));
        let (runtime, _rx) = start(AdapterKind::Pull, protocol.clone());

        sleep(Duration::from_millis(2500)).await;

        assert_eq!(protocol.calls(), 3);
        let stats = runtime.stats();
        assert_eq!(stats.failed_ticks, 3);
        assert_eq!(stats.events_delivered, 3);
        assert!(stats.last_error.unwrap().contains("framing failed"));
        assert!(!runtime.is_finished());
        assert_eq!(runtime.state(), SchedulerState::Scheduled);

        runtime.stop(GRACE).await;
    }

    // === Scenario: streams ===

    #[tokio::test]
    async fn framing_failure_ends_a_stream() {
        let protocol = Arc::new(with_oversized_line(StaticProtocol::open_stream(OVERSIZED.to_vec())));
        let (runtime, mut rx) = start(AdapterKind::Stream, protocol);

        rx.recv().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !runtime.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        let stats = runtime.stats();
        assert_eq!(stats.failed_ticks, 1);
        assert_eq!(stats.events_delivered, 1);
        assert_eq!(runtime.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn finite_stream_delivers_then_finishes() {
        let protocol = Arc::new(StaticProtocol::stream(body(3)));
        let (runtime, mut rx) = start(AdapterKind::Stream, protocol);

        for _ in 0..3 {
            rx.recv().await.unwrap();
        }
        tokio::time::timeout(Duration::from_secs(1), async {
            while !runtime.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(runtime.state(), SchedulerState::Idle);
        assert_eq!(runtime.stats().events_delivered, 3);
    }

    #[tokio::test]
    async fn open_stream_stops_on_cancel() {
        let protocol = Arc::new(StaticProtocol::open_stream(body(2)));
        let (runtime, mut rx) = start(AdapterKind::Stream, protocol);
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        assert!(!runtime.is_finished());
        assert_eq!(runtime.stop(GRACE).await, StopOutcome::Graceful);
    }

    #[tokio::test]
    async fn undecodable_records_are_skipped() {
        let protocol = Arc::new(StaticProtocol::stream(b"{\"n\":1}\nnope\n{\"n\":2}\n".to_vec()));
        let (runtime, mut rx) = start(AdapterKind::Stream, protocol);
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        while !runtime.is_finished() {
            tokio::task::yield_now().await;
        }
        let stats = runtime.stats();
        assert_eq!(stats.records_skipped, 1);
        assert_eq!(stats.events_delivered, 2);
    }
}
