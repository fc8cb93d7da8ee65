//! Pull scheduling and stream reading loops
//!
//! Each running adapter owns exactly one of these loops in its own task.
//! Ticks are strictly sequential: a slow tick delays the next one instead
//! of overlapping it.

use super::cancel::CancellationToken;
use super::ingest::IngestContext;
use crate::format::FormatError;
use crate::model::PollingSettings;
use crate::protocol::ProtocolError;
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Scheduling state of one adapter run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    /// Waiting for the next tick
    Scheduled,
    /// A tick or stream read is in progress
    Running,
}

#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub fn set(&self, state: SchedulerState) {
        let raw = match state {
            SchedulerState::Idle => 0,
            SchedulerState::Scheduled => 1,
            SchedulerState::Running => 2,
        };
        self.0.store(raw, Ordering::SeqCst);
    }

    pub fn get(&self) -> SchedulerState {
        match self.0.load(Ordering::SeqCst) {
            1 => SchedulerState::Scheduled,
            2 => SchedulerState::Running,
            _ => SchedulerState::Idle,
        }
    }
}

/// A failed poll. Logged and counted; scheduling continues.
#[derive(Debug, Error)]
pub(crate) enum TickError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] ProtocolError),

    #[error("framing failed: {0}")]
    Framing(#[from] FormatError),
}

async fn tick(ctx: &IngestContext) -> Result<(), TickError> {
    ctx.stats.record_tick();
    let mut stream = ctx.protocol.get_data_from_endpoint().await?;
    ctx.drain(&mut stream, None).await?;
    Ok(())
}

/// Poll at a fixed cadence until cancelled. The first tick fires immediately.
pub(crate) async fn run_pull(
    ctx: IngestContext,
    polling: PollingSettings,
    token: CancellationToken,
    state: &StateCell,
) {
    let mut ticker = tokio::time::interval(polling.as_duration());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        adapter_id = %ctx.adapter_id,
        interval_ms = polling.as_duration().as_millis() as u64,
        "pull adapter scheduled"
    );

    loop {
        state.set(SchedulerState::Scheduled);
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        state.set(SchedulerState::Running);
        if let Err(e) = tick(&ctx).await {
            warn!(adapter_id = %ctx.adapter_id, error = %e, "tick failed");
            ctx.stats.record_failed_tick(&e.to_string());
        }
        if token.is_cancelled() {
            break;
        }
    }

    state.set(SchedulerState::Idle);
    info!(adapter_id = %ctx.adapter_id, "pull adapter stopped");
}

/// Open the stream once and read it until it ends or the token fires.
pub(crate) async fn run_stream(ctx: IngestContext, token: CancellationToken, state: &StateCell) {
    state.set(SchedulerState::Running);
    ctx.stats.record_tick();

    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        opened = ctx.protocol.get_data_from_endpoint() => Some(opened),
    };

    match opened {
        None => {}
        Some(Err(e)) => {
            error!(adapter_id = %ctx.adapter_id, error = %e, "stream could not be opened");
            ctx.stats.record_failed_tick(&e.to_string());
        }
        Some(Ok(mut stream)) => {
            info!(adapter_id = %ctx.adapter_id, "stream opened");
            match ctx.drain(&mut stream, Some(&token)).await {
                Ok(()) if token.is_cancelled() => {}
                Ok(()) => info!(adapter_id = %ctx.adapter_id, "stream ended"),
                Err(e) => {
                    error!(adapter_id = %ctx.adapter_id, error = %e, "stream framing failed");
                    ctx.stats.record_failed_tick(&e.to_string());
                }
            }
        }
    }

    state.set(SchedulerState::Idle);
    info!(adapter_id = %ctx.adapter_id, "stream adapter finished");
}
