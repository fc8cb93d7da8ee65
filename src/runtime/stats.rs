//! Per-adapter counters: the non-propagating error channel

use crate::pipeline::PipelineOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Live counters, shared between an adapter's task and its observers.
#[derive(Debug, Default)]
pub struct AdapterStats {
    ticks: AtomicU64,
    failed_ticks: AtomicU64,
    records_decoded: AtomicU64,
    records_skipped: AtomicU64,
    events_delivered: AtomicU64,
    events_dropped: AtomicU64,
    events_failed: AtomicU64,
    last_tick_at: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<String>>,
}

/// Point-in-time copy of `AdapterStats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub records_decoded: u64,
    pub records_skipped: u64,
    pub events_delivered: u64,
    pub events_dropped: u64,
    pub events_failed: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl AdapterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        *self.last_tick_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
    }

    pub fn record_failed_tick(&self, error: &str) {
        self.failed_ticks.fetch_add(1, Ordering::Relaxed);
        self.note_error(error);
    }

    pub fn record_decoded(&self) {
        self.records_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self, error: &str) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
        self.note_error(error);
    }

    pub fn record_outcome(&self, outcome: &PipelineOutcome) {
        match outcome {
            PipelineOutcome::Delivered => self.events_delivered.fetch_add(1, Ordering::Relaxed),
            PipelineOutcome::Dropped => self.events_dropped.fetch_add(1, Ordering::Relaxed),
            PipelineOutcome::Failed(e) => {
                self.note_error(&e.to_string());
                self.events_failed.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    fn note_error(&self, error: &str) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error.to_string());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            failed_ticks: self.failed_ticks.load(Ordering::Relaxed),
            records_decoded: self.records_decoded.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
            last_tick_at: *self.last_tick_at.lock().unwrap_or_else(|e| e.into_inner()),
            last_error: self.last_error.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }
}
