//! Phase lifecycle and progress reporting.
//!
//! A run moves `Stop → Start → Analysis → Export → Stop`; an aborted run
//! jumps straight back to `Stop`. Observers are called synchronously from the
//! walk, so implementations should return quickly.

use crate::counters::{CountersSnapshot, percent};
use derive_more::Display;
use quipx_api::StatsSnapshot;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    #[default]
    #[display("STOP")]
    Stop,
    #[display("START")]
    Start,
    #[display("ANALYSIS")]
    Analysis,
    #[display("EXPORT")]
    Export,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProgressEvent {
    /// Running totals while the tree is being counted.
    Analysis { read_folders: u64, read_threads: u64 },
    /// Emitted each time a folder finishes processing.
    Export { threads_processed: u64, threads_total: u64, path: String },
}
impl ProgressEvent {
    /// Completion percentage, for export events only.
    pub fn percent(&self) -> Option<u8> {
        match self {
            Self::Analysis { .. } => None,
            Self::Export { threads_processed, threads_total, .. } => Some(percent(*threads_processed, *threads_total)),
        }
    }
}

/// Returned by every run, and handed to [`Observer::on_complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub counters: CountersSnapshot,
    pub gateway: StatsSnapshot,
    pub phase: Phase,
}

pub trait Observer: Send + Sync {
    fn on_phase(&self, _new: Phase, _previous: Phase) {}

    fn on_progress(&self, _event: &ProgressEvent) {}

    /// Called once at the end of every run, including aborted ones.
    fn on_complete(&self, _summary: &ExportSummary) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NoopObserver;
impl Observer for NoopObserver {}

/// Observer that reports through `tracing`.
#[derive(Debug, Default)]
pub struct LogObserver;
impl Observer for LogObserver {
    fn on_phase(&self, new: Phase, previous: Phase) {
        tracing::info!(%previous, "{new}");
    }

    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Analysis { read_folders, read_threads } => {
                tracing::debug!(folders = read_folders, threads = read_threads, "Analysing folders");
            },
            ProgressEvent::Export { threads_processed, threads_total, path } => {
                tracing::info!(
                    percent = event.percent().unwrap_or_default(),
                    threads = threads_processed,
                    total = threads_total,
                    %path,
                    "Exported folder"
                );
            },
        }
    }

    fn on_complete(&self, summary: &ExportSummary) {
        let counters = &summary.counters;
        tracing::info!(
            folders = counters.folders_processed,
            threads = counters.threads_processed,
            threads_total = counters.threads_total,
            requests = summary.gateway.query,
            retries = summary.gateway.retries,
            "Export finished"
        );
    }
}

/// Current phase of a run, notifying the observer on every change.
pub(crate) struct PhaseTracker<'a> {
    current: Mutex<Phase>,
    observer: &'a dyn Observer,
}
impl<'a> PhaseTracker<'a> {
    pub(crate) fn new(observer: &'a dyn Observer) -> Self {
        Self { current: Mutex::new(Phase::Stop), observer }
    }

    pub(crate) fn get(&self) -> Phase {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, new: Phase) {
        let previous = std::mem::replace(&mut *self.current.lock().unwrap_or_else(PoisonError::into_inner), new);
        if previous != new {
            self.observer.on_phase(new, previous);
        }
    }

    pub(crate) fn progress(&self, event: ProgressEvent) {
        self.observer.on_progress(&event);
    }
}
