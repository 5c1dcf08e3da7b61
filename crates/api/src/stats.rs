use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Remote call categories tracked by [`GatewayStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    GetUser,
    GetFolder,
    GetFolders,
    GetThread,
    GetThreads,
    GetMessages,
    GetBlob,
    GetRendition,
}

/// Live counters shared by every fetch of one gateway.
#[derive(Debug, Default)]
pub(crate) struct GatewayStats {
    query: AtomicU64,
    get_user: AtomicU64,
    get_folder: AtomicU64,
    get_folders: AtomicU64,
    get_thread: AtomicU64,
    get_threads: AtomicU64,
    get_messages: AtomicU64,
    get_blob: AtomicU64,
    get_rendition: AtomicU64,
    retries: AtomicU64,
}
impl GatewayStats {
    pub(crate) fn record(&self, call: Call) {
        let counter = match call {
            Call::GetUser => &self.get_user,
            Call::GetFolder => &self.get_folder,
            Call::GetFolders => &self.get_folders,
            Call::GetThread => &self.get_thread,
            Call::GetThreads => &self.get_threads,
            Call::GetMessages => &self.get_messages,
            Call::GetBlob => &self.get_blob,
            Call::GetRendition => &self.get_rendition,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_query(&self) {
        self.query.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            query: load(&self.query),
            get_user: load(&self.get_user),
            get_folder: load(&self.get_folder),
            get_folders: load(&self.get_folders),
            get_thread: load(&self.get_thread),
            get_threads: load(&self.get_threads),
            get_messages: load(&self.get_messages),
            get_blob: load(&self.get_blob),
            get_rendition: load(&self.get_rendition),
            retries: load(&self.retries),
        }
    }
}

/// Point-in-time copy of the gateway call counters.
///
/// `query` counts HTTP requests actually sent, so it includes retries; the
/// per-category counters count logical calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub query: u64,
    pub get_user: u64,
    pub get_folder: u64,
    pub get_folders: u64,
    pub get_thread: u64,
    pub get_threads: u64,
    pub get_messages: u64,
    pub get_blob: u64,
    pub get_rendition: u64,
    pub retries: u64,
}
