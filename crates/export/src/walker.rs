//! Tree Walker.
//!
//! A run first counts the whole tree sequentially, registering every folder
//! and thread in the [`ReferenceIndex`], then processes it with unbounded
//! fan-out: sibling threads and folders are awaited together on the calling
//! task.

use crate::counters::ExportCounters;
use crate::error::{ErrorKind, Result};
use crate::index::{EntryKind, ReferenceEntry, ReferenceIndex};
use crate::matcher::ReferenceMatcher;
use crate::naming::sanitize;
use crate::options::ExportOptions;
use crate::phase::{ExportSummary, NoopObserver, Observer, Phase, PhaseTracker, ProgressEvent};
use crate::save::Saver;
use exn::OptionExt;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use quipx_api::Gateway;
use quipx_api::models::FolderNode;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct Exporter {
    gateway: Arc<Gateway>,
    saver: Arc<dyn Saver>,
    observer: Arc<dyn Observer>,
    options: ExportOptions,
    references: Option<ReferenceMatcher>,
}
impl Exporter {
    pub fn new(gateway: Arc<Gateway>, saver: Arc<dyn Saver>, options: ExportOptions) -> Result<Self> {
        let references = options.references.then(|| ReferenceMatcher::new(&options.site_host)).transpose()?;
        Ok(Self { gateway, saver, observer: Arc::new(NoopObserver), options, references })
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Exports `folder_ids`, or the account's default folder set when `None`
    /// or empty.
    ///
    /// The observer's `on_complete` is called whatever the outcome. Only a
    /// failure to read the current user or every root folder is an error;
    /// anything narrower is logged and skipped.
    #[tracing::instrument(skip_all)]
    pub async fn start_export(&self, folder_ids: Option<Vec<String>>) -> Result<ExportSummary> {
        let run = Run::new(self);
        run.phase.set(Phase::Start);
        let result = run.export(folder_ids).await;
        run.phase.set(Phase::Stop);
        let summary = run.summary();
        self.observer.on_complete(&summary);
        result.map(|()| summary)
    }
}

/// State of one `start_export` invocation.
pub(crate) struct Run<'a> {
    pub(crate) gateway: &'a Gateway,
    pub(crate) saver: &'a dyn Saver,
    pub(crate) options: &'a ExportOptions,
    pub(crate) references: Option<&'a ReferenceMatcher>,
    pub(crate) counters: ExportCounters,
    pub(crate) phase: PhaseTracker<'a>,
    index: Mutex<ReferenceIndex>,
    /// Ids that neither resolved as a thread nor as a user.
    unresolvable: Mutex<HashSet<String>>,
    /// Folders and threads that reached the processing pass.
    listed: Mutex<BTreeSet<String>>,
}
impl<'a> Run<'a> {
    pub(crate) fn new(exporter: &'a Exporter) -> Self {
        Self {
            gateway: &exporter.gateway,
            saver: exporter.saver.as_ref(),
            options: &exporter.options,
            references: exporter.references.as_ref(),
            counters: ExportCounters::default(),
            phase: PhaseTracker::new(exporter.observer.as_ref()),
            index: Mutex::new(ReferenceIndex::default()),
            unresolvable: Mutex::default(),
            listed: Mutex::default(),
        }
    }

    /// Never hold the guard across an `.await`.
    pub(crate) fn index(&self) -> MutexGuard<'_, ReferenceIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lookup(&self, id: &str) -> Option<ReferenceEntry> {
        self.index().get(id).cloned()
    }

    pub(crate) fn is_unresolvable(&self, id: &str) -> bool {
        self.unresolvable.lock().unwrap_or_else(PoisonError::into_inner).contains(id)
    }

    pub(crate) fn mark_unresolvable(&self, id: &str) {
        self.unresolvable.lock().unwrap_or_else(PoisonError::into_inner).insert(id.to_string());
    }

    pub(crate) fn mark_listed(&self, id: &str) {
        self.listed.lock().unwrap_or_else(PoisonError::into_inner).insert(id.to_string());
    }

    /// Index entries of everything that reached the processing pass.
    pub(crate) fn listed_entries(&self) -> Vec<(String, ReferenceEntry)> {
        let listed = self.listed.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let index = self.index();
        listed.into_iter().filter_map(|id| index.get(&id).cloned().map(|entry| (id, entry))).collect()
    }

    fn summary(&self) -> ExportSummary {
        ExportSummary { counters: self.counters.snapshot(), gateway: self.gateway.stats(), phase: self.phase.get() }
    }

    async fn export(&self, folder_ids: Option<Vec<String>>) -> Result<()> {
        let folder_ids = match folder_ids.filter(|ids| !ids.is_empty()) {
            Some(ids) => ids,
            None => {
                let user = self.gateway.current_user().await.ok_or_raise(|| ErrorKind::UserUnavailable)?;
                user.default_folder_ids(self.options.group_folders)
            },
        };
        self.export_folders(&folder_ids).await
    }

    async fn export_folders(&self, folder_ids: &[String]) -> Result<()> {
        self.phase.set(Phase::Analysis);
        let Some(roots) = self.gateway.folders(folder_ids).await else {
            tracing::error!(ids = ?folder_ids, "Couldn't fetch root folders");
            exn::bail!(ErrorKind::RootFoldersUnavailable);
        };
        self.counters.add_totals(roots.len(), 0);
        for root in &roots {
            self.count_subtree(root, String::new()).await;
        }
        let counted = self.counters.snapshot();
        tracing::info!(folders = counted.folders_total, threads = counted.threads_total, "Analysis complete");
        self.phase.set(Phase::Export);
        self.process_folders(&roots, "").await;
        if self.options.only_index {
            self.save_listing().await;
        }
        Ok(())
    }

    /// Registers `folder` at `prefix` and counts everything reachable below
    /// it, one folder at a time. `folder` itself was counted by the caller.
    fn count_subtree<'b>(&'b self, folder: &'b FolderNode, prefix: String) -> BoxFuture<'b, ()> {
        async move {
            self.index().register(&folder.id, EntryKind::Folder, Some(prefix.clone()), Some(folder.title.clone()));
            if folder.children.is_empty() {
                return;
            }
            let partition = folder.partition();
            for id in &partition.restricted {
                tracing::info!(id, path = %prefix, "Skipping restricted folder");
            }
            let child_prefix = child_path(&prefix, &folder.title);
            {
                let mut index = self.index();
                for id in &partition.threads {
                    index.register(id, EntryKind::Thread, Some(child_prefix.clone()), None);
                }
            }
            let (read_folders, read_threads) = self.counters.add_totals(partition.folders.len(), partition.threads.len());
            self.phase.progress(ProgressEvent::Analysis { read_folders, read_threads });
            if partition.folders.is_empty() {
                return;
            }
            let Some(children) = self.gateway.folders(&partition.folders).await else {
                tracing::warn!(path = %child_prefix, "Couldn't fetch child folders; not descending");
                return;
            };
            for child in &children {
                self.count_subtree(child, child_prefix.clone()).await;
            }
        }
        .boxed()
    }

    fn process_folder<'b>(&'b self, folder: &'b FolderNode, path: String) -> BoxFuture<'b, ()> {
        async move {
            self.mark_listed(&folder.id);
            let partition = folder.partition();
            let (threads, folders) =
                futures::join!(self.gateway.threads(&partition.threads), self.gateway.folders(&partition.folders));
            if let Some(threads) = &threads {
                let mut index = self.index();
                for thread in threads {
                    index.set_title(&thread.id, thread.title.clone());
                }
            }
            let thread_work = async {
                match &threads {
                    Some(threads) => join_all(threads.iter().map(|thread| self.process_thread(thread, &path))).await,
                    None => {
                        tracing::error!(%path, "Couldn't fetch threads");
                        Vec::new()
                    },
                }
            };
            let folder_work = async {
                match &folders {
                    Some(folders) => self.process_folders(folders, &path).await,
                    None => tracing::error!(%path, "Couldn't fetch folders"),
                }
            };
            futures::join!(thread_work, folder_work);
            self.counters.folder_processed();
            let counters = self.counters.snapshot();
            self.phase.progress(ProgressEvent::Export {
                threads_processed: counters.threads_processed,
                threads_total: counters.threads_total,
                path,
            });
        }
        .boxed()
    }

    async fn process_folders(&self, folders: &[FolderNode], path: &str) {
        join_all(folders.iter().map(|folder| {
            let child = child_path(path, &folder.title);
            async move {
                if self.options.is_excluded(&child) {
                    tracing::info!(id = %folder.id, path = %child, "Skipping excluded folder");
                    return;
                }
                self.process_folder(folder, child).await;
            }
        }))
        .await;
    }
}

/// Path of a child folder: the parent path plus the sanitized title.
pub(crate) fn child_path(path: &str, title: &str) -> String {
    format!("{path}{}/", sanitize(title))
}
