//! Folder-tree export pipeline.
//!
//! [`Exporter::start_export`] walks the selected folders twice: a sequential
//! counting pass that fills the [`ReferenceIndex`] and the progress totals,
//! then a concurrent processing pass that rewrites each thread and hands the
//! resulting files to a [`Saver`].

pub mod assets;
mod counters;
pub mod error;
pub mod index;
mod listing;
mod matcher;
pub mod naming;
mod options;
mod phase;
mod rewrite;
mod save;
pub mod template;
#[cfg(test)]
mod testing;
mod walker;

pub use crate::assets::Builtins;
pub use crate::counters::CountersSnapshot;
pub use crate::index::{EntryKind, ReferenceEntry, ReferenceIndex};
pub use crate::listing::LISTING_FILE_NAME;
pub use crate::matcher::ReferenceMatcher;
pub use crate::naming::sanitize;
pub use crate::options::{DEFAULT_SITE_HOST, ExportFormat, ExportOptions};
pub use crate::phase::{ExportSummary, LogObserver, NoopObserver, Observer, Phase, ProgressEvent};
pub use crate::save::{SaveKind, Saver, StorageSaver, save_path};
pub use crate::template::DocumentTemplate;
pub use crate::walker::Exporter;
