//! Index-only output: one `index.html` at the export root linking every
//! folder and thread the processing pass reached to its remote page.

use crate::index::{EntryKind, ReferenceEntry};
use crate::naming::sanitize;
use crate::save::SaveKind;
use crate::template::{ListingContext, ListingItem};
use crate::walker::Run;

pub const LISTING_FILE_NAME: &str = "index.html";
const LISTING_TITLE: &str = "Quip export";

impl Run<'_> {
    pub(crate) async fn save_listing(&self) {
        let items = listing_items(self.listed_entries(), &self.options.site_host);
        let count = items.len();
        let context = ListingContext {
            title: LISTING_TITLE,
            stylesheet: self.options.stylesheet.as_deref(),
            stylesheet_path: "document.css",
            items,
        };
        match self.options.template.render_listing(&context) {
            Ok(html) => {
                self.saver.save(html.into_bytes(), LISTING_FILE_NAME, SaveKind::Thread, "").await;
                tracing::info!(entries = count, "Saved listing");
            },
            Err(err) => tracing::error!("Couldn't render listing: {}", &*err),
        }
    }
}

/// Items in tree order: each folder directly followed by its contents.
fn listing_items(entries: Vec<(String, ReferenceEntry)>, site_host: &str) -> Vec<ListingItem> {
    let mut keyed: Vec<(String, ListingItem)> = entries
        .into_iter()
        .filter_map(|(id, entry)| {
            let path = entry.path?;
            let title = entry.title.unwrap_or_else(|| id.clone());
            let key = match entry.kind {
                EntryKind::Folder => format!("{path}{}/", sanitize(&title)),
                EntryKind::Thread => format!("{path}{}", sanitize(&title)),
                EntryKind::User => return None,
            };
            let folder = entry.kind == EntryKind::Folder;
            let depth = path.matches('/').count();
            let href = format!("https://{site_host}/{id}");
            Some((key, ListingItem { title, href, folder, indent: depth * 2 }))
        })
        .collect();
    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
    keyed.into_iter().map(|(_, item)| item).collect()
}
