//! Reference Index: every folder, thread and user seen during one run, keyed
//! by remote id.

use crate::naming::{file_name, sanitize};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    Thread,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    pub kind: EntryKind,
    /// Slash-terminated ancestor path inside the export. `None` for users and
    /// for threads discovered outside the exported tree.
    pub path: Option<String>,
    pub title: Option<String>,
}
impl ReferenceEntry {
    pub fn resolved(&self) -> bool {
        self.title.is_some()
    }
}

/// Entries are never removed and never change kind; the first title set wins.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    entries: HashMap<String, ReferenceEntry>,
    aliases: HashMap<String, String>,
}
impl ReferenceIndex {
    /// Looks up `id`, following an alias if one was recorded.
    pub fn get(&self, id: &str) -> Option<&ReferenceEntry> {
        self.entries.get(id).or_else(|| self.entries.get(self.aliases.get(id)?))
    }

    /// Adds an entry if `id` is unknown. An existing entry keeps its kind and
    /// path, and only takes `title` if it had none. Returns `true` when a new
    /// entry was created.
    pub fn register(&mut self, id: &str, kind: EntryKind, path: Option<String>, title: Option<String>) -> bool {
        match self.entries.get_mut(id) {
            Some(existing) => {
                if existing.title.is_none() {
                    existing.title = title;
                }
                false
            },
            None => {
                self.entries.insert(id.to_string(), ReferenceEntry { kind, path, title });
                true
            },
        }
    }

    /// Sets the title of an unresolved entry. Returns `true` if it changed.
    pub fn set_title(&mut self, id: &str, title: impl Into<String>) -> bool {
        let canonical = self.canonical(id).to_string();
        match self.entries.get_mut(&canonical) {
            Some(entry) if entry.title.is_none() => {
                entry.title = Some(title.into());
                true
            },
            _ => false,
        }
    }

    /// Makes `alias` resolve to the entry stored under `canonical`.
    pub fn alias(&mut self, alias: &str, canonical: &str) {
        if alias != canonical && !self.entries.contains_key(alias) {
            self.aliases.insert(alias.to_string(), canonical.to_string());
        }
    }

    fn canonical<'a>(&'a self, id: &'a str) -> &'a str {
        if self.entries.contains_key(id) {
            return id;
        }
        self.aliases.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Link from a document `depth` folders deep to the exported file of `entry`.
///
/// Users and entries without a path or title can't be linked to.
pub fn relative_link(entry: &ReferenceEntry, depth: usize) -> Option<String> {
    let path = entry.path.as_deref()?;
    let title = entry.title.as_deref()?;
    let name = match entry.kind {
        EntryKind::Thread => file_name(title, "html"),
        EntryKind::Folder => sanitize(title),
        EntryKind::User => return None,
    };
    Some(format!("{}{path}{name}", "../".repeat(depth)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entry(kind: EntryKind, path: Option<&str>, title: Option<&str>) -> ReferenceEntry {
        ReferenceEntry { kind, path: path.map(str::to_string), title: title.map(str::to_string) }
    }

    #[test]
    fn test_first_title_wins() {
        let mut index = ReferenceIndex::default();
        assert!(index.register("T1", EntryKind::Thread, Some("Private/".into()), None));
        assert!(!index.get("T1").unwrap().resolved());
        assert!(index.set_title("T1", "Plan"));
        assert!(!index.set_title("T1", "Other"));
        assert!(!index.register("T1", EntryKind::Folder, None, Some("Again".into())));
        assert_eq!(index.get("T1"), Some(&entry(EntryKind::Thread, Some("Private/"), Some("Plan"))));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_register_fills_missing_title() {
        let mut index = ReferenceIndex::default();
        index.register("T1", EntryKind::Thread, Some("Private/".into()), None);
        index.register("T1", EntryKind::Thread, None, Some("Plan".into()));
        assert_eq!(index.get("T1"), Some(&entry(EntryKind::Thread, Some("Private/"), Some("Plan"))));
    }

    #[test]
    fn test_alias_follows_canonical() {
        let mut index = ReferenceIndex::default();
        index.register("CANON", EntryKind::Thread, Some("Shared/".into()), None);
        index.alias("link-id", "CANON");
        assert!(index.set_title("link-id", "Plan"));
        assert_eq!(index.get("link-id").and_then(|e| e.title.as_deref()), Some("Plan"));
        assert!(index.get("unknown").is_none());
        assert!(!index.is_empty());
    }

    #[rstest]
    #[case(entry(EntryKind::Folder, Some("Private/Programming/"), Some("folder1")), 4, Some("../../../../Private/Programming/folder1"))]
    #[case(entry(EntryKind::Thread, Some("Private/"), Some("Plan: v2")), 1, Some("../Private/Plan_ v2.html"))]
    #[case(entry(EntryKind::Thread, Some(""), Some("Root")), 0, Some("Root.html"))]
    #[case(entry(EntryKind::Thread, None, Some("Outside")), 2, None)]
    #[case(entry(EntryKind::Thread, Some("Private/"), None), 2, None)]
    #[case(entry(EntryKind::User, None, Some("Ada")), 2, None)]
    fn test_relative_link(#[case] entry: ReferenceEntry, #[case] depth: usize, #[case] expected: Option<&str>) {
        assert_eq!(relative_link(&entry, depth).as_deref(), expected);
    }
}
