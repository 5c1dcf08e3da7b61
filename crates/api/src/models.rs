//! Remote payloads and the typed nodes built from them.
//!
//! The API describes a folder child by which id field happens to be present;
//! that ambiguity is resolved once here, into [`Child`], when the payload is
//! deserialized.

use serde::Deserialize;

/// An account, as returned by `/users/current` and `/users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub private_folder_id: Option<String>,
    pub desktop_folder_id: Option<String>,
    pub archive_folder_id: Option<String>,
    pub starred_folder_id: Option<String>,
    pub trash_folder_id: Option<String>,
    #[serde(default)]
    pub shared_folder_ids: Vec<String>,
    #[serde(default)]
    pub group_folder_ids: Vec<String>,
}
impl User {
    /// The folders exported when no explicit folder list is given: the private
    /// folder, every shared folder and, optionally, group folders. Duplicates
    /// are dropped, first occurrence wins.
    pub fn default_folder_ids(&self, include_groups: bool) -> Vec<String> {
        let groups = include_groups.then_some(&self.group_folder_ids).into_iter().flatten();
        let mut ids: Vec<String> = Vec::new();
        for id in self.private_folder_id.iter().chain(&self.shared_folder_ids).chain(groups) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

/// A child entry of a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    Thread { id: String },
    Folder { id: String, restricted: bool },
}

#[derive(Deserialize)]
struct RawChild {
    thread_id: Option<String>,
    folder_id: Option<String>,
    #[serde(default)]
    restricted: bool,
}
impl RawChild {
    fn into_child(self) -> Option<Child> {
        match (self.thread_id, self.folder_id) {
            (Some(id), _) => Some(Child::Thread { id }),
            (None, Some(id)) => Some(Child::Folder { id, restricted: self.restricted }),
            (None, None) => None,
        }
    }
}

#[derive(Deserialize)]
struct FolderMeta {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
struct FolderPayload {
    folder: FolderMeta,
    #[serde(default)]
    children: Vec<RawChild>,
}

/// A folder and its direct children.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "FolderPayload")]
pub struct FolderNode {
    pub id: String,
    pub title: String,
    pub children: Vec<Child>,
}
impl From<FolderPayload> for FolderNode {
    fn from(payload: FolderPayload) -> Self {
        Self {
            id: payload.folder.id,
            title: payload.folder.title,
            children: payload.children.into_iter().filter_map(RawChild::into_child).collect(),
        }
    }
}
impl FolderNode {
    /// Splits children into thread ids and traversable folder ids. Restricted
    /// folders are returned separately; they are never fetched.
    pub fn partition(&self) -> Partition<'_> {
        let mut partition = Partition::default();
        for child in &self.children {
            match child {
                Child::Thread { id } => partition.threads.push(id.as_str()),
                Child::Folder { id, restricted: true } => partition.restricted.push(id.as_str()),
                Child::Folder { id, restricted: false } => partition.folders.push(id.as_str()),
            }
        }
        partition
    }
}

/// See [`FolderNode::partition`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Partition<'a> {
    pub threads: Vec<&'a str>,
    pub folders: Vec<&'a str>,
    pub restricted: Vec<&'a str>,
}

/// The kind of a thread; only documents and spreadsheets carry exportable
/// markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadKind {
    Document,
    Spreadsheet,
    Other(String),
}
impl From<String> for ThreadKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "document" => Self::Document,
            "spreadsheet" => Self::Spreadsheet,
            _ => Self::Other(value),
        }
    }
}
impl ThreadKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Document => "document",
            Self::Spreadsheet => "spreadsheet",
            Self::Other(name) => name,
        }
    }
}

#[derive(Deserialize)]
struct ThreadMeta {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    link: String,
}

#[derive(Deserialize)]
struct ThreadPayload {
    thread: ThreadMeta,
    #[serde(default)]
    html: String,
}

/// A document or spreadsheet with its rendered markup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ThreadPayload")]
pub struct ThreadNode {
    pub id: String,
    pub title: String,
    pub kind: ThreadKind,
    pub html: String,
    pub link: String,
}
impl From<ThreadPayload> for ThreadNode {
    fn from(payload: ThreadPayload) -> Self {
        Self {
            id: payload.thread.id,
            title: payload.thread.title,
            kind: payload.thread.kind.into(),
            html: payload.html,
            link: payload.thread.link,
        }
    }
}

/// A comment or chat message attached to a thread.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub author_name: String,
    /// Microseconds since the Unix epoch.
    #[serde(default)]
    pub created_usec: i64,
    #[serde(default)]
    pub text: String,
    /// `(style, html)` pairs of rich text.
    #[serde(default)]
    pub parts: Vec<(String, String)>,
    #[serde(default)]
    pub files: Vec<MessageFile>,
    pub annotation: Option<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageFile {
    pub hash: String,
    #[serde(default)]
    pub name: String,
}

/// Present on messages that annotate a section of the document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Annotation {
    pub id: String,
}

/// A binary attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// A server-side conversion of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendition {
    Docx,
    Xlsx,
    Pdf,
}
impl Rendition {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Pdf => "pdf",
        }
    }
}
