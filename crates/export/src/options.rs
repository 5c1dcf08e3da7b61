use crate::error::{ErrorKind, Result};
use crate::template::DocumentTemplate;
use exn::ResultExt;
use quipx_api::models::{Rendition, ThreadKind};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SITE_HOST: &str = "quip.com";

/// Output format of exported threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Rewritten markup wrapped in the document template.
    #[default]
    Html,
    /// Server renditions: `.docx` for documents, `.xlsx` for spreadsheets.
    Native,
    /// Server `.pdf` renditions.
    Pdf,
}
impl ExportFormat {
    /// The rendition to request for a thread kind, if this format uses one.
    pub fn rendition(&self, kind: &ThreadKind) -> Option<Rendition> {
        match (self, kind) {
            (Self::Html, _) | (_, ThreadKind::Other(_)) => None,
            (Self::Native, ThreadKind::Document) => Some(Rendition::Docx),
            (Self::Native, ThreadKind::Spreadsheet) => Some(Rendition::Xlsx),
            (Self::Pdf, _) => Some(Rendition::Pdf),
        }
    }
}

pub struct ExportOptions {
    pub template: DocumentTemplate,
    /// Inline CSS. When `None` documents link to a shared `document.css`.
    pub stylesheet: Option<String>,
    pub embed_images: bool,
    pub comments: bool,
    pub format: ExportFormat,
    /// Rewrite links between exported documents.
    pub references: bool,
    /// Add group folders to the default folder set.
    pub group_folders: bool,
    pub exclude: Option<Regex>,
    /// Host whose links count as cross-references.
    pub site_host: String,
    /// Write only a listing of the exported tree, without fetching content.
    pub only_index: bool,
}
impl ExportOptions {
    pub fn new(template: DocumentTemplate) -> Self {
        Self {
            template,
            stylesheet: None,
            embed_images: false,
            comments: false,
            format: ExportFormat::Html,
            references: true,
            group_folders: false,
            exclude: None,
            site_host: DEFAULT_SITE_HOST.to_string(),
            only_index: false,
        }
    }

    /// Options with the builtin document template.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(DocumentTemplate::builtin()?))
    }

    pub fn with_exclude(mut self, pattern: impl AsRef<str>) -> Result<Self> {
        let pattern = pattern.as_ref();
        self.exclude = Some(Regex::new(pattern).or_raise(|| ErrorKind::InvalidPattern(pattern.to_string()))?);
        Ok(self)
    }

    pub(crate) fn is_excluded(&self, candidate: &str) -> bool {
        self.exclude.as_ref().is_some_and(|regex| regex.is_match(candidate))
    }
}
