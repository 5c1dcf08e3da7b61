//! Scanning of thread markup for blob and cross-document references.
//!
//! Matches are typed records carrying the byte span to replace, so the
//! rewriter never re-runs a pattern to substitute a resolved value.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

regex!(IMAGE_BLOB_REGEX, r#"src=["'](/blob/([\w-]+)/([\w-]+)[^"']*)["']"#);
regex!(
    FILE_BLOB_REGEX,
    r#"href=["']((?:https?://[\w.-]+(?::\d+)?)?/blob/([\w-]+)/([\w-]+)(?:\?name=([^"'&#]*))?[^"']*)["']"#
);

/// Path segments on the site that aren't document ids.
const RESERVED_SEGMENTS: [&str; 2] = ["blob", "account"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlobKind {
    Image,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlobMatch {
    pub span: Range<usize>,
    pub kind: BlobKind,
    pub container_id: String,
    pub blob_id: String,
    /// URL-decoded `name` query parameter of a file link.
    pub file_name: Option<String>,
}

/// Every inline image and file link that points at a blob, in document order.
pub(crate) fn find_blobs(html: &str) -> Vec<BlobMatch> {
    let images = IMAGE_BLOB_REGEX.captures_iter(html).filter_map(|captures| {
        let url = captures.get(1)?;
        Some(BlobMatch {
            span: url.range(),
            kind: BlobKind::Image,
            container_id: captures.get(2)?.as_str().to_string(),
            blob_id: captures.get(3)?.as_str().to_string(),
            file_name: None,
        })
    });
    let files = FILE_BLOB_REGEX.captures_iter(html).filter_map(|captures| {
        let url = captures.get(1)?;
        let file_name = captures
            .get(4)
            .map(|name| {
                urlencoding::decode(name.as_str()).map(|decoded| decoded.into_owned()).unwrap_or_else(|_| name.as_str().to_string())
            })
            .filter(|name| !name.trim().is_empty());
        Some(BlobMatch {
            span: url.range(),
            kind: BlobKind::File,
            container_id: captures.get(2)?.as_str().to_string(),
            blob_id: captures.get(3)?.as_str().to_string(),
            file_name,
        })
    });
    let mut matches: Vec<BlobMatch> = images.chain(files).collect();
    matches.sort_by_key(|m| m.span.start);
    matches
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReferenceMatch {
    pub span: Range<usize>,
    pub id: String,
}

/// Finds links to other documents on the same site.
#[derive(Debug, Clone)]
pub struct ReferenceMatcher {
    regex: Regex,
}
impl ReferenceMatcher {
    /// Matches `https://{host}/{id}` and `https://{sub}.{host}/{id}` links.
    pub fn new(host: &str) -> Result<Self> {
        let host = host.trim().trim_matches('/');
        let pattern = format!(r#"href=["'](https://(?:[\w-]+\.)*{}/([\w-]+)[^"']*)["']"#, regex::escape(host));
        let regex = Regex::new(&pattern).or_raise(|| ErrorKind::InvalidPattern(pattern.clone()))?;
        Ok(Self { regex })
    }

    pub(crate) fn find(&self, html: &str) -> Vec<ReferenceMatch> {
        self.regex
            .captures_iter(html)
            .filter_map(|captures| {
                let url = captures.get(1)?;
                let id = captures.get(2)?.as_str();
                (!RESERVED_SEGMENTS.contains(&id)).then(|| ReferenceMatch { span: url.range(), id: id.to_string() })
            })
            .collect()
    }
}

/// Replaces each span of `html` with its replacement. Spans overlapping an
/// earlier one are ignored.
pub(crate) fn splice(html: &str, replacements: impl IntoIterator<Item = (Range<usize>, String)>) -> String {
    let mut replacements: Vec<_> = replacements.into_iter().collect();
    replacements.sort_by_key(|(span, _)| span.start);
    let mut spliced = String::with_capacity(html.len());
    let mut cursor = 0;
    for (span, replacement) in replacements {
        if span.start < cursor || span.end > html.len() {
            continue;
        }
        spliced.push_str(&html[cursor..span.start]);
        spliced.push_str(&replacement);
        cursor = span.end;
    }
    spliced.push_str(&html[cursor..]);
    spliced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_inline_image() {
        let html = r#"<p><img src="/blob/THREAD1/BLOB-1" width="40"></p>"#;
        let matches = find_blobs(html);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, BlobKind::Image);
        assert_eq!(matches[0].container_id, "THREAD1");
        assert_eq!(matches[0].blob_id, "BLOB-1");
        assert_eq!(&html[matches[0].span.clone()], "/blob/THREAD1/BLOB-1");
    }

    #[test]
    fn test_find_file_links() {
        let html = concat!(
            r#"<a href="https://platform.quip.com/blob/T1/B1?name=Q3%20report.pdf">report</a>"#,
            r#"<a href='/blob/T1/B2'>unnamed</a>"#,
            r#"<a href="/blob/T1/B3?name=">empty</a>"#,
        );
        let matches = find_blobs(html);
        let names: Vec<_> = matches.iter().map(|m| m.file_name.as_deref()).collect();
        assert_eq!(names, vec![Some("Q3 report.pdf"), None, None]);
        assert!(matches.iter().all(|m| m.kind == BlobKind::File));
        assert_eq!(&html[matches[0].span.clone()], "https://platform.quip.com/blob/T1/B1?name=Q3%20report.pdf");
    }

    #[test]
    fn test_blobs_in_document_order() {
        let html = r#"<a href="/blob/T/F1?name=a.txt">a</a><img src="/blob/T/I1"><a href="/blob/T/F2">b</a>"#;
        let ids: Vec<_> = find_blobs(html).into_iter().map(|m| m.blob_id).collect();
        assert_eq!(ids, vec!["F1", "I1", "F2"]);
    }

    #[test]
    fn test_find_references() {
        let matcher = ReferenceMatcher::new("quip.com").unwrap();
        let html = concat!(
            r#"<a href="https://quip.com/AbCdEf123">one</a>"#,
            r#"<a href="https://acme.quip.com/XyZ789/Some-Title#s=1">two</a>"#,
            r#"<a href="https://quip.com/blob/T1/B1">blob</a>"#,
            r#"<a href="https://example.com/AbCdEf123">elsewhere</a>"#,
            r#"<a href="https://notquip.com/AbCdEf123">lookalike</a>"#,
        );
        let ids: Vec<_> = matcher.find(html).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["AbCdEf123", "XyZ789"]);
    }

    #[test]
    fn test_reference_host_is_configurable() {
        let matcher = ReferenceMatcher::new("docs.example.org").unwrap();
        let matches = matcher.find(r#"<a href="https://docs.example.org/ID1">x</a><a href="https://quip.com/ID2">y</a>"#);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "ID1");
    }

    #[test]
    fn test_splice() {
        let html = "aaa bbb ccc";
        let spliced = splice(html, [(8..11, "Z".to_string()), (0..3, "X".to_string()), (1..2, "overlap".to_string())]);
        assert_eq!(spliced, "X bbb Z");
        assert_eq!(splice(html, []), html);
    }
}
