//! Content Rewriter.
//!
//! Turns one thread into files: blob references become local files or data
//! URIs, links to other exported documents become relative paths, comments
//! are appended, and the result is wrapped in the document template. With a
//! rendition format the server conversion is saved instead.

use crate::index::{EntryKind, ReferenceEntry, relative_link};
use crate::matcher::{BlobKind, BlobMatch, ReferenceMatcher, find_blobs, splice};
use crate::naming::{extension_for, file_name, sanitize};
use crate::options::ExportFormat;
use crate::save::SaveKind;
use crate::template::DocumentContext;
use crate::walker::Run;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::future::join_all;
use quipx_api::models::{Blob, ThreadKind, ThreadNode};
use std::collections::HashMap;

impl Run<'_> {
    /// Exports one thread, or only lists it in index-only mode. Counts as
    /// processed whatever happens.
    pub(crate) async fn process_thread(&self, thread: &ThreadNode, path: &str) {
        let qualified = format!("{path}{}", thread.title);
        if self.options.is_excluded(&thread.title) || self.options.is_excluded(&qualified) {
            tracing::info!(id = %thread.id, path = %qualified, "Skipping excluded thread");
        } else {
            self.mark_listed(&thread.id);
            if !self.options.only_index {
                match self.options.format {
                    ExportFormat::Html => self.export_html(thread, path).await,
                    ExportFormat::Native | ExportFormat::Pdf => self.export_rendition(thread, path).await,
                }
            }
        }
        self.counters.thread_processed();
    }

    async fn export_html(&self, thread: &ThreadNode, path: &str) {
        if !matches!(thread.kind, ThreadKind::Document | ThreadKind::Spreadsheet) {
            tracing::warn!(id = %thread.id, kind = thread.kind.as_str(), %path, "Skipping thread of unsupported kind");
            return;
        }
        let depth = path.matches('/').count();
        let body = self.rewrite(&thread.html, path, depth).await;
        let comments = if self.options.comments { self.comments(thread, path, depth).await } else { None };
        let stylesheet_path = format!("{}document.css", "../".repeat(depth));
        let context = DocumentContext {
            title: &thread.title,
            body: &body,
            comments: comments.as_deref(),
            stylesheet: self.options.stylesheet.as_deref(),
            stylesheet_path: &stylesheet_path,
        };
        match self.options.template.render(&context) {
            Ok(html) => {
                let file_name = file_name(&thread.title, "html");
                self.saver.save(html.into_bytes(), &file_name, SaveKind::Thread, path).await;
            },
            Err(err) => tracing::error!(id = %thread.id, %path, "Couldn't render document: {}", &*err),
        }
    }

    async fn export_rendition(&self, thread: &ThreadNode, path: &str) {
        let Some(rendition) = self.options.format.rendition(&thread.kind) else {
            tracing::warn!(id = %thread.id, kind = thread.kind.as_str(), %path, "Skipping thread of unsupported kind");
            return;
        };
        let Some(data) = self.gateway.rendition(&thread.id, rendition).await else {
            tracing::warn!(id = %thread.id, %path, format = rendition.extension(), "Rendition unavailable");
            return;
        };
        let file_name = file_name(&thread.title, rendition.extension());
        self.saver.save(data, &file_name, SaveKind::Thread, path).await;
    }

    /// Applies blob and cross-reference rewriting to a fragment of markup
    /// belonging to a document saved under `path`.
    async fn rewrite(&self, html: &str, path: &str, depth: usize) -> String {
        let html = self.rewrite_blobs(html, path).await;
        match self.references {
            Some(matcher) => self.rewrite_references(matcher, &html, depth).await,
            None => html,
        }
    }

    /// Fetches each distinct blob once, however often the markup references
    /// it, and saves each distinct file once.
    async fn rewrite_blobs(&self, html: &str, path: &str) -> String {
        let matches = find_blobs(html);
        if matches.is_empty() {
            return html.to_string();
        }
        let mut keys: Vec<(&str, &str)> = Vec::new();
        for blob in &matches {
            let key = (blob.container_id.as_str(), blob.blob_id.as_str());
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        let fetched = join_all(keys.iter().map(|(container, blob)| self.fetch_blob(container, blob, path))).await;
        let blobs: HashMap<(&str, &str), Blob> =
            keys.into_iter().zip(fetched).filter_map(|(key, blob)| Some((key, blob?))).collect();

        let mut files: Vec<(String, Vec<u8>)> = Vec::new();
        let mut replacements = Vec::new();
        for blob in &matches {
            let Some(data) = blobs.get(&(blob.container_id.as_str(), blob.blob_id.as_str())) else {
                continue;
            };
            let target = if blob.kind == BlobKind::Image && self.options.embed_images {
                format!("data:{};base64,{}", data.content_type, BASE64.encode(&data.data))
            } else {
                let name = blob_file_name(blob, &data.content_type);
                if !files.iter().any(|(saved, _)| *saved == name) {
                    files.push((name.clone(), data.data.clone()));
                }
                format!("blobs/{name}")
            };
            replacements.push((blob.span.clone(), target));
        }
        join_all(files.iter().map(|(name, data)| self.saver.save(data.clone(), name, SaveKind::Blob, path))).await;
        splice(html, replacements)
    }

    async fn fetch_blob(&self, container_id: &str, blob_id: &str, path: &str) -> Option<Blob> {
        let blob = self.gateway.blob(container_id, blob_id).await;
        if blob.is_none() {
            tracing::warn!(container = container_id, blob = blob_id, %path, "Couldn't fetch blob; leaving reference");
        }
        blob
    }

    async fn rewrite_references(&self, matcher: &ReferenceMatcher, html: &str, depth: usize) -> String {
        let matches = matcher.find(html);
        if matches.is_empty() {
            return html.to_string();
        }
        let mut ids: Vec<&str> = Vec::new();
        for reference in &matches {
            if !ids.contains(&reference.id.as_str()) {
                ids.push(&reference.id);
            }
        }
        let resolved = join_all(ids.iter().map(|id| self.resolve_reference(id, depth))).await;
        let links: HashMap<&str, String> = ids.into_iter().zip(resolved).filter_map(|(id, link)| Some((id, link?))).collect();
        let replacements: Vec<_> = matches
            .iter()
            .filter_map(|reference| Some((reference.span.clone(), links.get(reference.id.as_str())?.clone())))
            .collect();
        splice(html, replacements)
    }

    /// Relative link for a referenced id, resolving it through the index and
    /// the remote store as needed.
    async fn resolve_reference(&self, id: &str, depth: usize) -> Option<String> {
        if self.is_unresolvable(id) {
            return None;
        }
        let entry = match self.lookup(id) {
            Some(entry) if entry.resolved() => entry,
            Some(entry) if entry.kind == EntryKind::Thread => self.resolve_title(id).await?,
            Some(_) => return None,
            None => self.discover(id).await?,
        };
        relative_link(&entry, depth)
    }

    /// Fetches the title of a thread counted in the tree but not yet exported.
    async fn resolve_title(&self, id: &str) -> Option<ReferenceEntry> {
        let Some(thread) = self.gateway.thread(id).await else {
            tracing::debug!(id, "Couldn't resolve reference to known thread");
            self.mark_unresolvable(id);
            return None;
        };
        let mut index = self.index();
        index.set_title(id, thread.title);
        index.get(id).cloned()
    }

    /// Resolves an id the index has never seen: first as a thread, then as a
    /// user.
    async fn discover(&self, id: &str) -> Option<ReferenceEntry> {
        if let Some(thread) = self.gateway.thread(id).await {
            let mut index = self.index();
            index.register(&thread.id, EntryKind::Thread, None, Some(thread.title));
            index.alias(id, &thread.id);
            return index.get(id).cloned();
        }
        if let Some(user) = self.gateway.user(id).await {
            let mut index = self.index();
            index.register(id, EntryKind::User, None, Some(user.name));
            return index.get(id).cloned();
        }
        tracing::debug!(id, "Couldn't resolve reference");
        self.mark_unresolvable(id);
        None
    }

    async fn comments(&self, thread: &ThreadNode, path: &str, depth: usize) -> Option<String> {
        let Some(mut messages) = self.gateway.messages(&thread.id).await else {
            tracing::warn!(id = %thread.id, %path, "Couldn't fetch comments");
            return None;
        };
        messages.retain(|message| message.annotation.is_none());
        if messages.is_empty() {
            return None;
        }
        messages.sort_by_key(|message| message.created_usec);
        match self.options.template.render_comments(&thread.id, &messages) {
            Ok(html) => Some(self.rewrite(&html, path, depth).await),
            Err(err) => {
                tracing::error!(id = %thread.id, %path, "Couldn't render comments: {}", &*err);
                None
            },
        }
    }
}

/// The explicit file name of a link, else `{blob_id}.{extension}`; sanitized
/// either way.
pub(crate) fn blob_file_name(blob: &BlobMatch, content_type: &str) -> String {
    let Some(name) = &blob.file_name else {
        return file_name(&blob.blob_id, extension_for(content_type));
    };
    let name = sanitize(name);
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => file_name(stem, extension),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ExportOptions;
    use crate::testing::{MemorySaver, document, folder_json, gateway, thread_json, threads_json};
    use crate::Exporter;
    use quipx_api::{MockTransport, Response};
    use std::sync::Arc;

    fn blob_match(kind: BlobKind, file_name: Option<&str>) -> BlobMatch {
        BlobMatch {
            span: 0..0,
            kind,
            container_id: "THREAD".to_string(),
            blob_id: "BLOB_ID".to_string(),
            file_name: file_name.map(str::to_string),
        }
    }

    #[test]
    fn test_blob_file_name_fallback() {
        assert_eq!(blob_file_name(&blob_match(BlobKind::File, None), "application/pdf"), "BLOB_ID.pdf");
        assert_eq!(blob_file_name(&blob_match(BlobKind::Image, None), "image/png"), "BLOB_ID.png");
        assert_eq!(blob_file_name(&blob_match(BlobKind::File, Some("Q3: plan.pdf")), "application/pdf"), "Q3_ plan.pdf");
    }

    /// One root folder `Private` holding the given threads.
    fn single_folder(threads: &[(&str, String)]) -> MockTransport {
        let ids: Vec<&str> = threads.iter().map(|(id, _)| *id).collect();
        let payloads: Vec<String> = threads.iter().map(|(_, json)| json.clone()).collect();
        MockTransport::default()
            .on("/folders/?ids=ROOT", Response::json(format!(r#"{{"ROOT": {}}}"#, folder_json("ROOT", "Private", &ids, &[], &[]))))
            .on(&format!("/threads/?ids={}", ids.join(",")), Response::json(threads_json(&payloads)))
    }

    async fn export(transport: MockTransport, configure: impl FnOnce(&mut ExportOptions)) -> (Arc<MockTransport>, Arc<MemorySaver>) {
        let (transport, gateway) = gateway(transport);
        let saver = Arc::new(MemorySaver::default());
        let mut options = ExportOptions::builtin().unwrap();
        configure(&mut options);
        let exporter = Exporter::new(gateway, saver.clone(), options).unwrap();
        exporter.start_export(Some(vec!["ROOT".to_string()])).await.unwrap();
        (transport, saver)
    }

    #[tokio::test]
    async fn test_images_are_saved_and_rewritten() {
        let html = r#"<p><img src="/blob/T1/IMG1"></p><a href="https://platform.quip.com/blob/T1/FILE1?name=notes.txt">notes</a>"#;
        let transport = single_folder(&[("T1", document("T1", "Plan", html))])
            .on("/blob/T1/IMG1", Response::new(200).with_header("content-type", "image/png").with_body(b"png".to_vec()))
            .on("/blob/T1/FILE1", Response::new(200).with_header("content-type", "text/plain").with_body(b"txt".to_vec()));
        let (_, saver) = export(transport, |_| {}).await;
        let page = saver.text("Private/Plan.html").unwrap();
        assert!(page.contains(r#"src="blobs/IMG1.png""#));
        assert!(page.contains(r#"href="blobs/notes.txt""#));
        assert_eq!(saver.get("Private/blobs/IMG1.png").unwrap().0, b"png");
        assert_eq!(saver.get("Private/blobs/notes.txt").unwrap().1, SaveKind::Blob);
        assert!(page.contains(r#"href="../document.css""#));
    }

    #[tokio::test]
    async fn test_repeated_blob_is_fetched_once() {
        let html = r#"<img src="/blob/T1/IMG1"><p>again</p><img src="/blob/T1/IMG1">"#;
        let transport = single_folder(&[("T1", document("T1", "Plan", html))])
            .on("/blob/T1/IMG1", Response::new(200).with_header("content-type", "image/png").with_body(b"png".to_vec()));
        let (transport, saver) = export(transport, |_| {}).await;
        assert_eq!(transport.calls_to("/blob/T1/IMG1"), 1);
        assert_eq!(saver.text("Private/Plan.html").unwrap().matches(r#"src="blobs/IMG1.png""#).count(), 2);
        assert_eq!(saver.names(), vec!["Private/Plan.html", "Private/blobs/IMG1.png"]);
    }

    #[tokio::test]
    async fn test_images_can_be_embedded() {
        let html = r#"<img src="/blob/T1/IMG1"><a href="/blob/T1/FILE1">f</a>"#;
        let transport = single_folder(&[("T1", document("T1", "Plan", html))])
            .on("/blob/T1/IMG1", Response::new(200).with_header("content-type", "image/gif").with_body(b"GIF".to_vec()))
            .on("/blob/T1/FILE1", Response::new(200).with_header("content-type", "application/pdf").with_body(b"%PDF".to_vec()));
        let (_, saver) = export(transport, |options| {
            options.embed_images = true;
            options.stylesheet = Some("p { margin: 0 }".to_string());
        })
        .await;
        let page = saver.text("Private/Plan.html").unwrap();
        assert!(page.contains(r#"src="data:image/gif;base64,R0lG""#));
        assert!(page.contains(r#"href="blobs/FILE1.pdf""#));
        assert!(page.contains("p { margin: 0 }"));
        assert!(saver.get("Private/blobs/IMG1.gif").is_none());
        assert!(saver.get("Private/blobs/FILE1.pdf").is_some());
    }

    #[tokio::test]
    async fn test_missing_blob_is_left_untouched() {
        let html = r#"<img src="/blob/T1/GONE">"#;
        let (_, saver) = export(single_folder(&[("T1", document("T1", "Plan", html))]), |_| {}).await;
        assert!(saver.text("Private/Plan.html").unwrap().contains(r#"src="/blob/T1/GONE""#));
    }

    #[tokio::test]
    async fn test_cross_references() {
        let html = concat!(
            r#"<a href="https://quip.com/T2">sibling by id</a>"#,
            r#"<a href="https://acme.quip.com/link2/Notes">sibling by link</a>"#,
            r#"<a href="https://quip.com/OUTSIDE">outside</a>"#,
            r#"<a href="https://quip.com/U1">person</a>"#,
            r#"<a href="https://quip.com/NOWHERE">broken</a>"#,
        );
        let transport = single_folder(&[("T1", document("T1", "Plan", html)), ("T2", document("T2", "Notes", "<p>n</p>"))])
            .on("/threads/link2", Response::json(thread_json("T2", "Notes", "document", "")))
            .on("/threads/OUTSIDE", Response::json(thread_json("OUTSIDE", "Elsewhere", "document", "")))
            .on("/users/U1", Response::json(r#"{"id": "U1", "name": "Ada"}"#));
        let (transport, saver) = export(transport, |_| {}).await;
        let page = saver.text("Private/Plan.html").unwrap();
        assert!(page.contains(r#"href="../Private/Notes.html">sibling by id"#));
        assert!(page.contains(r#"href="../Private/Notes.html">sibling by link"#));
        assert!(page.contains(r#"href="https://quip.com/OUTSIDE""#));
        assert!(page.contains(r#"href="https://quip.com/U1""#));
        assert!(page.contains(r#"href="https://quip.com/NOWHERE""#));
        assert!(transport.requested("/users/NOWHERE"));
    }

    #[tokio::test]
    async fn test_repeated_reference_is_resolved_once() {
        let html = r#"<a href="https://quip.com/NOWHERE">one</a><a href="https://quip.com/NOWHERE">two</a>"#;
        let (transport, saver) = export(single_folder(&[("T1", document("T1", "Plan", html))]), |_| {}).await;
        assert_eq!(saver.text("Private/Plan.html").unwrap().matches(r#"href="https://quip.com/NOWHERE""#).count(), 2);
        assert_eq!(transport.calls_to("/threads/NOWHERE"), 1);
        assert_eq!(transport.calls_to("/users/NOWHERE"), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_ids_are_remembered() {
        let (transport, gateway) = gateway(MockTransport::default());
        let exporter = Exporter::new(gateway, Arc::new(MemorySaver::default()), ExportOptions::builtin().unwrap()).unwrap();
        let run = Run::new(&exporter);
        assert_eq!(run.resolve_reference("NOWHERE", 0).await, None);
        assert_eq!(run.resolve_reference("NOWHERE", 1).await, None);
        assert!(run.is_unresolvable("NOWHERE"));
        assert_eq!(transport.calls_to("/threads/NOWHERE"), 1);
        assert_eq!(transport.calls_to("/users/NOWHERE"), 1);

        run.index().register("T5", EntryKind::Thread, Some("Private/".to_string()), None);
        assert_eq!(run.resolve_reference("T5", 0).await, None);
        assert_eq!(run.resolve_reference("T5", 0).await, None);
        assert_eq!(transport.calls_to("/threads/T5"), 1);
    }

    #[tokio::test]
    async fn test_references_can_be_disabled() {
        let html = r#"<a href="https://quip.com/T2">sibling</a>"#;
        let transport = single_folder(&[("T1", document("T1", "Plan", html))]);
        let (transport, saver) = export(transport, |options| options.references = false).await;
        assert!(saver.text("Private/Plan.html").unwrap().contains(r#"href="https://quip.com/T2""#));
        assert!(!transport.requested("/threads/T2"));
    }

    #[tokio::test]
    async fn test_concurrent_resolution_sets_title_once() {
        let (_, gateway) = gateway(MockTransport::default().on("/threads/T9", Response::json(thread_json("T9", "Shared Doc", "document", ""))));
        let exporter = Exporter::new(gateway, Arc::new(MemorySaver::default()), ExportOptions::builtin().unwrap()).unwrap();
        let run = Run::new(&exporter);
        run.index().register("T9", EntryKind::Thread, Some("Private/Team/".to_string()), None);
        let links = join_all((0..8).map(|_| run.resolve_reference("T9", 2))).await;
        assert!(links.iter().all(|link| link.as_deref() == Some("../../Private/Team/Shared Doc.html")));
        assert_eq!(
            run.lookup("T9"),
            Some(ReferenceEntry { kind: EntryKind::Thread, path: Some("Private/Team/".to_string()), title: Some("Shared Doc".to_string()) })
        );
        assert_eq!(run.index().len(), 1);
    }

    #[tokio::test]
    async fn test_comments_are_appended() {
        let messages = r#"[
            {"id": "M2", "author_name": "Bob", "created_usec": 2000000, "text": "Second",
             "files": [{"hash": "B1", "name": "diagram.png"}]},
            {"id": "M1", "author_name": "Ada", "created_usec": 1000000, "text": "First"},
            {"id": "M3", "author_name": "Eve", "created_usec": 1500000, "text": "Inline", "annotation": {"id": "A1"}}
        ]"#;
        let transport = single_folder(&[("T1", document("T1", "Plan", "<p>body</p>"))])
            .on("/messages/T1", Response::json(messages))
            .on("/blob/T1/B1", Response::new(200).with_header("content-type", "image/png").with_body(b"png".to_vec()));
        let (_, saver) = export(transport, |options| options.comments = true).await;
        let page = saver.text("Private/Plan.html").unwrap();
        let first = page.find("First").unwrap();
        let second = page.find("Second").unwrap();
        assert!(first < second);
        assert!(!page.contains("Inline"));
        assert!(page.contains(r#"href="blobs/diagram.png""#));
        assert!(saver.get("Private/blobs/diagram.png").is_some());
    }

    #[tokio::test]
    async fn test_renditions() {
        let transport = single_folder(&[
            ("T1", document("T1", "Plan", "<p>x</p>")),
            ("T2", thread_json("T2", "Budget", "spreadsheet", "<table></table>")),
            ("T3", thread_json("T3", "Chat", "chat", "")),
        ])
        .on("/threads/T1/export/docx", Response::new(200).with_body(b"DOCX".to_vec()))
        .on("/threads/T2/export/xlsx", Response::new(200).with_body(b"XLSX".to_vec()));
        let (transport, saver) = export(transport, |options| options.format = ExportFormat::Native).await;
        assert_eq!(saver.get("Private/Plan.docx").unwrap().0, b"DOCX");
        assert_eq!(saver.get("Private/Budget.xlsx").unwrap().0, b"XLSX");
        assert_eq!(saver.names().len(), 2);
        assert!(!transport.requested("/threads/T3/export"));
    }

    #[tokio::test]
    async fn test_pdf_rendition_missing() {
        let transport = single_folder(&[("T1", document("T1", "Plan", "<p>x</p>"))]);
        let (transport, saver) = export(transport, |options| options.format = ExportFormat::Pdf).await;
        assert!(saver.names().is_empty());
        assert_eq!(transport.calls_to("/threads/T1/export/pdf"), 1);
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_skipped_but_counted() {
        let transport = single_folder(&[("T1", thread_json("T1", "Chat", "chat", "<p>hi</p>"))]);
        let (transport, gateway) = gateway(transport);
        let saver = Arc::new(MemorySaver::default());
        let exporter = Exporter::new(gateway, saver.clone(), ExportOptions::builtin().unwrap()).unwrap();
        let summary = exporter.start_export(Some(vec!["ROOT".to_string()])).await.unwrap();
        assert_eq!(summary.counters.threads_processed, 1);
        assert!(saver.names().is_empty());
        assert!(transport.requested("/threads/?ids=T1"));
    }
}
