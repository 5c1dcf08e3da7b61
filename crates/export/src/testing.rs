//! Fixtures shared by unit tests.

use crate::phase::{ExportSummary, Observer, Phase, ProgressEvent};
use crate::save::{SaveKind, Saver, save_path};
use async_trait::async_trait;
use quipx_api::{Gateway, MockTransport};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn gateway(transport: MockTransport) -> (Arc<MockTransport>, Arc<Gateway>) {
    let transport = Arc::new(transport);
    let gateway = Gateway::new(transport.clone(), "token")
        .with_base_url(MockTransport::BASE_URL)
        .with_default_backoff(Duration::ZERO);
    (transport, Arc::new(gateway))
}

/// JSON payload of a folder.
pub(crate) fn folder_json(id: &str, title: &str, threads: &[&str], folders: &[&str], restricted: &[&str]) -> String {
    let children: Vec<serde_json::Value> = threads
        .iter()
        .map(|id| serde_json::json!({ "thread_id": id }))
        .chain(folders.iter().map(|id| serde_json::json!({ "folder_id": id })))
        .chain(restricted.iter().map(|id| serde_json::json!({ "folder_id": id, "restricted": true })))
        .collect();
    serde_json::json!({ "folder": { "id": id, "title": title }, "children": children }).to_string()
}

/// JSON payload of a thread.
pub(crate) fn thread_json(id: &str, title: &str, kind: &str, html: &str) -> String {
    serde_json::json!({ "thread": { "id": id, "title": title, "type": kind, "link": "" }, "html": html }).to_string()
}

pub(crate) fn document(id: &str, title: &str, html: &str) -> String {
    thread_json(id, title, "document", html)
}

/// Batch response keyed by each thread's id.
pub(crate) fn threads_json(threads: &[String]) -> String {
    let map: serde_json::Map<String, serde_json::Value> = threads
        .iter()
        .map(|json| {
            let value: serde_json::Value = serde_json::from_str(json).unwrap();
            (value["thread"]["id"].as_str().unwrap().to_string(), value)
        })
        .collect();
    serde_json::Value::Object(map).to_string()
}

#[derive(Default)]
pub(crate) struct MemorySaver {
    files: Mutex<BTreeMap<String, (Vec<u8>, SaveKind)>>,
}
impl MemorySaver {
    pub(crate) fn get(&self, path: &str) -> Option<(Vec<u8>, SaveKind)> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub(crate) fn text(&self, path: &str) -> Option<String> {
        self.get(path).and_then(|(data, _)| String::from_utf8(data).ok())
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl Saver for MemorySaver {
    async fn save(&self, content: Vec<u8>, file_name: &str, kind: SaveKind, folder: &str) {
        self.files.lock().unwrap().insert(save_path(file_name, kind, folder), (content, kind));
    }
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    transitions: Mutex<Vec<(Phase, Phase)>>,
    events: Mutex<Vec<ProgressEvent>>,
    completed: Mutex<Option<ExportSummary>>,
}
impl RecordingObserver {
    /// `(new, previous)` pairs in call order.
    pub(crate) fn transitions(&self) -> Vec<(Phase, Phase)> {
        self.transitions.lock().unwrap().clone()
    }

    pub(crate) fn phases(&self) -> Vec<Phase> {
        self.transitions().into_iter().map(|(new, _)| new).collect()
    }

    pub(crate) fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn completed(&self) -> Option<ExportSummary> {
        *self.completed.lock().unwrap()
    }
}
impl Observer for RecordingObserver {
    fn on_phase(&self, new: Phase, previous: Phase) {
        self.transitions.lock().unwrap().push((new, previous));
    }

    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_complete(&self, summary: &ExportSummary) {
        *self.completed.lock().unwrap() = Some(*summary);
    }
}
