// LogTab - app/buffer.rs
//
// Display buffer for one log view. Append-only while a session runs; reset
// wholesale when a new log is watched or the file turns out to be missing.
//
// Every change is announced to subscribers as a `RenderNotice` that carries
// `ScrollTarget::Bottom`: a view already showing the buffer must scroll to
// the newest content. The buffer itself knows nothing about views.

use crate::core::markup::Markup;
use serde::Serialize;
use std::sync::mpsc;

/// Where a view must scroll after applying a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollTarget {
    /// Newest content visible.
    Bottom,
}

/// What changed in the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "markup", rename_all = "lowercase")]
pub enum BufferChange {
    /// `Markup` was added to the end.
    Appended(Markup),
    /// The whole content was replaced by `Markup` (possibly empty).
    Replaced(Markup),
}

/// Sent to every subscriber on each buffer change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderNotice {
    pub revision: u64,
    pub change: BufferChange,
    pub scroll: ScrollTarget,
}

/// Accumulated sanitized markup for one log view.
#[derive(Debug, Default)]
pub struct LogBuffer {
    content: String,
    revision: u64,
    lines: usize,
    subscribers: Vec<mpsc::Sender<RenderNotice>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of changes applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of fragments appended since the last reset.
    pub fn line_count(&self) -> usize {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Receive a `RenderNotice` for every later change.
    pub fn subscribe(&mut self) -> mpsc::Receiver<RenderNotice> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Add `markup` to the end.
    pub fn append(&mut self, markup: Markup) {
        self.content.push_str(markup.as_str());
        self.lines += 1;
        self.publish(BufferChange::Appended(markup));
    }

    /// Replace the content with nothing.
    pub fn reset(&mut self) {
        self.replace(Markup::default());
    }

    /// Replace the content with `markup` (e.g. a placeholder message).
    pub fn replace(&mut self, markup: Markup) {
        self.content = markup.as_str().to_string();
        self.lines = 0;
        self.publish(BufferChange::Replaced(markup));
    }

    fn publish(&mut self, change: BufferChange) {
        self.revision += 1;
        let notice = RenderNotice {
            revision: self.revision,
            change,
            scroll: ScrollTarget::Bottom,
        };
        // Drop subscribers whose receiver is gone.
        self.subscribers.retain(|tx| tx.send(notice.clone()).is_ok());
    }
}
