//! Clipboard payloads and the writer capability.
//!
//! The core never touches a system clipboard itself. It builds a
//! [`ClipboardPayload`], validates it, and hands it to an injected
//! [`ClipboardWriter`].

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::format::{Format, MAX_CLIPBOARD_CHARS};

pub const MIME_PLAIN: &str = "text/plain";
pub const MIME_HTML: &str = "text/html";

/// One clipboard write: the same text under one or more MIME types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardPayload {
    pub entries: Vec<(&'static str, String)>,
}

impl ClipboardPayload {
    /// Build the payload for `text` copied as `format`.
    ///
    /// MathML is offered as HTML as well as plain text so rich paste
    /// targets can pick up the markup.
    pub fn new(text: &str, format: Format) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyContent);
        }
        let len = text.chars().count();
        if len > MAX_CLIPBOARD_CHARS {
            return Err(Error::ContentTooLarge {
                len,
                max: MAX_CLIPBOARD_CHARS,
            });
        }

        let mut entries = Vec::with_capacity(2);
        if format == Format::MathML {
            entries.push((MIME_HTML, text.to_string()));
        }
        entries.push((MIME_PLAIN, text.to_string()));
        Ok(Self { entries })
    }

    pub fn plain(&self) -> Option<&str> {
        self.get(MIME_PLAIN)
    }

    pub fn get(&self, mime: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(m, _)| *m == mime)
            .map(|(_, text)| text.as_str())
    }

    fn plain_only(&self) -> Option<Self> {
        if self.entries.len() == 1 {
            return None;
        }
        let plain = self.plain()?.to_string();
        Some(Self {
            entries: vec![(MIME_PLAIN, plain)],
        })
    }
}

/// System clipboard capability supplied by the host.
pub trait ClipboardWriter {
    fn write(&mut self, payload: &ClipboardPayload) -> Result<()>;
}

/// Validate and write `text`, retrying as plain text if the rich write fails.
pub fn copy_text(writer: &mut dyn ClipboardWriter, text: &str, format: Format) -> Result<()> {
    let payload = ClipboardPayload::new(text, format)?;
    match writer.write(&payload) {
        Ok(()) => {
            debug!(%format, chars = text.len(), "clipboard written");
            Ok(())
        }
        Err(first) => {
            let Some(plain) = payload.plain_only() else {
                return Err(Error::ClipboardUnavailable(first.to_string()));
            };
            warn!(error = %first, "rich clipboard write failed; retrying as plain text");
            writer
                .write(&plain)
                .map_err(|e| Error::ClipboardUnavailable(e.to_string()))
        }
    }
}

/// In-memory clipboard. Keeps every payload written.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    writes: Vec<ClipboardPayload>,
    reject_html: bool,
    reject_all: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse payloads that carry HTML, like a plain-text-only clipboard.
    pub fn plain_text_only() -> Self {
        Self {
            reject_html: true,
            ..Self::default()
        }
    }

    /// Refuse every write.
    pub fn unavailable() -> Self {
        Self {
            reject_all: true,
            ..Self::default()
        }
    }

    pub fn last(&self) -> Option<&ClipboardPayload> {
        self.writes.last()
    }

    pub fn last_text(&self) -> Option<&str> {
        self.last().and_then(ClipboardPayload::plain)
    }

    pub fn writes(&self) -> &[ClipboardPayload] {
        &self.writes
    }
}

impl ClipboardWriter for MemoryClipboard {
    fn write(&mut self, payload: &ClipboardPayload) -> Result<()> {
        if self.reject_all {
            return Err(Error::ClipboardUnavailable("clipboard disabled".into()));
        }
        if self.reject_html && payload.get(MIME_HTML).is_some() {
            return Err(Error::ClipboardUnavailable("text/html not supported".into()));
        }
        self.writes.push(payload.clone());
        Ok(())
    }
}
