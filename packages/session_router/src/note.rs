//! Plain-text note buffer.
//!
//! A [`NoteEditor`] for surfaces that cannot render rich text. Positions are
//! counted in characters. Formatting is remembered as spans but never drawn.

use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, warn};

use crate::collaborators::NoteEditor;
use crate::connection::Outbound;

/// A formatting attribute applied to a character range.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatSpan {
    pub format_type: String,
    pub value: Value,
    pub index: usize,
    pub length: usize,
}

#[derive(Default)]
pub struct NoteBuffer {
    text: String,
    formats: Vec<FormatSpan>,
    outbound: Option<Outbound>,
    mirror: Option<PathBuf>,
}

impl NoteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite `path` with the document text after every change.
    pub fn with_mirror(mut self, path: impl Into<PathBuf>) -> Self {
        self.mirror = Some(path.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn formats(&self) -> &[FormatSpan] {
        &self.formats
    }

    pub fn is_bound(&self) -> bool {
        self.outbound.is_some()
    }

    fn byte_offset(&self, index: usize) -> usize {
        self.text
            .char_indices()
            .nth(index)
            .map(|(offset, _)| offset)
            .unwrap_or(self.text.len())
    }

    /// Out-of-range positions are clamped to the document end.
    fn insert_chars(&mut self, text: &str, index: usize) {
        let offset = self.byte_offset(index);
        self.text.insert_str(offset, text);
        self.write_mirror();
    }

    fn delete_chars(&mut self, length: usize, index: usize) {
        let len = self.text.chars().count();
        let index = index.min(len);
        let length = length.min(len - index);
        let start = self.byte_offset(index);
        let end = self.byte_offset(index + length);
        self.text.replace_range(start..end, "");
        self.write_mirror();
    }

    fn write_mirror(&self) {
        if let Some(path) = &self.mirror {
            if let Err(e) = fs::write(path, &self.text) {
                warn!("Failed to mirror note to {}: {}", path.display(), e);
            }
        }
    }
}

/// Concatenate the text inserts of a `{ "ops": [...] }` delta.
///
/// Embeds (non-string inserts) and retain/delete ops carry no text. A missing
/// or null delta is an empty document.
pub fn delta_text(delta: &Value) -> String {
    let ops = match delta {
        Value::Object(map) => map.get("ops"),
        Value::Array(_) => Some(delta),
        _ => None,
    };
    ops.and_then(Value::as_array)
        .map(|ops| {
            ops.iter()
                .filter_map(|op| op.get("insert").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

impl NoteEditor for NoteBuffer {
    fn set_connection(&mut self, outbound: Outbound) {
        self.outbound = Some(outbound);
    }

    fn insert_text(&mut self, text: &str, index: usize) {
        self.insert_chars(text, index);
    }

    fn delete_text(&mut self, length: usize, index: usize) {
        self.delete_chars(length, index);
    }

    fn apply_format_changes(&mut self, format_type: &str, value: Value, index: usize, length: usize) {
        debug!(
            "Format {} = {} over {}..{}",
            format_type,
            value,
            index,
            index.saturating_add(length)
        );
        self.formats.push(FormatSpan {
            format_type: format_type.to_string(),
            value,
            index,
            length,
        });
    }

    fn load_delta(&mut self, delta: Value) {
        self.text = delta_text(&delta);
        self.formats.clear();
        self.write_mirror();
    }
}
