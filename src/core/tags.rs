// FILE: src/core/tags.rs
//! Song header parsing.
//!
//! A song starts with three lines, `Artist: ...`, `Album: ...`, `Title: ...`.
//! Only the part after the first `:` matters; the key itself is not checked.

use crate::error::{CatalogError, Result};

const HEADER_LINES: usize = 3;

/// Checked in order. The first one found anywhere in the value wins and its
/// length is cut from the front of the value.
const MARKERS: [&str; 3] = ["THE", "the", "The"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongTags {
    pub artist: String,
    pub album: String,
    pub title: String,
}

impl SongTags {
    /// Values in category order: Artist, Album, Title.
    pub fn values(&self) -> [&str; 3] {
        [&self.artist, &self.album, &self.title]
    }
}

pub fn extract_tags(content: &[u8]) -> Result<SongTags> {
    let mut values = Vec::with_capacity(HEADER_LINES);
    let mut rest = content;

    for line_no in 0..HEADER_LINES {
        let end = rest.iter().position(|&b| b == b'\n').ok_or_else(|| {
            CatalogError::MalformedMetadata(format!(
                "expected {} header lines, found {}",
                HEADER_LINES, line_no
            ))
        })?;
        let line = &rest[..end];
        rest = &rest[end + 1..];

        if !line.is_ascii() {
            return Err(CatalogError::MalformedMetadata(format!(
                "header line {} is not ASCII",
                line_no + 1
            )));
        }
        let line = String::from_utf8_lossy(line);

        let (_, value) = line.split_once(':').ok_or_else(|| {
            CatalogError::MalformedMetadata(format!("header line {} has no ':'", line_no + 1))
        })?;

        // The first character names the letter directory, so `.` can never lead.
        let value = strip_marker(value.trim()).trim();
        if value.is_empty() || value.starts_with('.') || value.contains('/') || value.contains('\0') {
            return Err(CatalogError::MalformedMetadata(format!(
                "header line {} has no usable value",
                line_no + 1
            )));
        }
        values.push(value.to_string());
    }

    let mut values = values.into_iter();
    match (values.next(), values.next(), values.next()) {
        (Some(artist), Some(album), Some(title)) => Ok(SongTags { artist, album, title }),
        _ => Err(CatalogError::MalformedMetadata("incomplete header".into())),
    }
}

// Values are ASCII here, so byte slicing stays on char boundaries.
fn strip_marker(value: &str) -> &str {
    for marker in MARKERS {
        if value.contains(marker) {
            return &value[marker.len()..];
        }
    }
    value
}
