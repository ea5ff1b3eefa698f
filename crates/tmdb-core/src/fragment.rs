//! Coded text: plain text interleaved with markers that point into a list of
//! inline codes.
//!
//! A marker is two characters from the private-use area: the marker kind
//! (opening, closing or placeholder) followed by an index character
//! (`INDEX_BASE + position in the code list`). Plain text is the coded text
//! with every marker pair removed; it is what the n-gram analyzer sees.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MARKER_OPENING: char = '\u{E101}';
pub const MARKER_CLOSING: char = '\u{E102}';
pub const MARKER_PLACEHOLDER: char = '\u{E103}';
const INDEX_BASE: u32 = 0xE110;
// Index characters stay inside the BMP private-use area.
const MAX_CODES: u32 = 0xF8FF - INDEX_BASE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagType {
    Opening,
    Closing,
    Placeholder,
}

impl TagType {
    pub fn marker(self) -> char {
        match self {
            TagType::Opening => MARKER_OPENING,
            TagType::Closing => MARKER_CLOSING,
            TagType::Placeholder => MARKER_PLACEHOLDER,
        }
    }

    fn from_marker(c: char) -> Option<Self> {
        match c {
            MARKER_OPENING => Some(TagType::Opening),
            MARKER_CLOSING => Some(TagType::Closing),
            MARKER_PLACEHOLDER => Some(TagType::Placeholder),
            _ => None,
        }
    }
}

pub fn is_marker(c: char) -> bool {
    TagType::from_marker(c).is_some()
}

/// An inline placeholder for markup (`<b>`, `</b>`, `<br/>`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Code {
    pub tag_type: TagType,
    pub id: i32,
    pub kind: String,
    pub data: String,
}

impl Code {
    pub fn new(tag_type: TagType, id: i32, kind: impl Into<String>, data: impl Into<String>) -> Self {
        Self { tag_type, id, kind: kind.into(), data: data.into() }
    }

    pub fn list_to_string(codes: &[Code]) -> Result<String> {
        serde_json::to_string(codes)
            .map_err(|e| Error::invalid_argument(format!("codes cannot be serialized: {e}")))
    }

    /// Empty input decodes to an empty list.
    pub fn list_from_str(s: &str) -> Result<Vec<Code>> {
        if s.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(s)
            .map_err(|e| Error::invalid_argument(format!("malformed code list: {e}")))
    }
}

fn index_char(index: usize) -> Result<char> {
    let offset = u32::try_from(index)
        .ok()
        .filter(|i| *i < MAX_CODES)
        .ok_or_else(|| Error::invalid_argument(format!("too many inline codes ({index})")))?;
    char::from_u32(INDEX_BASE + offset)
        .ok_or_else(|| Error::invalid_argument(format!("no index character for code {index}")))
}

fn index_from_char(c: char) -> Option<usize> {
    let v = u32::from(c);
    (INDEX_BASE..INDEX_BASE + MAX_CODES)
        .contains(&v)
        .then(|| (v - INDEX_BASE) as usize)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextFragment {
    coded_text: String,
    codes: Vec<Code>,
}

impl TextFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragment without any inline code. Marker characters in `text` are
    /// dropped so the result always satisfies the marker/code invariant.
    pub fn from_text(text: &str) -> Self {
        Self { coded_text: text.chars().filter(|c| !is_marker(*c)).collect(), codes: Vec::new() }
    }

    /// Builds a fragment from stored parts, checking that every marker points
    /// at a code of the same tag type and that every code is referenced once.
    pub fn from_coded(coded_text: impl Into<String>, codes: Vec<Code>) -> Result<Self> {
        let coded_text = coded_text.into();
        let mut seen = vec![false; codes.len()];
        let mut chars = coded_text.chars();
        while let Some(c) = chars.next() {
            let Some(tag_type) = TagType::from_marker(c) else { continue };
            let index = chars
                .next()
                .and_then(index_from_char)
                .ok_or_else(|| Error::invalid_argument("marker without a valid code index"))?;
            let code = codes.get(index).ok_or_else(|| {
                Error::invalid_argument(format!("marker references code {index} of {}", codes.len()))
            })?;
            if code.tag_type != tag_type {
                return Err(Error::invalid_argument(format!(
                    "marker kind {tag_type:?} does not match code {index} ({:?})",
                    code.tag_type
                )));
            }
            if std::mem::replace(&mut seen[index], true) {
                return Err(Error::invalid_argument(format!("code {index} referenced twice")));
            }
        }
        if let Some(orphan) = seen.iter().position(|s| !s) {
            return Err(Error::invalid_argument(format!("code {orphan} has no marker")));
        }
        Ok(Self { coded_text, codes })
    }

    pub fn append_text(&mut self, text: &str) -> &mut Self {
        self.coded_text.extend(text.chars().filter(|c| !is_marker(*c)));
        self
    }

    /// Appends a code. The code id defaults to its position for opening and
    /// placeholder codes; a closing code reuses the id of the last unmatched
    /// opening code of the same kind.
    pub fn append_code(&mut self, tag_type: TagType, kind: &str, data: &str) -> Result<&mut Self> {
        let index = self.codes.len();
        let marker_index = index_char(index)?;
        let id = match tag_type {
            TagType::Closing => self.matching_open_id(kind).unwrap_or(index as i32 + 1),
            _ => index as i32 + 1,
        };
        self.coded_text.push(tag_type.marker());
        self.coded_text.push(marker_index);
        self.codes.push(Code::new(tag_type, id, kind, data));
        Ok(self)
    }

    fn matching_open_id(&self, kind: &str) -> Option<i32> {
        let mut depth = 0usize;
        for code in self.codes.iter().rev().filter(|c| c.kind == kind) {
            match code.tag_type {
                TagType::Closing => depth += 1,
                TagType::Opening if depth == 0 => return Some(code.id),
                TagType::Opening => depth -= 1,
                TagType::Placeholder => {}
            }
        }
        None
    }

    pub fn coded_text(&self) -> &str {
        &self.coded_text
    }

    pub fn codes(&self) -> &[Code] {
        &self.codes
    }

    pub fn has_code(&self) -> bool {
        !self.codes.is_empty()
    }

    /// True when there is neither text nor code.
    pub fn is_empty(&self) -> bool {
        self.coded_text.is_empty()
    }

    /// Plain text: the coded text with markers stripped.
    pub fn text(&self) -> String {
        plain_text(&self.coded_text)
    }

    /// Text with each marker replaced by the literal data of its code.
    pub fn to_display_text(&self) -> String {
        let mut out = String::with_capacity(self.coded_text.len());
        let mut chars = self.coded_text.chars();
        while let Some(c) = chars.next() {
            if is_marker(c) {
                if let Some(code) = chars.next().and_then(index_from_char).and_then(|i| self.codes.get(i)) {
                    out.push_str(&code.data);
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

/// Strips marker pairs from a coded text.
pub fn plain_text(coded_text: &str) -> String {
    let mut out = String::with_capacity(coded_text.len());
    let mut chars = coded_text.chars();
    while let Some(c) = chars.next() {
        if is_marker(c) {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

impl From<&str> for TextFragment {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}
