//! Plain-text extraction for Word documents.
//!
//! `.docx` is a ZIP package with `word/document.xml`; legacy `.doc` is an OLE2
//! compound file with a piece table. Filenames lie, so the container is sniffed
//! from the bytes and the other extractor is tried when the first one fails.
//! PDFs are never extracted locally.

mod doc;
mod docx;

use tracing::debug;

use crate::document::{FileKind, OLE2_MAGIC};
use crate::error::ExtractError;

pub use doc::extract_doc;
pub use docx::extract_docx;

/// Extract plain text from a document.
///
/// Returns [`ExtractError::PdfPassthrough`] for PDFs and
/// [`ExtractError::UnsupportedFormat`] when neither Word extractor succeeds.
pub fn extract_text(bytes: &[u8], kind: FileKind) -> Result<String, ExtractError> {
    if kind == FileKind::Pdf {
        return Err(ExtractError::PdfPassthrough);
    }

    let legacy_first = bytes.starts_with(OLE2_MAGIC);
    let first = if legacy_first {
        extract_doc(bytes)
    } else {
        extract_docx(bytes)
    };

    let first_err = match first {
        Ok(text) => return Ok(text),
        Err(e) => e,
    };
    debug!(legacy = legacy_first, error = %first_err, "primary extractor failed, trying fallback");

    let fallback = if legacy_first {
        extract_docx(bytes)
    } else {
        extract_doc(bytes)
    };
    match fallback {
        Ok(text) => Ok(text),
        Err(second_err) => {
            let (docx, doc) = if legacy_first {
                (second_err.to_string(), first_err.to_string())
            } else {
                (first_err.to_string(), second_err.to_string())
            };
            Err(ExtractError::UnsupportedFormat { docx, doc })
        }
    }
}

/// Longest prefix of `text` holding at most `limit` characters.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Collapse runs of blank lines and trim trailing whitespace from each line.
fn tidy(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
