use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;
use zip::result::ZipError;

use super::tidy;
use crate::error::ExtractError;

const MAIN_PART: &str = "word/document.xml";

/// Extract body text from an Office Open XML package.
///
/// Paragraphs (`w:p`) end with a newline, `w:tab` becomes a tab and `w:br`
/// a line break. Only runs of `w:t` contribute text.
pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    match archive.by_name(MAIN_PART) {
        Ok(mut part) => {
            part.read_to_string(&mut xml)?;
        }
        Err(ZipError::FileNotFound) => return Err(ExtractError::MissingPart(MAIN_PART)),
        Err(e) => return Err(e.into()),
    }

    let text = tidy(&document_text(&xml)?);
    if text.is_empty() {
        return Err(ExtractError::Malformed("document body has no text".into()));
    }
    Ok(text)
}

fn document_text(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => out.push_str(&t.unescape()?),
            Event::CData(t) if in_text => out.push_str(&String::from_utf8_lossy(&t)),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}
