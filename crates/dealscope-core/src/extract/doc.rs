use std::io::{Cursor, Read};

use cfb::CompoundFile;

use super::tidy;
use crate::error::ExtractError;

const WORD_IDENT: u16 = 0xA5EC;
/// `fWhichTblStm`: the piece table lives in `1Table` rather than `0Table`.
const FLAG_TABLE_1: u16 = 0x0200;
/// Index of the `fcClx`/`lcbClx` pair in `FibRgFcLcb97`.
const CLX_PAIR: usize = 33;
const COMPRESSED: u32 = 0x4000_0000;

/// Extract main-document text from a Word 97-2003 binary file.
pub fn extract_doc(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut cfb = CompoundFile::open(Cursor::new(bytes))?;
    let word = read_stream(&mut cfb, "/WordDocument")?;

    let fib = Fib::parse(&word)?;
    let table_name = if fib.table_1 { "/1Table" } else { "/0Table" };
    let table = read_stream(&mut cfb, table_name)?;

    let clx = slice(&table, fib.fc_clx as usize, fib.lcb_clx as usize)
        .ok_or_else(|| ExtractError::Malformed("Clx lies outside the table stream".into()))?;
    let pieces = piece_table(clx)?;

    let mut raw = String::new();
    let mut remaining = fib.ccp_text as usize;
    for piece in pieces {
        if remaining == 0 {
            break;
        }
        let chars = piece.len().min(remaining);
        raw.push_str(&piece.decode(&word, chars)?);
        remaining -= chars;
    }

    let text = tidy(&clean_controls(&raw));
    if text.is_empty() {
        return Err(ExtractError::Malformed("document body has no text".into()));
    }
    Ok(text)
}

fn read_stream(cfb: &mut CompoundFile<Cursor<&[u8]>>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let mut stream = cfb.open_stream(name)?;
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf)?;
    Ok(buf)
}

/// The subset of the File Information Block needed to find the text.
struct Fib {
    table_1: bool,
    ccp_text: u32,
    fc_clx: u32,
    lcb_clx: u32,
}

impl Fib {
    fn parse(word: &[u8]) -> Result<Self, ExtractError> {
        let short = || ExtractError::Malformed("FIB is truncated".into());

        if u16_at(word, 0).ok_or_else(short)? != WORD_IDENT {
            return Err(ExtractError::Malformed("not a Word binary document".into()));
        }
        let flags = u16_at(word, 0x0A).ok_or_else(short)?;

        // FibBase is 32 bytes, then three length-prefixed blocks.
        let csw = u16_at(word, 32).ok_or_else(short)? as usize;
        let rg_lw = 32 + 2 + csw * 2;
        let cslw = u16_at(word, rg_lw).ok_or_else(short)? as usize;
        let lw = rg_lw + 2;
        let ccp_text = u32_at(word, lw + 12).ok_or_else(short)?;

        let rg_fc = lw + cslw * 4;
        let cb_rg_fc_lcb = u16_at(word, rg_fc).ok_or_else(short)? as usize;
        if cb_rg_fc_lcb <= CLX_PAIR {
            return Err(ExtractError::Malformed("FIB has no Clx entry".into()));
        }
        let blob = rg_fc + 2;
        let fc_clx = u32_at(word, blob + CLX_PAIR * 8).ok_or_else(short)?;
        let lcb_clx = u32_at(word, blob + CLX_PAIR * 8 + 4).ok_or_else(short)?;

        Ok(Self {
            table_1: flags & FLAG_TABLE_1 != 0,
            ccp_text,
            fc_clx,
            lcb_clx,
        })
    }
}

/// A run of characters stored contiguously in the WordDocument stream.
struct Piece {
    cp_start: u32,
    cp_end: u32,
    fc: u32,
}

impl Piece {
    fn len(&self) -> usize {
        self.cp_end.saturating_sub(self.cp_start) as usize
    }

    fn decode(&self, word: &[u8], chars: usize) -> Result<String, ExtractError> {
        let oob = || ExtractError::Malformed("piece lies outside the WordDocument stream".into());
        if self.fc & COMPRESSED != 0 {
            let offset = ((self.fc & !COMPRESSED) / 2) as usize;
            let bytes = slice(word, offset, chars).ok_or_else(oob)?;
            Ok(bytes.iter().map(|b| cp1252(*b)).collect())
        } else {
            let bytes = slice(word, self.fc as usize, chars * 2).ok_or_else(oob)?;
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            Ok(String::from_utf16_lossy(&units))
        }
    }
}

/// Walk the Clx: skip `Prc` entries (0x01) and parse the `Pcdt` (0x02).
fn piece_table(clx: &[u8]) -> Result<Vec<Piece>, ExtractError> {
    let bad = |msg: &str| ExtractError::Malformed(msg.to_string());
    let mut pos = 0;
    loop {
        match clx.get(pos) {
            Some(0x01) => {
                let cb = u16_at(clx, pos + 1).ok_or_else(|| bad("truncated Prc"))? as usize;
                pos += 3 + cb;
            }
            Some(0x02) => {
                let lcb = u32_at(clx, pos + 1).ok_or_else(|| bad("truncated Pcdt"))? as usize;
                let plc = slice(clx, pos + 5, lcb).ok_or_else(|| bad("truncated PlcPcd"))?;
                return parse_plc_pcd(plc);
            }
            Some(_) => return Err(bad("unexpected Clx entry")),
            None => return Err(bad("Clx has no piece table")),
        }
    }
}

/// PlcPcd: `n + 1` character positions followed by `n` 8-byte piece descriptors.
fn parse_plc_pcd(plc: &[u8]) -> Result<Vec<Piece>, ExtractError> {
    if plc.len() < 4 || (plc.len() - 4) % 12 != 0 {
        return Err(ExtractError::Malformed("PlcPcd has an odd size".into()));
    }
    let n = (plc.len() - 4) / 12;
    let pcd_base = (n + 1) * 4;
    let mut pieces = Vec::with_capacity(n);
    for i in 0..n {
        let (Some(cp_start), Some(cp_end), Some(fc)) = (
            u32_at(plc, i * 4),
            u32_at(plc, (i + 1) * 4),
            u32_at(plc, pcd_base + i * 8 + 2),
        ) else {
            return Err(ExtractError::Malformed("PlcPcd is truncated".into()));
        };
        pieces.push(Piece { cp_start, cp_end, fc });
    }
    Ok(pieces)
}

/// Map Word's in-band control characters to plain text.
fn clean_controls(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            '\r' | '\u{0B}' | '\u{0C}' => Some('\n'),
            // Table cell / row end mark.
            '\u{07}' => Some('\t'),
            '\t' | '\n' => Some(c),
            c if (c as u32) < 0x20 => None,
            c => Some(c),
        })
        .collect()
}

/// Windows-1252 to Unicode for 8-bit ("compressed") pieces.
fn cp1252(b: u8) -> char {
    const HIGH: [char; 32] = [
        '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8D}', 'Ž',
        '\u{8F}', '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{9D}',
        'ž', 'Ÿ',
    ];
    match b {
        0x80..=0x9F => HIGH[(b - 0x80) as usize],
        _ => b as char,
    }
}

fn slice(buf: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    buf.get(offset..offset.checked_add(len)?)
}

fn u16_at(buf: &[u8], offset: usize) -> Option<u16> {
    slice(buf, offset, 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn u32_at(buf: &[u8], offset: usize) -> Option<u32> {
    slice(buf, offset, 4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use super::*;

    const CSW: u16 = 14;
    const CSLW: u16 = 22;
    const CB_RG_FC_LCB: u16 = 0x5D;
    const TEXT_OFFSET: usize = 1024;

    fn put_u16(buf: &mut [u8], at: usize, v: u16) {
        buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn put_u32(buf: &mut [u8], at: usize, v: u32) {
        buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// A single-piece Word 97 file holding `text`.
    pub(crate) fn build_doc(text: &str, compressed: bool) -> Vec<u8> {
        let chars = text.chars().count() as u32;
        let encoded: Vec<u8> = if compressed {
            text.chars().map(|c| c as u8).collect()
        } else {
            text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
        };

        let mut word = vec![0u8; TEXT_OFFSET];
        put_u16(&mut word, 0, WORD_IDENT);
        put_u16(&mut word, 0x0A, FLAG_TABLE_1);
        put_u16(&mut word, 32, CSW);
        let rg_lw = 32 + 2 + CSW as usize * 2;
        put_u16(&mut word, rg_lw, CSLW);
        put_u32(&mut word, rg_lw + 2 + 12, chars);
        let rg_fc = rg_lw + 2 + CSLW as usize * 4;
        put_u16(&mut word, rg_fc, CB_RG_FC_LCB);
        word.extend_from_slice(&encoded);

        // Clx: one Prc to skip, then the Pcdt.
        let mut clx = vec![0x01, 0x02, 0x00, 0xAA, 0xBB];
        let fc = if compressed {
            (TEXT_OFFSET as u32 * 2) | COMPRESSED
        } else {
            TEXT_OFFSET as u32
        };
        let mut plc = Vec::new();
        plc.extend_from_slice(&0u32.to_le_bytes());
        plc.extend_from_slice(&chars.to_le_bytes());
        plc.extend_from_slice(&0u16.to_le_bytes());
        plc.extend_from_slice(&fc.to_le_bytes());
        plc.extend_from_slice(&0u16.to_le_bytes());
        clx.push(0x02);
        clx.extend_from_slice(&(plc.len() as u32).to_le_bytes());
        clx.extend_from_slice(&plc);

        let blob = rg_fc + 2;
        put_u32(&mut word, blob + CLX_PAIR * 8, 0);
        put_u32(&mut word, blob + CLX_PAIR * 8 + 4, clx.len() as u32);

        let mut comp = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        for (name, data) in [("/WordDocument", &word), ("/1Table", &clx)] {
            let mut stream = comp.create_stream(name).unwrap();
            stream.write_all(data).unwrap();
            stream.flush().unwrap();
        }
        comp.flush().unwrap();
        comp.into_inner().into_inner()
    }

    #[test]
    fn compressed_piece() {
        let bytes = build_doc("Liquidation preference\r1x non-participating", true);
        let text = extract_doc(&bytes).unwrap();
        assert_eq!(text, "Liquidation preference\n1x non-participating");
    }

    #[test]
    fn unicode_piece() {
        let bytes = build_doc("Prix: 10 € par action", false);
        assert_eq!(extract_doc(&bytes).unwrap(), "Prix: 10 € par action");
    }

    #[test]
    fn rejects_non_compound_files() {
        assert!(matches!(extract_doc(b"PK\x03\x04"), Err(ExtractError::Io(_))));
    }

    #[test]
    fn control_characters() {
        assert_eq!(clean_controls("a\u{07}b\u{13}c\u{15}"), "a\tbc");
        assert_eq!(cp1252(0x93), '“');
        assert_eq!(cp1252(b'A'), 'A');
    }
}
