//! Uploaded documents and the legal instrument taxonomy.

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub(crate) const PDF_MAGIC: &[u8] = b"%PDF";
pub(crate) const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
pub(crate) const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Container family of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Word,
}

impl FileKind {
    /// Sniff the file kind from magic bytes, falling back to the extension.
    pub fn sniff(filename: &str, bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PDF_MAGIC) {
            return Some(Self::Pdf);
        }
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE2_MAGIC) {
            return Some(Self::Word);
        }
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if lower.ends_with(".docx") || lower.ends_with(".doc") {
            Some(Self::Word)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Word => "word",
        }
    }
}

/// An ingested document. Content is shared, never mutated.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub content: Arc<[u8]>,
    pub kind: FileKind,
}

impl Document {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Result<Self, CoreError> {
        let filename = filename.into();
        if content.is_empty() {
            return Err(CoreError::EmptyDocument(filename));
        }
        let kind = FileKind::sniff(&filename, &content)
            .ok_or_else(|| CoreError::UnsupportedFileType(filename.clone()))?;
        Ok(Self {
            filename,
            content: content.into(),
            kind,
        })
    }

    /// Decode an upload encoded as base64, with or without a `data:` URL prefix.
    pub fn from_base64(filename: impl Into<String>, encoded: &str) -> Result<Self, CoreError> {
        let filename = filename.into();
        let payload = match encoded.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => encoded,
        };
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|source| CoreError::InvalidBase64 {
                filename: filename.clone(),
                source,
            })?;
        Self::new(filename, bytes)
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Legal instrument kinds recognised by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSubtype {
    TermSheet,
    Safe,
    ConvertibleNote,
    Spa,
    Sha,
    Ira,
    VotingAgreement,
    ArticlesCharter,
    Cla,
    SideLetter,
    Indemnification,
    DisclosureSchedule,
    ManagementRights,
    RofrCosale,
    Other,
}

impl DocumentSubtype {
    pub const ALL: [DocumentSubtype; 15] = [
        Self::TermSheet,
        Self::Safe,
        Self::ConvertibleNote,
        Self::Spa,
        Self::Sha,
        Self::Ira,
        Self::VotingAgreement,
        Self::ArticlesCharter,
        Self::Cla,
        Self::SideLetter,
        Self::Indemnification,
        Self::DisclosureSchedule,
        Self::ManagementRights,
        Self::RofrCosale,
        Self::Other,
    ];

    pub fn category(&self) -> DocumentCategory {
        match self {
            Self::TermSheet | Self::Safe | Self::ConvertibleNote | Self::Cla | Self::Spa => {
                DocumentCategory::Economics
            }
            Self::Sha
            | Self::Ira
            | Self::VotingAgreement
            | Self::ArticlesCharter
            | Self::RofrCosale => DocumentCategory::Governance,
            Self::Indemnification | Self::DisclosureSchedule => DocumentCategory::LegalGc,
            Self::SideLetter | Self::ManagementRights | Self::Other => DocumentCategory::Standalone,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TermSheet => "term_sheet",
            Self::Safe => "safe",
            Self::ConvertibleNote => "convertible_note",
            Self::Spa => "spa",
            Self::Sha => "sha",
            Self::Ira => "ira",
            Self::VotingAgreement => "voting_agreement",
            Self::ArticlesCharter => "articles_charter",
            Self::Cla => "cla",
            Self::SideLetter => "side_letter",
            Self::Indemnification => "indemnification",
            Self::DisclosureSchedule => "disclosure_schedule",
            Self::ManagementRights => "management_rights",
            Self::RofrCosale => "rofr_cosale",
            Self::Other => "other",
        }
    }

    /// Lenient parse of a service-supplied label (`"Term Sheet"`, `"term-sheet"`, `"SHA"`).
    pub fn parse(label: &str) -> Option<Self> {
        let key: String = label
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let key = key.trim_matches('_');
        let found = match key {
            "term_sheet" | "termsheet" => Self::TermSheet,
            "safe" => Self::Safe,
            "convertible_note" | "note" => Self::ConvertibleNote,
            "spa" | "share_purchase_agreement" | "stock_purchase_agreement" => Self::Spa,
            "sha" | "shareholders_agreement" | "stockholders_agreement" => Self::Sha,
            "ira" | "investors_rights_agreement" => Self::Ira,
            "voting_agreement" => Self::VotingAgreement,
            "articles_charter" | "articles" | "charter" => Self::ArticlesCharter,
            "cla" | "convertible_loan_agreement" => Self::Cla,
            "side_letter" => Self::SideLetter,
            "indemnification" | "indemnification_agreement" => Self::Indemnification,
            "disclosure_schedule" | "disclosure_letter" => Self::DisclosureSchedule,
            "management_rights" | "management_rights_letter" => Self::ManagementRights,
            "rofr_cosale" | "rofr" | "co_sale" => Self::RofrCosale,
            "other" => Self::Other,
            _ => return None,
        };
        Some(found)
    }
}

impl fmt::Display for DocumentSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis category. Phase 2 runs once per category present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Economics,
    Governance,
    LegalGc,
    Standalone,
}

impl DocumentCategory {
    /// Fixed Phase 2 processing order.
    pub const ORDER: [DocumentCategory; 4] = [
        Self::Economics,
        Self::Governance,
        Self::LegalGc,
        Self::Standalone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Economics => "economics",
            Self::Governance => "governance",
            Self::LegalGc => "legal_gc",
            Self::Standalone => "standalone",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
