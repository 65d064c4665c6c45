use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid base64 payload for {filename}: {source}")]
    InvalidBase64 {
        filename: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("document {0} is empty")]
    EmptyDocument(String),

    #[error("unsupported file type for {0} (expected PDF or Word)")]
    UnsupportedFileType(String),

    #[error("invalid pipeline transition from {from} to {to}")]
    InvalidTransition {
        from: crate::state::PipelineStatus,
        to: crate::state::PipelineStatus,
    },
}

/// Failures while turning a binary document into plain text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Both Word extractors failed; carries each extractor's message.
    #[error("unsupported format: docx extractor failed ({docx}); doc extractor failed ({doc})")]
    UnsupportedFormat { docx: String, doc: String },

    /// PDFs are forwarded to the extraction service as binary.
    #[error("PDF text extraction is delegated to the extraction service")]
    PdfPassthrough,

    #[error("zip container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("compound file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing document part: {0}")]
    MissingPart(&'static str),

    #[error("malformed document: {0}")]
    Malformed(String),
}
