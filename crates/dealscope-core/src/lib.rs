//! Core types for legal document analysis: documents, instrument classification,
//! bundling, phase results, run state and text extraction.

pub mod audit;
pub mod classifier;
pub mod document;
pub mod error;
pub mod extract;
pub mod grouping;
pub mod jurisdiction;
pub mod results;
pub mod source;
pub mod state;

pub use audit::{AuditRecord, collect_audit_trail};
pub use classifier::{Classification, classify};
pub use document::{Document, DocumentCategory, DocumentSubtype, FileKind};
pub use error::{CoreError, ExtractError};
pub use extract::{extract_text, truncate_chars};
pub use grouping::{DocumentGroup, DocumentInfo, GroupKind, group_documents};
pub use jurisdiction::{InstrumentType, Jurisdiction, derive_instrument_type, majority_jurisdiction};
pub use results::{
    BoardComposition, CategoryAnalysis, ClassificationSource, CrossDocumentIssue,
    DimensionFlag, EconomicsAnalysis, ExecutiveSummaryPoint, FlagSummary, GovernanceAnalysis,
    IssueKind, ItemStatus, KeyTerms, LegalGcAnalysis, LiquidationPreference, Phase1Result,
    Phase2Result, Phase3Result, QuickFlag, StandaloneAnalysis, TermAssessment,
    Timing, TransactionSnapshot,
};
pub use source::{BoundingBox, Flag, SourceLocation, SourcedNumber, SourcedText};
pub use state::{PhaseProgress, PipelineProgress, PipelineState, PipelineStatus, RunConfig};
