//! Per-phase analysis results.
//!
//! Every optional term here follows one rule: it is only `Some` when the
//! extraction service backed it with a verbatim quote. Absence is `None`,
//! never a default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::Classification;
use crate::document::{DocumentCategory, DocumentSubtype};
use crate::jurisdiction::{InstrumentType, Jurisdiction};
use crate::source::{Flag, SourceLocation, SourcedNumber, SourcedText};

/// Lifecycle of a single analysed item (document, category, synthesis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Processing,
    Complete,
    Error,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

/// Wall-clock bookkeeping shared by all result kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl Timing {
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = self
            .started_at
            .map(|start| (now - start).num_milliseconds().max(0) as u64);
    }
}

// ── Phase 1 ──

/// Which signal decided a document's subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    #[default]
    Filename,
    Text,
    Service,
}

/// Headline terms pulled out of a single document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyTerms {
    pub parties: Vec<SourcedText>,
    pub round_type: Option<SourcedText>,
    pub valuation_cap: Option<SourcedText>,
    pub discount: Option<SourcedText>,
    pub liquidation_preference: Option<SourcedText>,
    pub anti_dilution: Option<SourcedText>,
    pub board_seats: Option<SourcedText>,
    pub protective_provisions: Vec<SourcedText>,
}

impl KeyTerms {
    /// `(term key, value)` pairs for every populated term.
    pub fn entries(&self) -> Vec<(&'static str, &SourcedText)> {
        let mut out: Vec<(&'static str, &SourcedText)> = Vec::new();
        out.extend(self.parties.iter().map(|p| ("parties", p)));
        let singles = [
            ("round_type", &self.round_type),
            ("valuation_cap", &self.valuation_cap),
            ("discount", &self.discount),
            ("liquidation_preference", &self.liquidation_preference),
            ("anti_dilution", &self.anti_dilution),
            ("board_seats", &self.board_seats),
        ];
        for (key, term) in singles {
            if let Some(term) = term {
                out.push((key, term));
            }
        }
        out.extend(
            self.protective_provisions
                .iter()
                .map(|p| ("protective_provisions", p)),
        );
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// A risk flag raised during quick extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickFlag {
    pub flag: Flag,
    pub topic: String,
    pub issue: String,
    pub source: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase1Result {
    pub id: String,
    pub filename: String,
    pub status: ItemStatus,
    pub subtype: DocumentSubtype,
    pub category: DocumentCategory,
    pub classified_by: ClassificationSource,
    pub classification_confidence: Option<f32>,
    pub jurisdiction: Jurisdiction,
    pub key_terms: KeyTerms,
    pub quick_flags: Vec<QuickFlag>,
    pub summary: Option<String>,
    /// Extracted text sent to the service (Word only; PDFs are passed through).
    pub raw_text: Option<String>,
    /// Bundle this document was analysed in, if any.
    pub group_id: Option<String>,
    pub model: Option<String>,
    pub error: Option<String>,
    pub timing: Timing,
}

impl Phase1Result {
    /// A `pending` result for the document at `index`, classified by filename.
    pub fn pending(index: usize, filename: &str, classification: Classification) -> Self {
        Self {
            id: format!("doc-{}", index + 1),
            filename: filename.to_string(),
            status: ItemStatus::Pending,
            subtype: classification.subtype,
            category: classification.category,
            classified_by: ClassificationSource::Filename,
            classification_confidence: None,
            jurisdiction: Jurisdiction::Unknown,
            key_terms: KeyTerms::default(),
            quick_flags: Vec::new(),
            summary: None,
            raw_text: None,
            group_id: None,
            model: None,
            error: None,
            timing: Timing::default(),
        }
    }

    pub fn begin(&mut self) {
        self.status = ItemStatus::Processing;
        self.timing.start();
    }

    pub fn complete(&mut self) {
        self.status = ItemStatus::Complete;
        self.timing.finish();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ItemStatus::Error;
        self.error = Some(message.into());
        self.timing.finish();
    }

    pub fn reclassify(&mut self, classification: Classification, by: ClassificationSource) {
        self.subtype = classification.subtype;
        self.category = classification.category;
        self.classified_by = by;
    }

    pub fn is_complete(&self) -> bool {
        self.status == ItemStatus::Complete
    }
}

// ── Phase 2 ──

/// A deep-analysed term with its severity and rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermAssessment {
    /// Short name of the term (used for standalone key provisions).
    pub term: Option<String>,
    pub summary: String,
    pub flag: Option<Flag>,
    pub rationale: Option<String>,
    pub source: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationPreference {
    pub multiple: Option<f64>,
    /// `participating`, `non_participating` or `capped_participating`.
    pub participation: Option<String>,
    /// `senior`, `pari_passu` or `junior`.
    pub seniority: Option<String>,
    pub flag: Option<Flag>,
    pub rationale: Option<String>,
    pub source: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardComposition {
    pub total_seats: Option<u32>,
    pub investor_seats: Option<u32>,
    pub founder_seats: Option<u32>,
    pub independent_seats: Option<u32>,
    pub flag: Option<Flag>,
    pub rationale: Option<String>,
    pub source: SourceLocation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EconomicsAnalysis {
    pub liquidation_preference: Option<LiquidationPreference>,
    pub anti_dilution: Option<TermAssessment>,
    pub dividends: Option<TermAssessment>,
    pub redemption_rights: Option<TermAssessment>,
    pub pay_to_play: Option<TermAssessment>,
    pub warrants: Option<TermAssessment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernanceAnalysis {
    pub board_composition: Option<BoardComposition>,
    pub protective_provisions: Option<TermAssessment>,
    pub drag_along: Option<TermAssessment>,
    pub tag_along: Option<TermAssessment>,
    pub information_rights: Option<TermAssessment>,
    pub voting_thresholds: Option<TermAssessment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegalGcAnalysis {
    pub representations_warranties: Option<TermAssessment>,
    pub indemnification: Option<TermAssessment>,
    pub governing_law: Option<TermAssessment>,
    pub dispute_resolution: Option<TermAssessment>,
    pub conditions_precedent: Option<TermAssessment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandaloneAnalysis {
    pub key_provisions: Vec<TermAssessment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum CategoryAnalysis {
    Economics(EconomicsAnalysis),
    Governance(GovernanceAnalysis),
    LegalGc(LegalGcAnalysis),
    Standalone(StandaloneAnalysis),
}

impl CategoryAnalysis {
    /// Every flag carried by a sub-term.
    pub fn flags(&self) -> Vec<Flag> {
        self.terms()
            .into_iter()
            .filter_map(|(_, flag, _)| flag)
            .collect()
    }

    /// `(term key, flag, source)` for every populated sub-term.
    pub fn terms(&self) -> Vec<(String, Option<Flag>, &SourceLocation)> {
        fn push<'a>(
            out: &mut Vec<(String, Option<Flag>, &'a SourceLocation)>,
            key: &str,
            term: &'a Option<TermAssessment>,
        ) {
            if let Some(t) = term {
                out.push((key.to_string(), t.flag, &t.source));
            }
        }

        let mut out = Vec::new();
        match self {
            Self::Economics(e) => {
                if let Some(lp) = &e.liquidation_preference {
                    out.push(("liquidation_preference".to_string(), lp.flag, &lp.source));
                }
                push(&mut out, "anti_dilution", &e.anti_dilution);
                push(&mut out, "dividends", &e.dividends);
                push(&mut out, "redemption_rights", &e.redemption_rights);
                push(&mut out, "pay_to_play", &e.pay_to_play);
                push(&mut out, "warrants", &e.warrants);
            }
            Self::Governance(g) => {
                if let Some(board) = &g.board_composition {
                    out.push(("board_composition".to_string(), board.flag, &board.source));
                }
                push(&mut out, "protective_provisions", &g.protective_provisions);
                push(&mut out, "drag_along", &g.drag_along);
                push(&mut out, "tag_along", &g.tag_along);
                push(&mut out, "information_rights", &g.information_rights);
                push(&mut out, "voting_thresholds", &g.voting_thresholds);
            }
            Self::LegalGc(l) => {
                push(&mut out, "representations_warranties", &l.representations_warranties);
                push(&mut out, "indemnification", &l.indemnification);
                push(&mut out, "governing_law", &l.governing_law);
                push(&mut out, "dispute_resolution", &l.dispute_resolution);
                push(&mut out, "conditions_precedent", &l.conditions_precedent);
            }
            Self::Standalone(s) => {
                for (i, p) in s.key_provisions.iter().enumerate() {
                    let key = p
                        .term
                        .clone()
                        .unwrap_or_else(|| format!("key_provision_{}", i + 1));
                    out.push((key, p.flag, &p.source));
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase2Result {
    pub category: DocumentCategory,
    pub status: ItemStatus,
    pub analysis: Option<CategoryAnalysis>,
    pub summary: Vec<String>,
    pub flag: Option<Flag>,
    pub source_documents: Vec<String>,
    pub model: Option<String>,
    pub error: Option<String>,
    pub timing: Timing,
}

impl Phase2Result {
    pub fn pending(category: DocumentCategory, source_documents: Vec<String>) -> Self {
        Self {
            category,
            status: ItemStatus::Pending,
            analysis: None,
            summary: Vec::new(),
            flag: None,
            source_documents,
            model: None,
            error: None,
            timing: Timing::default(),
        }
    }

    pub fn begin(&mut self) {
        self.status = ItemStatus::Processing;
        self.timing.start();
    }

    pub fn complete(&mut self) {
        self.status = ItemStatus::Complete;
        self.timing.finish();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ItemStatus::Error;
        self.error = Some(message.into());
        self.timing.finish();
    }
}

// ── Phase 3 ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummaryPoint {
    pub text: String,
    pub flag: Flag,
    pub category: String,
}

/// Headline numbers of the round. Every field requires a source quote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    pub round_type: Option<SourcedText>,
    pub pre_money_valuation: Option<SourcedNumber>,
    pub post_money_valuation: Option<SourcedNumber>,
    pub round_size: Option<SourcedNumber>,
    pub price_per_share: Option<SourcedNumber>,
    pub option_pool: Option<SourcedNumber>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Conflict,
    MissingDocument,
    Inconsistency,
}

impl IssueKind {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "conflict" => Self::Conflict,
            "missing_document" | "missing" => Self::MissingDocument,
            _ => Self::Inconsistency,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::MissingDocument => "missing_document",
            Self::Inconsistency => "inconsistency",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossDocumentIssue {
    pub kind: IssueKind,
    pub description: String,
    pub documents: Vec<String>,
    pub flag: Option<Flag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionFlag {
    pub flag: Flag,
    pub justification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagSummary {
    pub economics: Option<DimensionFlag>,
    pub governance: Option<DimensionFlag>,
    pub dilution: Option<DimensionFlag>,
    pub investor_rights: Option<DimensionFlag>,
    pub legal_risk: Option<DimensionFlag>,
}

impl FlagSummary {
    pub fn dimensions(&self) -> [(&'static str, Option<&DimensionFlag>); 5] {
        [
            ("economics", self.economics.as_ref()),
            ("governance", self.governance.as_ref()),
            ("dilution", self.dilution.as_ref()),
            ("investor_rights", self.investor_rights.as_ref()),
            ("legal_risk", self.legal_risk.as_ref()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase3Result {
    pub status: ItemStatus,
    pub executive_summary: Vec<ExecutiveSummaryPoint>,
    pub transaction_snapshot: TransactionSnapshot,
    pub cross_document_issues: Vec<CrossDocumentIssue>,
    pub flag_summary: FlagSummary,
    pub jurisdiction: Jurisdiction,
    pub instrument_type: InstrumentType,
    pub documents_analyzed: Vec<String>,
    pub model: Option<String>,
    pub error: Option<String>,
    pub timing: Timing,
}

impl Phase3Result {
    /// A result carrying only locally computed context.
    pub fn local(
        jurisdiction: Jurisdiction,
        instrument_type: InstrumentType,
        documents_analyzed: Vec<String>,
    ) -> Self {
        Self {
            status: ItemStatus::Pending,
            executive_summary: Vec::new(),
            transaction_snapshot: TransactionSnapshot::default(),
            cross_document_issues: Vec::new(),
            flag_summary: FlagSummary::default(),
            jurisdiction,
            instrument_type,
            documents_analyzed,
            model: None,
            error: None,
            timing: Timing::default(),
        }
    }

    pub fn begin(&mut self) {
        self.status = ItemStatus::Processing;
        self.timing.start();
    }

    pub fn complete(&mut self) {
        self.status = ItemStatus::Complete;
        self.timing.finish();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ItemStatus::Error;
        self.error = Some(message.into());
        self.timing.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;

    #[test]
    fn phase1_lifecycle() {
        let mut r = Phase1Result::pending(0, "SHA.docx", classify("SHA.docx", None));
        assert_eq!(r.id, "doc-1");
        assert_eq!(r.status, ItemStatus::Pending);
        r.begin();
        assert_eq!(r.status, ItemStatus::Processing);
        assert!(r.timing.started_at.is_some());
        r.complete();
        assert!(r.status.is_terminal());
        assert!(r.timing.duration_ms.is_some());
    }

    #[test]
    fn phase1_failure_records_message() {
        let mut r = Phase1Result::pending(2, "x.pdf", classify("x.pdf", None));
        r.begin();
        r.fail("service timed out");
        assert_eq!(r.status, ItemStatus::Error);
        assert_eq!(r.error.as_deref(), Some("service timed out"));
    }

    #[test]
    fn key_term_entries_skip_absent_terms() {
        let mut terms = KeyTerms::default();
        assert!(terms.is_empty());
        terms.discount = Some(SourcedText {
            value: "20%".into(),
            source: SourceLocation::quote("a discount of 20%").with_page(2),
        });
        let entries = terms.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "discount");
    }

    #[test]
    fn category_analysis_collects_flags() {
        let analysis = CategoryAnalysis::Economics(EconomicsAnalysis {
            liquidation_preference: Some(LiquidationPreference {
                multiple: Some(1.0),
                participation: Some("non_participating".into()),
                seniority: None,
                flag: Some(Flag::Green),
                rationale: None,
                source: SourceLocation::quote("1x non-participating"),
            }),
            warrants: Some(TermAssessment {
                term: None,
                summary: "Warrant coverage 10%".into(),
                flag: Some(Flag::Amber),
                rationale: None,
                source: SourceLocation::quote("warrants"),
            }),
            ..Default::default()
        });
        assert_eq!(analysis.flags(), vec![Flag::Green, Flag::Amber]);
        assert_eq!(analysis.terms()[0].0, "liquidation_preference");
    }

    #[test]
    fn issue_kind_parse_defaults_to_inconsistency() {
        assert_eq!(IssueKind::parse("Missing Document"), IssueKind::MissingDocument);
        assert_eq!(IssueKind::parse("conflict"), IssueKind::Conflict);
        assert_eq!(IssueKind::parse("weird"), IssueKind::Inconsistency);
    }
}
