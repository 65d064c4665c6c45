//! Flattening of source-bearing fields into audit rows.

use serde::{Deserialize, Serialize};

use crate::results::{ItemStatus, TransactionSnapshot};
use crate::source::{BoundingBox, SourceLocation};
use crate::state::PipelineState;

/// One extracted value and where it was quoted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub run_id: String,
    pub phase: u8,
    /// `key_terms`, `quick_flags`, a category name, or `transaction_snapshot`.
    pub section: String,
    pub term_key: String,
    pub value: Option<String>,
    pub page: Option<u32>,
    pub bbox: Option<BoundingBox>,
    pub quote: String,
    pub confidence: Option<f32>,
    pub document: Option<String>,
}

impl AuditRecord {
    fn new(
        state: &PipelineState,
        phase: u8,
        section: &str,
        term_key: &str,
        value: Option<String>,
        source: &SourceLocation,
    ) -> Self {
        Self {
            run_id: state.run_id.clone(),
            phase,
            section: section.to_string(),
            term_key: term_key.to_string(),
            value,
            page: source.page,
            bbox: source.bbox,
            quote: source.quote.clone(),
            confidence: None,
            document: source.document.clone(),
        }
    }
}

/// Collect one row per source-bearing field across all completed phases.
pub fn collect_audit_trail(state: &PipelineState) -> Vec<AuditRecord> {
    let mut rows = Vec::new();

    for doc in state.phase1_results.iter().filter(|r| r.is_complete()) {
        for (key, term) in doc.key_terms.entries() {
            let mut row = AuditRecord::new(state, 1, "key_terms", key, Some(term.value.clone()), &term.source);
            row.confidence = doc.classification_confidence;
            row.document.get_or_insert_with(|| doc.filename.clone());
            rows.push(row);
        }
        for flag in &doc.quick_flags {
            if let Some(source) = &flag.source {
                let value = format!("{}: {}", flag.flag, flag.issue);
                let mut row = AuditRecord::new(state, 1, "quick_flags", &flag.topic, Some(value), source);
                row.document.get_or_insert_with(|| doc.filename.clone());
                rows.push(row);
            }
        }
    }

    for category in state
        .phase2_results
        .iter()
        .filter(|r| r.status == ItemStatus::Complete)
    {
        let Some(analysis) = &category.analysis else {
            continue;
        };
        for (key, flag, source) in analysis.terms() {
            let value = flag.map(|f| f.to_string());
            rows.push(AuditRecord::new(state, 2, category.category.as_str(), &key, value, source));
        }
    }

    if let Some(synthesis) = state
        .phase3_result
        .as_ref()
        .filter(|r| r.status == ItemStatus::Complete)
    {
        snapshot_rows(state, &synthesis.transaction_snapshot, &mut rows);
    }

    rows
}

fn snapshot_rows(state: &PipelineState, snapshot: &TransactionSnapshot, rows: &mut Vec<AuditRecord>) {
    const SECTION: &str = "transaction_snapshot";
    if let Some(round) = &snapshot.round_type {
        rows.push(AuditRecord::new(state, 3, SECTION, "round_type", Some(round.value.clone()), &round.source));
    }
    let numbers = [
        ("pre_money_valuation", &snapshot.pre_money_valuation),
        ("post_money_valuation", &snapshot.post_money_valuation),
        ("round_size", &snapshot.round_size),
        ("price_per_share", &snapshot.price_per_share),
        ("option_pool", &snapshot.option_pool),
    ];
    for (key, number) in numbers {
        if let Some(n) = number {
            let value = match &n.currency {
                Some(ccy) => format!("{} {ccy}", n.value),
                None => n.value.to_string(),
            };
            rows.push(AuditRecord::new(state, 3, SECTION, key, Some(value), &n.source));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::document::DocumentCategory;
    use crate::jurisdiction::{InstrumentType, Jurisdiction};
    use crate::results::{
        CategoryAnalysis, GovernanceAnalysis, Phase1Result, Phase2Result, Phase3Result, QuickFlag,
        TermAssessment,
    };
    use crate::source::{Flag, SourcedNumber, SourcedText};
    use crate::state::RunConfig;

    fn state() -> PipelineState {
        let mut state = PipelineState::new("run-7", RunConfig::default());

        let mut doc = Phase1Result::pending(0, "SHA.docx", classify("SHA.docx", None));
        doc.key_terms.board_seats = Some(SourcedText {
            value: "2 investor seats".into(),
            source: SourceLocation::quote("two (2) directors nominated by the Investors").with_page(4),
        });
        doc.quick_flags.push(QuickFlag {
            flag: Flag::Red,
            topic: "drag_along".into(),
            issue: "Drag at 50% of preferred".into(),
            source: Some(SourceLocation::quote("holders of 50% of the Preferred")),
        });
        doc.quick_flags.push(QuickFlag {
            flag: Flag::Amber,
            topic: "unsourced".into(),
            issue: "no quote".into(),
            source: None,
        });
        doc.classification_confidence = Some(0.9);
        doc.complete();
        state.phase1_results.push(doc);

        let mut failed = Phase1Result::pending(1, "x.pdf", classify("x.pdf", None));
        failed.key_terms.discount = Some(SourcedText {
            value: "ignored".into(),
            source: SourceLocation::quote("ignored"),
        });
        failed.fail("timeout");
        state.phase1_results.push(failed);

        let mut gov = Phase2Result::pending(DocumentCategory::Governance, vec!["SHA.docx".into()]);
        gov.analysis = Some(CategoryAnalysis::Governance(GovernanceAnalysis {
            drag_along: Some(TermAssessment {
                term: None,
                summary: "Drag at 50%".into(),
                flag: Some(Flag::Red),
                rationale: None,
                source: SourceLocation::quote("holders of 50%"),
            }),
            ..Default::default()
        }));
        gov.status = ItemStatus::Complete;
        state.phase2_results.push(gov);

        let mut synthesis = Phase3Result::local(
            Jurisdiction::Uk,
            InstrumentType::UkBvcaEquity,
            vec!["SHA.docx".into()],
        );
        synthesis.transaction_snapshot.round_size = Some(SourcedNumber {
            value: 5_000_000.0,
            currency: Some("GBP".into()),
            source: SourceLocation::quote("£5,000,000"),
        });
        synthesis.status = ItemStatus::Complete;
        state.phase3_result = Some(synthesis);
        state
    }

    #[test]
    fn rows_cover_all_three_phases() {
        let rows = collect_audit_trail(&state());
        let keys: Vec<(u8, &str, &str)> = rows
            .iter()
            .map(|r| (r.phase, r.section.as_str(), r.term_key.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (1, "key_terms", "board_seats"),
                (1, "quick_flags", "drag_along"),
                (2, "governance", "drag_along"),
                (3, "transaction_snapshot", "round_size"),
            ]
        );
        assert!(rows.iter().all(|r| r.run_id == "run-7"));
    }

    #[test]
    fn phase1_rows_carry_page_document_and_confidence() {
        let rows = collect_audit_trail(&state());
        let board = &rows[0];
        assert_eq!(board.page, Some(4));
        assert_eq!(board.document.as_deref(), Some("SHA.docx"));
        assert_eq!(board.confidence, Some(0.9));
        assert_eq!(board.value.as_deref(), Some("2 investor seats"));
    }

    #[test]
    fn snapshot_numbers_include_currency() {
        let rows = collect_audit_trail(&state());
        assert_eq!(rows[3].value.as_deref(), Some("5000000 GBP"));
        assert_eq!(rows[2].value.as_deref(), Some("RED"));
    }

    #[test]
    fn empty_state_has_no_rows() {
        let state = PipelineState::new("run-0", RunConfig::default());
        assert!(collect_audit_trail(&state).is_empty());
    }
}
