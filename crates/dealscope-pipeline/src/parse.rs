//! Validation of untrusted service responses.
//!
//! Nothing is inferred here: a value without a verbatim quote is dropped, an
//! unrecognised label becomes `None`, a missing array becomes empty.

use dealscope_core::{
    BoardComposition, BoundingBox, CategoryAnalysis, CrossDocumentIssue, DimensionFlag,
    DocumentCategory, DocumentSubtype, EconomicsAnalysis, ExecutiveSummaryPoint, Flag,
    FlagSummary, GovernanceAnalysis, InstrumentType, IssueKind, Jurisdiction, KeyTerms,
    LegalGcAnalysis, LiquidationPreference, QuickFlag, SourceLocation, SourcedNumber, SourcedText,
    StandaloneAnalysis, TermAssessment, TransactionSnapshot,
};
use serde_json::Value;

use crate::error::ItemError;

// ── Primitives ──

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn page(v: Option<&Value>) -> Option<u32> {
    let n = match v? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    u32::try_from(n).ok().filter(|p| *p >= 1)
}

fn count(v: Option<&Value>) -> Option<u32> {
    v.and_then(Value::as_u64).and_then(|n| u32::try_from(n).ok())
}

fn bbox(v: Option<&Value>) -> Option<BoundingBox> {
    let v = v?;
    let field = |k: &str| v.get(k).and_then(Value::as_f64);
    BoundingBox {
        x: field("x")?,
        y: field("y")?,
        width: field("width")?,
        height: field("height")?,
    }
    .normalized()
}

pub fn flag(v: Option<&Value>) -> Option<Flag> {
    v.and_then(Value::as_str).and_then(Flag::parse)
}

/// Source location from an object carrying `quote`, `page` and friends.
///
/// `None` unless the quote is non-empty.
pub fn source_location(v: &Value) -> Option<SourceLocation> {
    let quote = non_empty_str(v.get("quote"))?;
    Some(SourceLocation {
        quote,
        page: page(v.get("page")),
        section: non_empty_str(v.get("section")),
        bbox: bbox(v.get("bbox")),
        snippet_ref: None,
        document: non_empty_str(v.get("document")),
    })
}

/// `{value, quote, page, ...}` with a non-null value and a non-empty quote.
pub fn sourced_text(v: &Value) -> Option<SourcedText> {
    let value = match v.get("value")? {
        Value::Null => return None,
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(_) | Value::Object(_) => return None,
        other => other.to_string(),
    };
    Some(SourcedText {
        value,
        source: source_location(v)?,
    })
}

/// Like [`sourced_text`], with the value read as a number.
///
/// Strings such as `"$8,000,000"` are accepted; anything not reducible to a
/// plain number is rejected rather than guessed at.
pub fn sourced_number(v: &Value) -> Option<SourcedNumber> {
    let value = match v.get("value")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_amount(s)?,
        _ => return None,
    };
    Some(SourcedNumber {
        value,
        currency: non_empty_str(v.get("currency")),
        source: source_location(v)?,
    })
}

fn parse_amount(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_start_matches(['$', '£', '€'])
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    cleaned.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn sourced_list(v: Option<&Value>) -> Vec<SourcedText> {
    v.and_then(Value::as_array)
        .map(|items| items.iter().filter_map(sourced_text).collect())
        .unwrap_or_default()
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|i| non_empty_str(Some(i))).collect())
        .unwrap_or_default()
}

fn require_object(v: &Value) -> Result<(), ItemError> {
    if v.is_object() {
        Ok(())
    } else {
        Err(ItemError::Schema("expected a JSON object".into()))
    }
}

// ── Phase 1 ──

/// Validated per-document output of the quick extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Phase1Extraction {
    pub document_type: Option<DocumentSubtype>,
    pub confidence: Option<f32>,
    pub jurisdiction: Jurisdiction,
    pub summary: Option<String>,
    pub key_terms: KeyTerms,
    pub quick_flags: Vec<QuickFlag>,
}

pub fn phase1_document(v: &Value) -> Result<Phase1Extraction, ItemError> {
    require_object(v)?;
    let terms = v.get("key_terms").unwrap_or(&Value::Null);
    let single = |k: &str| terms.get(k).and_then(sourced_text);

    let key_terms = KeyTerms {
        parties: sourced_list(terms.get("parties")),
        round_type: single("round_type"),
        valuation_cap: single("valuation_cap"),
        discount: single("discount"),
        liquidation_preference: single("liquidation_preference"),
        anti_dilution: single("anti_dilution"),
        board_seats: single("board_seats"),
        protective_provisions: sourced_list(terms.get("protective_provisions")),
    };

    let quick_flags = v
        .get("quick_flags")
        .and_then(Value::as_array)
        .map(|flags| flags.iter().filter_map(quick_flag).collect())
        .unwrap_or_default();

    let confidence = v
        .get("classification_confidence")
        .and_then(Value::as_f64)
        .filter(|c| (0.0..=1.0).contains(c))
        .map(|c| c as f32);

    Ok(Phase1Extraction {
        document_type: v
            .get("document_type")
            .and_then(Value::as_str)
            .and_then(DocumentSubtype::parse),
        confidence,
        jurisdiction: v
            .get("jurisdiction")
            .and_then(Value::as_str)
            .map(Jurisdiction::parse)
            .unwrap_or_default(),
        summary: non_empty_str(v.get("summary")),
        key_terms,
        quick_flags,
    })
}

fn quick_flag(v: &Value) -> Option<QuickFlag> {
    Some(QuickFlag {
        flag: flag(v.get("flag"))?,
        topic: non_empty_str(v.get("topic")).unwrap_or_else(|| "general".into()),
        issue: non_empty_str(v.get("issue"))?,
        source: source_location(v),
    })
}

/// Split a bundle response into `(filename, extraction)` entries.
pub fn phase1_bundle(v: &Value) -> Result<Vec<(String, Phase1Extraction)>, ItemError> {
    let docs = v
        .get("documents")
        .and_then(Value::as_array)
        .ok_or_else(|| ItemError::Schema("bundle response has no documents array".into()))?;
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        let Some(filename) = non_empty_str(doc.get("filename")) else {
            continue;
        };
        out.push((filename, phase1_document(doc)?));
    }
    Ok(out)
}

// ── Phase 2 ──

fn term(v: Option<&Value>) -> Option<TermAssessment> {
    let v = v?;
    let source = source_location(v)?;
    Some(TermAssessment {
        term: non_empty_str(v.get("term")),
        summary: non_empty_str(v.get("summary"))?,
        flag: flag(v.get("flag")),
        rationale: non_empty_str(v.get("rationale")),
        source,
    })
}

fn liquidation_preference(v: Option<&Value>) -> Option<LiquidationPreference> {
    let v = v?;
    Some(LiquidationPreference {
        multiple: v.get("multiple").and_then(Value::as_f64).filter(|m| *m > 0.0),
        participation: non_empty_str(v.get("participation")),
        seniority: non_empty_str(v.get("seniority")),
        flag: flag(v.get("flag")),
        rationale: non_empty_str(v.get("rationale")),
        source: source_location(v)?,
    })
}

fn board_composition(v: Option<&Value>) -> Option<BoardComposition> {
    let v = v?;
    Some(BoardComposition {
        total_seats: count(v.get("total_seats")),
        investor_seats: count(v.get("investor_seats")),
        founder_seats: count(v.get("founder_seats")),
        independent_seats: count(v.get("independent_seats")),
        flag: flag(v.get("flag")),
        rationale: non_empty_str(v.get("rationale")),
        source: source_location(v)?,
    })
}

/// Parsed Phase 2 response.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOutput {
    pub analysis: CategoryAnalysis,
    pub summary: Vec<String>,
    /// The service's overall flag, falling back to the worst sub-term flag.
    pub flag: Option<Flag>,
}

pub fn category_analysis(category: DocumentCategory, v: &Value) -> Result<CategoryOutput, ItemError> {
    require_object(v)?;
    let analysis = match category {
        DocumentCategory::Economics => CategoryAnalysis::Economics(EconomicsAnalysis {
            liquidation_preference: liquidation_preference(v.get("liquidation_preference")),
            anti_dilution: term(v.get("anti_dilution")),
            dividends: term(v.get("dividends")),
            redemption_rights: term(v.get("redemption_rights")),
            pay_to_play: term(v.get("pay_to_play")),
            warrants: term(v.get("warrants")),
        }),
        DocumentCategory::Governance => CategoryAnalysis::Governance(GovernanceAnalysis {
            board_composition: board_composition(v.get("board_composition")),
            protective_provisions: term(v.get("protective_provisions")),
            drag_along: term(v.get("drag_along")),
            tag_along: term(v.get("tag_along")),
            information_rights: term(v.get("information_rights")),
            voting_thresholds: term(v.get("voting_thresholds")),
        }),
        DocumentCategory::LegalGc => CategoryAnalysis::LegalGc(LegalGcAnalysis {
            representations_warranties: term(v.get("representations_warranties")),
            indemnification: term(v.get("indemnification")),
            governing_law: term(v.get("governing_law")),
            dispute_resolution: term(v.get("dispute_resolution")),
            conditions_precedent: term(v.get("conditions_precedent")),
        }),
        DocumentCategory::Standalone => CategoryAnalysis::Standalone(StandaloneAnalysis {
            key_provisions: v
                .get("key_provisions")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(|i| term(Some(i))).collect())
                .unwrap_or_default(),
        }),
    };

    let flag = flag(v.get("overall_flag")).or_else(|| analysis.flags().into_iter().max());
    Ok(CategoryOutput {
        summary: string_list(v.get("summary")),
        analysis,
        flag,
    })
}

// ── Phase 3 ──

/// Parsed Phase 3 response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisOutput {
    pub executive_summary: Vec<ExecutiveSummaryPoint>,
    pub transaction_snapshot: TransactionSnapshot,
    pub cross_document_issues: Vec<CrossDocumentIssue>,
    pub flag_summary: FlagSummary,
    pub instrument_type: Option<InstrumentType>,
}

pub fn synthesis(v: &Value, max_points: usize) -> Result<SynthesisOutput, ItemError> {
    require_object(v)?;

    let executive_summary = v
        .get("executive_summary")
        .and_then(Value::as_array)
        .map(|points| {
            points
                .iter()
                .filter_map(|p| {
                    Some(ExecutiveSummaryPoint {
                        text: non_empty_str(p.get("text"))?,
                        flag: flag(p.get("flag"))?,
                        category: non_empty_str(p.get("category")).unwrap_or_else(|| "general".into()),
                    })
                })
                .take(max_points)
                .collect()
        })
        .unwrap_or_default();

    let snap = v.get("transaction_snapshot").unwrap_or(&Value::Null);
    let number = |k: &str| snap.get(k).and_then(sourced_number);
    let transaction_snapshot = TransactionSnapshot {
        round_type: snap.get("round_type").and_then(sourced_text),
        pre_money_valuation: number("pre_money_valuation"),
        post_money_valuation: number("post_money_valuation"),
        round_size: number("round_size"),
        price_per_share: number("price_per_share"),
        option_pool: number("option_pool"),
    };

    let cross_document_issues = v
        .get("cross_document_issues")
        .and_then(Value::as_array)
        .map(|issues| {
            issues
                .iter()
                .filter_map(|i| {
                    Some(CrossDocumentIssue {
                        kind: i
                            .get("kind")
                            .and_then(Value::as_str)
                            .map(IssueKind::parse)
                            .unwrap_or(IssueKind::Inconsistency),
                        description: non_empty_str(i.get("description"))?,
                        documents: string_list(i.get("documents")),
                        flag: flag(i.get("flag")),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let flags = v.get("flag_summary").unwrap_or(&Value::Null);
    let dimension = |k: &str| {
        let d = flags.get(k)?;
        Some(DimensionFlag {
            flag: flag(d.get("flag"))?,
            justification: non_empty_str(d.get("justification")).unwrap_or_default(),
        })
    };
    let flag_summary = FlagSummary {
        economics: dimension("economics"),
        governance: dimension("governance"),
        dilution: dimension("dilution"),
        investor_rights: dimension("investor_rights"),
        legal_risk: dimension("legal_risk"),
    };

    Ok(SynthesisOutput {
        executive_summary,
        transaction_snapshot,
        cross_document_issues,
        flag_summary,
        instrument_type: v
            .get("instrument_type")
            .and_then(Value::as_str)
            .and_then(InstrumentType::parse)
            .filter(|t| *t != InstrumentType::Unknown),
    })
}
