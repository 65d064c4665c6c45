//! Full runs against a scripted extraction service.

use std::io::{Cursor, Write};
use std::sync::Arc;

use dealscope_ai::{DefaultPrompts, ExtractionRequest, PromptKey, PromptProvider, ScriptedService};
use dealscope_core::{
    ClassificationSource, Document, DocumentCategory, Flag, InstrumentType, ItemStatus, Jurisdiction,
    PipelineStatus, RunConfig,
};
use dealscope_pipeline::{CancellationToken, ChannelObserver, Pipeline, PipelineConfig, PipelineEvent};
use dealscope_store::{ANALYSES_TABLE, AUDIT_TABLE, DocumentStore, MemoryStore};
use serde_json::{Value, json};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

fn deal_documents() -> Vec<Document> {
    vec![
        Document::new("Term Sheet.pdf", b"%PDF-1.7 term sheet".to_vec()).unwrap(),
        Document::new(
            "SHA.docx",
            docx(&[
                "SHAREHOLDERS' AGREEMENT",
                "The Board shall consist of five directors: two Investor Directors, two Founder Directors and one Independent Director.",
                "This Agreement is governed by the laws of England and Wales.",
            ]),
        )
        .unwrap(),
        Document::new(
            "Side Letter.docx",
            docx(&["Side letter confirming the delivery of quarterly management accounts."]),
        )
        .unwrap(),
    ]
}

fn prompt_key(req: &ExtractionRequest) -> PromptKey {
    PromptKey::ALL
        .into_iter()
        .find(|k| DefaultPrompts.system_prompt(*k) == req.system_prompt)
        .unwrap()
}

fn respond(req: &ExtractionRequest) -> Value {
    match prompt_key(req) {
        PromptKey::Phase1Bundle => json!({
            "documents": [
                {
                    "filename": "Term Sheet.pdf",
                    "document_type": "term_sheet",
                    "classification_confidence": 0.95,
                    "jurisdiction": "UK",
                    "summary": "Series A term sheet.",
                    "key_terms": {
                        "round_type": {"value": "Series A", "quote": "Series A Preferred Shares", "page": 1},
                        "liquidation_preference": {
                            "value": "1x non-participating",
                            "quote": "1x non-participating liquidation preference",
                            "page": 2
                        },
                        "valuation_cap": {"value": "$20,000,000"}
                    }
                },
                {
                    "filename": "SHA.docx",
                    "document_type": "sha",
                    "classification_confidence": 0.9,
                    "summary": "Shareholders' agreement.",
                    "key_terms": {
                        "board_seats": {
                            "value": "5 (2 investor, 2 founder, 1 independent)",
                            "quote": "The Board shall consist of five directors",
                            "page": 3
                        }
                    },
                    "quick_flags": [{
                        "flag": "AMBER",
                        "topic": "board",
                        "issue": "Investor directors hold a blocking position",
                        "quote": "two Investor Directors",
                        "page": 3
                    }]
                }
            ]
        }),
        PromptKey::Phase1Document => json!({
            "document_type": "side_letter",
            "classification_confidence": 0.9,
            "jurisdiction": "UK",
            "summary": "Information undertaking only.",
            "key_terms": {},
            "quick_flags": []
        }),
        PromptKey::Phase2Economics => json!({
            "liquidation_preference": {
                "summary": "1x non-participating, pari passu",
                "multiple": 1.0,
                "participation": "non-participating",
                "seniority": "pari passu",
                "flag": "GREEN",
                "quote": "1x non-participating liquidation preference",
                "page": 2,
                "document": "Term Sheet.pdf"
            },
            "summary": ["Market-standard preference."],
            "overall_flag": "GREEN"
        }),
        PromptKey::Phase2Governance => json!({
            "board_composition": {
                "total_seats": 5,
                "investor_seats": 2,
                "founder_seats": 2,
                "independent_seats": 1,
                "flag": "AMBER",
                "rationale": "Investors and founders deadlock without the independent.",
                "quote": "The Board shall consist of five directors",
                "page": 3
            },
            "summary": ["Balanced board with an independent tie-breaker."]
        }),
        PromptKey::Phase3Synthesis => json!({
            "executive_summary": [
                {"text": "Economics are market standard.", "flag": "GREEN", "category": "economics"},
                {"text": "Board control depends on the independent director.", "flag": "AMBER", "category": "governance"}
            ],
            "transaction_snapshot": {
                "round_type": {"value": "Series A", "quote": "Series A Preferred Shares", "page": 1},
                "pre_money_valuation": {"value": 8000000}
            },
            "flag_summary": {
                "economics": {"flag": "GREEN", "justification": "1x non-participating"},
                "governance": {"flag": "AMBER", "justification": "Independent holds the casting seat"}
            }
        }),
        other => panic!("unexpected call {other}"),
    }
}

#[tokio::test]
async fn term_sheet_sha_and_side_letter() {
    let service = Arc::new(ScriptedService::new("gpt-test", |req| Ok(respond(req))));
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(service.clone(), Arc::new(DefaultPrompts), PipelineConfig::default())
        .with_store(store.clone());
    let (observer, mut events) = ChannelObserver::new();

    let state = pipeline
        .run_documents(
            &deal_documents(),
            RunConfig {
                company_name: Some("Acme Ltd".into()),
                ..RunConfig::default()
            },
            &observer,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(state.status, PipelineStatus::Complete, "error: {:?}", state.error);

    // Phase 1: one bundle call plus the standalone side letter.
    assert_eq!(state.phase1_results.len(), 3);
    assert!(state.phase1_results.iter().all(|r| r.is_complete()));
    let [term_sheet, sha, side_letter] = &state.phase1_results[..] else {
        unreachable!()
    };
    assert_eq!(term_sheet.group_id.as_deref(), Some("group-1"));
    assert_eq!(sha.group_id.as_deref(), Some("group-1"));
    assert_eq!(side_letter.group_id, None);
    assert_eq!(sha.classified_by, ClassificationSource::Service);
    assert_eq!(sha.jurisdiction, Jurisdiction::Uk);
    assert!(sha.raw_text.as_deref().unwrap().contains("five directors"));
    assert_eq!(
        term_sheet.key_terms.liquidation_preference.as_ref().unwrap().value,
        "1x non-participating"
    );
    assert!(term_sheet.key_terms.valuation_cap.is_none());
    assert!(side_letter.key_terms.is_empty());

    // Phase 2: the side letter yields nothing to analyse.
    let categories: Vec<(DocumentCategory, Option<Flag>)> =
        state.phase2_results.iter().map(|r| (r.category, r.flag)).collect();
    assert_eq!(
        categories,
        vec![
            (DocumentCategory::Economics, Some(Flag::Green)),
            (DocumentCategory::Governance, Some(Flag::Amber)),
        ]
    );
    assert!(state.phase2_results.iter().all(|r| r.status == ItemStatus::Complete));

    // Phase 3.
    let synthesis = state.phase3_result.as_ref().unwrap();
    assert_eq!(synthesis.status, ItemStatus::Complete);
    let mentioned: Vec<&str> = synthesis
        .executive_summary
        .iter()
        .map(|p| p.category.as_str())
        .collect();
    assert_eq!(mentioned, vec!["economics", "governance"]);
    assert!(synthesis.transaction_snapshot.pre_money_valuation.is_none());
    assert!(synthesis.transaction_snapshot.round_type.is_some());
    assert_eq!(synthesis.jurisdiction, Jurisdiction::Uk);
    assert_eq!(synthesis.instrument_type, InstrumentType::UkBvcaEquity);
    assert_eq!(synthesis.documents_analyzed.len(), 3);

    assert_eq!(service.call_count(), 5);

    // Persistence.
    let analyses = store
        .select(ANALYSES_TABLE, &[("run_id", json!(state.run_id))])
        .await
        .unwrap();
    assert_eq!(analyses.len(), 1);
    let audit = store
        .select(AUDIT_TABLE, &[("term_key", json!("liquidation_preference"))])
        .await
        .unwrap();
    assert!(!audit.is_empty());

    // Events.
    let mut last = None;
    let mut phase1_events = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, PipelineEvent::Phase1Progress(_)) {
            phase1_events += 1;
        }
        last = Some(event);
    }
    assert!(phase1_events >= 3);
    assert!(matches!(last, Some(PipelineEvent::Complete(_))));
}

#[tokio::test]
async fn grouping_disabled_sends_every_document_alone() {
    let service = Arc::new(ScriptedService::new("gpt-test", |req| {
        Ok(match prompt_key(req) {
            PromptKey::Phase1Document => json!({"summary": "ok"}),
            _ => respond(req),
        })
    }));
    let config = PipelineConfig {
        group_documents: false,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(service.clone(), Arc::new(DefaultPrompts), config);
    let (observer, _events) = ChannelObserver::new();

    let state = pipeline
        .run_documents(&deal_documents(), RunConfig::default(), &observer, &CancellationToken::new())
        .await;

    assert_eq!(state.status, PipelineStatus::Complete);
    assert!(state.phase1_results.iter().all(|r| r.group_id.is_none()));
    let phase1_calls = service
        .requests()
        .iter()
        .filter(|r| prompt_key(r) == PromptKey::Phase1Document)
        .count();
    assert_eq!(phase1_calls, 3);
    // Nothing extractable, so only synthesis follows.
    assert!(state.phase2_results.is_empty());
}
