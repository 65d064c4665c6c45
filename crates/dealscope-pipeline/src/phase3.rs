//! Phase 3: cross-document synthesis.

use std::sync::Arc;

use dealscope_ai::{ExtractionRequest, ExtractionService, PromptKey, PromptProvider};
use dealscope_core::{
    Phase1Result, Phase2Result, Phase3Result, derive_instrument_type, majority_jurisdiction,
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::ItemError;
use crate::parse;

pub struct Synthesizer {
    service: Arc<dyn ExtractionService>,
    prompts: Arc<dyn PromptProvider>,
    config: PipelineConfig,
}

impl Synthesizer {
    pub fn new(
        service: Arc<dyn ExtractionService>,
        prompts: Arc<dyn PromptProvider>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            service,
            prompts,
            config,
        }
    }

    /// One synthesis call over everything Phases 1 and 2 produced.
    ///
    /// Jurisdiction, instrument type and the analysed-document list are
    /// computed locally first, so they survive a failed call. The service's
    /// instrument type wins when it names a known one.
    pub async fn synthesize(
        &self,
        phase1: &[Phase1Result],
        phase2: &[Phase2Result],
        company_label: &str,
    ) -> Phase3Result {
        let analysed: Vec<&Phase1Result> = phase1.iter().filter(|r| r.is_complete()).collect();
        let jurisdiction = majority_jurisdiction(analysed.iter().map(|r| r.jurisdiction));
        let subtypes: Vec<_> = analysed.iter().map(|r| r.subtype).collect();
        let mut result = Phase3Result::local(
            jurisdiction,
            derive_instrument_type(&subtypes, jurisdiction),
            analysed.iter().map(|r| r.filename.clone()).collect(),
        );
        result.begin();

        if analysed.is_empty() {
            warn!("no successfully analysed documents, skipping synthesis");
            result.fail("no documents were analysed successfully");
            return result;
        }

        let request = ExtractionRequest::new(
            self.prompts.system_prompt(PromptKey::Phase3Synthesis),
            user_prompt(&result, &analysed, phase2, company_label),
        );
        let outcome = async {
            let resp = self.service.extract(&request).await?;
            let output = parse::synthesis(&resp.value, self.config.max_summary_points)?;
            Ok::<_, ItemError>((output, resp.model))
        }
        .await;

        match outcome {
            Ok((output, model)) => {
                result.executive_summary = output.executive_summary;
                result.transaction_snapshot = output.transaction_snapshot;
                result.cross_document_issues = output.cross_document_issues;
                result.flag_summary = output.flag_summary;
                if let Some(instrument_type) = output.instrument_type {
                    result.instrument_type = instrument_type;
                }
                result.model = Some(model);
                result.complete();
                info!(
                    points = result.executive_summary.len(),
                    issues = result.cross_document_issues.len(),
                    instrument_type = %result.instrument_type,
                    "deal synthesised"
                );
            }
            Err(e) => {
                warn!(error = %e, "synthesis failed");
                result.fail(e.to_string());
            }
        }
        result
    }
}

fn user_prompt(
    local: &Phase3Result,
    analysed: &[&Phase1Result],
    phase2: &[Phase2Result],
    company_label: &str,
) -> String {
    let documents: Vec<Value> = analysed
        .iter()
        .map(|d| {
            json!({
                "filename": d.filename,
                "document_type": d.subtype,
                "category": d.category,
                "summary": d.summary,
                "key_terms": d.key_terms,
                "quick_flags": d.quick_flags,
            })
        })
        .collect();
    let categories: Vec<Value> = phase2
        .iter()
        .filter(|c| c.analysis.is_some())
        .map(|c| {
            json!({
                "category": c.category,
                "overall_flag": c.flag,
                "summary": c.summary,
                "analysis": c.analysis,
            })
        })
        .collect();

    format!(
        "Company: {company_label}\n\
         Majority jurisdiction: {jurisdiction}\n\
         Instrument type (derived from document types): {instrument}\n\
         \n\
         Document findings:\n{documents}\n\
         \n\
         Category analyses:\n{categories}\n\
         \n\
         Synthesise a single deal assessment for {company_label}.",
        jurisdiction = local.jurisdiction,
        instrument = local.instrument_type,
        documents = serde_json::to_string_pretty(&documents).unwrap_or_default(),
        categories = serde_json::to_string_pretty(&categories).unwrap_or_default(),
    )
}
