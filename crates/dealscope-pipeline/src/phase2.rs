//! Phase 2: in-depth analysis per document category.

use std::sync::Arc;

use dealscope_ai::{ExtractionRequest, ExtractionService, PromptKey, PromptProvider};
use dealscope_core::{DocumentCategory, Phase1Result, Phase2Result, truncate_chars};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::ItemError;
use crate::parse;

/// Categories worth analysing, in analysis order, each with the documents
/// that contribute evidence to it.
///
/// A document contributes when its Phase 1 extraction completed and produced
/// at least one key term or quick flag.
pub fn contributing_documents(results: &[Phase1Result]) -> Vec<(DocumentCategory, Vec<&Phase1Result>)> {
    DocumentCategory::ORDER
        .iter()
        .filter_map(|&category| {
            let docs: Vec<&Phase1Result> = results
                .iter()
                .filter(|r| r.category == category && contributes(r))
                .collect();
            (!docs.is_empty()).then_some((category, docs))
        })
        .collect()
}

fn contributes(result: &Phase1Result) -> bool {
    result.is_complete() && (!result.key_terms.is_empty() || !result.quick_flags.is_empty())
}

pub struct CategoryAnalyzer {
    service: Arc<dyn ExtractionService>,
    prompts: Arc<dyn PromptProvider>,
    config: PipelineConfig,
}

impl CategoryAnalyzer {
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

    /// Analyse one category from its documents' Phase 1 findings.
    ///
    /// Service and schema failures mark the result `error`.
    pub async fn analyze_category(&self, category: DocumentCategory, documents: &[&Phase1Result]) -> Phase2Result {
        let sources = documents.iter().map(|d| d.filename.clone()).collect();
        let mut result = Phase2Result::pending(category, sources);
        result.begin();

        let request = ExtractionRequest::new(
            self.prompts.system_prompt(PromptKey::for_category(category)),
            self.user_prompt(category, documents),
        );
        let outcome = async {
            let resp = self.service.extract(&request).await?;
            let output = parse::category_analysis(category, &resp.value)?;
            Ok::<_, ItemError>((output, resp.model))
        }
        .await;

        match outcome {
            Ok((output, model)) => {
                result.analysis = Some(output.analysis);
                result.summary = output.summary;
                result.flag = output.flag;
                result.model = Some(model);
                result.complete();
                info!(
                    category = %category,
                    documents = documents.len(),
                    flag = ?result.flag,
                    "category analysed"
                );
            }
            Err(e) => {
                warn!(category = %category, error = %e, "category analysis failed");
                result.fail(e.to_string());
            }
        }
        result
    }

    fn user_prompt(&self, category: DocumentCategory, documents: &[&Phase1Result]) -> String {
        let findings: Vec<Value> = documents
            .iter()
            .map(|d| {
                json!({
                    "filename": d.filename,
                    "document_type": d.subtype,
                    "jurisdiction": d.jurisdiction,
                    "summary": d.summary,
                    "key_terms": d.key_terms,
                    "quick_flags": d.quick_flags,
                    "text_excerpt": d
                        .raw_text
                        .as_deref()
                        .map(|t| truncate_chars(t, self.config.category_text_excerpt_chars)),
                })
            })
            .collect();

        format!(
            "Category: {category}\n\
             \n\
             Phase 1 findings for the {n} document(s) in this category:\n\
             {findings}\n\
             \n\
             Analyse the {category} terms across these documents.",
            n = documents.len(),
            findings = serde_json::to_string_pretty(&findings).unwrap_or_default(),
        )
    }
}
