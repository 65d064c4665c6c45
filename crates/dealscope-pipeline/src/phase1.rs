//! Phase 1: quick per-document extraction.

use std::sync::Arc;

use dealscope_ai::{
    DocumentPayload, ExtractionRequest, ExtractionService, PdfDetail, PromptKey, PromptProvider,
    ServiceError, ServiceResponse,
};
use dealscope_core::{
    ClassificationSource, CoreError, Document, DocumentGroup, DocumentSubtype, FileKind,
    Jurisdiction, Phase1Result, classify, extract_text, truncate_chars,
};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::batch::{BatchEvent, run_windows};
use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::error::{ItemError, PipelineError};
use crate::parse::{self, Phase1Extraction};

/// Progress reported by [`Phase1Processor::run_batch`].
#[derive(Debug)]
pub enum Phase1Update<'r> {
    /// The document's work unit was dispatched.
    Started { index: usize },
    /// One document reached a terminal status.
    Finished {
        index: usize,
        result: &'r Phase1Result,
        completed: usize,
        total: usize,
    },
}

/// A document that is ready to be sent: text extracted, result in `processing`.
struct Prepared {
    index: usize,
    result: Phase1Result,
    payload: DocumentPayload,
}

/// Phase 1 extraction. Every service call it makes, bundle or single,
/// holds one of `config.concurrency` permits.
pub struct Phase1Processor {
    service: Arc<dyn ExtractionService>,
    prompts: Arc<dyn PromptProvider>,
    calls: Semaphore,
    config: PipelineConfig,
}

impl Phase1Processor {
    pub fn new(
        service: Arc<dyn ExtractionService>,
        prompts: Arc<dyn PromptProvider>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            service,
            prompts,
            calls: Semaphore::new(config.concurrency.max(1)),
            config,
        }
    }

    /// The `pending` result for a document, classified by filename only.
    pub fn pending(index: usize, document: &Document) -> Phase1Result {
        Phase1Result::pending(index, &document.filename, classify(&document.filename, None))
    }

    /// The finished `error` result for an upload that never became a document.
    pub fn rejected(index: usize, filename: &str, err: &CoreError) -> Phase1Result {
        let mut result = Phase1Result::pending(index, filename, classify(filename, None));
        result.begin();
        result.fail(err.to_string());
        result
    }

    /// Analyse one document on its own. Never fails: errors land in the result.
    pub async fn process_one(&self, index: usize, document: &Document) -> Phase1Result {
        match self.prepare(index, document) {
            Ok(prepared) => self.extract_single(prepared).await.1,
            Err(failed) => failed,
        }
    }

    /// Analyse one work unit. Bundles go to the service in a single call; if
    /// that call fails each member is retried on its own.
    ///
    /// `documents` is indexed by request position; `None` slots are skipped.
    /// Returns `(document index, result)` pairs sorted by index.
    pub async fn process_group(
        &self,
        group: &DocumentGroup,
        documents: &[Option<&Document>],
    ) -> Vec<(usize, Phase1Result)> {
        let mut done = Vec::with_capacity(group.members.len());
        let mut ready = Vec::with_capacity(group.members.len());

        for member in &group.members {
            let Some(document) = documents.get(member.index).copied().flatten() else {
                continue;
            };
            match self.prepare(member.index, document) {
                Ok(mut p) => {
                    if group.is_bundle() {
                        p.result.group_id = Some(group.id.clone());
                    }
                    ready.push(p);
                }
                Err(mut failed) => {
                    if group.is_bundle() {
                        failed.group_id = Some(group.id.clone());
                    }
                    done.push((member.index, failed));
                }
            }
        }

        if ready.len() > 1 {
            done.extend(self.extract_bundle(group, ready).await);
        } else {
            done.extend(join_all(ready.into_iter().map(|p| self.extract_single(p))).await);
        }

        done.sort_by_key(|(index, _)| *index);
        done
    }

    /// Run every group through Phase 1 in windows of `config.concurrency`.
    ///
    /// Results come back as `(index, result)` in document order, one per
    /// `Some` slot. `None` slots count as already finished.
    pub async fn run_batch<P>(
        &self,
        documents: &[Option<&Document>],
        groups: &[DocumentGroup],
        cancel: &CancellationToken,
        mut on_update: P,
    ) -> Result<Vec<(usize, Phase1Result)>, PipelineError>
    where
        P: FnMut(Phase1Update<'_>),
    {
        let total = documents.len();
        let mut completed = documents.iter().filter(|d| d.is_none()).count();

        let per_group = run_windows(
            groups,
            self.config.concurrency,
            cancel,
            move |_, group| self.process_group(group, documents),
            |event| match event {
                BatchEvent::Dispatched { index } => {
                    for member in &groups[index].members {
                        on_update(Phase1Update::Started {
                            index: member.index,
                        });
                    }
                }
                BatchEvent::Completed { result, .. } => {
                    for (index, r) in result {
                        completed += 1;
                        on_update(Phase1Update::Finished {
                            index: *index,
                            result: r,
                            completed,
                            total,
                        });
                    }
                }
            },
        )
        .await?;

        let mut results: Vec<(usize, Phase1Result)> = per_group.into_iter().flatten().collect();
        results.sort_by_key(|(index, _)| *index);
        Ok(results)
    }

    // ── Steps ──

    /// Classify, extract text and build the payload. A failed extraction
    /// yields the finished `error` result instead.
    fn prepare(&self, index: usize, document: &Document) -> Result<Prepared, Phase1Result> {
        let mut result = Self::pending(index, document);
        result.begin();

        let payload = match document.kind {
            FileKind::Pdf => DocumentPayload::Pdf {
                filename: document.filename.clone(),
                data: document.content.clone(),
                detail: PdfDetail::Low,
            },
            FileKind::Word => {
                let text = match extract_text(&document.content, FileKind::Word) {
                    Ok(text) => text,
                    Err(e) => {
                        let err = ItemError::from(e);
                        warn!(filename = %document.filename, error = %err, "text extraction failed");
                        result.fail(err.to_string());
                        return Err(result);
                    }
                };
                let text = truncate_chars(&text, self.config.text_char_limit).to_string();
                if result.subtype == DocumentSubtype::Other {
                    let by_text = classify(&document.filename, Some(&text));
                    if by_text.subtype != result.subtype {
                        result.reclassify(by_text, ClassificationSource::Text);
                    }
                }
                result.raw_text = Some(text.clone());
                DocumentPayload::Text {
                    filename: document.filename.clone(),
                    text,
                }
            }
        };

        debug!(filename = %document.filename, bytes = payload.size(), "prepared payload");
        Ok(Prepared {
            index,
            result,
            payload,
        })
    }

    async fn extract_single(&self, prepared: Prepared) -> (usize, Phase1Result) {
        let Prepared {
            index,
            mut result,
            payload,
        } = prepared;

        let request = ExtractionRequest::new(
            self.prompts.system_prompt(PromptKey::Phase1Document),
            single_prompt(&result),
        )
        .with_payload(payload);

        let outcome = async {
            let resp = self.call(&request).await?;
            let extraction = parse::phase1_document(&resp.value)?;
            Ok::<_, ItemError>((extraction, resp.model))
        }
        .await;

        match outcome {
            Ok((extraction, model)) => {
                self.apply(&mut result, extraction);
                result.model = Some(model);
                result.complete();
                info!(filename = %result.filename, subtype = %result.subtype, "document extracted");
            }
            Err(e) => {
                warn!(filename = %result.filename, error = %e, "document extraction failed");
                result.fail(e.to_string());
            }
        }
        (index, result)
    }

    async fn extract_bundle(&self, group: &DocumentGroup, ready: Vec<Prepared>) -> Vec<(usize, Phase1Result)> {
        let mut request = ExtractionRequest::new(
            self.prompts.system_prompt(PromptKey::Phase1Bundle),
            bundle_prompt(group, &ready),
        );
        request.payload = ready.iter().map(|p| p.payload.clone()).collect();

        let outcome = async {
            let resp = self.call(&request).await?;
            let entries = parse::phase1_bundle(&resp.value)?;
            Ok::<_, ItemError>((entries, resp.model))
        }
        .await;

        let (mut entries, model) = match outcome {
            Ok(ok) => ok,
            Err(e) => {
                warn!(
                    group = %group.id,
                    members = ready.len(),
                    error = %e,
                    "bundle extraction failed, falling back to per-document calls"
                );
                return join_all(ready.into_iter().map(|p| self.extract_single(p))).await;
            }
        };
        info!(group = %group.id, kind = group.kind.as_str(), members = ready.len(), "bundle extracted");

        let mut done = Vec::with_capacity(ready.len());
        let mut omitted = Vec::new();
        for mut p in ready {
            let found = entries
                .iter()
                .position(|(name, _)| name.eq_ignore_ascii_case(&p.result.filename));
            match found {
                Some(pos) => {
                    let (_, extraction) = entries.swap_remove(pos);
                    self.apply(&mut p.result, extraction);
                    p.result.model = Some(model.clone());
                    p.result.complete();
                    done.push((p.index, p.result));
                }
                None => omitted.push(p),
            }
        }
        if !omitted.is_empty() {
            warn!(group = %group.id, omitted = omitted.len(), "bundle response omitted documents, extracting individually");
            done.extend(join_all(omitted.into_iter().map(|p| self.extract_single(p))).await);
        }
        done
    }

    async fn call(&self, request: &ExtractionRequest) -> Result<ServiceResponse, ServiceError> {
        // Never closed, so a permit is always granted.
        let _permit = self.calls.acquire().await;
        self.service.extract(request).await
    }

    fn apply(&self, result: &mut Phase1Result, extraction: Phase1Extraction) {
        if let (Some(subtype), Some(confidence)) = (extraction.document_type, extraction.confidence)
            && confidence > self.config.classification_override_threshold
        {
            result.reclassify(subtype.into(), ClassificationSource::Service);
        }
        result.classification_confidence = extraction.confidence;

        result.jurisdiction = match extraction.jurisdiction {
            Jurisdiction::Unknown => result
                .raw_text
                .as_deref()
                .map(Jurisdiction::detect)
                .unwrap_or_default(),
            known => known,
        };
        result.summary = extraction.summary;
        result.key_terms = extraction.key_terms;
        result.quick_flags = extraction.quick_flags;
    }
}

fn single_prompt(result: &Phase1Result) -> String {
    format!(
        "Filename: {filename}\n\
         Filename classification: {subtype} ({category})\n\
         \n\
         Extract the key terms of the attached document.",
        filename = result.filename,
        subtype = result.subtype,
        category = result.category,
    )
}

fn bundle_prompt(group: &DocumentGroup, ready: &[Prepared]) -> String {
    let primary = group.primary().map_or("(none)", |p| p.filename.as_str());
    let mut prompt = format!(
        "Bundle type: {kind}\nPrimary document: {primary}\nDocuments:\n",
        kind = group.kind.as_str(),
    );
    for p in ready {
        prompt.push_str(&format!(
            "- {} (filename classification: {})\n",
            p.result.filename, p.result.subtype
        ));
    }
    prompt.push_str("\nExtract the key terms of every attached document, one entry per filename.");
    prompt
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dealscope_ai::{ScriptedService, ServiceError};
    use dealscope_core::{DocumentInfo, GroupKind, ItemStatus, group_documents};
    use serde_json::{Value, json};

    use super::*;

    fn pdf(name: &str) -> Document {
        Document::new(name, b"%PDF-1.7 test".to_vec()).unwrap()
    }

    fn slots(docs: &[Document]) -> Vec<Option<&Document>> {
        docs.iter().map(Some).collect()
    }

    fn processor(service: Arc<ScriptedService>) -> Phase1Processor {
        Phase1Processor::new(service, Arc::new(dealscope_ai::DefaultPrompts), PipelineConfig::default())
    }

    fn doc_response(doc_type: &str) -> Value {
        json!({
            "document_type": doc_type,
            "classification_confidence": 0.9,
            "jurisdiction": "UK",
            "summary": "ok",
            "key_terms": {},
            "quick_flags": []
        })
    }

    #[tokio::test]
    async fn service_classification_overrides_when_confident() {
        let service = Arc::new(ScriptedService::new("m", |_| Ok(doc_response("spa"))));
        let result = processor(service).process_one(0, &pdf("deal.pdf")).await;
        assert_eq!(result.status, ItemStatus::Complete);
        assert_eq!(result.subtype, DocumentSubtype::Spa);
        assert_eq!(result.classified_by, ClassificationSource::Service);
        assert_eq!(result.jurisdiction, Jurisdiction::Uk);
        assert_eq!(result.model.as_deref(), Some("m"));
    }

    #[tokio::test]
    async fn low_confidence_keeps_filename_classification() {
        let service = Arc::new(ScriptedService::new("m", |_| {
            Ok(json!({"document_type": "spa", "classification_confidence": 0.7}))
        }));
        let result = processor(service).process_one(0, &pdf("SHA.pdf")).await;
        assert_eq!(result.subtype, DocumentSubtype::Sha);
        assert_eq!(result.classified_by, ClassificationSource::Filename);
        assert_eq!(result.classification_confidence, Some(0.7));
    }

    #[tokio::test]
    async fn service_failure_marks_document_error() {
        let service = Arc::new(ScriptedService::new("m", |_| Err(ServiceError::Timeout)));
        let result = processor(service).process_one(3, &pdf("SHA.pdf")).await;
        assert_eq!(result.status, ItemStatus::Error);
        assert_eq!(result.id, "doc-4");
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn unreadable_word_file_fails_without_calling_service() {
        let service = Arc::new(ScriptedService::new("m", |_| Ok(doc_response("sha"))));
        let doc = Document::new("SHA.docx", b"PK\x03\x04 truncated".to_vec()).unwrap();
        let result = processor(service.clone()).process_one(0, &doc).await;
        assert_eq!(result.status, ItemStatus::Error);
        assert!(result.error.unwrap().starts_with("text extraction failed"));
        assert_eq!(service.call_count(), 0);
    }

    fn three_doc_bundle() -> (Vec<Document>, Vec<DocumentGroup>) {
        let docs = vec![pdf("TermSheet.pdf"), pdf("SHA.pdf"), pdf("SideLetter.pdf")];
        let infos: Vec<DocumentInfo> = docs
            .iter()
            .enumerate()
            .map(|(i, d)| DocumentInfo::classify(i, &d.filename, None))
            .collect();
        let groups = group_documents(&infos);
        assert_eq!(groups[0].kind, GroupKind::PricedEquityBundle);
        (docs, groups)
    }

    #[tokio::test]
    async fn bundle_is_one_call_with_results_per_member() {
        let service = Arc::new(ScriptedService::new("m", |req: &ExtractionRequest| {
            if req.payload.len() > 1 {
                Ok(json!({"documents": [
                    {"filename": "SHA.pdf", "document_type": "sha", "classification_confidence": 0.95},
                    {"filename": "TermSheet.pdf", "document_type": "term_sheet", "classification_confidence": 0.95}
                ]}))
            } else {
                Ok(doc_response("side_letter"))
            }
        }));
        let (docs, groups) = three_doc_bundle();
        let p = processor(service.clone());

        let bundle = p.process_group(&groups[0], &slots(&docs)).await;
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle[0].0, 0);
        assert_eq!(bundle[0].1.group_id.as_deref(), Some("group-1"));
        assert!(bundle.iter().all(|(_, r)| r.status == ItemStatus::Complete));
        assert_eq!(service.call_count(), 1);

        let standalone = p.process_group(&groups[1], &slots(&docs)).await;
        assert_eq!(standalone[0].1.group_id, None);
    }

    #[tokio::test]
    async fn failed_bundle_call_falls_back_to_individual_calls() {
        let service = Arc::new(ScriptedService::new("m", |req: &ExtractionRequest| {
            if req.payload.len() > 1 {
                Err(ServiceError::MalformedResponse("truncated".into()))
            } else {
                Ok(doc_response("sha"))
            }
        }));
        let (docs, groups) = three_doc_bundle();
        let results = processor(service.clone())
            .process_group(&groups[0], &slots(&docs))
            .await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| r.is_complete()));
        assert_eq!(service.call_count(), 3);
    }

    #[tokio::test]
    async fn batch_preserves_order_with_mixed_latency_and_failures() {
        let names = ["A.pdf", "B.pdf", "C.pdf", "D.pdf", "E.pdf"];
        let service = ScriptedService::new("m", |req: &ExtractionRequest| {
            if req.filenames() == ["B.pdf"] {
                Err(ServiceError::Status {
                    status: 400,
                    body: "bad".into(),
                })
            } else {
                Ok(doc_response("other"))
            }
        })
        .with_delay(|req| match req.filenames()[0] {
            "D.pdf" => Duration::from_millis(40),
            "B.pdf" => Duration::from_millis(1),
            _ => Duration::from_millis(10),
        });
        let docs: Vec<Document> = names.iter().map(|n| pdf(n)).collect();
        let groups: Vec<DocumentGroup> = docs
            .iter()
            .enumerate()
            .map(|(i, d)| {
                DocumentGroup::new(
                    format!("group-{}", i + 1),
                    GroupKind::Standalone,
                    vec![DocumentInfo::classify(i, &d.filename, None)],
                    0,
                )
            })
            .collect();

        let config = PipelineConfig {
            concurrency: 2,
            ..PipelineConfig::default()
        };
        let p = Phase1Processor::new(Arc::new(service), Arc::new(dealscope_ai::DefaultPrompts), config);

        let mut progress = Vec::new();
        let results = p
            .run_batch(&slots(&docs), &groups, &CancellationToken::new(), |update| {
                if let Phase1Update::Finished {
                    completed,
                    total,
                    result,
                    ..
                } = update
                {
                    progress.push((completed, total, result.filename.clone()));
                }
            })
            .await
            .unwrap();

        let order: Vec<&str> = results.iter().map(|(_, r)| r.filename.as_str()).collect();
        assert_eq!(order, names);
        assert_eq!(results[1].1.status, ItemStatus::Error);
        assert!(results.iter().filter(|(_, r)| r.is_complete()).count() == 4);

        assert_eq!(progress.len(), 5);
        assert_eq!(progress[0], (1, 5, "B.pdf".to_string()));
        assert_eq!(progress[4].0, 5);
    }

    #[tokio::test]
    async fn bundle_fallback_stays_within_the_call_limit() {
        let service = Arc::new(
            ScriptedService::new("m", |req: &ExtractionRequest| {
                if req.payload.len() > 1 {
                    Err(ServiceError::Timeout)
                } else {
                    Ok(doc_response("other"))
                }
            })
            .with_delay(|_| Duration::from_millis(30)),
        );
        let names = [
            "SPA.pdf",
            "SHA.pdf",
            "IRA.pdf",
            "Voting Agreement.pdf",
            "Articles.pdf",
            "Disclosure Letter.pdf",
            "Term Sheet.pdf",
        ];
        let docs: Vec<Document> = names.iter().map(|n| pdf(n)).collect();
        let infos: Vec<DocumentInfo> = docs
            .iter()
            .enumerate()
            .map(|(i, d)| DocumentInfo::classify(i, &d.filename, None))
            .collect();
        let groups = group_documents(&infos);
        assert!(groups.iter().any(|g| g.members.len() > 3));

        let results = processor(service.clone())
            .run_batch(&slots(&docs), &groups, &CancellationToken::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(results.len(), 7);
        assert!(results.iter().all(|(_, r)| r.is_complete()));
        assert!(service.peak_in_flight() <= PipelineConfig::default().concurrency);
        assert!(service.peak_in_flight() > 1);
    }

    #[tokio::test]
    async fn empty_slots_count_as_finished() {
        let service = Arc::new(ScriptedService::new("m", |_| Ok(doc_response("other"))));
        let docs = [pdf("A.pdf"), pdf("C.pdf")];
        let slots = [Some(&docs[0]), None, Some(&docs[1])];
        let groups: Vec<DocumentGroup> = [(0, "A.pdf"), (2, "C.pdf")]
            .into_iter()
            .map(|(i, name)| {
                DocumentGroup::new(
                    format!("group-{}", i + 1),
                    GroupKind::Standalone,
                    vec![DocumentInfo::classify(i, name, None)],
                    0,
                )
            })
            .collect();

        let mut finished = Vec::new();
        let results = processor(service)
            .run_batch(&slots, &groups, &CancellationToken::new(), |update| {
                if let Phase1Update::Finished { index, completed, total, .. } = update {
                    finished.push((index, completed, total));
                }
            })
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|(_, r)| r.id.as_str()).collect();
        assert_eq!(ids, vec!["doc-1", "doc-3"]);
        let mut indices: Vec<usize> = finished.iter().map(|f| f.0).collect();
        indices.sort();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(finished.iter().map(|f| (f.1, f.2)).max(), Some((3, 3)));
    }

    #[test]
    fn rejected_upload_is_a_finished_error() {
        let err = CoreError::UnsupportedFileType("notes.txt".into());
        let result = Phase1Processor::rejected(2, "notes.txt", &err);
        assert_eq!(result.id, "doc-3");
        assert_eq!(result.status, ItemStatus::Error);
        assert!(result.error.unwrap().contains("notes.txt"));
    }
}
