//! Pipeline orchestration: the run state machine.

use std::sync::Arc;

use dealscope_ai::{ExtractionService, PromptProvider};
use dealscope_core::{
    CoreError, Document, DocumentGroup, DocumentInfo, GroupKind, ItemStatus, Phase2Result,
    PhaseProgress, PipelineState, PipelineStatus, RunConfig, group_documents,
};
use dealscope_store::{DocumentStore, persist_run};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::observer::PipelineObserver;
use crate::phase1::{Phase1Processor, Phase1Update};
use crate::phase2::{CategoryAnalyzer, contributing_documents};
use crate::phase3::Synthesizer;
use crate::request::AnalysisRequest;

/// One position of the run's input.
enum Intake<'a> {
    Ready(&'a Document),
    Rejected { filename: &'a str, error: &'a CoreError },
}

impl<'a> Intake<'a> {
    fn document(&self) -> Option<&'a Document> {
        match self {
            Self::Ready(document) => Some(*document),
            Self::Rejected { .. } => None,
        }
    }
}

/// Drives a run through Phase 1, Phase 2, Phase 3 and persistence.
///
/// The pipeline is the only writer of the [`PipelineState`]; observers get a
/// read-only view after every mutation. Per-item failures stay inside their
/// result. Anything else ends the run in `error` with partial results kept.
pub struct Pipeline {
    phase1: Phase1Processor,
    phase2: CategoryAnalyzer,
    phase3: Synthesizer,
    store: Option<Arc<dyn DocumentStore>>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        service: Arc<dyn ExtractionService>,
        prompts: Arc<dyn PromptProvider>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            phase1: Phase1Processor::new(service.clone(), prompts.clone(), config.clone()),
            phase2: CategoryAnalyzer::new(service.clone(), prompts.clone(), config.clone()),
            phase3: Synthesizer::new(service, prompts, config.clone()),
            store: None,
            config,
        }
    }

    /// Persist finished runs to `store` unless the request is a dry run.
    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decode the uploads and run the pipeline. Always returns the final state.
    ///
    /// An upload that cannot be decoded becomes an `error` Phase 1 result at
    /// its position; the other documents are analysed as usual.
    pub async fn run(
        &self,
        request: &AnalysisRequest,
        observer: &dyn PipelineObserver,
        cancel: &CancellationToken,
    ) -> PipelineState {
        let uploads = request.decode();
        let intake: Vec<Intake<'_>> = uploads
            .iter()
            .map(|u| match &u.document {
                Ok(document) => Intake::Ready(document),
                Err(error) => Intake::Rejected {
                    filename: &u.filename,
                    error,
                },
            })
            .collect();
        self.drive(&intake, request.run_config(), observer, cancel).await
    }

    /// Run the pipeline over already decoded documents.
    pub async fn run_documents(
        &self,
        documents: &[Document],
        run_config: RunConfig,
        observer: &dyn PipelineObserver,
        cancel: &CancellationToken,
    ) -> PipelineState {
        let intake: Vec<Intake<'_>> = documents.iter().map(Intake::Ready).collect();
        self.drive(&intake, run_config, observer, cancel).await
    }

    async fn drive(
        &self,
        intake: &[Intake<'_>],
        run_config: RunConfig,
        observer: &dyn PipelineObserver,
        cancel: &CancellationToken,
    ) -> PipelineState {
        let mut state = PipelineState::new(Uuid::new_v4().to_string(), run_config);
        info!(
            run_id = %state.run_id,
            documents = intake.len(),
            company = state.company_label(),
            dry_run = state.config.dry_run,
            "starting analysis run"
        );

        match self.execute(&mut state, intake, observer, cancel).await {
            Ok(()) => {
                notify(observer, &state);
                observer.on_complete(&state);
                info!(run_id = %state.run_id, "analysis run complete");
            }
            Err(e) => abort(&mut state, e, observer),
        }
        state
    }

    async fn execute(
        &self,
        state: &mut PipelineState,
        intake: &[Intake<'_>],
        observer: &dyn PipelineObserver,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        if intake.is_empty() {
            return Err(PipelineError::NoDocuments);
        }

        // ── Phase 1 ──
        cancel.check()?;
        state.advance(PipelineStatus::Phase1)?;
        state.phase1_results = intake
            .iter()
            .enumerate()
            .map(|(i, slot)| match slot {
                Intake::Ready(d) => Phase1Processor::pending(i, d),
                Intake::Rejected { filename, error } => {
                    warn!(filename = %filename, error = %error, "upload rejected");
                    Phase1Processor::rejected(i, filename, error)
                }
            })
            .collect();
        state.progress.phase1 = PhaseProgress::new(intake.len());
        for rejected in state.phase1_results.iter().filter(|r| r.status == ItemStatus::Error) {
            state.progress.phase1.record(rejected.filename.as_str());
        }
        notify(observer, state);

        let documents: Vec<Option<&Document>> = intake.iter().map(Intake::document).collect();
        let groups = self.plan_groups(&documents);
        info!(
            groups = groups.len(),
            bundles = groups.iter().filter(|g| g.is_bundle()).count(),
            "phase 1 started"
        );
        let results = self
            .phase1
            .run_batch(&documents, &groups, cancel, |update| match update {
                Phase1Update::Started { index } => {
                    state.phase1_results[index].begin();
                    notify(observer, state);
                }
                Phase1Update::Finished { index, result, .. } => {
                    state.phase1_results[index] = result.clone();
                    state.progress.phase1.record(result.filename.as_str());
                    notify(observer, state);
                }
            })
            .await?;
        for (index, result) in results {
            state.phase1_results[index] = result;
        }
        info!(
            complete = state.successful_documents().count(),
            failed = state.phase1_results.len() - state.successful_documents().count(),
            "phase 1 finished"
        );

        // ── Phase 2 ──
        cancel.check()?;
        state.advance(PipelineStatus::Phase2)?;
        let phase1 = state.phase1_results.clone();
        let plan = contributing_documents(&phase1);
        state.progress.phase2 = PhaseProgress::new(plan.len());
        notify(observer, state);

        for (category, docs) in plan {
            cancel.check()?;
            let mut pending = Phase2Result::pending(category, docs.iter().map(|d| d.filename.clone()).collect());
            pending.begin();
            state.phase2_results.push(pending);
            let slot = state.phase2_results.len() - 1;
            notify(observer, state);

            state.phase2_results[slot] = self.phase2.analyze_category(category, &docs).await;
            state.progress.phase2.record(category.as_str());
            notify(observer, state);
        }

        // ── Phase 3 ──
        cancel.check()?;
        state.advance(PipelineStatus::Phase3)?;
        state.progress.phase3 = PhaseProgress::new(1);
        notify(observer, state);

        let synthesis = self
            .phase3
            .synthesize(&state.phase1_results, &state.phase2_results, state.company_label())
            .await;
        state.phase3_result = Some(synthesis);
        state.progress.phase3.record("synthesis");
        notify(observer, state);

        state.advance(PipelineStatus::Complete)?;
        self.persist(state).await
    }

    async fn persist(&self, state: &PipelineState) -> Result<(), PipelineError> {
        match &self.store {
            Some(_) if state.config.dry_run => {
                info!(run_id = %state.run_id, "dry run, skipping persistence");
                Ok(())
            }
            Some(store) => {
                persist_run(store.as_ref(), state).await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Work units for Phase 1: bundles when grouping is enabled, otherwise one
    /// standalone group per document. Empty slots are left out.
    fn plan_groups(&self, documents: &[Option<&Document>]) -> Vec<DocumentGroup> {
        let infos: Vec<DocumentInfo> = documents
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.map(|d| DocumentInfo::classify(i, &d.filename, None)))
            .collect();
        if self.config.group_documents {
            return group_documents(&infos);
        }
        infos
            .into_iter()
            .enumerate()
            .map(|(i, info)| DocumentGroup::new(format!("group-{}", i + 1), GroupKind::Standalone, vec![info], 0))
            .collect()
    }
}

fn abort(state: &mut PipelineState, err: PipelineError, observer: &dyn PipelineObserver) {
    error!(run_id = %state.run_id, status = %state.status, error = %err, "analysis run failed");
    state.fail(err.to_string());
    observer.on_progress(state);
    observer.on_error(state);
}

/// `on_progress`, then the hook of the phase the run is in.
fn notify(observer: &dyn PipelineObserver, state: &PipelineState) {
    observer.on_progress(state);
    match state.status {
        PipelineStatus::Phase1 => observer.on_phase1_progress(state),
        PipelineStatus::Phase2 => observer.on_phase2_progress(state),
        PipelineStatus::Phase3 => observer.on_phase3_progress(state),
        _ => {}
    }
}
