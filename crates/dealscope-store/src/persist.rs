//! Saving finished pipeline runs.

use dealscope_core::{PipelineState, collect_audit_trail};
use serde_json::{Value, json};
use tracing::info;

use crate::{DocumentStore, StoreError};

pub const ANALYSES_TABLE: &str = "legal_analyses";
pub const AUDIT_TABLE: &str = "legal_analysis_audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistSummary {
    pub audit_rows: usize,
}

/// Upsert the analysis keyed on `run_id` and append its audit trail.
pub async fn persist_run(store: &dyn DocumentStore, state: &PipelineState) -> Result<PersistSummary, StoreError> {
    let record = analysis_record(state)?;
    store.upsert(ANALYSES_TABLE, record, "run_id").await?;

    let rows = collect_audit_trail(state)
        .into_iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()?;
    let audit_rows = if rows.is_empty() {
        0
    } else {
        store.insert(AUDIT_TABLE, rows).await?
    };

    info!(run_id = %state.run_id, audit_rows, "persisted analysis");
    Ok(PersistSummary { audit_rows })
}

fn analysis_record(state: &PipelineState) -> Result<Value, StoreError> {
    Ok(json!({
        "run_id": state.run_id,
        "company_id": state.config.company_id,
        "company_name": state.config.company_name,
        "status": state.status,
        "error": state.error,
        "started_at": state.started_at,
        "completed_at": state.completed_at,
        "document_count": state.phase1_results.len(),
        "phase1_results": serde_json::to_value(&state.phase1_results)?,
        "phase2_results": serde_json::to_value(&state.phase2_results)?,
        "phase3_result": serde_json::to_value(&state.phase3_result)?,
    }))
}
