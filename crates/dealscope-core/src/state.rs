//! Aggregate state of one pipeline run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::results::{Phase1Result, Phase2Result, Phase3Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    #[default]
    Initializing,
    Phase1,
    Phase2,
    Phase3,
    Complete,
    Error,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Phase1 => "phase1",
            Self::Phase2 => "phase2",
            Self::Phase3 => "phase3",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Linear transitions, plus `error` from any non-terminal state.
    pub fn can_advance_to(&self, next: PipelineStatus) -> bool {
        use PipelineStatus::*;
        match (self, next) {
            (Complete | Error, _) => false,
            (_, Error) => true,
            (Initializing, Phase1) | (Phase1, Phase2) | (Phase2, Phase3) | (Phase3, Complete) => {
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub completed: usize,
    pub total: usize,
    /// Item most recently finished (filename or category).
    pub current: Option<String>,
}

impl PhaseProgress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            current: None,
        }
    }

    pub fn record(&mut self, item: impl Into<String>) {
        self.completed += 1;
        self.current = Some(item.into());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub phase1: PhaseProgress,
    pub phase2: PhaseProgress,
    pub phase3: PhaseProgress,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub dry_run: bool,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: String,
    pub status: PipelineStatus,
    pub progress: PipelineProgress,
    pub phase1_results: Vec<Phase1Result>,
    pub phase2_results: Vec<Phase2Result>,
    pub phase3_result: Option<Phase3Result>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub config: RunConfig,
}

impl PipelineState {
    pub fn new(run_id: impl Into<String>, config: RunConfig) -> Self {
        Self {
            run_id: run_id.into(),
            status: PipelineStatus::Initializing,
            progress: PipelineProgress::default(),
            phase1_results: Vec::new(),
            phase2_results: Vec::new(),
            phase3_result: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
            config,
        }
    }

    pub fn advance(&mut self, next: PipelineStatus) -> Result<(), CoreError> {
        if !self.status.can_advance_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Abort the run. Partial results are kept.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = PipelineStatus::Error;
        self.error = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn successful_documents(&self) -> impl Iterator<Item = &Phase1Result> {
        self.phase1_results.iter().filter(|r| r.is_complete())
    }

    pub fn company_label(&self) -> &str {
        self.config
            .company_name
            .as_deref()
            .or(self.config.company_id.as_deref())
            .unwrap_or("the company")
    }
}
