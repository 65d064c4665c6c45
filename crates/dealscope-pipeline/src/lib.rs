//! The three-phase analysis pipeline.
//!
//! Phase 1 extracts headline terms per document (concurrently, in fixed
//! windows), Phase 2 analyses each document category in depth, Phase 3
//! synthesises an executive view across the deal. The [`Pipeline`] drives the
//! phases, owns the [`PipelineState`](dealscope_core::PipelineState) and
//! reports every change to a [`PipelineObserver`].

pub mod batch;
pub mod cancel;
pub mod config;
pub mod error;
pub mod observer;
pub mod orchestrator;
pub mod parse;
pub mod phase1;
pub mod phase2;
pub mod phase3;
pub mod request;

pub use batch::{BatchEvent, run_windows};
pub use cancel::CancellationToken;
pub use config::PipelineConfig;
pub use error::{ItemError, PipelineError};
pub use observer::{ChannelObserver, NoopObserver, PipelineEvent, PipelineObserver};
pub use orchestrator::Pipeline;
pub use phase1::{Phase1Processor, Phase1Update};
pub use phase2::{CategoryAnalyzer, contributing_documents};
pub use phase3::Synthesizer;
pub use request::{AnalysisRequest, DecodedUpload, FileUpload};
