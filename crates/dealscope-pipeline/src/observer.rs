//! Progress callbacks.
//!
//! Observers see read-only snapshots; only the orchestrator mutates state.

use dealscope_core::PipelineState;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Hooks invoked by the orchestrator. Every method defaults to a no-op.
///
/// `on_progress` fires after every state mutation; the phase hooks fire
/// alongside it when the mutation belongs to that phase.
pub trait PipelineObserver: Send + Sync {
    fn on_progress(&self, _state: &PipelineState) {}
    fn on_phase1_progress(&self, _state: &PipelineState) {}
    fn on_phase2_progress(&self, _state: &PipelineState) {}
    fn on_phase3_progress(&self, _state: &PipelineState) {}
    fn on_complete(&self, _state: &PipelineState) {}
    fn on_error(&self, _state: &PipelineState) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// An owned snapshot of the run, tagged with the hook that produced it.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Progress(PipelineState),
    Phase1Progress(PipelineState),
    Phase2Progress(PipelineState),
    Phase3Progress(PipelineState),
    Complete(PipelineState),
    Error(PipelineState),
}

impl PipelineEvent {
    pub fn state(&self) -> &PipelineState {
        match self {
            Self::Progress(s)
            | Self::Phase1Progress(s)
            | Self::Phase2Progress(s)
            | Self::Phase3Progress(s)
            | Self::Complete(s)
            | Self::Error(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error(_))
    }
}

/// Forwards every hook as a [`PipelineEvent`] over an unbounded channel.
///
/// Send errors (receiver dropped) are ignored; the run carries on.
pub struct ChannelObserver {
    tx: UnboundedSender<PipelineEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }
}

impl PipelineObserver for ChannelObserver {
    fn on_progress(&self, state: &PipelineState) {
        self.send(PipelineEvent::Progress(state.clone()));
    }

    fn on_phase1_progress(&self, state: &PipelineState) {
        self.send(PipelineEvent::Phase1Progress(state.clone()));
    }

    fn on_phase2_progress(&self, state: &PipelineState) {
        self.send(PipelineEvent::Phase2Progress(state.clone()));
    }

    fn on_phase3_progress(&self, state: &PipelineState) {
        self.send(PipelineEvent::Phase3Progress(state.clone()));
    }

    fn on_complete(&self, state: &PipelineState) {
        self.send(PipelineEvent::Complete(state.clone()));
    }

    fn on_error(&self, state: &PipelineState) {
        self.send(PipelineEvent::Error(state.clone()));
    }
}
