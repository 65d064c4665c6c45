use serde::{Deserialize, Serialize};

/// Tuning knobs for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Phase 1 window size.
    pub concurrency: usize,
    /// Word text sent to the service is cut to this many characters.
    pub text_char_limit: usize,
    /// Service classification replaces the filename one above this confidence.
    pub classification_override_threshold: f32,
    pub max_summary_points: usize,
    /// Raw-text excerpt per document included in Phase 2 prompts.
    pub category_text_excerpt_chars: usize,
    /// Bundle related documents before Phase 1.
    pub group_documents: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            text_char_limit: 15_000,
            classification_override_threshold: 0.7,
            max_summary_points: 10,
            category_text_excerpt_chars: 6_000,
            group_documents: true,
        }
    }
}
