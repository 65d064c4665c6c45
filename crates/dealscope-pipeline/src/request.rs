use dealscope_core::{CoreError, Document, RunConfig};
use serde::{Deserialize, Serialize};

/// One uploaded file, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpload {
    pub filename: String,
    pub file_base64: String,
}

/// One upload after decoding: the document, or why it was rejected.
#[derive(Debug)]
pub struct DecodedUpload {
    pub filename: String,
    pub document: Result<Document, CoreError>,
}

/// Input to a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub files: Vec<FileUpload>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

impl AnalysisRequest {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            dry_run: self.dry_run,
            company_id: self.company_id.clone(),
            company_name: self.company_name.clone(),
        }
    }

    /// Decode every upload on its own, in request order.
    pub fn decode(&self) -> Vec<DecodedUpload> {
        self.files
            .iter()
            .map(|f| DecodedUpload {
                filename: f.filename.clone(),
                document: Document::from_base64(f.filename.clone(), &f.file_base64),
            })
            .collect()
    }
}
