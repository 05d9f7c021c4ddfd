use crate::{detect::BoundaryMap, engine::SplitChunk};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub input_dir: String,
    pub output_dir: String,
    pub manual_review_dir: String,
    pub started: String,
    pub finished: String,
    pub split_count: usize,
    pub manual_count: usize,
    pub files: Vec<FileReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub input: String,
    pub sha256: Option<String>,
    pub page_count: Option<u32>,
    pub machine_readable: Option<bool>,
    pub type_name: Option<String>,
    pub boundaries: Option<BoundaryMap>,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Split { outputs: Vec<SplitChunk> },
    ManualReview { reason: String },
}

impl FileOutcome {
    pub fn is_split(&self) -> bool {
        matches!(self, FileOutcome::Split { .. })
    }
}
