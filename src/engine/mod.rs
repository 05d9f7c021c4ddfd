pub mod poppler;
pub mod types;

use anyhow::Result;
use std::path::Path;

pub use types::{
    DocDiag, OcrLayout, OcrRequest, PageRange, PageSize, ProbeOut, Region, SplitChunk,
    SplitTarget, ToolDiag,
};

/// PDF access used by the splitter. Pages are 0-based everywhere.
pub trait Engine: Sync {
    fn doctor(&self) -> Result<DocDiag>;
    fn probe_pdf(&self, input: &Path) -> Result<ProbeOut>;
    fn native_text(&self, input: &Path, page: u32, region: Option<&Region>) -> Result<String>;
    fn ocr_text(&self, input: &Path, page: u32, req: &OcrRequest) -> Result<String>;
    fn split_pdf(&self, input: &Path, out_dir: &Path, targets: &[SplitTarget])
        -> Result<Vec<SplitChunk>>;
}
