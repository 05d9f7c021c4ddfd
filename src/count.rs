use crate::engine::Engine;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountReport {
    pub folders: Vec<FolderCount>,
    pub total_files: usize,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderCount {
    pub folder: String,
    pub files: Vec<FileCount>,
    pub file_count: usize,
    pub page_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCount {
    pub name: String,
    pub pages: u32,
}

/// `.pdf` files directly inside `dir`, sorted by name.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_pdf = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if is_pdf {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Files and pages per folder. A PDF that cannot be opened counts as 0 pages.
pub fn count_pdfs(engine: &dyn Engine, folders: &[&Path]) -> Result<CountReport> {
    let mut report = CountReport {
        folders: Vec::new(),
        total_files: 0,
        total_pages: 0,
    };

    for folder in folders {
        let mut fc = FolderCount {
            folder: folder.display().to_string(),
            files: Vec::new(),
            file_count: 0,
            page_count: 0,
        };
        for path in list_pdfs(folder)? {
            let pages = match engine.probe_pdf(&path) {
                Ok(p) => p.page_count,
                Err(err) => {
                    warn!("count: cannot open {}: {err:#}", path.display());
                    0
                }
            };
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            fc.files.push(FileCount { name, pages });
            fc.file_count += 1;
            fc.page_count += pages as u64;
        }
        info!(
            "count folder={} files={} pages={}",
            fc.folder, fc.file_count, fc.page_count
        );
        report.total_files += fc.file_count;
        report.total_pages += fc.page_count;
        report.folders.push(fc);
    }

    Ok(report)
}
