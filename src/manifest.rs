use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only list of file stems that need manual splitting.
/// Appends go through one lock so concurrent workers never interleave lines.
pub struct Manifest {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Manifest {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, stem: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open manifest: {}", self.path.display()))?;
        writeln!(f, "{stem}").with_context(|| format!("append manifest: {}", self.path.display()))?;
        Ok(())
    }
}
