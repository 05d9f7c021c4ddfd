use crate::{
    config::Config,
    engine::{Engine, PageSize},
    normalize::text_len,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub input: ProbeInput,
    pub sample: ProbeSample,
    #[serde(skip)]
    pub page_sizes: Vec<PageSize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeInput {
    pub path: String,
    pub file_bytes: u64,
    pub page_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSample {
    pub first_page_chars: usize,
    /// Decided once per document from the first page. When false every page is OCR'd.
    pub machine_readable: bool,
}

pub fn probe_pdf(cfg: &Config, engine: &dyn Engine, input: &Path) -> Result<ProbeResult> {
    let meta = std::fs::metadata(input).with_context(|| "stat input")?;
    let file_bytes = meta.len();
    if file_bytes > cfg.limits.max_input_file_bytes {
        anyhow::bail!("input exceeds max_input_file_bytes: {}", file_bytes);
    }

    let probe = engine
        .probe_pdf(input)
        .with_context(|| "engine probe_pdf failed")?;

    if probe.page_count > cfg.limits.max_input_pages {
        anyhow::bail!("input exceeds max_input_pages: {}", probe.page_count);
    }
    if probe.page_count == 0 {
        anyhow::bail!("input has zero pages");
    }

    let first_page_chars = match engine.native_text(input, 0, None) {
        Ok(t) => text_len(&t),
        Err(err) => {
            warn!("native text unavailable on first page of {}: {err:#}", input.display());
            0
        }
    };

    Ok(ProbeResult {
        input: ProbeInput {
            path: input.display().to_string(),
            file_bytes,
            page_count: probe.page_count,
        },
        sample: ProbeSample {
            first_page_chars,
            machine_readable: first_page_chars >= cfg.text.min_text_chars,
        },
        page_sizes: probe.page_sizes,
    })
}
