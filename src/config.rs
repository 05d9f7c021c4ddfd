use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub text: Text,
    #[serde(default)]
    pub ocr: Ocr,
    #[serde(default)]
    pub normalize: Normalize,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub print_summary: bool,
    /// Number of PDFs processed concurrently. 1 keeps the batch strictly sequential.
    pub max_parallel_files: usize,
    /// Skip the toolchain check before a batch. Only useful with text-only inputs.
    pub skip_doctor: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
            max_parallel_files: 1,
            skip_doctor: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub rules_file: String,
    pub split_dir_name: String,
    pub manual_dir_name: String,
    pub manifest_filename: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            rules_file: "rules.toml".into(),
            split_dir_name: "split-files".into(),
            manual_dir_name: "manual-splitting required".into(),
            manifest_filename: "manifest-of-unsplit-files.txt".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_input_file_bytes: u64,
    pub max_input_pages: u32,
    /// Wall-clock budget for scanning one document; 0 disables the check.
    pub document_timeout_seconds: u64,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_file_bytes: 2 * 1024 * 1024 * 1024,
            max_input_pages: 20000,
            document_timeout_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    /// Native text shorter than this (in chars) counts as no text layer.
    pub min_text_chars: usize,
    pub classify_sample_pages: u32,
    /// Share of the page height, measured from the bottom edge, treated as footer.
    pub footer_fraction: f64,
}
impl Default for Text {
    fn default() -> Self {
        Self {
            min_text_chars: 20,
            classify_sample_pages: 12,
            footer_fraction: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ocr {
    pub pdftotext_exe: String,
    pub pdftoppm_exe: String,
    pub tesseract_exe: String,
    pub lang: String,
    pub page_dpi: u32,
    pub footer_dpi: u32,
    pub block_psm: u32,
    pub line_psm: u32,
    pub timeout_seconds: u64,
}
impl Default for Ocr {
    fn default() -> Self {
        Self {
            pdftotext_exe: "pdftotext".into(),
            pdftoppm_exe: "pdftoppm".into(),
            tesseract_exe: "tesseract".into(),
            lang: "eng".into(),
            page_dpi: 200,
            footer_dpi: 288,
            block_psm: 6,
            line_psm: 7,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Normalize {
    pub nfkc: bool,
    pub collapse_whitespace: bool,
    #[serde(default)]
    pub replacements: Vec<Replacement>,
}
impl Default for Normalize {
    fn default() -> Self {
        Self {
            nfkc: true,
            collapse_whitespace: true,
            replacements: vec![
                Replacement {
                    pattern: "\\b0f\\b".into(),
                    replacement: "of".into(),
                },
                Replacement {
                    pattern: "(?i)\\b(page)\\s*\\|".into(),
                    replacement: "$1 1".into(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replacement {
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub write_report_json: bool,
    pub report_filename: String,
    pub write_counts: bool,
    pub pre_counts_filename: String,
    pub post_counts_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_report_json: true,
            report_filename: "batch-report.json".into(),
            write_counts: true,
            pre_counts_filename: "pre-split-counts.json".into(),
            post_counts_filename: "post-split-counts.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            dump_effective_config: false,
        }
    }
}
