#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use statement_splitter::{
    config::Config,
    engine::{
        DocDiag, Engine, OcrLayout, OcrRequest, PageSize, ProbeOut, Region, SplitChunk,
        SplitTarget,
    },
    normalize::Normalizer,
    pipeline::Pipeline,
    probe::probe_pdf,
    rules::RuleCatalog,
    text::PageTextSource,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const FILLER: &str = " -- account activity for the period, see reverse for details";

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub native: String,
    pub ocr: String,
    pub footer_native: String,
    pub footer_ocr_block: String,
    pub footer_ocr_line: String,
    pub ocr_fails: bool,
}

/// Page with a usable text layer.
pub fn text_page(s: &str) -> FakePage {
    FakePage {
        native: format!("{s}{FILLER}"),
        ..Default::default()
    }
}

/// Page with no text layer; only OCR sees `s`.
pub fn scanned_page(s: &str) -> FakePage {
    FakePage {
        ocr: format!("{s}{FILLER}"),
        ..Default::default()
    }
}

#[derive(Default)]
pub struct FakeEngine {
    docs: HashMap<String, Vec<FakePage>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_split: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc(mut self, file_name: &str, pages: Vec<FakePage>) -> Self {
        self.docs.insert(file_name.to_string(), pages);
        self
    }

    fn pages(&self, input: &Path) -> Result<&Vec<FakePage>> {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.docs
            .get(&name)
            .ok_or_else(|| anyhow!("not a PDF: {}", input.display()))
    }

    fn page(&self, input: &Path, page: u32) -> Result<&FakePage> {
        self.pages(input)?
            .get(page as usize)
            .ok_or_else(|| anyhow!("page {page} out of range"))
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Engine for FakeEngine {
    fn doctor(&self) -> Result<DocDiag> {
        Ok(DocDiag {
            tools: Vec::new(),
            ok: true,
        })
    }

    fn probe_pdf(&self, input: &Path) -> Result<ProbeOut> {
        let pages = self.pages(input)?;
        Ok(ProbeOut {
            page_count: pages.len() as u32,
            page_sizes: vec![PageSize::default(); pages.len()],
        })
    }

    fn native_text(&self, input: &Path, page: u32, region: Option<&Region>) -> Result<String> {
        let p = self.page(input, page)?;
        match region {
            None => {
                self.record(format!("native:{page}"));
                Ok(p.native.clone())
            }
            Some(_) => {
                self.record(format!("footer_native:{page}"));
                Ok(p.footer_native.clone())
            }
        }
    }

    fn ocr_text(&self, input: &Path, page: u32, req: &OcrRequest) -> Result<String> {
        let p = self.page(input, page)?;
        let tag = match (req.region.is_some(), req.layout) {
            (false, _) => "ocr",
            (true, OcrLayout::Block) => "footer_ocr_block",
            (true, OcrLayout::SingleLine) => "footer_ocr_line",
        };
        self.record(format!("{tag}:{page}"));
        if p.ocr_fails {
            bail!("tesseract crashed");
        }
        Ok(match tag {
            "ocr" => p.ocr.clone(),
            "footer_ocr_block" => p.footer_ocr_block.clone(),
            _ => p.footer_ocr_line.clone(),
        })
    }

    fn split_pdf(
        &self,
        input: &Path,
        out_dir: &Path,
        targets: &[SplitTarget],
    ) -> Result<Vec<SplitChunk>> {
        if self.fail_split {
            bail!("disk full");
        }
        let total = self.pages(input)?.len() as u32;
        std::fs::create_dir_all(out_dir)?;
        let mut out = Vec::new();
        for t in targets {
            if t.range.end >= total {
                bail!("range out of bounds");
            }
            let path = out_dir.join(&t.file_name);
            let pages: Vec<String> = (t.range.start..=t.range.end).map(|p| p.to_string()).collect();
            std::fs::write(&path, pages.join(","))?;
            out.push(SplitChunk {
                file_name: t.file_name.clone(),
                range: t.range,
                path: path.display().to_string(),
            });
        }
        Ok(out)
    }
}

pub fn catalog(raw: &str) -> RuleCatalog {
    RuleCatalog::from_toml(raw).expect("catalog")
}

/// Writes a placeholder file so filesystem checks on `name` pass.
pub fn touch_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.4 placeholder").unwrap();
    path
}

pub fn pipeline(engine: FakeEngine, catalog: RuleCatalog) -> Pipeline<FakeEngine> {
    Pipeline::new(&Config::default(), catalog, engine).unwrap()
}

/// Runs `f` with a text source over `input` using default config.
pub fn with_source<T>(engine: &FakeEngine, input: &Path, f: impl FnOnce(&PageTextSource<'_>) -> T) -> T {
    let cfg = Config::default();
    let normalizer = Normalizer::new(&cfg.normalize).unwrap();
    let probe = probe_pdf(&cfg, engine, input).unwrap();
    let source = PageTextSource::new(&cfg, engine, &normalizer, input, &probe);
    f(&source)
}
