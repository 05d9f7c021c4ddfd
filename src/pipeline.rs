use crate::{
    classify::{self, Classification},
    config::Config,
    count::list_pdfs,
    detect::{self, BoundaryMap},
    engine::Engine,
    manifest::Manifest,
    normalize::Normalizer,
    probe::{self, ProbeResult},
    report::{BatchReport, FileOutcome, FileReport},
    rules::{LayoutRule, RuleCatalog},
    split_plan::SplitPlan,
    text::PageTextSource,
    util::{ensure_dir, file_stem, hash_file, now_rfc3339},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct Pipeline<E: Engine> {
    cfg: Config,
    catalog: RuleCatalog,
    normalizer: Normalizer,
    engine: E,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub probe: ProbeResult,
    pub type_name: String,
    pub classified: bool,
    pub boundaries: Option<BoundaryMap>,
}

impl<E: Engine> Pipeline<E> {
    pub fn new(cfg: &Config, catalog: RuleCatalog, engine: E) -> Result<Self> {
        let normalizer = Normalizer::new(&cfg.normalize)?;
        Ok(Self {
            cfg: cfg.clone(),
            catalog,
            normalizer,
            engine,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn probe(&self, input: &Path) -> Result<ProbeResult> {
        probe::probe_pdf(&self.cfg, &self.engine, input)
            .with_context(|| format!("probing {}", input.display()))
    }

    fn source<'a>(&'a self, input: &'a Path, probe: &'a ProbeResult) -> PageTextSource<'a> {
        PageTextSource::new(&self.cfg, &self.engine, &self.normalizer, input, probe)
    }

    pub fn classify_file(&self, input: &Path) -> Result<(ProbeResult, Classification)> {
        let probe = self.probe(input)?;
        let source = self.source(input, &probe);
        let (classification, _) =
            classify::classify(&self.catalog, &source, self.cfg.text.classify_sample_pages);
        Ok((probe, classification))
    }

    /// Classify (unless `selected_type` is given) and scan for boundaries.
    /// `boundaries` is None when the type is unknown.
    pub fn detect_file(&self, input: &Path, selected_type: Option<&str>) -> Result<Detection> {
        let selected = selected_type.map(|t| self.catalog.require(t)).transpose()?;
        let probe = self.probe(input)?;
        let (type_name, classified, boundaries) = self.detect_with(input, &probe, selected)?;
        Ok(Detection {
            probe,
            type_name,
            classified,
            boundaries,
        })
    }

    fn detect_with(
        &self,
        input: &Path,
        probe: &ProbeResult,
        selected: Option<&LayoutRule>,
    ) -> Result<(String, bool, Option<BoundaryMap>)> {
        let source = self.source(input, probe);
        if source.forces_ocr() {
            info!("{} has no usable text layer; OCR for every page", input.display());
        }

        let (rule, classified) = match selected {
            Some(rule) => (Some(rule), false),
            None => {
                let (c, rule) =
                    classify::classify(&self.catalog, &source, self.cfg.text.classify_sample_pages);
                info!("{} classified as {}", input.display(), c.type_name);
                (rule, true)
            }
        };

        let Some(rule) = rule else {
            return Ok((classify::UNKNOWN_TYPE.to_string(), classified, None));
        };

        let timeout = match self.cfg.limits.document_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let map = detect::detect(&source, rule, timeout)?;
        debug!(?map, "boundaries for {}", input.display());
        Ok((rule.type_name.clone(), classified, Some(map)))
    }

    pub fn process_all(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        manual_review_dir: &Path,
        selected_type: Option<&str>,
    ) -> Result<BatchReport> {
        let selected = selected_type.map(|t| self.catalog.require(t)).transpose()?;
        ensure_dir(output_dir)?;
        ensure_dir(manual_review_dir)?;

        let manifest = Manifest::new(&manual_review_dir.join(&self.cfg.paths.manifest_filename));
        let files = list_pdfs(input_dir)?;
        let started = now_rfc3339();

        info!(
            "splitting {} files from {} into {}",
            files.len(),
            input_dir.display(),
            output_dir.display()
        );

        let workers = self.cfg.global.max_parallel_files.max(1).min(files.len().max(1));
        let reports: Vec<FileReport> = if workers <= 1 {
            files
                .iter()
                .map(|f| self.process_file(f, output_dir, manual_review_dir, &manifest, selected))
                .collect()
        } else {
            debug!("processing with {workers} workers");
            let next = AtomicUsize::new(0);
            let done: Mutex<Vec<(usize, FileReport)>> = Mutex::new(Vec::with_capacity(files.len()));
            std::thread::scope(|s| {
                for _ in 0..workers {
                    s.spawn(|| loop {
                        let i = next.fetch_add(1, Ordering::SeqCst);
                        let Some(f) = files.get(i) else { break };
                        let r = self.process_file(f, output_dir, manual_review_dir, &manifest, selected);
                        done.lock().unwrap_or_else(|p| p.into_inner()).push((i, r));
                    });
                }
            });
            let mut done = done.into_inner().unwrap_or_else(|p| p.into_inner());
            done.sort_by_key(|(i, _)| *i);
            done.into_iter().map(|(_, r)| r).collect()
        };

        let split_count = reports.iter().filter(|r| r.outcome.is_split()).count();
        let manual_count = reports.len() - split_count;
        info!("splitting complete: split={split_count} manual={manual_count}");
        if manual_count > 0 {
            warn!(
                "{manual_count} file(s) need manual splitting; see {}",
                manifest.path().display()
            );
        }

        Ok(BatchReport {
            input_dir: input_dir.display().to_string(),
            output_dir: output_dir.display().to_string(),
            manual_review_dir: manual_review_dir.display().to_string(),
            started,
            finished: now_rfc3339(),
            split_count,
            manual_count,
            files: reports,
        })
    }

    /// Never fails: any error routes the file to manual review.
    fn process_file(
        &self,
        input: &Path,
        output_dir: &Path,
        manual_review_dir: &Path,
        manifest: &Manifest,
        selected: Option<&LayoutRule>,
    ) -> FileReport {
        let name = input.display().to_string();
        info!("processing {name}");

        let mut report = FileReport {
            input: name.clone(),
            sha256: hash_file(input).ok(),
            page_count: None,
            machine_readable: None,
            type_name: None,
            boundaries: None,
            outcome: FileOutcome::ManualReview {
                reason: String::new(),
            },
        };

        let reason = match self.split_file(input, output_dir, selected, &mut report) {
            Ok(Some(outputs)) => {
                info!("{name} split into {} file(s)", outputs.len());
                report.outcome = FileOutcome::Split { outputs };
                return report;
            }
            Ok(None) => {
                warn!("could not identify document boundaries for {name}");
                match report.type_name.as_deref() {
                    Some(classify::UNKNOWN_TYPE) | None => "unknown document type".to_string(),
                    Some(t) => format!("no boundaries found for type {t}"),
                }
            }
            Err(err) => {
                error!("{name}: {err:#}");
                format!("{err:#}")
            }
        };

        let reason = match route_to_manual(input, manual_review_dir, manifest) {
            Ok(()) => {
                info!("{name} moved to manual review: {}", manual_review_dir.display());
                reason
            }
            Err(err) => {
                error!("{name}: manual review routing failed: {err:#}");
                format!("{reason}; manual review routing failed: {err:#}")
            }
        };
        report.outcome = FileOutcome::ManualReview { reason };
        report
    }

    fn split_file(
        &self,
        input: &Path,
        output_dir: &Path,
        selected: Option<&LayoutRule>,
        report: &mut FileReport,
    ) -> Result<Option<Vec<crate::engine::SplitChunk>>> {
        let probe = self.probe(input)?;
        report.page_count = Some(probe.input.page_count);
        report.machine_readable = Some(probe.sample.machine_readable);

        let (type_name, _, boundaries) = self.detect_with(input, &probe, selected)?;
        report.type_name = Some(type_name);

        let Some(map) = boundaries.filter(|m| !m.is_empty()) else {
            return Ok(None);
        };
        report.boundaries = Some(map.clone());

        let plan = SplitPlan::from_boundaries(&file_stem(input), &map, probe.input.page_count);
        if plan.targets.is_empty() {
            return Ok(None);
        }
        let outputs = self
            .engine
            .split_pdf(input, output_dir, &plan.targets)
            .with_context(|| format!("splitting {}", input.display()))?;
        Ok(Some(outputs))
    }
}

fn route_to_manual(input: &Path, manual_review_dir: &Path, manifest: &Manifest) -> Result<()> {
    let file_name = input
        .file_name()
        .with_context(|| format!("no file name: {}", input.display()))?;
    let dest = manual_review_dir.join(file_name);
    std::fs::copy(input, &dest)
        .with_context(|| format!("copy {} -> {}", input.display(), dest.display()))?;
    manifest.append(&file_stem(input))
}
