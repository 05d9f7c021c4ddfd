use super::{types::*, Engine};
use crate::config::Config;
use crate::util::ensure_dir;
use anyhow::{anyhow, bail, Context, Result};
use lopdf::{Document, Object, ObjectId};
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Poppler command-line tools for text and rasterizing, tesseract for OCR,
/// lopdf for page geometry and writing split documents.
pub struct PopplerEngine {
    cfg: Config,
    pdftotext: PathBuf,
    pdftoppm: PathBuf,
    tesseract: PathBuf,
}

impl PopplerEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            cfg: cfg.clone(),
            pdftotext: resolve_exe(&cfg.ocr.pdftotext_exe, "PDFTOTEXT", "pdftotext"),
            pdftoppm: resolve_exe(&cfg.ocr.pdftoppm_exe, "PDFTOPPM", "pdftoppm"),
            tesseract: resolve_exe(&cfg.ocr.tesseract_exe, "TESSERACT", "tesseract"),
        })
    }

    fn timeout(&self) -> Option<Duration> {
        if self.cfg.ocr.timeout_seconds > 0 {
            Some(Duration::from_secs(self.cfg.ocr.timeout_seconds))
        } else {
            None
        }
    }

    fn run_tool(&self, exe: &Path, args: &[OsString]) -> Result<Output> {
        debug!("run {} {:?}", exe.display(), args);
        let mut cmd = Command::new(exe);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning {}", exe.display()))?;

        let output = match self.timeout() {
            Some(t) => wait_with_timeout(&mut child, t)
                .with_context(|| format!("{} did not finish", exe.display()))?,
            None => child
                .wait_with_output()
                .with_context(|| format!("waiting for {}", exe.display()))?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} failed ({}): {}",
                exe.display(),
                output.status,
                stderr.trim()
            ));
        }
        Ok(output)
    }

    fn tool_version(&self, name: &str, exe: &Path, flag: &str) -> ToolDiag {
        let res = Command::new(exe)
            .arg(flag)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();
        match res {
            Ok(out) if out.status.success() || !out.stderr.is_empty() => {
                // poppler prints its version banner on stderr
                let text = if out.stdout.is_empty() {
                    String::from_utf8_lossy(&out.stderr).to_string()
                } else {
                    String::from_utf8_lossy(&out.stdout).to_string()
                };
                ToolDiag {
                    name: name.to_string(),
                    exe: exe.display().to_string(),
                    version: text.lines().next().map(|l| l.trim().to_string()),
                    error: None,
                }
            }
            Ok(out) => ToolDiag {
                name: name.to_string(),
                exe: exe.display().to_string(),
                version: None,
                error: Some(format!("exited with {}", out.status)),
            },
            Err(e) => ToolDiag {
                name: name.to_string(),
                exe: exe.display().to_string(),
                version: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn render_png(&self, input: &Path, page: u32, req: &OcrRequest, dir: &Path) -> Result<PathBuf> {
        let prefix = dir.join(format!("page-{:05}", page));
        let mut args: Vec<OsString> = vec![
            "-f".into(),
            (page + 1).to_string().into(),
            "-l".into(),
            (page + 1).to_string().into(),
            "-r".into(),
            req.dpi.to_string().into(),
            "-png".into(),
            "-singlefile".into(),
        ];
        if let Some(region) = &req.region {
            let (x, y, w, h) = region.to_pixels(req.dpi);
            for (flag, v) in [("-x", x), ("-y", y), ("-W", w), ("-H", h)] {
                args.push(flag.into());
                args.push(v.to_string().into());
            }
        }
        args.push(input.as_os_str().to_owned());
        args.push(prefix.as_os_str().to_owned());

        self.run_tool(&self.pdftoppm, &args)?;

        let png = prefix.with_extension("png");
        if !png.exists() {
            bail!("pdftoppm produced no image for page {}", page + 1);
        }
        Ok(png)
    }
}

fn resolve_exe(raw: &str, env_key: &str, fallback: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var(env_key) {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
        }
        return PathBuf::from(fallback);
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

impl Engine for PopplerEngine {
    fn doctor(&self) -> Result<DocDiag> {
        let tools = vec![
            self.tool_version("pdftotext", &self.pdftotext, "-v"),
            self.tool_version("pdftoppm", &self.pdftoppm, "-v"),
            self.tool_version("tesseract", &self.tesseract, "--version"),
        ];
        let ok = tools.iter().all(|t| t.error.is_none());
        Ok(DocDiag { tools, ok })
    }

    fn probe_pdf(&self, input: &Path) -> Result<ProbeOut> {
        let doc = Document::load(input).with_context(|| format!("loading PDF: {}", input.display()))?;
        let pages = doc.get_pages();
        let page_sizes: Vec<PageSize> = pages
            .values()
            .map(|id| media_box(&doc, *id).unwrap_or_default())
            .collect();
        Ok(ProbeOut {
            page_count: page_sizes.len() as u32,
            page_sizes,
        })
    }

    fn native_text(&self, input: &Path, page: u32, region: Option<&Region>) -> Result<String> {
        let mut args: Vec<OsString> = vec![
            "-f".into(),
            (page + 1).to_string().into(),
            "-l".into(),
            (page + 1).to_string().into(),
            "-enc".into(),
            "UTF-8".into(),
            "-r".into(),
            "72".into(),
        ];
        if let Some(region) = region {
            let (x, y, w, h) = region.to_pixels(72);
            for (flag, v) in [("-x", x), ("-y", y), ("-W", w), ("-H", h)] {
                args.push(flag.into());
                args.push(v.to_string().into());
            }
        }
        args.push(input.as_os_str().to_owned());
        args.push("-".into());

        let out = self.run_tool(&self.pdftotext, &args)?;
        Ok(String::from_utf8_lossy(&out.stdout).to_string())
    }

    fn ocr_text(&self, input: &Path, page: u32, req: &OcrRequest) -> Result<String> {
        let dir = tempfile::Builder::new()
            .prefix("statement-splitter-")
            .tempdir()
            .with_context(|| "creating OCR scratch dir")?;
        let png = self.render_png(input, page, req, dir.path())?;

        let psm = match req.layout {
            OcrLayout::Block => self.cfg.ocr.block_psm,
            OcrLayout::SingleLine => self.cfg.ocr.line_psm,
        };
        let args: Vec<OsString> = vec![
            png.as_os_str().to_owned(),
            "stdout".into(),
            "-l".into(),
            self.cfg.ocr.lang.clone().into(),
            "--psm".into(),
            psm.to_string().into(),
        ];
        let out = self.run_tool(&self.tesseract, &args)?;
        Ok(String::from_utf8_lossy(&out.stdout).to_string())
    }

    fn split_pdf(
        &self,
        input: &Path,
        out_dir: &Path,
        targets: &[SplitTarget],
    ) -> Result<Vec<SplitChunk>> {
        ensure_dir(out_dir)?;
        let doc = Document::load(input).with_context(|| format!("loading PDF: {}", input.display()))?;
        let total = doc.get_pages().len() as u32;

        let mut outputs = Vec::with_capacity(targets.len());
        for t in targets {
            if t.range.end >= total || t.range.start > t.range.end {
                bail!(
                    "page range {}-{} out of bounds for {} pages",
                    t.range.start,
                    t.range.end,
                    total
                );
            }

            let mut part = doc.clone();
            let drop: Vec<u32> = (1..=total).filter(|p| !t.range.contains(p - 1)).collect();
            if !drop.is_empty() {
                part.delete_pages(&drop);
                part.prune_objects();
            }

            let path = out_dir.join(&t.file_name);
            part.save(&path)
                .with_context(|| format!("writing {}", path.display()))?;

            outputs.push(SplitChunk {
                file_name: t.file_name.clone(),
                range: t.range,
                path: path.display().to_string(),
            });
        }
        Ok(outputs)
    }
}

fn media_box(doc: &Document, page_id: ObjectId) -> Option<PageSize> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    // MediaBox is inheritable from the page tree
    for _ in 0..32 {
        if let Ok(obj) = dict.get(b"MediaBox") {
            return box_size(doc, obj);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn box_size(doc: &Document, obj: &Object) -> Option<PageSize> {
    let arr = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?,
        other => other.as_array().ok()?,
    };
    let nums: Vec<f64> = arr
        .iter()
        .filter_map(|o| match o {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(f) => Some(*f as f64),
            _ => None,
        })
        .collect();
    if nums.len() != 4 {
        return None;
    }
    Some(PageSize {
        width: (nums[2] - nums[0]).abs(),
        height: (nums[3] - nums[1]).abs(),
    })
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting so a chatty tool can't block on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("tool process timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            let _ = stdout_thread.join();
            return Err(anyhow!(
                "process exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr)
            ));
        }

        std::thread::sleep(Duration::from_millis(20));
    }
}
