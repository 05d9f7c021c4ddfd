use crate::{
    config::Config,
    count::count_pdfs,
    engine::{poppler::PopplerEngine, Engine},
    pipeline::Pipeline,
    rules::RuleCatalog,
    util::ensure_dir,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "statement-splitter")]
#[command(about = "Split multi-statement bank statement PDFs into one PDF per statement")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./statement-splitter.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the statement type catalog. Overrides paths.rules_file.
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that pdftotext, pdftoppm and tesseract are usable.
    Doctor {},
    /// List statement types in catalog order.
    Rules {},
    Classify {
        #[arg(long)]
        input: PathBuf,
    },
    Detect {
        #[arg(long)]
        input: PathBuf,
        /// Skip classification and use this statement type.
        #[arg(long = "type")]
        type_name: Option<String>,
    },
    Count {
        #[arg(long, required = true)]
        dir: Vec<PathBuf>,
    },
    /// Split every PDF in --input into <input>/<name>/split-files.
    Run {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        manual_dir: Option<PathBuf>,
        #[arg(long = "type")]
        type_name: Option<String>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(p) => Config::load(&p)?,
        None => Config::default(),
    };

    match &args.cmd {
        Command::Run {
            input,
            name,
            out_dir,
            manual_dir,
            type_name,
        } => run(
            &args,
            &cfg,
            input,
            name,
            out_dir.as_deref(),
            manual_dir.as_deref(),
            type_name.as_deref(),
        ),
        Command::Doctor {} => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            doctor(&cfg)
        }
        Command::Rules {} => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            rules(&args, &cfg)
        }
        Command::Classify { input } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            classify(&args, &cfg, input)
        }
        Command::Detect { input, type_name } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            detect(&args, &cfg, input, type_name.as_deref())
        }
        Command::Count { dir } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            count(&cfg, dir)
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["statement-splitter.toml", "statement-splitter.example.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn load_catalog(args: &Args, cfg: &Config) -> Result<RuleCatalog> {
    let path = args
        .rules
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.rules_file));
    let catalog = RuleCatalog::load(&path)?;
    if catalog.is_empty() {
        bail!("rule catalog has no statement types: {}", path.display());
    }
    info!(
        "loaded {} statement types from {}",
        catalog.rules().len(),
        path.display()
    );
    Ok(catalog)
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let engine = PopplerEngine::new(cfg)?;
    let diag = engine.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    if !diag.ok {
        bail!("text/OCR toolchain is not usable");
    }
    Ok(())
}

fn rules(args: &Args, cfg: &Config) -> Result<()> {
    let catalog = load_catalog(args, cfg)?;
    let listing: Vec<_> = catalog
        .rules()
        .iter()
        .map(|r| {
            serde_json::json!({
                "type_name": r.type_name,
                "split_type": r.topology,
                "criteria": r.criteria.len(),
                "start_pattern": r.start_pattern.as_ref().map(|p| p.as_str()),
                "start_phrase": r.start_phrase,
                "must_not_contain": r.must_not_contain,
                "start_in_footer": r.start_in_footer,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

fn classify(args: &Args, cfg: &Config, input: &Path) -> Result<()> {
    validate_input(input)?;
    let catalog = load_catalog(args, cfg)?;
    let pipeline = Pipeline::new(cfg, catalog, PopplerEngine::new(cfg)?)?;
    let (probe, classification) = pipeline.classify_file(input)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "probe": probe,
            "classification": classification,
        }))?
    );
    Ok(())
}

fn detect(args: &Args, cfg: &Config, input: &Path, type_name: Option<&str>) -> Result<()> {
    validate_input(input)?;
    let catalog = load_catalog(args, cfg)?;
    let pipeline = Pipeline::new(cfg, catalog, PopplerEngine::new(cfg)?)?;
    let detection = pipeline.detect_file(input, type_name)?;
    println!("{}", serde_json::to_string_pretty(&detection)?);
    Ok(())
}

fn count(cfg: &Config, dirs: &[PathBuf]) -> Result<()> {
    let engine = PopplerEngine::new(cfg)?;
    let folders: Vec<&Path> = dirs.iter().map(|d| d.as_path()).collect();
    let report = count_pdfs(&engine, &folders)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run(
    args: &Args,
    cfg: &Config,
    input: &Path,
    name: &str,
    out_override: Option<&Path>,
    manual_override: Option<&Path>,
    type_name: Option<&str>,
) -> Result<()> {
    if !input.is_dir() {
        return Err(anyhow!("input is not a directory: {}", input.display()));
    }
    if name.trim().is_empty() || name.contains(['/', '\\']) {
        return Err(anyhow!("invalid run name: {name:?}"));
    }

    let run_dir = input.join(name);
    let out_dir = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| run_dir.join(&cfg.paths.split_dir_name));
    let manual_dir = manual_override
        .map(PathBuf::from)
        .unwrap_or_else(|| run_dir.join(&cfg.paths.manual_dir_name));

    ensure_dir(&run_dir)?;
    ensure_dir(&out_dir)?;
    ensure_dir(&manual_dir)?;

    let log_path = resolve_log_path(cfg, Some(&run_dir));
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    info!("run={name} out={} manual={}", out_dir.display(), manual_dir.display());

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(run_dir.join("effective-config.toml"), raw)?;
    }

    let catalog = load_catalog(args, cfg)?;
    let engine = PopplerEngine::new(cfg)?;

    if !cfg.global.skip_doctor {
        let diag = engine.doctor()?;
        if !diag.ok {
            let broken: Vec<String> = diag
                .tools
                .iter()
                .filter_map(|t| t.error.as_ref().map(|e| format!("{} ({}): {e}", t.name, t.exe)))
                .collect();
            bail!("text/OCR toolchain is not usable: {}", broken.join("; "));
        }
    }

    let pipeline = Pipeline::new(cfg, catalog, engine)?;

    if cfg.output.write_counts {
        let pre = count_pdfs(pipeline.engine(), &[input])?;
        std::fs::write(
            run_dir.join(&cfg.output.pre_counts_filename),
            serde_json::to_string_pretty(&pre)?,
        )?;
    }

    let report = pipeline.process_all(input, &out_dir, &manual_dir, type_name)?;

    if cfg.output.write_counts {
        let post = count_pdfs(pipeline.engine(), &[out_dir.as_path()])?;
        std::fs::write(
            run_dir.join(&cfg.output.post_counts_filename),
            serde_json::to_string_pretty(&post)?,
        )?;
    }

    if cfg.output.write_report_json {
        std::fs::write(
            run_dir.join(&cfg.output.report_filename),
            serde_json::to_string_pretty(&report)?,
        )?;
    }

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "run_dir": run_dir,
                "split_dir": out_dir,
                "manual_review_dir": manual_dir,
                "split": report.split_count,
                "manual_review": report.manual_count,
                "status": "ok"
            }))?
        );
    }

    Ok(())
}

fn validate_input(input: &Path) -> Result<()> {
    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }
    match input.extension().and_then(|s| s.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => Ok(()),
        Some(_) => Err(anyhow!("input is not a PDF: {}", input.display())),
        None => {
            tracing::warn!("input has no extension; assuming PDF: {}", input.display());
            Ok(())
        }
    }
}

fn resolve_log_path(cfg: &Config, run_dir: Option<&Path>) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    run_dir.map(|d| d.join("splitter.log"))
}
