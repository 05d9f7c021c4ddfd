use crate::{
    rules::{LayoutRule, SplitTopology},
    text::PageTextSource,
};
use anyhow::{bail, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementId {
    /// Number captured from the start pattern.
    Number(u64),
    /// Synthetic id: the page the statement opened on.
    Page(u32),
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementId::Number(n) => write!(f, "{n}"),
            StatementId::Page(p) => write!(f, "page-{p}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRange {
    pub id: StatementId,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMap {
    /// Start pages; document i spans [start_i, start_{i+1}).
    Starts(Vec<u32>),
    /// Inclusive ranges ordered by start page.
    Ranges(Vec<StatementRange>),
}

impl BoundaryMap {
    pub fn is_empty(&self) -> bool {
        match self {
            BoundaryMap::Starts(s) => s.is_empty(),
            BoundaryMap::Ranges(r) => r.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BoundaryMap::Starts(s) => s.len(),
            BoundaryMap::Ranges(r) => r.len(),
        }
    }
}

#[derive(Debug, Default)]
struct OpenStatements {
    ranges: Vec<StatementRange>,
    open: Option<(StatementId, u32)>,
}

impl OpenStatements {
    fn open(&mut self, id: StatementId, page: u32) {
        if matches!(&self.open, Some((cur, _)) if *cur == id) {
            return;
        }
        self.close_at(page.saturating_sub(1));
        debug!("open statement {id} at page {page}");
        self.open = Some((id, page));
    }

    fn close_at(&mut self, end: u32) {
        if let Some((id, start)) = self.open.take() {
            let end = end.max(start);
            debug!("close statement {id} pages {start}-{end}");
            self.ranges.push(StatementRange { id, start, end });
        }
    }

    fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

/// Outcome of the start checks for one page.
enum StartSignal {
    Pattern(Option<String>),
    Phrase,
}

pub fn detect(
    source: &PageTextSource<'_>,
    rule: &LayoutRule,
    timeout: Option<Duration>,
) -> Result<BoundaryMap> {
    let started = Instant::now();
    let pages = source.page_count();

    let mut starts = Vec::new();
    let mut state = OpenStatements::default();

    for page in 0..pages {
        if let Some(limit) = timeout {
            if started.elapsed() > limit {
                bail!("boundary scan exceeded {}s at page {}", limit.as_secs(), page);
            }
        }

        let text = source.text(page);
        let signal = start_signal(source, rule, page, &text);

        match (signal, rule.topology) {
            (Some(_), SplitTopology::List) => {
                debug!("start marker at page {page}");
                starts.push(page);
            }
            (Some(StartSignal::Pattern(group)), SplitTopology::StartEnd) => {
                let id = group
                    .and_then(|g| g.trim().parse::<u64>().ok())
                    .map(StatementId::Number)
                    .unwrap_or(StatementId::Page(page));
                state.open(id, page);
            }
            (Some(StartSignal::Phrase), SplitTopology::StartEnd) => {
                state.open(StatementId::Page(page), page);
            }
            (None, _) => {
                if let Some(marker) = &rule.must_not_contain {
                    if state.is_open() && !text.contains(marker.as_str()) {
                        state.close_at(page);
                    }
                }
            }
        }
    }

    if pages > 0 {
        state.close_at(pages - 1);
    }

    Ok(match rule.topology {
        SplitTopology::List => BoundaryMap::Starts(starts),
        SplitTopology::StartEnd => BoundaryMap::Ranges(state.ranges),
    })
}

fn start_signal(
    source: &PageTextSource<'_>,
    rule: &LayoutRule,
    page: u32,
    text: &str,
) -> Option<StartSignal> {
    if let Some(re) = &rule.start_pattern {
        if let Some(group) = find_start(re, text) {
            return Some(StartSignal::Pattern(group));
        }
        if rule.start_in_footer {
            if !source.forces_ocr() {
                if let Some(group) = find_start(re, &source.footer_native_text(page)) {
                    debug!("page {page}: start pattern found in footer text layer");
                    return Some(StartSignal::Pattern(group));
                }
            }
            if let Some(group) = find_start(re, &source.footer_ocr_text(page)) {
                debug!("page {page}: start pattern found in footer OCR");
                return Some(StartSignal::Pattern(group));
            }
        }
    }

    if let Some(phrase) = &rule.start_phrase {
        if text.contains(phrase.as_str()) {
            return Some(StartSignal::Phrase);
        }
    }

    None
}

/// Some(first capture group) when the pattern matches.
fn find_start(re: &Regex, text: &str) -> Option<Option<String>> {
    re.captures(text)
        .map(|c| c.get(1).map(|m| m.as_str().to_string()))
}
