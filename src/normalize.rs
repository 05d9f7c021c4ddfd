use crate::config::Normalize;
use anyhow::{Context, Result};
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Cleans OCR output before pattern matching.
#[derive(Debug, Clone)]
pub struct Normalizer {
    nfkc: bool,
    collapse_whitespace: bool,
    replacements: Vec<(Regex, String)>,
    whitespace: Regex,
}

impl Normalizer {
    pub fn new(cfg: &Normalize) -> Result<Self> {
        let replacements = cfg
            .replacements
            .iter()
            .map(|r| {
                Regex::new(&r.pattern)
                    .map(|re| (re, r.replacement.clone()))
                    .with_context(|| format!("bad normalize.replacements pattern: {:?}", r.pattern))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            nfkc: cfg.nfkc,
            collapse_whitespace: cfg.collapse_whitespace,
            replacements,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    pub fn apply(&self, raw: &str) -> String {
        let mut s = if self.nfkc {
            raw.nfkc().collect::<String>()
        } else {
            raw.to_string()
        };

        if self.collapse_whitespace {
            s = self.whitespace.replace_all(&s, " ").trim().to_string();
        }

        for (re, rep) in &self.replacements {
            s = re.replace_all(&s, rep.as_str()).into_owned();
        }

        s
    }
}

/// Length used for the "has a text layer" threshold.
pub fn text_len(s: &str) -> usize {
    s.trim().chars().count()
}
