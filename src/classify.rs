use crate::{
    rules::{LayoutRule, RuleCatalog},
    text::PageTextSource,
};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_TYPE: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub type_name: String,
    pub sampled_pages: u32,
    pub forced_ocr: bool,
}

impl Classification {
    pub fn is_unknown(&self) -> bool {
        self.type_name == UNKNOWN_TYPE
    }
}

/// Joined text of the leading pages used for classification.
pub fn leading_text(source: &PageTextSource<'_>, sample_pages: u32) -> (String, u32) {
    let n = sample_pages.min(source.page_count());
    let buf = (0..n).map(|p| source.text(p)).collect::<String>();
    (buf, n)
}

/// First rule, in catalog order, with any satisfied criterion.
pub fn first_match<'c>(catalog: &'c RuleCatalog, text: &str) -> Option<&'c LayoutRule> {
    catalog.rules().iter().find(|r| r.matches(text))
}

pub fn classify<'c>(
    catalog: &'c RuleCatalog,
    source: &PageTextSource<'_>,
    sample_pages: u32,
) -> (Classification, Option<&'c LayoutRule>) {
    let (buf, sampled) = leading_text(source, sample_pages);
    let rule = first_match(catalog, &buf);
    let type_name = rule
        .map(|r| r.type_name.clone())
        .unwrap_or_else(|| UNKNOWN_TYPE.to_string());
    (
        Classification {
            type_name,
            sampled_pages: sampled,
            forced_ocr: source.forces_ocr(),
        },
        rule,
    )
}
