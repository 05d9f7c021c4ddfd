use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitTopology {
    List,
    StartEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    Keyword,
    Regex,
}

/// On-disk shape of the catalog. `statement_types` has no default on purpose:
/// a catalog without it is rejected at load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub statement_types: Vec<RuleDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    pub type_name: String,
    #[serde(default)]
    pub match_criteria: Vec<CriterionDef>,
    pub split_type: SplitTopology,
    #[serde(default)]
    pub start_pattern: Option<String>,
    #[serde(default)]
    pub start_phrase: Option<String>,
    #[serde(default)]
    pub must_not_contain: Option<String>,
    #[serde(default)]
    pub start_in_footer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionDef {
    #[serde(rename = "type")]
    pub kind: CriterionKind,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum Criterion {
    Keyword(String),
    Regex(Regex),
}

impl Criterion {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Criterion::Keyword(k) => text.contains(k.as_str()),
            Criterion::Regex(r) => r.is_match(text),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayoutRule {
    pub type_name: String,
    pub criteria: Vec<Criterion>,
    pub topology: SplitTopology,
    pub start_pattern: Option<Regex>,
    pub start_phrase: Option<String>,
    pub must_not_contain: Option<String>,
    pub start_in_footer: bool,
}

impl LayoutRule {
    pub fn compile(def: &RuleDef) -> Result<Self> {
        let name = def.type_name.trim();
        if name.is_empty() {
            bail!("statement type with empty type_name");
        }

        let criteria = def
            .match_criteria
            .iter()
            .map(|c| match c.kind {
                CriterionKind::Keyword => Ok(Criterion::Keyword(c.value.clone())),
                CriterionKind::Regex => Regex::new(&c.value)
                    .map(Criterion::Regex)
                    .with_context(|| format!("{name}: bad match_criteria regex {:?}", c.value)),
            })
            .collect::<Result<Vec<_>>>()?;

        let start_pattern = def
            .start_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .with_context(|| format!("{name}: bad start_pattern"))?;

        let start_phrase = def.start_phrase.clone().filter(|s| !s.is_empty());
        let must_not_contain = def.must_not_contain.clone().filter(|s| !s.is_empty());

        if start_pattern.is_none() && start_phrase.is_none() {
            bail!("{name}: needs a start_pattern or a start_phrase");
        }
        if def.start_in_footer && start_pattern.is_none() {
            bail!("{name}: start_in_footer requires start_pattern");
        }

        Ok(Self {
            type_name: name.to_string(),
            criteria,
            topology: def.split_type,
            start_pattern,
            start_phrase,
            must_not_contain,
            start_in_footer: def.start_in_footer,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.criteria.iter().any(|c| c.matches(text))
    }
}

/// Ordered, immutable set of statement layouts. Order is the classification order.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<LayoutRule>,
}

impl RuleCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading rule catalog: {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("rule catalog: {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(raw).with_context(|| "parsing rule catalog TOML")?;
        Self::from_defs(&file.statement_types)
    }

    pub fn from_defs(defs: &[RuleDef]) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(defs.len());
        for def in defs {
            let rule = LayoutRule::compile(def)?;
            if !seen.insert(rule.type_name.clone()) {
                bail!("duplicate statement type: {}", rule.type_name);
            }
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[LayoutRule] {
        &self.rules
    }

    pub fn rule_for(&self, type_name: &str) -> Option<&LayoutRule> {
        self.rules.iter().find(|r| r.type_name == type_name)
    }

    pub fn require(&self, type_name: &str) -> Result<&LayoutRule> {
        self.rule_for(type_name).ok_or_else(|| {
            anyhow!(
                "statement type '{type_name}' not found in catalog (known: {})",
                self.type_names().join(", ")
            )
        })
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.type_name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
