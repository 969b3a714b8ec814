//! Fitting configuration types
//!
//! A fitting configuration has three sections: `targets` (named values or
//! named groups of shares), `weights` (multipliers for soft-constraint
//! penalties) and an ordered list of `constraints`. An optional
//! `weight_rules` list decides which weight applies to which constraint.
//!
//! Constraint entries are loose: every field is optional when
//! the document is read and only checked when the compiler looks it up.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Constraint types understood by the compiler.
pub const CONSTRAINT_TYPES: &[&str] = &["sum", "share", "share_group"];

/// A single target value or a group of named shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetEntry {
    Value(f64),
    Group(IndexMap<String, f64>),
}

impl TargetEntry {
    pub fn as_value(&self) -> Option<f64> {
        match self {
            TargetEntry::Value(v) => Some(*v),
            TargetEntry::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&IndexMap<String, f64>> {
        match self {
            TargetEntry::Value(_) => None,
            TargetEntry::Group(group) => Some(group),
        }
    }
}

/// Target of a `sum` or `share` constraint: a literal or a key into `targets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetRef {
    Value(f64),
    Key(String),
}

pub type Targets = BTreeMap<String, TargetEntry>;
pub type Weights = BTreeMap<String, f64>;

/// Declarative constraint entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub hard: bool,
    /// Numeric column aggregated by the constraint
    pub column: Option<String>,
    /// `sum` / `share`: literal value or key into `targets`
    pub target: Option<TargetRef>,
    /// `share`: row filter selecting the numerator
    pub predicate: Option<String>,
    /// `share_group`: key of a target group
    pub targets: Option<String>,
    /// `share_group`: category name -> row filter, in declaration order
    pub categories: Option<IndexMap<String, String>>,
}

impl ConstraintSpec {
    pub fn sum(name: &str, column: &str, target: TargetRef, hard: bool) -> Self {
        Self {
            name: Some(name.to_string()),
            kind: Some("sum".to_string()),
            hard,
            column: Some(column.to_string()),
            target: Some(target),
            ..Self::default()
        }
    }

    pub fn share(name: &str, column: &str, predicate: &str, target: TargetRef, hard: bool) -> Self {
        Self {
            name: Some(name.to_string()),
            kind: Some("share".to_string()),
            hard,
            column: Some(column.to_string()),
            target: Some(target),
            predicate: Some(predicate.to_string()),
            ..Self::default()
        }
    }

    pub fn share_group(
        name: &str,
        column: &str,
        targets: &str,
        categories: &[(&str, &str)],
        hard: bool,
    ) -> Self {
        Self {
            name: Some(name.to_string()),
            kind: Some("share_group".to_string()),
            hard,
            column: Some(column.to_string()),
            targets: Some(targets.to_string()),
            categories: Some(
                categories
                    .iter()
                    .map(|(cat, pred)| (cat.to_string(), pred.to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }
}

/// Maps constraint names onto weight keys. Exactly one of `exact` / `prefix`
/// is expected; `exact` wins when both are given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightRule {
    pub exact: Option<String>,
    pub prefix: Option<String>,
    /// Key into `weights`
    pub weight: String,
}

impl WeightRule {
    pub fn exact(name: &str, weight: &str) -> Self {
        Self {
            exact: Some(name.to_string()),
            prefix: None,
            weight: weight.to_string(),
        }
    }

    pub fn prefix(prefix: &str, weight: &str) -> Self {
        Self {
            exact: None,
            prefix: Some(prefix.to_string()),
            weight: weight.to_string(),
        }
    }
}

/// Complete fitting configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    #[serde(default)]
    pub targets: Targets,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default)]
    pub weight_rules: Vec<WeightRule>,
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
}

impl FitConfig {
    /// Split into the three sections consumed by the compiler.
    pub fn into_parts(self) -> (Targets, Weights, Vec<ConstraintSpec>) {
        (self.targets, self.weights, self.constraints)
    }

    /// Lint the document without rejecting it.
    ///
    /// Returns one message per suspicious entry: missing required keys,
    /// duplicate names, unknown types, dangling target references and weight
    /// rules without a matcher. Compilation still fails on the first real
    /// error; this only surfaces problems up front.
    pub fn check(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        for (idx, c) in self.constraints.iter().enumerate() {
            let label = c.name.clone().unwrap_or_else(|| format!("#{idx}"));
            match &c.name {
                None => warnings.push(format!("constraint {label}: missing 'name'")),
                Some(name) => {
                    if !seen.insert(name.clone()) {
                        warnings.push(format!("constraint {label}: duplicate name"));
                    }
                }
            }
            if c.column.is_none() {
                warnings.push(format!("constraint {label}: missing 'column'"));
            }
            match c.kind.as_deref() {
                None => warnings.push(format!("constraint {label}: missing 'type'")),
                Some("sum") => self.check_target_ref(&label, c, &mut warnings),
                Some("share") => {
                    self.check_target_ref(&label, c, &mut warnings);
                    if c.predicate.is_none() {
                        warnings.push(format!("constraint {label}: missing 'predicate'"));
                    }
                }
                Some("share_group") => self.check_group(&label, c, &mut warnings),
                Some(other) => warnings.push(format!(
                    "constraint {label}: unknown type '{other}' (expected one of {})",
                    CONSTRAINT_TYPES.join(", ")
                )),
            }
        }
        for rule in &self.weight_rules {
            if rule.exact.is_none() && rule.prefix.is_none() {
                warnings.push(format!(
                    "weight rule for '{}' has neither 'exact' nor 'prefix'",
                    rule.weight
                ));
            }
        }
        warnings
    }

    fn check_target_ref(&self, label: &str, c: &ConstraintSpec, warnings: &mut Vec<String>) {
        match &c.target {
            None => warnings.push(format!("constraint {label}: missing 'target'")),
            Some(TargetRef::Key(key)) => match self.targets.get(key) {
                None => warnings.push(format!("constraint {label}: unknown target '{key}'")),
                Some(TargetEntry::Group(_)) => warnings.push(format!(
                    "constraint {label}: target '{key}' is a group, expected a value"
                )),
                Some(TargetEntry::Value(_)) => {}
            },
            Some(TargetRef::Value(_)) => {}
        }
    }

    fn check_group(&self, label: &str, c: &ConstraintSpec, warnings: &mut Vec<String>) {
        let group = match &c.targets {
            None => {
                warnings.push(format!("constraint {label}: missing 'targets'"));
                None
            }
            Some(key) => match self.targets.get(key) {
                Some(TargetEntry::Group(group)) => Some(group),
                Some(TargetEntry::Value(_)) => {
                    warnings.push(format!(
                        "constraint {label}: target '{key}' is a value, expected a group"
                    ));
                    None
                }
                None => {
                    warnings.push(format!("constraint {label}: unknown target group '{key}'"));
                    None
                }
            },
        };
        match (&c.categories, group) {
            (None, _) => warnings.push(format!("constraint {label}: missing 'categories'")),
            (Some(categories), Some(group)) => {
                for cat in categories.keys() {
                    if !group.contains_key(cat) {
                        warnings.push(format!(
                            "constraint {label}: category '{cat}' has no target share"
                        ));
                    }
                }
            }
            (Some(_), None) => {}
        }
    }
}
