//! Slack-penalty weights
//!
//! Each soft constraint's slack pair is penalized with a weight. Which
//! weight applies is decided by an ordered list of rules mapping constraint
//! names onto keys of the `weights` section; the first matching rule wins
//! and unmatched names fall back to [`DEFAULT_WEIGHT`].

use archifer_core::{WeightRule, Weights};
use tracing::warn;

pub const DEFAULT_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightMatcher {
    Exact(String),
    Prefix(String),
}

impl WeightMatcher {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            WeightMatcher::Exact(exact) => name == exact,
            WeightMatcher::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

/// Rules used when a configuration declares none.
pub fn default_rules() -> Vec<(WeightMatcher, String)> {
    vec![
        (
            WeightMatcher::Exact("Af_total".to_string()),
            "Af_total".to_string(),
        ),
        (
            WeightMatcher::Exact("share_residential_Af".to_string()),
            "share_residential_Af".to_string(),
        ),
        (
            WeightMatcher::Prefix("share_energy_therm_".to_string()),
            "share_energy_therm".to_string(),
        ),
    ]
}

#[derive(Debug, Clone)]
pub struct WeightResolver {
    rules: Vec<(WeightMatcher, String)>,
    weights: Weights,
}

impl WeightResolver {
    pub fn new(weights: Weights, rules: Vec<(WeightMatcher, String)>) -> Self {
        Self { rules, weights }
    }

    pub fn with_default_rules(weights: Weights) -> Self {
        Self::new(weights, default_rules())
    }

    /// Build from configuration rules; an empty list selects [`default_rules`].
    /// Rules without a matcher are skipped.
    pub fn from_rules(weights: Weights, rules: &[WeightRule]) -> Self {
        if rules.is_empty() {
            return Self::with_default_rules(weights);
        }
        let rules = rules
            .iter()
            .filter_map(|rule| {
                let matcher = match (&rule.exact, &rule.prefix) {
                    (Some(exact), _) => WeightMatcher::Exact(exact.clone()),
                    (None, Some(prefix)) => WeightMatcher::Prefix(prefix.clone()),
                    (None, None) => {
                        warn!(weight = %rule.weight, "ignoring weight rule without matcher");
                        return None;
                    }
                };
                Some((matcher, rule.weight.clone()))
            })
            .collect();
        Self::new(weights, rules)
    }

    pub fn rules(&self) -> &[(WeightMatcher, String)] {
        &self.rules
    }

    /// Weight for the slack pair of constraint `name`.
    pub fn resolve(&self, name: &str) -> f64 {
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.matches(name))
            .and_then(|(_, key)| self.weights.get(key).copied())
            .unwrap_or(DEFAULT_WEIGHT)
    }
}
