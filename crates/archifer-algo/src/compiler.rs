//! Constraint compiler
//!
//! Translates a declarative constraint list into a linear model over
//! archetype counts.
//!
//! ## Formulation
//!
//! ```text
//! variables:   w[i] ∈ ℤ≥0                    one count per archetype
//!              s_<name>_pos, s_<name>_neg ≥ 0  one pair per soft constraint
//!
//! sum:         Σ_i w[i]·col[i]                 == T
//! share:       Σ_sel w[i]·col[i] - T·Σ_i w[i]·col[i] == 0
//! share_group: one share-style row per category, named <name>_<category>
//!
//! soft rows:   lhs - T == s_pos - s_neg
//! objective:   min Σ weight(name)·(s_pos + s_neg)
//! ```
//!
//! Constraints are compiled in declaration order; the first error aborts
//! the whole compilation and no partial model is returned.
//!
//! `share_group` rows evaluate their category filter but aggregate both
//! numerator and denominator over *all* archetypes, so each row reduces to
//! `(1 - T)·Σ_i w[i]·col[i] == 0`. Known quirk, pinned by tests until the
//! intended per-category numerator is settled.

use std::collections::HashSet;

use archifer_core::{
    ArchetypeTable, ArchiferError, ArchiferResult, ConstraintSpec, FitConfig, RowFilter,
    TargetEntry, TargetRef, Targets, Weights,
};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::model::{LinearExpr, LinearModel, ModelBuilder, VarId, VariableDef};
use crate::weights::WeightResolver;

pub const MODEL_NAME: &str = "Archetype_Inference";

/// Positive and negative deviation of one soft constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlackPair {
    pub positive: VarId,
    pub negative: VarId,
}

/// Result of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompiledModel<B = LinearModel> {
    pub model: B,
    /// Archetype key and its count variable, in table order
    pub counts: Vec<(String, VarId)>,
    /// Slack pairs by (sub-)constraint name, in registration order
    pub slacks: IndexMap<String, SlackPair>,
}

impl<B> CompiledModel<B> {
    pub fn count_var(&self, key: &str) -> Option<VarId> {
        self.counts.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn slack(&self, name: &str) -> Option<SlackPair> {
        self.slacks.get(name).copied()
    }
}

/// Compile into a fresh [`LinearModel`] using the default weight rules.
pub fn compile_model(
    targets: &Targets,
    weights: &Weights,
    constraints: &[ConstraintSpec],
    table: &ArchetypeTable,
) -> ArchiferResult<CompiledModel> {
    let resolver = WeightResolver::with_default_rules(weights.clone());
    compile_into(
        targets,
        &resolver,
        constraints,
        table,
        LinearModel::new(MODEL_NAME),
    )
}

/// Compile a full configuration, honoring its `weight_rules`.
pub fn compile_config(config: &FitConfig, table: &ArchetypeTable) -> ArchiferResult<CompiledModel> {
    let resolver = WeightResolver::from_rules(config.weights.clone(), &config.weight_rules);
    compile_into(
        &config.targets,
        &resolver,
        &config.constraints,
        table,
        LinearModel::new(MODEL_NAME),
    )
}

/// Compile into any [`ModelBuilder`].
///
/// The builder is consumed; on error it is dropped together with whatever
/// was added so far.
pub fn compile_into<B: ModelBuilder>(
    targets: &Targets,
    weights: &WeightResolver,
    constraints: &[ConstraintSpec],
    table: &ArchetypeTable,
    builder: B,
) -> ArchiferResult<CompiledModel<B>> {
    let mut compiler = Compiler {
        targets,
        table,
        builder,
        counts: Vec::new(),
        slacks: IndexMap::new(),
        names: HashSet::new(),
    };

    for key in table.keys()? {
        let var = compiler
            .builder
            .add_variable(VariableDef::non_negative_integer(format!("w_{key}")));
        compiler.counts.push((key, var));
    }

    for spec in constraints {
        compiler.compile_constraint(spec)?;
    }

    let Compiler {
        mut builder,
        counts,
        slacks,
        ..
    } = compiler;

    for (name, pair) in &slacks {
        let alpha = weights.resolve(name);
        debug!(constraint = %name, weight = alpha, "slack penalty");
        builder.add_objective_term(
            LinearExpr::term(pair.positive, alpha) + LinearExpr::term(pair.negative, alpha),
        );
    }

    info!(
        archetypes = counts.len(),
        constraints = constraints.len(),
        soft = slacks.len(),
        "compiled archetype model"
    );

    Ok(CompiledModel {
        model: builder,
        counts,
        slacks,
    })
}

/// Per-call compilation state.
struct Compiler<'a, B> {
    targets: &'a Targets,
    table: &'a ArchetypeTable,
    builder: B,
    counts: Vec<(String, VarId)>,
    slacks: IndexMap<String, SlackPair>,
    names: HashSet<String>,
}

/// Target section of a constraint, resolved before its column is read.
enum ResolvedTarget<'t> {
    Value(f64),
    Group(&'t IndexMap<String, f64>),
}

impl<'a, B: ModelBuilder> Compiler<'a, B> {
    fn compile_constraint(&mut self, spec: &ConstraintSpec) -> ArchiferResult<()> {
        let name = required(&spec.name, "name")?;
        let kind = required(&spec.kind, "type")?;
        let hard = spec.hard;

        let target = match kind.as_str() {
            "sum" | "share" => ResolvedTarget::Value(self.scalar_target(name, &spec.target)?),
            "share_group" => ResolvedTarget::Group(self.group_target(name, &spec.targets)?),
            other => return Err(ArchiferError::UnknownConstraintType(other.to_string())),
        };

        let column = required(&spec.column, "column")?;
        let series = self.table.numeric_column(column)?;
        let all_rows = 0..self.counts.len();

        match target {
            ResolvedTarget::Value(target_value) if kind == "sum" => {
                let expr = self.weighted_sum(&series, all_rows);
                debug!(constraint = %name, hard, target = target_value, "sum");
                self.add_row(name, hard, expr, target_value)?;
            }
            ResolvedTarget::Value(target_value) => {
                let predicate = required(&spec.predicate, "predicate")?;
                let selected = self.select(predicate)?;
                let numerator = self.weighted_sum(&series, selected.iter().copied());
                let denominator = self.weighted_sum(&series, all_rows);
                debug!(
                    constraint = %name,
                    hard,
                    target = target_value,
                    selected = selected.len(),
                    "share"
                );
                self.add_row(name, hard, numerator - denominator * target_value, 0.0)?;
            }
            ResolvedTarget::Group(group) => {
                let categories = spec
                    .categories
                    .as_ref()
                    .ok_or_else(|| ArchiferError::missing("constraint field", "categories"))?;
                for (category, predicate) in categories {
                    let sub_name = format!("{name}_{category}");
                    let target_share = *group
                        .get(category)
                        .ok_or_else(|| ArchiferError::missing("target share", category.clone()))?;
                    let selected = self.select(predicate)?;
                    // numerator spans every archetype, not `selected` (see module docs)
                    let numerator = self.weighted_sum(&series, all_rows.clone());
                    let denominator = self.weighted_sum(&series, all_rows.clone());
                    debug!(
                        constraint = %sub_name,
                        hard,
                        target = target_share,
                        selected = selected.len(),
                        "share_group entry"
                    );
                    self.add_row(
                        &sub_name,
                        hard,
                        numerator - denominator * target_share,
                        0.0,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn scalar_target(&self, name: &str, target: &Option<TargetRef>) -> ArchiferResult<f64> {
        match target {
            None => Err(ArchiferError::missing("constraint field", "target")),
            Some(TargetRef::Value(v)) => Ok(*v),
            Some(TargetRef::Key(key)) => match self.targets.get(key) {
                None => Err(ArchiferError::missing("target", key.clone())),
                Some(TargetEntry::Value(v)) => Ok(*v),
                Some(TargetEntry::Group(_)) => Err(ArchiferError::Config(format!(
                    "constraint '{name}' needs a single target value but '{key}' is a group"
                ))),
            },
        }
    }

    fn group_target(
        &self,
        name: &str,
        group: &Option<String>,
    ) -> ArchiferResult<&'a IndexMap<String, f64>> {
        let key = required(group, "targets")?;
        match self.targets.get(key) {
            None => Err(ArchiferError::missing("target", key.clone())),
            Some(TargetEntry::Group(group)) => Ok(group),
            Some(TargetEntry::Value(_)) => Err(ArchiferError::Config(format!(
                "constraint '{name}' needs a target group but '{key}' is a single value"
            ))),
        }
    }

    fn select(&self, predicate: &str) -> ArchiferResult<Vec<usize>> {
        let filter = RowFilter::parse(predicate)?;
        self.table.filter(&filter)
    }

    fn weighted_sum(&self, series: &[f64], rows: impl Iterator<Item = usize>) -> LinearExpr {
        let mut expr = LinearExpr::zero();
        for row in rows {
            expr.add_term(self.counts[row].1, series[row]);
        }
        expr
    }

    /// Hard: `expr == rhs`. Soft: `expr - rhs == s_pos - s_neg`.
    fn add_row(&mut self, name: &str, hard: bool, expr: LinearExpr, rhs: f64) -> ArchiferResult<()> {
        if !self.names.insert(name.to_string()) {
            return Err(ArchiferError::Config(format!(
                "duplicate constraint name '{name}'"
            )));
        }
        if hard {
            self.builder
                .add_constraint(name, expr, LinearExpr::from_constant(rhs));
            return Ok(());
        }
        let positive = self
            .builder
            .add_variable(VariableDef::non_negative(format!("s_{name}_pos")));
        let negative = self
            .builder
            .add_variable(VariableDef::non_negative(format!("s_{name}_neg")));
        self.builder.add_constraint(
            name,
            expr - LinearExpr::from_constant(rhs),
            LinearExpr::from(positive) - LinearExpr::from(negative),
        );
        self.slacks
            .insert(name.to_string(), SlackPair { positive, negative });
        Ok(())
    }
}

fn required<'s>(field: &'s Option<String>, key: &'static str) -> ArchiferResult<&'s String> {
    field
        .as_ref()
        .ok_or_else(|| ArchiferError::missing("constraint field", key))
}
