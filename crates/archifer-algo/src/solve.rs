//! good_lp backend
//!
//! Hands a [`LinearModel`] to one of the LP/MIP solvers exposed by
//! `good_lp`. Clarabel is pure Rust and always available but cannot branch
//! on integers, so it solves the LP relaxation and integer variables are
//! rounded to the nearest feasible integer afterwards. HiGHS (feature
//! `solver-highs`) keeps integrality.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use archifer_core::{ArchiferError, ArchiferResult};
use good_lp::solvers::clarabel::clarabel;
#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, Solution, SolverModel, Variable,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compiler::CompiledModel;
use crate::model::{LinearExpr, LinearModel, VarDomain, VarId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LpSolverKind {
    #[default]
    Clarabel,
    #[cfg(feature = "solver-highs")]
    Highs,
}

const AVAILABLE_LP_SOLVERS: &[&str] = &[
    "clarabel",
    #[cfg(feature = "solver-highs")]
    "highs",
];

impl LpSolverKind {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_LP_SOLVERS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LpSolverKind::Clarabel => "clarabel",
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => "highs",
        }
    }

    /// True when the backend only solves the continuous relaxation.
    pub fn relaxes_integers(&self) -> bool {
        match self {
            LpSolverKind::Clarabel => true,
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => false,
        }
    }
}

impl fmt::Display for LpSolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LpSolverKind {
    type Err = ArchiferError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.to_ascii_lowercase();
        match normalized.as_str() {
            "clarabel" => Ok(LpSolverKind::Clarabel),
            #[cfg(feature = "solver-highs")]
            "highs" => Ok(LpSolverKind::Highs),
            _ => Err(ArchiferError::Config(format!(
                "unknown lp solver '{}'; supported values: {}",
                normalized,
                LpSolverKind::available().join(", ")
            ))),
        }
    }
}

/// Variable values of a solved model.
#[derive(Debug, Clone)]
pub struct FitSolution {
    pub solver: LpSolverKind,
    /// Objective evaluated at `values`
    pub objective: f64,
    /// One value per model variable, indexed by [`VarId`]
    pub values: Vec<f64>,
    /// Integer variables were rounded from a relaxed solution
    pub rounded: bool,
    /// Rows the returned values do not satisfy, with their residual
    pub violations: Vec<(String, f64)>,
    pub solve_time: Duration,
}

/// Rows whose residual exceeds this are reported as violated.
pub const RESIDUAL_TOLERANCE: f64 = 1e-6;

impl FitSolution {
    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.index()).copied().unwrap_or(0.0)
    }

    pub fn status_message(&self) -> &'static str {
        if !self.violations.is_empty() {
            "Hard constraints violated after rounding"
        } else if self.rounded {
            "Optimal (LP relaxation, counts rounded)"
        } else {
            "Optimal"
        }
    }
}

/// Fitted count of one archetype.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchetypeCount {
    pub key: String,
    pub count: f64,
}

/// Residual `lhs - rhs` of one constraint row at the solved values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintResidual {
    pub name: String,
    pub hard: bool,
    pub residual: f64,
}

/// Solved slack pair of one soft constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackValue {
    pub name: String,
    pub positive: f64,
    pub negative: f64,
}

impl SlackValue {
    /// Signed deviation from the target.
    pub fn deviation(&self) -> f64 {
        self.positive - self.negative
    }
}

impl CompiledModel<LinearModel> {
    pub fn archetype_counts(&self, solution: &FitSolution) -> Vec<ArchetypeCount> {
        self.counts
            .iter()
            .map(|(key, var)| ArchetypeCount {
                key: key.clone(),
                count: solution.value(*var),
            })
            .collect()
    }

    pub fn slack_values(&self, solution: &FitSolution) -> Vec<SlackValue> {
        self.slacks
            .iter()
            .map(|(name, pair)| SlackValue {
                name: name.clone(),
                positive: solution.value(pair.positive),
                negative: solution.value(pair.negative),
            })
            .collect()
    }

    /// Residual of every row, in declaration order.
    pub fn constraint_residuals(&self, solution: &FitSolution) -> Vec<ConstraintResidual> {
        self.model
            .residuals(&solution.values)
            .into_iter()
            .map(|(name, residual)| ConstraintResidual {
                hard: !self.slacks.contains_key(&name),
                name,
                residual,
            })
            .collect()
    }

    /// Solve the compiled model. After rounding a relaxed solution the
    /// slack pairs are recomputed from the rounded counts, so they report
    /// the deviation that the returned counts actually produce. Hard rows
    /// broken by the rounding end up in [`FitSolution::violations`].
    pub fn solve(&self, kind: LpSolverKind) -> ArchiferResult<FitSolution> {
        let mut solution = solve_model(&self.model, kind)?;
        if solution.rounded {
            self.rebalance_slacks(&mut solution);
            solution.violations = violated_rows(&self.model, &solution.values);
            for (name, residual) in &solution.violations {
                warn!(constraint = %name, residual, "hard constraint violated after rounding");
            }
        }
        Ok(solution)
    }

    fn rebalance_slacks(&self, solution: &mut FitSolution) {
        for (name, pair) in &self.slacks {
            let Some(row) = self.model.constraint(name) else {
                continue;
            };
            solution.values[pair.positive.index()] = 0.0;
            solution.values[pair.negative.index()] = 0.0;
            let deviation = row.residual(&solution.values);
            solution.values[pair.positive.index()] = deviation.max(0.0);
            solution.values[pair.negative.index()] = (-deviation).max(0.0);
        }
        solution.objective = self.model.evaluate_objective(&solution.values);
    }
}

/// Solve `model` with the requested backend.
pub fn solve_model(model: &LinearModel, kind: LpSolverKind) -> ArchiferResult<FitSolution> {
    let start = Instant::now();
    let integral = !kind.relaxes_integers();
    let (vars, handles) = build_variables(model, integral);
    let objective = to_expression(model.objective(), &handles);

    debug!(
        solver = %kind,
        variables = model.num_variables(),
        constraints = model.num_constraints(),
        "solving archetype model"
    );

    let raw: Vec<f64> = match kind {
        LpSolverKind::Clarabel => {
            let problem = vars.minimise(objective).using(clarabel);
            let solution = add_constraints(problem, model, &handles)
                .solve()
                .map_err(|e| ArchiferError::Solver(e.to_string()))?;
            handles.iter().map(|v| solution.value(*v)).collect()
        }
        #[cfg(feature = "solver-highs")]
        LpSolverKind::Highs => {
            let problem = vars.minimise(objective).using(highs);
            let solution = add_constraints(problem, model, &handles)
                .solve()
                .map_err(|e| ArchiferError::Solver(e.to_string()))?;
            handles.iter().map(|v| solution.value(*v)).collect()
        }
    };

    let values: Vec<f64> = model
        .variables()
        .iter()
        .zip(raw)
        .map(|(def, value)| match def.domain {
            VarDomain::Integer => value.round().max(def.lower),
            VarDomain::Continuous => value,
        })
        .collect();
    let objective = model.evaluate_objective(&values);
    let violations = violated_rows(model, &values);

    info!(
        solver = %kind,
        objective,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "archetype model solved"
    );

    Ok(FitSolution {
        solver: kind,
        objective,
        values,
        rounded: !integral && model.num_integer_variables() > 0,
        violations,
        solve_time: start.elapsed(),
    })
}

fn violated_rows(model: &LinearModel, values: &[f64]) -> Vec<(String, f64)> {
    model
        .residuals(values)
        .into_iter()
        .filter(|(_, residual)| residual.abs() > RESIDUAL_TOLERANCE)
        .collect()
}

fn build_variables(model: &LinearModel, integral: bool) -> (ProblemVariables, Vec<Variable>) {
    let mut vars = ProblemVariables::new();
    let handles = model
        .variables()
        .iter()
        .map(|def| {
            let mut definition = variable().min(def.lower).name(def.name.clone());
            if let Some(upper) = def.upper {
                definition = definition.max(upper);
            }
            if integral && def.domain == VarDomain::Integer {
                definition = definition.integer();
            }
            vars.add(definition)
        })
        .collect();
    (vars, handles)
}

fn to_expression(expr: &LinearExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::from(expr.constant());
    for (var, coef) in expr.terms() {
        out += coef * handles[var.index()];
    }
    out
}

fn add_constraints<M: SolverModel>(mut problem: M, model: &LinearModel, handles: &[Variable]) -> M {
    for c in model.constraints() {
        let lhs = to_expression(&c.expr, handles);
        let rhs = c.rhs;
        problem = problem.with(constraint!(lhs == rhs));
    }
    problem
}
