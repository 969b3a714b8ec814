//! Solver-neutral linear model
//!
//! The compiler talks to a [`ModelBuilder`] (add variable, add equality,
//! add objective term) so that any backend can sit behind it. [`LinearModel`]
//! is the in-memory implementation: a plain description that can be
//! inspected, exported as an LP file or handed to a solver.

use std::collections::BTreeMap;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Index of a variable inside its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn new(index: usize) -> Self {
        VarId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarDomain {
    Integer,
    Continuous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
    pub name: String,
    pub domain: VarDomain,
    pub lower: f64,
    pub upper: Option<f64>,
}

impl VariableDef {
    /// Integer variable in `[0, ∞)`, used for archetype counts.
    pub fn non_negative_integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: VarDomain::Integer,
            lower: 0.0,
            upper: None,
        }
    }

    /// Continuous variable in `[0, ∞)`, used for slacks.
    pub fn non_negative(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: VarDomain::Continuous,
            lower: 0.0,
            upper: None,
        }
    }

    pub fn with_upper(mut self, upper: f64) -> Self {
        self.upper = Some(upper);
        self
    }
}

/// Affine expression `Σ c_i x_i + constant`.
///
/// Terms whose coefficient cancels to (almost) zero are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: BTreeMap<VarId, f64>,
    constant: f64,
}

const ZERO_TOLERANCE: f64 = 1e-12;

impl LinearExpr {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_constant(value: f64) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: value,
        }
    }

    pub fn term(var: VarId, coefficient: f64) -> Self {
        let mut expr = Self::zero();
        expr.add_term(var, coefficient);
        expr
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        let entry = self.terms.entry(var).or_insert(0.0);
        *entry += coefficient;
        if entry.abs() <= ZERO_TOLERANCE {
            self.terms.remove(&var);
        }
    }

    pub fn coefficient(&self, var: VarId) -> f64 {
        self.terms.get(&var).copied().unwrap_or(0.0)
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.terms.iter().map(|(v, c)| (*v, *c))
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn scale(&self, k: f64) -> Self {
        let mut out = Self::from_constant(self.constant * k);
        for (var, coef) in self.terms() {
            out.add_term(var, coef * k);
        }
        out
    }

    /// Value of the expression for a full assignment indexed by [`VarId`].
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms()
            .map(|(var, coef)| coef * values.get(var.index()).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

impl From<VarId> for LinearExpr {
    fn from(var: VarId) -> Self {
        LinearExpr::term(var, 1.0)
    }
}

impl AddAssign<&LinearExpr> for LinearExpr {
    fn add_assign(&mut self, rhs: &LinearExpr) {
        self.constant += rhs.constant;
        for (var, coef) in rhs.terms() {
            self.add_term(var, coef);
        }
    }
}

impl AddAssign for LinearExpr {
    fn add_assign(&mut self, rhs: LinearExpr) {
        *self += &rhs;
    }
}

impl SubAssign<&LinearExpr> for LinearExpr {
    fn sub_assign(&mut self, rhs: &LinearExpr) {
        self.constant -= rhs.constant;
        for (var, coef) in rhs.terms() {
            self.add_term(var, -coef);
        }
    }
}

impl SubAssign for LinearExpr {
    fn sub_assign(&mut self, rhs: LinearExpr) {
        *self -= &rhs;
    }
}

impl Add for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: LinearExpr) -> LinearExpr {
        self += &rhs;
        self
    }
}

impl Sub for LinearExpr {
    type Output = LinearExpr;

    fn sub(mut self, rhs: LinearExpr) -> LinearExpr {
        self -= &rhs;
        self
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self.scale(-1.0)
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(self, k: f64) -> LinearExpr {
        self.scale(k)
    }
}

impl Mul<&LinearExpr> for f64 {
    type Output = LinearExpr;

    fn mul(self, expr: &LinearExpr) -> LinearExpr {
        expr.scale(self)
    }
}

/// Named equality `expr == rhs`; variable terms on the left, constant on
/// the right.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualityConstraint {
    pub name: String,
    pub expr: LinearExpr,
    pub rhs: f64,
}

impl EqualityConstraint {
    /// `lhs - rhs` for the given assignment; zero when satisfied.
    pub fn residual(&self, values: &[f64]) -> f64 {
        self.expr.evaluate(values) - self.rhs
    }
}

/// Backend-agnostic model construction.
pub trait ModelBuilder {
    fn add_variable(&mut self, def: VariableDef) -> VarId;

    /// Add the equality `lhs == rhs`.
    fn add_constraint(&mut self, name: &str, lhs: LinearExpr, rhs: LinearExpr);

    /// Add a term to the minimization objective.
    fn add_objective_term(&mut self, term: LinearExpr);
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearModel {
    name: String,
    variables: Vec<VariableDef>,
    constraints: Vec<EqualityConstraint>,
    objective: LinearExpr,
}

impl LinearModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &[VariableDef] {
        &self.variables
    }

    pub fn variable(&self, var: VarId) -> Option<&VariableDef> {
        self.variables.get(var.index())
    }

    pub fn find_variable(&self, name: &str) -> Option<VarId> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .map(VarId::new)
    }

    pub fn constraints(&self) -> &[EqualityConstraint] {
        &self.constraints
    }

    pub fn constraint(&self, name: &str) -> Option<&EqualityConstraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Minimization objective.
    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn num_integer_variables(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| v.domain == VarDomain::Integer)
            .count()
    }

    pub fn evaluate_objective(&self, values: &[f64]) -> f64 {
        self.objective.evaluate(values)
    }

    /// Residual of every constraint, in declaration order.
    pub fn residuals(&self, values: &[f64]) -> Vec<(String, f64)> {
        self.constraints
            .iter()
            .map(|c| (c.name.clone(), c.residual(values)))
            .collect()
    }
}

impl ModelBuilder for LinearModel {
    fn add_variable(&mut self, def: VariableDef) -> VarId {
        self.variables.push(def);
        VarId::new(self.variables.len() - 1)
    }

    fn add_constraint(&mut self, name: &str, lhs: LinearExpr, rhs: LinearExpr) {
        let mut expr = lhs - rhs;
        let rhs = -expr.constant;
        expr.constant = 0.0;
        self.constraints.push(EqualityConstraint {
            name: name.to_string(),
            expr,
            rhs,
        });
    }

    fn add_objective_term(&mut self, term: LinearExpr) {
        self.objective += term;
    }
}
