//! # archifer-algo
//!
//! Turns a [`FitConfig`](archifer_core::FitConfig) and an
//! [`ArchetypeTable`](archifer_core::ArchetypeTable) into a linear model
//! over archetype counts, and optionally solves it.
//!
//! - [`compiler`]: constraint compilation (`sum`, `share`, `share_group`)
//! - [`model`]: solver-neutral [`LinearModel`] and the [`ModelBuilder`] seam
//! - [`weights`]: slack-penalty weight rules
//! - [`lp_format`]: CPLEX LP export
//! - [`solve`]: good_lp backends (Clarabel, HiGHS)

pub mod compiler;
pub mod lp_format;
pub mod model;
pub mod solve;
pub mod weights;

pub use compiler::{
    compile_config, compile_into, compile_model, CompiledModel, SlackPair, MODEL_NAME,
};
pub use lp_format::write_lp;
pub use model::{
    EqualityConstraint, LinearExpr, LinearModel, ModelBuilder, VarDomain, VarId, VariableDef,
};
pub use solve::{
    solve_model, ArchetypeCount, ConstraintResidual, FitSolution, LpSolverKind, SlackValue,
    RESIDUAL_TOLERANCE,
};
pub use weights::{default_rules, WeightMatcher, WeightResolver, DEFAULT_WEIGHT};
