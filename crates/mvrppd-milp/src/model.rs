//! Solver-agnostic MIP model representation.
//!
//! The driver builds a [`MipModel`] once and hands it to a [`MipEngine`]
//! together with a [`MipCallback`]. The engine invokes the callback at every
//! integer incumbent; cuts registered there become part of the model for the
//! remainder of the search. Any MILP backend able to honor that contract can
//! stand in for the bundled HiGHS engine. The objective sense is fixed to
//! minimization.

use std::time::Duration;

use thiserror::Error;

/// Handle of a model variable, valid for the model that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    Binary,
    Continuous,
}

#[derive(Clone, Copy, Debug)]
pub struct Variable {
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
    pub objective: f64,
}

/// A linear combination of model variables.
#[derive(Clone, Debug, Default)]
pub struct LinExpr {
    terms: Vec<(VarId, f64)>,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, var: VarId, coefficient: f64) {
        self.terms.push((var, coefficient));
    }

    pub fn with(mut self, var: VarId, coefficient: f64) -> Self {
        self.push(var, coefficient);
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }
}

impl FromIterator<(VarId, f64)> for LinExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        LinExpr {
            terms: iter.into_iter().collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowSense {
    /// `expr <= rhs`
    Le,
    /// `expr >= rhs`
    Ge,
    /// `expr == rhs`
    Eq,
}

#[derive(Clone, Debug)]
pub struct Constraint {
    pub expr: LinExpr,
    pub sense: RowSense,
    pub rhs: f64,
}

/// A growable MIP: a variable table plus linear constraint rows.
#[derive(Clone, Debug, Default)]
pub struct MipModel {
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
}

impl MipModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `{0, 1}` variable with the given objective coefficient.
    pub fn add_binary(&mut self, objective: f64) -> VarId {
        self.add_variable(Variable {
            kind: VarKind::Binary,
            lower: 0.0,
            upper: 1.0,
            objective,
        })
    }

    /// Adds a bounded continuous variable with the given objective
    /// coefficient.
    pub fn add_continuous(&mut self, lower: f64, upper: f64, objective: f64) -> VarId {
        self.add_variable(Variable {
            kind: VarKind::Continuous,
            lower,
            upper,
            objective,
        })
    }

    fn add_variable(&mut self, variable: Variable) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(variable);
        id
    }

    pub fn add_constraint(&mut self, expr: LinExpr, sense: RowSense, rhs: f64) {
        self.constraints.push(Constraint { expr, sense, rhs });
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
}

/// Engine parameters, set once per [`MipEngine::optimize`] call.
#[derive(Clone, Copy, Debug)]
pub struct MipParams {
    /// Remaining wall-clock budget; `None` solves to completion.
    pub time_limit: Option<Duration>,
    pub threads: u32,
    pub seed: u32,
    /// Suppress solver output.
    pub silent: bool,
    /// Honor cuts registered by the callback.
    pub lazy_constraints: bool,
}

impl Default for MipParams {
    fn default() -> Self {
        MipParams {
            time_limit: None,
            threads: 1,
            seed: 0,
            silent: true,
            lazy_constraints: true,
        }
    }
}

/// Variable values of one integer incumbent.
pub struct Incumbent<'a> {
    values: &'a [f64],
}

impl<'a> Incumbent<'a> {
    pub fn new(values: &'a [f64]) -> Self {
        Incumbent { values }
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.0]
    }

    /// Rounds a binary variable's relaxed value.
    pub fn is_set(&self, var: VarId) -> bool {
        self.value(var) >= 0.5
    }

    pub fn values(&self) -> &[f64] {
        self.values
    }
}

/// Cuts registered by a callback at an incumbent; the engine folds them into
/// the model for the remainder of the search.
#[derive(Debug, Default)]
pub struct LazyCuts {
    cuts: Vec<Constraint>,
}

impl LazyCuts {
    pub fn add(&mut self, expr: LinExpr, sense: RowSense, rhs: f64) {
        self.cuts.push(Constraint { expr, sense, rhs });
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    pub(crate) fn take(&mut self) -> Vec<Constraint> {
        std::mem::take(&mut self.cuts)
    }
}

/// Observer of integer incumbents, with the option to tighten the model.
pub trait MipCallback {
    fn on_incumbent(&mut self, incumbent: &Incumbent<'_>, cuts: &mut LazyCuts);
}

/// No-op callback for plain solves.
impl MipCallback for () {
    fn on_incumbent(&mut self, _incumbent: &Incumbent<'_>, _cuts: &mut LazyCuts) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MipStatus {
    /// Proven optimal; final variable values are available.
    Optimal,
    /// The model admits no solution under the constraints and cuts in effect.
    Infeasible,
    Unbounded,
    /// The wall-clock budget expired before optimality was proven.
    TimeLimit,
}

#[derive(Clone, Debug)]
pub struct MipOutcome {
    pub status: MipStatus,
    /// Final variable values, present only on [`MipStatus::Optimal`].
    pub values: Option<Vec<f64>>,
}

/// Failure at the optimizer boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("solver rejected the model: {0}")]
    Model(String),
    #[error("optimization failed: {0}")]
    Solve(String),
}

/// A MILP backend able to solve a [`MipModel`] while surfacing integer
/// incumbents to a callback and honoring its lazy cuts.
pub trait MipEngine {
    fn optimize(
        &mut self,
        model: &MipModel,
        params: &MipParams,
        callback: &mut dyn MipCallback,
    ) -> Result<MipOutcome, EngineError>;
}
