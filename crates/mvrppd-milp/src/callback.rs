//! Incumbent recorder and profit-lower-bound ratchet.
//!
//! At every integer incumbent the recorder materialises a full
//! [`Solution`] from the variable values, keeps it, discards every profit
//! threshold the incumbent already exceeds and, while thresholds remain,
//! registers the lazy cut `sum of p_r * y[r][k] >= next threshold` so the
//! continuing search is forced toward higher-profit regions of the Pareto
//! set.

use std::collections::VecDeque;
use std::sync::Arc;

use log::error;

use mvrppd_core::{Instance, Solution, SolutionError};

use crate::model::{Incumbent, LazyCuts, LinExpr, MipCallback, RowSense, VarId};
use crate::solver::VarTable;

pub(crate) struct IncumbentRecorder<'a> {
    instance: Arc<Instance>,
    vars: &'a VarTable,
    min_total_profits: VecDeque<f64>,
    solutions: Vec<Solution>,
}

impl<'a> IncumbentRecorder<'a> {
    pub(crate) fn new(
        instance: Arc<Instance>,
        vars: &'a VarTable,
        min_total_profits: VecDeque<f64>,
    ) -> Self {
        IncumbentRecorder {
            instance,
            vars,
            min_total_profits,
            solutions: Vec::new(),
        }
    }

    pub(crate) fn into_solutions(self) -> Vec<Solution> {
        self.solutions
    }
}

impl MipCallback for IncumbentRecorder<'_> {
    fn on_incumbent(&mut self, incumbent: &Incumbent<'_>, cuts: &mut LazyCuts) {
        let solution = match solution_from_values(&self.instance, self.vars, |var| {
            incumbent.value(var)
        }) {
            Ok(solution) => solution,
            Err(err) => {
                error!("discarding malformed incumbent: {err}");
                return;
            }
        };

        let total_profit = solution.total_profit();
        self.solutions.push(solution);

        while self
            .min_total_profits
            .front()
            .is_some_and(|&threshold| threshold <= total_profit)
        {
            self.min_total_profits.pop_front();
        }

        if let Some(&threshold) = self.min_total_profits.front() {
            let instance = &self.instance;

            let expr: LinExpr = (0..instance.num_vehicles())
                .flat_map(|k| {
                    (0..instance.num_requests()).map(move |r| (r, k))
                })
                .map(|(r, k)| (self.vars.y(r, k), instance.profit(r)))
                .collect();

            cuts.add(expr, RowSense::Ge, threshold);
        }
    }
}

/// Materialises a [`Solution`] from a full assignment of the model
/// variables, rounding the binaries.
pub(crate) fn solution_from_values(
    instance: &Arc<Instance>,
    vars: &VarTable,
    value: impl Fn(VarId) -> f64,
) -> Result<Solution, SolutionError> {
    let nv = instance.num_vertices();
    let nr = instance.num_requests();
    let nk = instance.num_vehicles();

    let mut x = vec![vec![vec![false; nk]; nv]; nv];
    let mut y = vec![vec![false; nk]; nr];
    let mut t = vec![vec![0.0; nk]; nv];
    let mut l = vec![vec![0.0; nk]; nv];

    for k in 0..nk {
        for i in 0..nv {
            for j in 0..nv {
                x[i][j][k] = value(vars.x(i, j, k)) >= 0.5;
            }
        }
    }

    for k in 0..nk {
        for r in 0..nr {
            y[r][k] = value(vars.y(r, k)) >= 0.5;
        }
    }

    for k in 0..nk {
        for i in 0..nv {
            t[i][k] = value(vars.t(i, k));
            l[i][k] = value(vars.l(i, k));
        }
    }

    Solution::from_decision_variables(Arc::clone(instance), x, y, t, l)
}
