//! HiGHS-backed [`MipEngine`].
//!
//! The `highs` bindings expose no incumbent callbacks, so the callback
//! contract is realised by iterated re-solves: solve the current model to
//! optimality, present the optimum to the callback as an integer incumbent,
//! fold any lazy cuts it registered into the row set, and solve again. The
//! loop ends at the first incumbent that produces no new cuts, when a cut
//! makes the model infeasible, or when the wall-clock budget runs out. Every
//! value handed to the callback this way is a genuine integer incumbent of
//! the cumulative model.

use std::time::Instant;

use highs::{HighsModelStatus, RowProblem, Sense};
use log::{debug, warn};

use crate::model::{
    Constraint, EngineError, Incumbent, LazyCuts, MipCallback, MipEngine, MipModel, MipOutcome,
    MipParams, MipStatus, RowSense, VarKind,
};

/// Engine backed by the bundled HiGHS solver.
#[derive(Clone, Copy, Debug, Default)]
pub struct HighsEngine;

impl HighsEngine {
    pub fn new() -> Self {
        HighsEngine
    }

    fn solve_once(
        &self,
        model: &MipModel,
        extra: &[Constraint],
        params: &MipParams,
        remaining: Option<f64>,
    ) -> Result<(HighsModelStatus, Option<Vec<f64>>), EngineError> {
        let mut problem = RowProblem::default();

        let columns: Vec<highs::Col> = model
            .variables()
            .iter()
            .map(|v| match v.kind {
                VarKind::Binary => problem.add_integer_column(v.objective, v.lower..=v.upper),
                VarKind::Continuous => problem.add_column(v.objective, v.lower..=v.upper),
            })
            .collect();

        for constraint in model.constraints().iter().chain(extra) {
            let row: Vec<(highs::Col, f64)> = constraint
                .expr
                .terms()
                .iter()
                .map(|&(var, weight)| (columns[var.0], weight))
                .collect();

            match constraint.sense {
                RowSense::Le => problem.add_row(..=constraint.rhs, row),
                RowSense::Ge => problem.add_row(constraint.rhs.., row),
                RowSense::Eq => problem.add_row(constraint.rhs..=constraint.rhs, row),
            };
        }

        let mut highs_model = problem.optimise(Sense::Minimise);

        if params.silent {
            highs_model.make_quiet();
        }

        highs_model.set_option("threads", params.threads as i32);
        highs_model.set_option("random_seed", params.seed as i32);

        if let Some(seconds) = remaining {
            highs_model.set_option("time_limit", seconds);
        }

        let solved = highs_model.solve();
        let status = solved.status();

        match status {
            HighsModelStatus::Optimal => {
                let values = solved.get_solution().columns().to_vec();
                Ok((status, Some(values)))
            }
            HighsModelStatus::ModelEmpty => Ok((HighsModelStatus::Optimal, Some(Vec::new()))),
            _ => Ok((status, None)),
        }
    }
}

impl MipEngine for HighsEngine {
    fn optimize(
        &mut self,
        model: &MipModel,
        params: &MipParams,
        callback: &mut dyn MipCallback,
    ) -> Result<MipOutcome, EngineError> {
        let deadline = params.time_limit.map(|limit| Instant::now() + limit);
        let mut extra: Vec<Constraint> = Vec::new();

        loop {
            let remaining = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());

                    if left.is_zero() {
                        return Ok(MipOutcome {
                            status: MipStatus::TimeLimit,
                            values: None,
                        });
                    }

                    Some(left.as_secs_f64())
                }
                None => None,
            };

            let (status, values) = self.solve_once(model, &extra, params, remaining)?;

            match status {
                HighsModelStatus::Optimal => {
                    let Some(values) = values else {
                        return Err(EngineError::Solve(
                            "optimal status without solution values".into(),
                        ));
                    };

                    let mut cuts = LazyCuts::default();
                    callback.on_incumbent(&Incumbent::new(&values), &mut cuts);

                    if cuts.is_empty() {
                        return Ok(MipOutcome {
                            status: MipStatus::Optimal,
                            values: Some(values),
                        });
                    }

                    if !params.lazy_constraints {
                        warn!("lazy constraints are disabled; dropping {} cut(s)", cuts.len());

                        return Ok(MipOutcome {
                            status: MipStatus::Optimal,
                            values: Some(values),
                        });
                    }

                    debug!(
                        "incumbent accepted, re-solving with {} additional cut(s)",
                        cuts.len()
                    );
                    extra.extend(cuts.take());
                }
                HighsModelStatus::Infeasible => {
                    return Ok(MipOutcome {
                        status: MipStatus::Infeasible,
                        values: None,
                    });
                }
                HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
                    return Ok(MipOutcome {
                        status: MipStatus::Unbounded,
                        values: None,
                    });
                }
                HighsModelStatus::ReachedTimeLimit => {
                    return Ok(MipOutcome {
                        status: MipStatus::TimeLimit,
                        values: None,
                    });
                }
                other => {
                    return Err(EngineError::Solve(format!(
                        "unexpected solver status {other:?}"
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinExpr, MipModel, RowSense};

    #[test]
    fn solves_a_small_knapsack() {
        // Minimize -3a - 5b subject to a + 2b <= 3: the optimum picks both.
        let mut model = MipModel::new();
        let a = model.add_binary(-3.0);
        let b = model.add_binary(-5.0);
        model.add_constraint(LinExpr::new().with(a, 1.0).with(b, 2.0), RowSense::Le, 3.0);

        let mut engine = HighsEngine::new();
        let outcome = engine
            .optimize(&model, &MipParams::default(), &mut ())
            .unwrap();

        assert_eq!(outcome.status, MipStatus::Optimal);

        let values = outcome.values.unwrap();
        assert!(values[0] >= 0.5);
        assert!(values[1] >= 0.5);
    }

    #[test]
    fn infeasible_models_are_reported() {
        let mut model = MipModel::new();
        let a = model.add_binary(1.0);
        model.add_constraint(LinExpr::new().with(a, 1.0), RowSense::Ge, 2.0);

        let mut engine = HighsEngine::new();
        let outcome = engine
            .optimize(&model, &MipParams::default(), &mut ())
            .unwrap();

        assert_eq!(outcome.status, MipStatus::Infeasible);
        assert!(outcome.values.is_none());
    }

    #[test]
    fn lazy_cuts_drive_re_solves() {
        struct Ratchet {
            incumbents: Vec<f64>,
            var: crate::model::VarId,
        }

        impl MipCallback for Ratchet {
            fn on_incumbent(&mut self, incumbent: &Incumbent<'_>, cuts: &mut LazyCuts) {
                let value = incumbent.value(self.var);
                self.incumbents.push(value);

                // Push the continuous variable upward one unit at a time.
                if value < 1.5 {
                    cuts.add(
                        LinExpr::new().with(self.var, 1.0),
                        RowSense::Ge,
                        value + 1.0,
                    );
                }
            }
        }

        // Minimize v over [0, 10]: the first incumbent is 0, then the
        // ratchet forces 1 and 2, at which point no cut is added.
        let mut model = MipModel::new();
        let v = model.add_continuous(0.0, 10.0, 1.0);

        let mut engine = HighsEngine::new();
        let mut recorder = Ratchet {
            incumbents: Vec::new(),
            var: v,
        };

        let outcome = engine
            .optimize(&model, &MipParams::default(), &mut recorder)
            .unwrap();

        assert_eq!(outcome.status, MipStatus::Optimal);
        assert_eq!(recorder.incumbents.len(), 3);
        assert!((recorder.incumbents[0] - 0.0).abs() < 1e-6);
        assert!((recorder.incumbents[1] - 1.0).abs() < 1e-6);
        assert!((recorder.incumbents[2] - 2.0).abs() < 1e-6);
        assert!((outcome.values.unwrap()[0] - 2.0).abs() < 1e-6);
    }
}
