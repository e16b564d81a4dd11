//! Iterated ε-constraint MILP driver.
//!
//! The driver builds the routing MILP once, precomputes an evenly spaced
//! ladder of profit thresholds, and runs a single engine optimization with
//! the incumbent recorder hooked in. The recorder's lazy cuts sweep the
//! search across the profit range, so the one call enumerates a whole set of
//! Pareto candidates; every recorded incumbent plus the proven optimum ends
//! up in the archive.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{debug, error, info};

use mvrppd_core::{Instance, ParetoArchive};

use crate::callback::{solution_from_values, IncumbentRecorder};
use crate::engine::HighsEngine;
use crate::model::{LinExpr, MipEngine, MipModel, MipParams, MipStatus, RowSense, VarId};

/// Runtime parameters of the driver.
#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
    /// Wall-clock budget for the whole sweep.
    pub time_limit: Duration,
    /// Seed forwarded to the engine's pseudo-random components.
    pub seed: u64,
    /// Ladder length and archive capacity.
    pub max_num_solutions: usize,
}

impl SolverConfig {
    /// The defaults for an instance: one hour, a clock-derived seed, and
    /// `2 |V|` solutions.
    pub fn default_for(instance: &Instance) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(0);

        SolverConfig {
            time_limit: Duration::from_secs(3600),
            seed,
            max_num_solutions: 2 * instance.num_vertices(),
        }
    }
}

/// Dense table of the model variables, indexed the way the formulation
/// writes them: `x[i][j][k]`, `y[r][k]`, `t[i][k]`, `l[i][k]`.
pub(crate) struct VarTable {
    num_vertices: usize,
    num_vehicles: usize,
    x: Vec<VarId>,
    y: Vec<VarId>,
    t: Vec<VarId>,
    l: Vec<VarId>,
}

impl VarTable {
    pub(crate) fn x(&self, i: usize, j: usize, k: usize) -> VarId {
        self.x[(i * self.num_vertices + j) * self.num_vehicles + k]
    }

    pub(crate) fn y(&self, r: usize, k: usize) -> VarId {
        self.y[r * self.num_vehicles + k]
    }

    pub(crate) fn t(&self, i: usize, k: usize) -> VarId {
        self.t[i * self.num_vehicles + k]
    }

    pub(crate) fn l(&self, i: usize, k: usize) -> VarId {
        self.l[i * self.num_vehicles + k]
    }
}

/// Exact bi-objective solver: one MILP sweep, one archive.
pub struct MilpSolver<E = HighsEngine> {
    instance: Arc<Instance>,
    config: SolverConfig,
    engine: E,
    archive: ParetoArchive,
    solving_time: Option<Duration>,
}

impl MilpSolver<HighsEngine> {
    pub fn new(instance: Arc<Instance>, config: SolverConfig) -> Self {
        Self::with_engine(instance, config, HighsEngine::new())
    }
}

impl<E: MipEngine> MilpSolver<E> {
    pub fn with_engine(instance: Arc<Instance>, config: SolverConfig, engine: E) -> Self {
        let archive = ParetoArchive::new(config.max_num_solutions);

        MilpSolver {
            instance,
            config,
            engine,
            archive,
            solving_time: None,
        }
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The archive of solutions found so far.
    pub fn archive(&self) -> &ParetoArchive {
        &self.archive
    }

    pub fn archive_mut(&mut self) -> &mut ParetoArchive {
        &mut self.archive
    }

    pub fn into_archive(self) -> ParetoArchive {
        self.archive
    }

    /// Wall-clock duration of the last [`MilpSolver::solve`] call.
    pub fn solving_time(&self) -> Option<Duration> {
        self.solving_time
    }

    /// Builds the MILP, runs the sweep and fills the archive. Optimizer
    /// failures are logged; incumbents recorded before the failure are kept.
    pub fn solve(&mut self) {
        let start = Instant::now();

        let (model, vars) = build_model(&self.instance);
        debug!(
            "built MILP with {} variables and {} constraints",
            model.num_variables(),
            model.num_constraints()
        );

        let mut recorder = IncumbentRecorder::new(
            Arc::clone(&self.instance),
            &vars,
            profit_ladder(&self.instance, self.config.max_num_solutions),
        );

        let params = MipParams {
            time_limit: Some(self.config.time_limit),
            threads: 1,
            seed: self.config.seed as u32,
            silent: true,
            lazy_constraints: true,
        };

        let outcome = self.engine.optimize(&model, &params, &mut recorder);

        let final_values = match &outcome {
            Ok(outcome) if outcome.status == MipStatus::Optimal => outcome.values.clone(),
            Ok(outcome) => {
                info!("sweep ended with status {:?}", outcome.status);
                None
            }
            Err(err) => {
                error!("optimizer error, keeping partial results: {err}");
                None
            }
        };

        for solution in recorder.into_solutions() {
            self.archive.insert(solution);
        }

        if let Some(values) = final_values {
            match solution_from_values(&self.instance, &vars, |var| values[var.0]) {
                Ok(solution) => self.archive.insert(solution),
                Err(err) => error!("discarding final optimum: {err}"),
            }
        }

        self.solving_time = Some(start.elapsed());
    }

    /// Writes one `total_profit sum_t_fulfill` line per first-front solution.
    pub fn write_statistics(&mut self, writer: impl Write) -> io::Result<()> {
        let mut writer = writer;

        if self.archive.is_empty() {
            return Ok(());
        }

        for solution in self.archive.front(0) {
            writeln!(
                writer,
                "{} {}",
                solution.total_profit(),
                solution.sum_t_fulfill()
            )?;
        }

        Ok(())
    }
}

/// Evenly spaced profit thresholds `i * sum_profit / (n - 1)` for
/// `i = 0..n`; degenerate ladders collapse to a single zero threshold.
fn profit_ladder(instance: &Instance, max_num_solutions: usize) -> VecDeque<f64> {
    if max_num_solutions < 2 {
        return VecDeque::from([0.0]);
    }

    let step = instance.sum_profit() / (max_num_solutions as f64 - 1.0);

    (0..max_num_solutions).map(|i| i as f64 * step).collect()
}

/// Builds the routing MILP: variables with their bounds and objective
/// coefficients, then the sixteen constraint families c01..c16.
fn build_model(instance: &Arc<Instance>) -> (MipModel, VarTable) {
    let nv = instance.num_vertices();
    let nr = instance.num_requests();
    let nk = instance.num_vehicles();

    let mut model = MipModel::new();

    let mut x = vec![VarId(0); nv * nv * nk];
    let mut y = vec![VarId(0); nr * nk];
    let mut t = vec![VarId(0); nv * nk];
    let mut l = vec![VarId(0); nv * nk];

    for k in 0..nk {
        for i in 0..nv {
            for j in 0..nv {
                x[(i * nv + j) * nk + k] = model.add_binary(0.0);
            }
        }
    }

    for k in 0..nk {
        for r in 0..nr {
            // Completes the t-part of the objective into the fulfillment-time
            // sum: service at the delivery vertex, minus the head start the
            // release time grants.
            let objective = instance.t_visit(instance.target_r(r)) - instance.t_create(r);
            y[r * nk + k] = model.add_binary(objective);
        }
    }

    for k in 0..nk {
        let upper = instance.t_start(k) + instance.t_limit(k);

        for i in 0..nv {
            let objective = if instance.is_target(i) && instance.request_v(i).is_some() {
                1.0
            } else {
                0.0
            };

            t[i * nk + k] = model.add_continuous(0.0, upper, objective);
        }
    }

    for k in 0..nk {
        for i in 0..nv {
            let upper = if i == instance.source_k(k) || i == instance.target_k(k) {
                0.0
            } else if instance.is_target(i) && instance.request_v(i).is_some() {
                let r = instance.request_v(i).expect("request target has an owner");
                (instance.capacity(k) - instance.demand_r(r)).max(0.0)
            } else {
                instance.capacity(k)
            };

            l[i * nk + k] = model.add_continuous(0.0, upper, 0.0);
        }
    }

    let vars = VarTable {
        num_vertices: nv,
        num_vehicles: nk,
        x,
        y,
        t,
        l,
    };

    // c01: each request source is left at most once, over all vehicles.
    for r in 0..nr {
        let source = instance.source_r(r);
        let expr: LinExpr = (0..nv)
            .filter(|&i| i != source)
            .flat_map(|i| (0..nk).map(move |k| (i, k)))
            .map(|(i, k)| (vars.x(source, i, k), 1.0))
            .collect();

        model.add_constraint(expr, RowSense::Le, 1.0);
    }

    // c02: each request target is entered at most once, over all vehicles.
    for r in 0..nr {
        let target = instance.target_r(r);
        let expr: LinExpr = (0..nv)
            .filter(|&i| i != target)
            .flat_map(|i| (0..nk).map(move |k| (i, k)))
            .map(|(i, k)| (vars.x(i, target, k), 1.0))
            .collect();

        model.add_constraint(expr, RowSense::Le, 1.0);
    }

    // c03: per vehicle, flow out of a request source equals flow into its
    // target.
    for k in 0..nk {
        for r in 0..nr {
            let source = instance.source_r(r);
            let target = instance.target_r(r);
            let mut expr = LinExpr::new();

            for i in (0..nv).filter(|&i| i != source) {
                expr.push(vars.x(source, i, k), 1.0);
            }

            for i in (0..nv).filter(|&i| i != target) {
                expr.push(vars.x(i, target, k), -1.0);
            }

            model.add_constraint(expr, RowSense::Eq, 0.0);
        }
    }

    // c04: each vehicle leaves its source depot exactly once, toward a
    // request source or directly to its own target.
    for k in 0..nk {
        let source = instance.source_k(k);
        let target = instance.target_k(k);

        let expr: LinExpr = (0..nv)
            .filter(|&i| (instance.is_source(i) && i != source) || i == target)
            .map(|i| (vars.x(source, i, k), 1.0))
            .collect();

        model.add_constraint(expr, RowSense::Eq, 1.0);
    }

    // c05: each vehicle enters its target depot exactly once.
    for k in 0..nk {
        let source = instance.source_k(k);
        let target = instance.target_k(k);

        let expr: LinExpr = (0..nv)
            .filter(|&i| (instance.is_target(i) && i != target) || i == source)
            .map(|i| (vars.x(i, target, k), 1.0))
            .collect();

        model.add_constraint(expr, RowSense::Eq, 1.0);
    }

    // c06: per vehicle, flow is conserved at every non-depot vertex.
    for k in 0..nk {
        let source = instance.source_k(k);
        let target = instance.target_k(k);

        for i in (0..nv).filter(|&i| i != source && i != target) {
            let mut expr = LinExpr::new();

            for j in (0..nv).filter(|&j| j != target) {
                expr.push(vars.x(j, i, k), 1.0);
            }

            for j in (0..nv).filter(|&j| j != source) {
                expr.push(vars.x(i, j, k), -1.0);
            }

            model.add_constraint(expr, RowSense::Eq, 0.0);
        }
    }

    // c07, c08: y[r][k] equals the request-source out-flow and the
    // request-target in-flow of vehicle k.
    for k in 0..nk {
        for r in 0..nr {
            let source = instance.source_r(r);
            let mut expr = LinExpr::new().with(vars.y(r, k), 1.0);

            for i in (0..nv).filter(|&i| i != source) {
                expr.push(vars.x(source, i, k), -1.0);
            }

            model.add_constraint(expr, RowSense::Eq, 0.0);
        }
    }

    for k in 0..nk {
        for r in 0..nr {
            let target = instance.target_r(r);
            let mut expr = LinExpr::new().with(vars.y(r, k), 1.0);

            for i in (0..nv).filter(|&i| i != target) {
                expr.push(vars.x(i, target, k), -1.0);
            }

            model.add_constraint(expr, RowSense::Eq, 0.0);
        }
    }

    // c09, c10: depot service times within the operating window.
    for k in 0..nk {
        let expr = LinExpr::new().with(vars.t(instance.source_k(k), k), 1.0);
        model.add_constraint(expr, RowSense::Ge, instance.t_start(k));
    }

    for k in 0..nk {
        let latest = instance.t_start(k) + instance.t_limit(k)
            - instance.t_visit(instance.target_k(k));

        let expr = LinExpr::new().with(vars.t(instance.target_k(k), k), 1.0);
        model.add_constraint(expr, RowSense::Le, latest);
    }

    // c11: release-time coupling through y.
    for k in 0..nk {
        for r in 0..nr {
            let expr = LinExpr::new()
                .with(vars.t(instance.source_r(r), k), 1.0)
                .with(vars.y(r, k), -instance.t_create(r));

            model.add_constraint(expr, RowSense::Ge, 0.0);
        }
    }

    // c12: duration-budget coupling through y.
    for k in 0..nk {
        for r in 0..nr {
            let window = instance.t_start(k) + instance.t_limit(k)
                - instance.t_visit(instance.target_k(k));

            let expr = LinExpr::new()
                .with(vars.t(instance.target_r(r), k), 1.0)
                .with(vars.y(r, k), -window);

            model.add_constraint(expr, RowSense::Le, 0.0);
        }
    }

    // c13: a serving vehicle's span covers the direct pickup-to-delivery
    // travel time.
    for k in 0..nk {
        for r in 0..nr {
            let direct = instance.length(instance.source_r(r), instance.target_r(r))
                / instance.speed(k);

            let expr = LinExpr::new()
                .with(vars.t(instance.target_r(r), k), 1.0)
                .with(vars.t(instance.source_r(r), k), -1.0)
                .with(vars.y(r, k), -direct);

            model.add_constraint(expr, RowSense::Ge, 0.0);
        }
    }

    // c14: big-M service-time propagation along every edge.
    for k in 0..nk {
        let horizon = instance.t_start(k) + instance.t_limit(k)
            - instance.t_visit(instance.target_k(k));
        let rhs = instance.t_visit(instance.target_k(k))
            - instance.t_start(k)
            - instance.t_limit(k);

        for i in 0..nv {
            for j in 0..nv {
                let big_m =
                    horizon + instance.t_visit(i) + instance.length(i, j) / instance.speed(k);

                let expr = LinExpr::new()
                    .with(vars.t(j, k), 1.0)
                    .with(vars.t(i, k), -1.0)
                    .with(vars.x(i, j, k), -big_m);

                model.add_constraint(expr, RowSense::Ge, rhs);
            }
        }
    }

    // c15: pickup load covers the demand of a served request.
    for k in 0..nk {
        for r in 0..nr {
            let expr = LinExpr::new()
                .with(vars.l(instance.source_r(r), k), 1.0)
                .with(vars.y(r, k), -instance.demand_r(r));

            model.add_constraint(expr, RowSense::Ge, 0.0);
        }
    }

    // c16: big-M load propagation along every edge.
    for k in 0..nk {
        for i in 0..nv {
            for j in 0..nv {
                let big_m = instance.capacity(k) + instance.demand_v(j);

                let expr = LinExpr::new()
                    .with(vars.l(i, k), 1.0)
                    .with(vars.l(j, k), -1.0)
                    .with(vars.x(i, j, k), big_m);

                model.add_constraint(expr, RowSense::Le, instance.capacity(k));
            }
        }
    }

    (model, vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvrppd_core::{Request, Stop, Vehicle};

    fn tiny_instance() -> Arc<Instance> {
        Arc::new(Instance::from_parts(
            &[Vehicle {
                t_start: 0.0,
                t_limit: 100.0,
                speed: 1.0,
                capacity: 10.0,
                source: Stop { x: 0.0, y: 0.0, t_visit: 0.0 },
                target: Stop { x: 0.0, y: 0.0, t_visit: 0.0 },
            }],
            &[Request {
                profit: 5.0,
                t_create: 0.0,
                demand: 1.0,
                source: Stop { x: 1.0, y: 0.0, t_visit: 0.0 },
                target: Stop { x: 2.0, y: 0.0, t_visit: 0.0 },
            }],
        ))
    }

    #[test]
    fn ladder_is_evenly_spaced() {
        let instance = tiny_instance();

        let ladder = profit_ladder(&instance, 6);
        assert_eq!(ladder.len(), 6);
        assert_eq!(ladder[0], 0.0);
        assert_eq!(ladder[5], 5.0);
        assert!((ladder[1] - 1.0).abs() < 1e-12);

        let degenerate = profit_ladder(&instance, 1);
        assert_eq!(degenerate, VecDeque::from([0.0]));
    }

    #[test]
    fn model_dimensions_match_the_formulation() {
        let instance = tiny_instance();
        let (model, vars) = build_model(&instance);

        let nv = 4;
        let nr = 1;
        let nk = 1;

        assert_eq!(
            model.num_variables(),
            nv * nv * nk + nr * nk + 2 * nv * nk
        );

        // c01 + c02 + c03 + c04 + c05 + c06 + c07 + c08 + c09 + c10 + c11 +
        // c12 + c13 + c14 + c15 + c16.
        let expected = nr
            + nr
            + nk * nr
            + nk
            + nk
            + nk * (nv - 2)
            + nk * nr
            + nk * nr
            + nk
            + nk
            + nk * nr
            + nk * nr
            + nk * nr
            + nk * nv * nv
            + nk * nr
            + nk * nv * nv;
        assert_eq!(model.num_constraints(), expected);

        // Depot loads are pinned to zero through their bounds.
        let source_load = &model.variables()[vars.l(instance.source_k(0), 0).0];
        assert_eq!(source_load.upper, 0.0);

        // The delivery-vertex load bound leaves headroom for the demand.
        let delivery_load = &model.variables()[vars.l(instance.target_r(0), 0).0];
        assert_eq!(delivery_load.upper, 9.0);

        // Only request-target service times carry objective weight.
        let delivery_time = &model.variables()[vars.t(instance.target_r(0), 0).0];
        assert_eq!(delivery_time.objective, 1.0);
        let depot_time = &model.variables()[vars.t(instance.source_k(0), 0).0];
        assert_eq!(depot_time.objective, 0.0);
    }
}
