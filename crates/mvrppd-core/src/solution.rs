//! Candidate MVRPPD solutions.
//!
//! A solution keeps two coupled representations of the same routes: the
//! per-vehicle vertex paths, and the MILP decision variables `x`, `y`, `t`,
//! `l`. Either one can be the constructor input; the other is derived, along
//! with the cached scheduling aggregates both checkers rely on. Solutions are
//! immutable once constructed.
//!
//! Two derivation conventions are easy to conflate and are both kept:
//! `times[k][i]` accumulates pure travel-plus-visit duration from the start
//! of the path, with no waiting, while `t[v][k]` starts at the vehicle's
//! `t_start` and is lifted to a request's release time when the vehicle
//! arrives at the pickup early.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::instance::Instance;
use crate::read::{ReadError, Tokens};
use crate::FLOAT_EPS;

/// Failure to construct a solution.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SolutionError {
    #[error("expected one path per vehicle ({expected}), got {actual}")]
    PathCount { expected: usize, actual: usize },

    #[error("path of vehicle {vehicle} visits out-of-bounds vertex {vertex}")]
    VertexOutOfBounds { vehicle: usize, vertex: usize },

    /// Following `x[.][.][k]` from the vehicle source did not reach the
    /// vehicle target within `|V|` hops. A decision-variable assignment can
    /// satisfy every constraint clause and still be rejected here; this is
    /// the only way such an assignment fails to become a solution.
    #[error("decision variables of vehicle {vehicle} do not form a source-to-target path")]
    PathReconstruction { vehicle: usize },
}

/// Defect of a single vehicle path, found by [`Solution::validate_path`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PathError {
    #[error("path does not begin at the vehicle source depot")]
    WrongFirstVertex,
    #[error("path does not end at the vehicle target depot")]
    WrongLastVertex,
    #[error("travel time {t_travel} exceeds the operating limit {t_limit}")]
    TravelTimeExceeded { t_travel: f64, t_limit: f64 },
    #[error("load {load} at position {position} exceeds the capacity {capacity}")]
    OverCapacity {
        position: usize,
        load: f64,
        capacity: f64,
    },
    #[error("request {request} is delivered before it is picked up")]
    PrecedenceViolated { request: usize },
}

impl PathError {
    /// Stable numeric code of this defect, 1..=5.
    pub fn code(&self) -> u32 {
        match self {
            PathError::WrongFirstVertex => 1,
            PathError::WrongLastVertex => 2,
            PathError::TravelTimeExceeded { .. } => 3,
            PathError::OverCapacity { .. } => 4,
            PathError::PrecedenceViolated { .. } => 5,
        }
    }
}

/// Infeasibility of a solution: the first vehicle whose path is invalid.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("path of vehicle {vehicle} is invalid: {source}")]
pub struct FeasibilityError {
    pub vehicle: usize,
    pub source: PathError,
}

impl FeasibilityError {
    /// Stable numeric code: the offending vehicle index plus one.
    pub fn code(&self) -> u32 {
        self.vehicle as u32 + 1
    }
}

/// Violation of one clause of the MILP constraint system, found by
/// [`Solution::check_constraints`]. [`ConstraintViolation::code`] recovers
/// the stable 1..=22 clause numbering.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConstraintViolation {
    #[error("request {request} source has out-degree above one")]
    SourceOutDegree { request: usize },
    #[error("request {request} target has in-degree above one")]
    TargetInDegree { request: usize },
    #[error("flow through request {request} is unbalanced for vehicle {vehicle}")]
    RequestFlowImbalance { request: usize, vehicle: usize },
    #[error("vehicle {vehicle} does not leave its source depot exactly once")]
    DepotDeparture { vehicle: usize },
    #[error("vehicle {vehicle} does not enter its target depot exactly once")]
    DepotArrival { vehicle: usize },
    #[error("flow of vehicle {vehicle} is not conserved at vertex {vertex}")]
    FlowConservation { vertex: usize, vehicle: usize },
    #[error("y[{request}][{vehicle}] disagrees with the request source out-flow")]
    ServiceSourceMismatch { request: usize, vehicle: usize },
    #[error("y[{request}][{vehicle}] disagrees with the request target in-flow")]
    ServiceTargetMismatch { request: usize, vehicle: usize },
    #[error("vehicle {vehicle} starts before its start time")]
    StartTimeTooEarly { vehicle: usize },
    #[error("vehicle {vehicle} reaches its depot after its operating window")]
    FinishTimeTooLate { vehicle: usize },
    #[error("request {request} is picked up by vehicle {vehicle} before its release time")]
    ReleaseTimeViolated { request: usize, vehicle: usize },
    #[error("request {request} is delivered by vehicle {vehicle} after its deadline")]
    DeadlineViolated { request: usize, vehicle: usize },
    #[error("vehicle {vehicle} serves request {request} faster than the direct travel time")]
    DirectTravelTimeViolated { request: usize, vehicle: usize },
    #[error("service times of vehicle {vehicle} break propagation along edge ({from}, {to})")]
    TimePropagationViolated {
        from: usize,
        to: usize,
        vehicle: usize,
    },
    #[error("vehicle {vehicle} carries load at its source depot")]
    SourceDepotLoad { vehicle: usize },
    #[error("vehicle {vehicle} carries load at its target depot")]
    TargetDepotLoad { vehicle: usize },
    #[error("pickup load of request {request} on vehicle {vehicle} is below its demand")]
    PickupLoadTooLow { request: usize, vehicle: usize },
    #[error("pickup load of request {request} exceeds the capacity of vehicle {vehicle}")]
    PickupLoadOverCapacity { request: usize, vehicle: usize },
    #[error("delivery load of request {request} exceeds the capacity of vehicle {vehicle}")]
    DeliveryLoadOverCapacity { request: usize, vehicle: usize },
    #[error("loads of vehicle {vehicle} break propagation along edge ({from}, {to})")]
    LoadPropagationViolated {
        from: usize,
        to: usize,
        vehicle: usize,
    },
    #[error("service time at vertex {vertex} is negative for vehicle {vehicle}")]
    NegativeTime { vertex: usize, vehicle: usize },
    #[error("load at vertex {vertex} is negative for vehicle {vehicle}")]
    NegativeLoad { vertex: usize, vehicle: usize },
}

impl ConstraintViolation {
    /// Stable numeric code of the violated clause, 1..=22.
    pub fn code(&self) -> u32 {
        use ConstraintViolation::*;

        match self {
            SourceOutDegree { .. } => 1,
            TargetInDegree { .. } => 2,
            RequestFlowImbalance { .. } => 3,
            DepotDeparture { .. } => 4,
            DepotArrival { .. } => 5,
            FlowConservation { .. } => 6,
            ServiceSourceMismatch { .. } => 7,
            ServiceTargetMismatch { .. } => 8,
            StartTimeTooEarly { .. } => 9,
            FinishTimeTooLate { .. } => 10,
            ReleaseTimeViolated { .. } => 11,
            DeadlineViolated { .. } => 12,
            DirectTravelTimeViolated { .. } => 13,
            TimePropagationViolated { .. } => 14,
            SourceDepotLoad { .. } => 15,
            TargetDepotLoad { .. } => 16,
            PickupLoadTooLow { .. } => 17,
            PickupLoadOverCapacity { .. } => 18,
            DeliveryLoadOverCapacity { .. } => 19,
            LoadPropagationViolated { .. } => 20,
            NegativeTime { .. } => 21,
            NegativeLoad { .. } => 22,
        }
    }
}

/// A candidate solution: one path per vehicle plus the decision variables
/// and cached schedule derived from them.
#[derive(Clone, Debug)]
pub struct Solution {
    instance: Arc<Instance>,

    /// Canonical route form: `paths[k]` starts at the vehicle's source depot
    /// and ends at its target depot.
    paths: Vec<Vec<usize>>,

    // Decision variables, flattened: x over (i, j, k), y over (r, k), t and
    // l over (i, k).
    x: Vec<bool>,
    y: Vec<bool>,
    t: Vec<f64>,
    l: Vec<f64>,

    t_travels: Vec<f64>,
    t_fulfills: Vec<f64>,
    total_profit: f64,
    sum_t_fulfill: f64,

    /// Running signed demand sum per path position.
    loads: Vec<Vec<f64>>,
    /// Travel-plus-visit duration per path position, without release lifts.
    times: Vec<Vec<f64>>,

    vehicles_r: Vec<Option<usize>>,
    vehicles_v: Vec<Option<usize>>,
    vehicles_e: Vec<Option<usize>>,
    requests_k: Vec<HashSet<usize>>,
    /// `indexes_kv[k][v]` is the position of `v` in `paths[k]`, or the path
    /// length when absent.
    indexes_kv: Vec<Vec<usize>>,
}

impl Solution {
    /// Builds a solution from one path per vehicle, deriving the decision
    /// variables and the cached schedule.
    pub fn from_paths(
        instance: Arc<Instance>,
        paths: Vec<Vec<usize>>,
    ) -> Result<Self, SolutionError> {
        if paths.len() != instance.num_vehicles() {
            return Err(SolutionError::PathCount {
                expected: instance.num_vehicles(),
                actual: paths.len(),
            });
        }

        for (vehicle, path) in paths.iter().enumerate() {
            for &vertex in path {
                if vertex >= instance.num_vertices() {
                    return Err(SolutionError::VertexOutOfBounds { vehicle, vertex });
                }
            }
        }

        let mut solution = Self::empty(instance, paths);
        solution.compute_decision_variables();
        solution.init();

        Ok(solution)
    }

    /// Builds a solution from MILP decision-variable values, reconstructing
    /// each vehicle's path by following `x[.][.][k]` from the vehicle source
    /// until the vehicle target.
    pub fn from_decision_variables(
        instance: Arc<Instance>,
        x: Vec<Vec<Vec<bool>>>,
        y: Vec<Vec<bool>>,
        t: Vec<Vec<f64>>,
        l: Vec<Vec<f64>>,
    ) -> Result<Self, SolutionError> {
        let nv = instance.num_vertices();
        let nk = instance.num_vehicles();

        let mut paths = Vec::with_capacity(nk);

        for k in 0..nk {
            let target = instance.target_k(k);
            let mut last = instance.source_k(k);
            let mut path = vec![last];

            while last != target {
                let next = (0..nv).find(|&v| x[last][v][k]);

                match next {
                    Some(v) if path.len() <= nv => {
                        path.push(v);
                        last = v;
                    }
                    _ => return Err(SolutionError::PathReconstruction { vehicle: k }),
                }
            }

            paths.push(path);
        }

        let mut solution = Self::empty(instance, paths);

        for (i, rows) in x.iter().enumerate() {
            for (j, vehicles) in rows.iter().enumerate() {
                for (k, &used) in vehicles.iter().enumerate() {
                    let index = solution.xi(i, j, k);
                    solution.x[index] = used;
                }
            }
        }

        for (r, vehicles) in y.iter().enumerate() {
            for (k, &served) in vehicles.iter().enumerate() {
                let index = solution.yi(r, k);
                solution.y[index] = served;
            }
        }

        for (i, vehicles) in t.iter().enumerate() {
            for (k, &time) in vehicles.iter().enumerate() {
                let index = solution.tli(i, k);
                solution.t[index] = time;
            }
        }

        for (i, vehicles) in l.iter().enumerate() {
            for (k, &load) in vehicles.iter().enumerate() {
                let index = solution.tli(i, k);
                solution.l[index] = load;
            }
        }

        solution.init();

        Ok(solution)
    }

    /// Reads a solution from its textual form: a line of path lengths, then
    /// one line of vertex ids per vehicle.
    pub fn read(instance: Arc<Instance>, reader: impl Read) -> Result<Self, ReadError> {
        let mut tokens = Tokens::from_reader(reader)?;

        let sizes = (0..instance.num_vehicles())
            .map(|_| tokens.index("path length"))
            .collect::<Result<Vec<_>, _>>()?;

        let mut paths = Vec::with_capacity(sizes.len());

        for size in sizes {
            paths.push(
                (0..size)
                    .map(|_| tokens.index("path vertex"))
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }

        Ok(Self::from_paths(instance, paths)?)
    }

    /// Reads a solution from a file.
    pub fn from_file(instance: Arc<Instance>, path: impl AsRef<Path>) -> Result<Self, ReadError> {
        Self::read(instance, BufReader::new(File::open(path)?))
    }

    /// Writes this solution in the format understood by [`Solution::read`].
    pub fn write(&self, writer: impl Write) -> io::Result<()> {
        let mut writer = writer;

        let sizes = self
            .paths
            .iter()
            .map(|path| path.len().to_string())
            .collect::<Vec<_>>();
        writeln!(writer, "{}", sizes.join(" "))?;

        for path in &self.paths {
            let vertices = path
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>();
            writeln!(writer, "{}", vertices.join(" "))?;
        }

        Ok(())
    }

    /// Writes this solution to a file.
    pub fn write_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()
    }

    fn empty(instance: Arc<Instance>, paths: Vec<Vec<usize>>) -> Self {
        let nv = instance.num_vertices();
        let nr = instance.num_requests();
        let nk = instance.num_vehicles();

        Solution {
            instance,
            paths,
            x: vec![false; nv * nv * nk],
            y: vec![false; nr * nk],
            t: vec![0.0; nv * nk],
            l: vec![0.0; nv * nk],
            t_travels: vec![0.0; nk],
            t_fulfills: vec![0.0; nr],
            total_profit: 0.0,
            sum_t_fulfill: 0.0,
            loads: Vec::new(),
            times: Vec::new(),
            vehicles_r: vec![None; nr],
            vehicles_v: vec![None; nv],
            vehicles_e: vec![None; nv * nv],
            requests_k: vec![HashSet::new(); nk],
            indexes_kv: Vec::new(),
        }
    }

    fn xi(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.instance.num_vertices() + j) * self.instance.num_vehicles() + k
    }

    fn yi(&self, r: usize, k: usize) -> usize {
        r * self.instance.num_vehicles() + k
    }

    fn tli(&self, i: usize, k: usize) -> usize {
        i * self.instance.num_vehicles() + k
    }

    /// Derives `x`, `y`, `t` and `l` from the paths. `t` propagates visit
    /// and travel durations from `t_start` and is lifted to the release time
    /// at a request pickup reached early; `l` is the running signed demand.
    fn compute_decision_variables(&mut self) {
        let instance = Arc::clone(&self.instance);

        for (k, path) in self.paths.clone().iter().enumerate() {
            for (i, &v) in path.iter().enumerate() {
                if i == 0 {
                    let index = self.tli(v, k);
                    self.t[index] = instance.t_start(k);
                    self.l[index] = 0.0;
                    continue;
                }

                let u = path[i - 1];

                let index = self.xi(u, v, k);
                self.x[index] = true;

                if i < path.len() - 1 && instance.is_target(v) {
                    if let Some(r) = instance.request_v(v) {
                        let index = self.yi(r, k);
                        self.y[index] = true;
                    }
                }

                let mut time = self.t[self.tli(u, k)]
                    + instance.t_visit(u)
                    + instance.length(u, v) / instance.speed(k);

                if instance.is_source(v) {
                    if let Some(r) = instance.request_v(v) {
                        if time < instance.t_create(r) {
                            time = instance.t_create(r);
                        }
                    }
                }

                let index = self.tli(v, k);
                self.t[index] = time;
                self.l[index] = self.l[self.tli(u, k)] + instance.demand_v(v);
            }
        }
    }

    /// Walks each path accumulating the cached schedule: travel durations,
    /// per-position loads and times, fulfillment times and the objective
    /// sums, and the reverse indices.
    fn init(&mut self) {
        let instance = Arc::clone(&self.instance);
        let nk = instance.num_vehicles();
        let nv = instance.num_vertices();

        self.loads = (0..nk).map(|k| vec![0.0; self.paths[k].len()]).collect();
        self.times = (0..nk).map(|k| vec![0.0; self.paths[k].len()]).collect();
        self.indexes_kv = (0..nk).map(|k| vec![self.paths[k].len(); nv]).collect();

        for (k, path) in self.paths.clone().iter().enumerate() {
            for (i, &v) in path.iter().enumerate() {
                if i == 0 {
                    self.t_travels[k] = instance.t_visit(v);
                    self.loads[k][i] = instance.demand_v(v);
                    self.times[k][i] = instance.t_visit(v);
                } else {
                    let u = path[i - 1];
                    let hop = instance.length(u, v) / instance.speed(k) + instance.t_visit(v);

                    self.t_travels[k] += hop;
                    self.loads[k][i] = self.loads[k][i - 1] + instance.demand_v(v);
                    self.times[k][i] = self.times[k][i - 1] + hop;
                    self.vehicles_e[u * nv + v] = Some(k);
                }

                if instance.is_target(v) {
                    if let Some(r) = instance.request_v(v) {
                        // Delivery completes once the target has been
                        // serviced; t carries the release-time lift that the
                        // waiting-free `times` cannot.
                        self.t_fulfills[r] = self.t[self.tli(v, k)] + instance.t_visit(v)
                            - instance.t_create(r);

                        self.total_profit += instance.profit(r);
                        self.sum_t_fulfill += self.t_fulfills[r];
                        self.vehicles_r[r] = Some(k);
                        self.requests_k[k].insert(r);
                    }
                }

                self.vehicles_v[v] = Some(k);
                self.indexes_kv[k][v] = i;
            }
        }
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    pub fn paths(&self) -> &[Vec<usize>] {
        &self.paths
    }

    pub fn path(&self, k: usize) -> &[usize] {
        &self.paths[k]
    }

    /// Whether vehicle `k` traverses the directed edge `(i, j)`.
    pub fn x(&self, i: usize, j: usize, k: usize) -> bool {
        self.x[self.xi(i, j, k)]
    }

    /// Whether vehicle `k` serves request `r`.
    pub fn y(&self, r: usize, k: usize) -> bool {
        self.y[self.yi(r, k)]
    }

    /// Time at which vehicle `k` begins service at vertex `i`.
    pub fn t(&self, i: usize, k: usize) -> f64 {
        self.t[self.tli(i, k)]
    }

    /// Load of vehicle `k` after serving vertex `i`.
    pub fn l(&self, i: usize, k: usize) -> f64 {
        self.l[self.tli(i, k)]
    }

    /// Total travel-plus-visit duration of vehicle `k`'s path.
    pub fn t_travel(&self, k: usize) -> f64 {
        self.t_travels[k]
    }

    /// Fulfillment time of request `r`; zero when unserved.
    pub fn t_fulfill(&self, r: usize) -> f64 {
        self.t_fulfills[r]
    }

    pub fn total_profit(&self) -> f64 {
        self.total_profit
    }

    pub fn sum_t_fulfill(&self) -> f64 {
        self.sum_t_fulfill
    }

    /// Load of vehicle `k` after the `i`-th position of its path.
    pub fn load(&self, k: usize, i: usize) -> f64 {
        self.loads[k][i]
    }

    /// Travel-plus-visit duration of vehicle `k`'s path prefix ending at
    /// position `i`.
    pub fn time(&self, k: usize, i: usize) -> f64 {
        self.times[k][i]
    }

    /// The vehicle serving request `r`, if any.
    pub fn vehicle_r(&self, r: usize) -> Option<usize> {
        self.vehicles_r[r]
    }

    /// The vehicle visiting vertex `v`, if any.
    pub fn vehicle_v(&self, v: usize) -> Option<usize> {
        self.vehicles_v[v]
    }

    /// The vehicle traversing the directed edge `(u, v)`, if any.
    pub fn vehicle_e(&self, u: usize, v: usize) -> Option<usize> {
        self.vehicles_e[u * self.instance.num_vertices() + v]
    }

    /// Requests served by vehicle `k`.
    pub fn requests_k(&self, k: usize) -> &HashSet<usize> {
        &self.requests_k[k]
    }

    /// Position of vertex `v` in vehicle `k`'s path, or the path length when
    /// the vertex is not visited by `k`.
    pub fn index_kv(&self, k: usize, v: usize) -> usize {
        self.indexes_kv[k][v]
    }

    /// Fast per-vehicle check: depot endpoints, operating-duration budget,
    /// capacity along the path, and pickup-before-delivery precedence.
    pub fn validate_path(&self, k: usize) -> Result<(), PathError> {
        let instance = &self.instance;

        if self.paths[k].first() != Some(&instance.source_k(k)) {
            return Err(PathError::WrongFirstVertex);
        }

        if self.paths[k].last() != Some(&instance.target_k(k)) {
            return Err(PathError::WrongLastVertex);
        }

        if self.t_travels[k] > instance.t_limit(k) {
            return Err(PathError::TravelTimeExceeded {
                t_travel: self.t_travels[k],
                t_limit: instance.t_limit(k),
            });
        }

        for (position, &load) in self.loads[k].iter().enumerate() {
            if load > instance.capacity(k) {
                return Err(PathError::OverCapacity {
                    position,
                    load,
                    capacity: instance.capacity(k),
                });
            }
        }

        for &r in &self.requests_k[k] {
            if self.indexes_kv[k][instance.source_r(r)] >= self.indexes_kv[k][instance.target_r(r)]
            {
                return Err(PathError::PrecedenceViolated { request: r });
            }
        }

        Ok(())
    }

    /// Whether vehicle `k`'s path is valid.
    pub fn is_valid_path(&self, k: usize) -> bool {
        self.validate_path(k).is_ok()
    }

    /// Checks every vehicle path, reporting the first invalid one.
    pub fn check_feasibility(&self) -> Result<(), FeasibilityError> {
        for k in 0..self.instance.num_vehicles() {
            self.validate_path(k)
                .map_err(|source| FeasibilityError { vehicle: k, source })?;
        }

        Ok(())
    }

    /// Whether every vehicle path is valid.
    pub fn is_feasible(&self) -> bool {
        self.check_feasibility().is_ok()
    }

    /// Verifies the decision variables against the full MILP constraint
    /// system, clause by clause in the order that defines the violation
    /// codes. Every floating comparison is tolerant to [`FLOAT_EPS`], so
    /// solver incumbents that satisfy the rows within the LP feasibility
    /// tolerance verify cleanly.
    pub fn check_constraints(&self) -> Result<(), ConstraintViolation> {
        use ConstraintViolation::*;

        let instance = &self.instance;
        let nv = instance.num_vertices();
        let nr = instance.num_requests();
        let nk = instance.num_vehicles();

        // c1: each request source is left at most once, over all vehicles.
        for r in 0..nr {
            let source = instance.source_r(r);
            let out: usize = (0..nv)
                .filter(|&i| i != source)
                .map(|i| (0..nk).filter(|&k| self.x(source, i, k)).count())
                .sum();

            if out > 1 {
                return Err(SourceOutDegree { request: r });
            }
        }

        // c2: each request target is entered at most once, over all vehicles.
        for r in 0..nr {
            let target = instance.target_r(r);
            let inn: usize = (0..nv)
                .filter(|&i| i != target)
                .map(|i| (0..nk).filter(|&k| self.x(i, target, k)).count())
                .sum();

            if inn > 1 {
                return Err(TargetInDegree { request: r });
            }
        }

        // c3: per vehicle, the flow out of a request source matches the flow
        // into its target.
        for k in 0..nk {
            for r in 0..nr {
                let source = instance.source_r(r);
                let target = instance.target_r(r);

                let out = (0..nv)
                    .filter(|&i| i != source && self.x(source, i, k))
                    .count();
                let inn = (0..nv)
                    .filter(|&i| i != target && self.x(i, target, k))
                    .count();

                if out != inn {
                    return Err(RequestFlowImbalance {
                        request: r,
                        vehicle: k,
                    });
                }
            }
        }

        // c4: each vehicle leaves its source depot exactly once, toward a
        // request source or directly to its own target.
        for k in 0..nk {
            let source = instance.source_k(k);
            let target = instance.target_k(k);

            let out = (0..nv)
                .filter(|&i| {
                    ((instance.is_source(i) && i != source) || i == target)
                        && self.x(source, i, k)
                })
                .count();

            if out != 1 {
                return Err(DepotDeparture { vehicle: k });
            }
        }

        // c5: each vehicle enters its target depot exactly once.
        for k in 0..nk {
            let source = instance.source_k(k);
            let target = instance.target_k(k);

            let inn = (0..nv)
                .filter(|&i| {
                    ((instance.is_target(i) && i != target) || i == source)
                        && self.x(i, target, k)
                })
                .count();

            if inn != 1 {
                return Err(DepotArrival { vehicle: k });
            }
        }

        // c6: per vehicle, flow is conserved at every non-depot vertex.
        for k in 0..nk {
            let source = instance.source_k(k);
            let target = instance.target_k(k);

            for i in (0..nv).filter(|&i| i != source && i != target) {
                let inn = (0..nv)
                    .filter(|&j| j != target && self.x(j, i, k))
                    .count();
                let out = (0..nv)
                    .filter(|&j| j != source && self.x(i, j, k))
                    .count();

                if inn != out {
                    return Err(FlowConservation {
                        vertex: i,
                        vehicle: k,
                    });
                }
            }
        }

        // c7, c8: y[r][k] equals the request-source out-flow and the
        // request-target in-flow of vehicle k.
        for k in 0..nk {
            for r in 0..nr {
                let source = instance.source_r(r);
                let out = (0..nv)
                    .filter(|&i| i != source && self.x(source, i, k))
                    .count();

                if usize::from(self.y(r, k)) != out {
                    return Err(ServiceSourceMismatch {
                        request: r,
                        vehicle: k,
                    });
                }
            }
        }

        for k in 0..nk {
            for r in 0..nr {
                let target = instance.target_r(r);
                let inn = (0..nv)
                    .filter(|&i| i != target && self.x(i, target, k))
                    .count();

                if usize::from(self.y(r, k)) != inn {
                    return Err(ServiceTargetMismatch {
                        request: r,
                        vehicle: k,
                    });
                }
            }
        }

        // c9, c10: depot service times within the operating window.
        for k in 0..nk {
            if self.t(instance.source_k(k), k) < instance.t_start(k) - FLOAT_EPS {
                return Err(StartTimeTooEarly { vehicle: k });
            }
        }

        for k in 0..nk {
            let latest = instance.t_start(k) + instance.t_limit(k)
                - instance.t_visit(instance.target_k(k));

            if self.t(instance.target_k(k), k) > latest + FLOAT_EPS {
                return Err(FinishTimeTooLate { vehicle: k });
            }
        }

        // c11: release-time coupling through y, at the request's pickup
        // vertex.
        for k in 0..nk {
            for r in 0..nr {
                let pickup = self.t(instance.source_r(r), k);
                let bound = if self.y(r, k) { instance.t_create(r) } else { 0.0 };

                if pickup < bound - FLOAT_EPS {
                    return Err(ReleaseTimeViolated {
                        request: r,
                        vehicle: k,
                    });
                }
            }
        }

        // c12: duration-budget coupling through y; an unserved request pins
        // the target service time of this vehicle to zero.
        for k in 0..nk {
            for r in 0..nr {
                let delivery = self.t(instance.target_r(r), k);
                let bound = if self.y(r, k) {
                    instance.t_start(k) + instance.t_limit(k)
                        - instance.t_visit(instance.target_k(k))
                } else {
                    0.0
                };

                if delivery > bound + FLOAT_EPS {
                    return Err(DeadlineViolated {
                        request: r,
                        vehicle: k,
                    });
                }
            }
        }

        // c13: a served request's pickup-to-delivery span covers at least
        // the direct travel time between its endpoints.
        for k in 0..nk {
            for r in 0..nr {
                let span = self.t(instance.target_r(r), k) - self.t(instance.source_r(r), k);
                let bound = if self.y(r, k) {
                    instance.length(instance.source_r(r), instance.target_r(r))
                        / instance.speed(k)
                } else {
                    0.0
                };

                if span < bound - FLOAT_EPS {
                    return Err(DirectTravelTimeViolated {
                        request: r,
                        vehicle: k,
                    });
                }
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
                    let activation = if self.x(i, j, k) { big_m } else { 0.0 };

                    if self.t(j, k) - self.t(i, k) - activation < rhs - FLOAT_EPS {
                        return Err(TimePropagationViolated {
                            from: i,
                            to: j,
                            vehicle: k,
                        });
                    }
                }
            }
        }

        // c15, c16: loads vanish at both depots.
        for k in 0..nk {
            if self.l(instance.source_k(k), k).abs() > FLOAT_EPS {
                return Err(SourceDepotLoad { vehicle: k });
            }
        }

        for k in 0..nk {
            if self.l(instance.target_k(k), k).abs() > FLOAT_EPS {
                return Err(TargetDepotLoad { vehicle: k });
            }
        }

        // c17..c19: capacity bounds at request vertices, coupled to y.
        for k in 0..nk {
            for r in 0..nr {
                let pickup = self.l(instance.source_r(r), k);
                let bound = if self.y(r, k) { instance.demand_r(r) } else { 0.0 };

                if pickup < bound - FLOAT_EPS {
                    return Err(PickupLoadTooLow {
                        request: r,
                        vehicle: k,
                    });
                }
            }
        }

        for k in 0..nk {
            for r in 0..nr {
                if self.l(instance.source_r(r), k) > instance.capacity(k) + FLOAT_EPS {
                    return Err(PickupLoadOverCapacity {
                        request: r,
                        vehicle: k,
                    });
                }
            }
        }

        for k in 0..nk {
            for r in 0..nr {
                let headroom = (instance.capacity(k) - instance.demand_r(r)).max(0.0);

                if self.l(instance.target_r(r), k) > headroom + FLOAT_EPS {
                    return Err(DeliveryLoadOverCapacity {
                        request: r,
                        vehicle: k,
                    });
                }
            }
        }

        // c20: load propagation along every edge.
        for k in 0..nk {
            for i in 0..nv {
                for j in 0..nv {
                    let activation = if self.x(i, j, k) {
                        instance.capacity(k) + instance.demand_v(j)
                    } else {
                        0.0
                    };

                    if self.l(i, k) - self.l(j, k) + activation
                        > instance.capacity(k) + FLOAT_EPS
                    {
                        return Err(LoadPropagationViolated {
                            from: i,
                            to: j,
                            vehicle: k,
                        });
                    }
                }
            }
        }

        // c21, c22: non-negativity.
        for k in 0..nk {
            for i in 0..nv {
                if self.t(i, k) < -FLOAT_EPS {
                    return Err(NegativeTime {
                        vertex: i,
                        vehicle: k,
                    });
                }
            }
        }

        for k in 0..nk {
            for i in 0..nv {
                if self.l(i, k) < -FLOAT_EPS {
                    return Err(NegativeLoad {
                        vertex: i,
                        vehicle: k,
                    });
                }
            }
        }

        Ok(())
    }

    /// Whether the decision variables satisfy the full constraint system.
    pub fn are_constraints_satisfied(&self) -> bool {
        self.check_constraints().is_ok()
    }

    /// Pareto dominance: at least as good on both objectives and strictly
    /// better on one (profit maximised, fulfillment-time sum minimised).
    pub fn dominates(&self, other: &Solution) -> bool {
        (self.total_profit > other.total_profit && self.sum_t_fulfill <= other.sum_t_fulfill)
            || (self.total_profit >= other.total_profit
                && self.sum_t_fulfill < other.sum_t_fulfill)
    }
}

impl PartialEq for Solution {
    /// Equality on the path sequences only; the derived quantities are a
    /// function of them.
    fn eq(&self, other: &Self) -> bool {
        self.paths == other.paths
    }
}

impl Eq for Solution {}

impl PartialOrd for Solution {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Solution {
    /// Lexicographic order on `(-total_profit, sum_t_fulfill, path count,
    /// per-path lengths, per-position vertex ids)`; total via
    /// [`f64::total_cmp`].
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .total_profit
            .total_cmp(&self.total_profit)
            .then_with(|| self.sum_t_fulfill.total_cmp(&other.sum_t_fulfill))
            .then_with(|| self.paths.len().cmp(&other.paths.len()))
            .then_with(|| {
                for (a, b) in self.paths.iter().zip(&other.paths) {
                    match a.len().cmp(&b.len()) {
                        Ordering::Equal => {}
                        unequal => return unequal,
                    }
                }

                Ordering::Equal
            })
            .then_with(|| {
                for (a, b) in self.paths.iter().zip(&other.paths) {
                    match a.cmp(b) {
                        Ordering::Equal => {}
                        unequal => return unequal,
                    }
                }

                Ordering::Equal
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Request, Stop, Vehicle};

    fn single_vehicle_instance() -> Arc<Instance> {
        // Vertices: 0 = depot origin, 1 = depot destination, 2/3 = request 0
        // pickup/delivery, 4/5 = request 1 pickup/delivery.
        Arc::new(Instance::from_parts(
            &[Vehicle {
                t_start: 0.0,
                t_limit: 100.0,
                speed: 1.0,
                capacity: 10.0,
                source: Stop { x: 0.0, y: 0.0, t_visit: 0.0 },
                target: Stop { x: 0.0, y: 0.0, t_visit: 0.0 },
            }],
            &[
                Request {
                    profit: 5.0,
                    t_create: 0.0,
                    demand: 1.0,
                    source: Stop { x: 1.0, y: 0.0, t_visit: 0.0 },
                    target: Stop { x: 2.0, y: 0.0, t_visit: 0.0 },
                },
                Request {
                    profit: 3.0,
                    t_create: 0.0,
                    demand: 2.0,
                    source: Stop { x: 0.0, y: 1.0, t_visit: 0.0 },
                    target: Stop { x: 0.0, y: 2.0, t_visit: 0.0 },
                },
            ],
        ))
    }

    fn serve_first(instance: &Arc<Instance>) -> Solution {
        Solution::from_paths(Arc::clone(instance), vec![vec![0, 2, 3, 1]]).unwrap()
    }

    fn serve_second(instance: &Arc<Instance>) -> Solution {
        Solution::from_paths(Arc::clone(instance), vec![vec![0, 4, 5, 1]]).unwrap()
    }

    #[test]
    fn derives_schedule_from_paths() {
        let instance = single_vehicle_instance();
        let solution = serve_first(&instance);

        assert_eq!(solution.t_travel(0), 4.0);
        assert_eq!(solution.total_profit(), 5.0);
        assert_eq!(solution.t_fulfill(0), 2.0);
        assert_eq!(solution.sum_t_fulfill(), 2.0);
        assert_eq!(solution.t_fulfill(1), 0.0);

        assert!(solution.x(0, 2, 0));
        assert!(solution.x(2, 3, 0));
        assert!(solution.x(3, 1, 0));
        assert!(!solution.x(0, 1, 0));

        assert!(solution.y(0, 0));
        assert!(!solution.y(1, 0));

        assert_eq!(solution.t(0, 0), 0.0);
        assert_eq!(solution.t(2, 0), 1.0);
        assert_eq!(solution.t(3, 0), 2.0);
        assert_eq!(solution.t(1, 0), 4.0);

        assert_eq!(solution.l(2, 0), 1.0);
        assert_eq!(solution.l(3, 0), 0.0);

        assert_eq!(solution.load(0, 1), 1.0);
        assert_eq!(solution.time(0, 3), 4.0);

        assert_eq!(solution.vehicle_r(0), Some(0));
        assert_eq!(solution.vehicle_r(1), None);
        assert_eq!(solution.vehicle_e(2, 3), Some(0));
        assert_eq!(solution.vehicle_e(3, 2), None);
        assert_eq!(solution.index_kv(0, 3), 2);
        assert_eq!(solution.index_kv(0, 4), 4);
    }

    #[test]
    fn release_time_lifts_service_times() {
        let instance = Arc::new(Instance::from_parts(
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
                t_create: 10.0,
                demand: 1.0,
                source: Stop { x: 1.0, y: 0.0, t_visit: 0.0 },
                target: Stop { x: 2.0, y: 0.0, t_visit: 0.0 },
            }],
        ));

        let solution = Solution::from_paths(Arc::clone(&instance), vec![vec![0, 2, 3, 1]]).unwrap();

        // The vehicle arrives at the pickup at 1 and waits until 10.
        assert_eq!(solution.t(2, 0), 10.0);
        assert_eq!(solution.t(3, 0), 11.0);
        assert_eq!(solution.t_fulfill(0), 1.0);

        // The waiting-free prefix times are untouched by the lift.
        assert_eq!(solution.time(0, 2), 2.0);
        assert_eq!(solution.t_travel(0), 4.0);

        assert_eq!(solution.check_constraints(), Ok(()));
    }

    #[test]
    fn decision_variable_round_trip() {
        let instance = single_vehicle_instance();
        let original = Solution::from_paths(Arc::clone(&instance), vec![vec![0, 2, 4, 3, 5, 1]])
            .unwrap();

        let nv = instance.num_vertices();
        let nr = instance.num_requests();
        let nk = instance.num_vehicles();

        let mut x = vec![vec![vec![false; nk]; nv]; nv];
        let mut y = vec![vec![false; nk]; nr];
        let mut t = vec![vec![0.0; nk]; nv];
        let mut l = vec![vec![0.0; nk]; nv];

        for i in 0..nv {
            for j in 0..nv {
                for k in 0..nk {
                    x[i][j][k] = original.x(i, j, k);
                }
            }
        }

        for r in 0..nr {
            for k in 0..nk {
                y[r][k] = original.y(r, k);
            }
        }

        for i in 0..nv {
            for k in 0..nk {
                t[i][k] = original.t(i, k);
                l[i][k] = original.l(i, k);
            }
        }

        let rebuilt = Solution::from_decision_variables(Arc::clone(&instance), x, y, t, l).unwrap();

        assert_eq!(rebuilt.paths(), original.paths());
        assert_eq!(rebuilt.total_profit(), original.total_profit());
        assert_eq!(rebuilt.sum_t_fulfill(), original.sum_t_fulfill());
    }

    #[test]
    fn reconstruction_rejects_broken_edge_sets() {
        let instance = single_vehicle_instance();
        let nv = instance.num_vertices();

        // An edge out of the depot that never reaches the depot destination.
        let mut x = vec![vec![vec![false; 1]; nv]; nv];
        x[0][2][0] = true;

        let result = Solution::from_decision_variables(
            Arc::clone(&instance),
            x,
            vec![vec![false; 1]; 2],
            vec![vec![0.0; 1]; nv],
            vec![vec![0.0; 1]; nv],
        );

        assert_eq!(
            result.unwrap_err(),
            SolutionError::PathReconstruction { vehicle: 0 }
        );
    }

    #[test]
    fn path_validity_codes() {
        let instance = single_vehicle_instance();

        let wrong_first = Solution::from_paths(Arc::clone(&instance), vec![vec![2, 3, 1]]).unwrap();
        assert_eq!(wrong_first.validate_path(0).unwrap_err().code(), 1);

        let wrong_last = Solution::from_paths(Arc::clone(&instance), vec![vec![0, 2, 3]]).unwrap();
        assert_eq!(wrong_last.validate_path(0).unwrap_err().code(), 2);

        let ok = serve_first(&instance);
        assert_eq!(ok.validate_path(0), Ok(()));
        assert_eq!(ok.check_feasibility(), Ok(()));
    }

    #[test]
    fn travel_budget_and_capacity_violations() {
        let tight = Arc::new(Instance::from_parts(
            &[Vehicle {
                t_start: 0.0,
                t_limit: 3.0,
                speed: 1.0,
                capacity: 0.5,
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
        ));

        let solution = Solution::from_paths(Arc::clone(&tight), vec![vec![0, 2, 3, 1]]).unwrap();
        // The travel budget trips first; capacity would be code 4.
        assert_eq!(solution.validate_path(0).unwrap_err().code(), 3);
        assert_eq!(solution.check_feasibility().unwrap_err().code(), 1);
    }

    #[test]
    fn feasible_paths_satisfy_all_constraints() {
        let instance = single_vehicle_instance();

        for paths in [
            vec![vec![0, 1]],
            vec![vec![0, 2, 3, 1]],
            vec![vec![0, 4, 5, 1]],
            vec![vec![0, 2, 4, 3, 5, 1]],
            vec![vec![0, 2, 3, 4, 5, 1]],
        ] {
            let solution = Solution::from_paths(Arc::clone(&instance), paths).unwrap();
            assert_eq!(solution.check_feasibility(), Ok(()));
            assert_eq!(solution.check_constraints(), Ok(()));
        }
    }

    #[test]
    fn undelivered_pickup_violates_flow_balance() {
        let instance = single_vehicle_instance();
        let solution = Solution::from_paths(Arc::clone(&instance), vec![vec![0, 2, 1]]).unwrap();

        // The pickup is left but its delivery is never entered: clause 3
        // trips before the depot-load clauses get a chance to.
        assert_eq!(solution.check_constraints().unwrap_err().code(), 3);
    }

    #[test]
    fn doctored_times_violate_propagation() {
        let instance = single_vehicle_instance();
        let good = serve_first(&instance);

        let nv = instance.num_vertices();
        let nk = instance.num_vehicles();

        let mut x = vec![vec![vec![false; nk]; nv]; nv];
        let mut y = vec![vec![false; nk]; 2];
        let mut t = vec![vec![0.0; nk]; nv];
        let mut l = vec![vec![0.0; nk]; nv];

        for i in 0..nv {
            for j in 0..nv {
                x[i][j][0] = good.x(i, j, 0);
            }
        }

        for r in 0..2 {
            y[r][0] = good.y(r, 0);
        }

        for i in 0..nv {
            t[i][0] = good.t(i, 0);
            l[i][0] = good.l(i, 0);
        }

        // Pretend the vehicle is back at its depot before it could travel
        // there from the delivery; the pickup-to-delivery leg itself stays
        // plausible, so the edge-propagation clause is the one that trips.
        t[1][0] = 2.5;

        let solution = Solution::from_decision_variables(Arc::clone(&instance), x, y, t, l).unwrap();
        assert_eq!(solution.check_constraints().unwrap_err().code(), 14);
    }

    #[test]
    fn doctored_request_span_violates_direct_travel_time() {
        let instance = single_vehicle_instance();
        let good = serve_first(&instance);

        let nv = instance.num_vertices();
        let nk = instance.num_vehicles();

        let mut x = vec![vec![vec![false; nk]; nv]; nv];
        let mut y = vec![vec![false; nk]; 2];
        let mut t = vec![vec![0.0; nk]; nv];
        let mut l = vec![vec![0.0; nk]; nv];

        for i in 0..nv {
            for j in 0..nv {
                x[i][j][0] = good.x(i, j, 0);
            }
        }

        for r in 0..2 {
            y[r][0] = good.y(r, 0);
        }

        for i in 0..nv {
            t[i][0] = good.t(i, 0);
            l[i][0] = good.l(i, 0);
        }

        // The delivery is scheduled half a unit after the pickup, faster
        // than the unit-length leg allows at speed 1.
        t[3][0] = t[2][0] + 0.5;

        let solution = Solution::from_decision_variables(Arc::clone(&instance), x, y, t, l).unwrap();
        assert_eq!(solution.check_constraints().unwrap_err().code(), 13);
    }

    #[test]
    fn dominance_is_a_strict_partial_order() {
        let instance = single_vehicle_instance();

        let idle = Solution::from_paths(Arc::clone(&instance), vec![vec![0, 1]]).unwrap();
        let direct = serve_first(&instance);
        let second = serve_second(&instance);

        // Same profit as `direct`, strictly later delivery: detours through
        // the other request's pickup without ever delivering it.
        let detour =
            Solution::from_paths(Arc::clone(&instance), vec![vec![0, 4, 2, 3, 1]]).unwrap();
        let long_detour =
            Solution::from_paths(Arc::clone(&instance), vec![vec![0, 2, 4, 3, 1]]).unwrap();

        assert_eq!(detour.total_profit(), direct.total_profit());
        assert!(detour.sum_t_fulfill() > direct.sum_t_fulfill());
        assert!(long_detour.sum_t_fulfill() > detour.sum_t_fulfill());

        // Irreflexive.
        for s in [&idle, &direct, &second, &detour, &long_detour] {
            assert!(!s.dominates(s));
        }

        // direct (5, 2) vs second (3, 4): a genuine trade-off.
        assert!(!direct.dominates(&second));
        assert!(!second.dominates(&direct));

        // Equal profit, strictly faster fulfillment dominates; antisymmetry.
        assert!(direct.dominates(&detour));
        assert!(!detour.dominates(&direct));

        // Transitive along the chain direct -> detour -> long_detour.
        assert!(detour.dominates(&long_detour));
        assert!(direct.dominates(&long_detour));

        // The idle plan (0, 0) trades profit for time against every server.
        assert!(!idle.dominates(&direct) && !direct.dominates(&idle));
    }

    #[test]
    fn ordering_prefers_profit_then_fulfillment() {
        let instance = single_vehicle_instance();

        let idle = Solution::from_paths(Arc::clone(&instance), vec![vec![0, 1]]).unwrap();
        let first = serve_first(&instance);
        let second = serve_second(&instance);

        assert!(first < second);
        assert!(second < idle);
        assert!(first < idle);

        assert_eq!(first.cmp(&serve_first(&instance)), Ordering::Equal);
        assert_eq!(first, serve_first(&instance));
        assert_ne!(first, second);
    }

    #[test]
    fn text_round_trip() {
        let instance = single_vehicle_instance();
        let solution =
            Solution::from_paths(Arc::clone(&instance), vec![vec![0, 2, 4, 3, 5, 1]]).unwrap();

        let mut buffer = Vec::new();
        solution.write(&mut buffer).unwrap();

        assert_eq!(String::from_utf8_lossy(&buffer), "6\n0 2 4 3 5 1\n");

        let reread = Solution::read(Arc::clone(&instance), buffer.as_slice()).unwrap();
        assert_eq!(reread, solution);
    }
}
