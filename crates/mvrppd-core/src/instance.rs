//! Immutable MVRPPD problem definition.
//!
//! An instance owns `2|R| + 2|K|` vertices: two per request (pickup source,
//! delivery target) and two per vehicle (depot origin, depot destination).
//! Vertices are numbered in declaration order, each belonging to exactly one
//! owner. Construction derives the per-vertex back-references, the signed
//! per-vertex demands and the full Euclidean edge-length matrix once; the
//! instance is immutable afterwards.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::read::{ReadError, Tokens};
use crate::FLOAT_EPS;

/// A vertex as declared in an instance: planar position plus service duration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub x: f64,
    pub y: f64,
    pub t_visit: f64,
}

/// Declaration of one vehicle of the fleet.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Earliest time the vehicle may leave its depot origin.
    pub t_start: f64,
    /// Maximum operating duration.
    pub t_limit: f64,
    pub speed: f64,
    pub capacity: f64,
    pub source: Stop,
    pub target: Stop,
}

/// Declaration of one transportation request.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Profit earned when both endpoints are visited in order by one vehicle.
    pub profit: f64,
    /// Release time: the pickup may not be serviced earlier.
    pub t_create: f64,
    pub demand: f64,
    pub source: Stop,
    pub target: Stop,
}

/// Raw column-vector form of an instance, mirroring the internal layout.
///
/// This is the structured-input constructor argument and the JSON-facing
/// representation. `lengths`, when present, overrides the Euclidean edge
/// matrix otherwise derived from the coordinates; the integrity validator
/// checks symmetry and the triangle inequality on whatever matrix ends up
/// in effect.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceData {
    pub num_requests: usize,
    pub num_vehicles: usize,
    pub num_vertices: usize,
    pub profits: Vec<f64>,
    pub t_creates: Vec<f64>,
    pub demands_r: Vec<f64>,
    pub sources_r: Vec<usize>,
    pub targets_r: Vec<usize>,
    pub t_starts: Vec<f64>,
    pub t_limits: Vec<f64>,
    pub speeds: Vec<f64>,
    pub capacities: Vec<f64>,
    pub sources_k: Vec<usize>,
    pub targets_k: Vec<usize>,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub t_visits: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lengths: Option<Vec<Vec<f64>>>,
}

/// Integrity defect of an instance, found by [`Instance::validate`].
///
/// These are preconditions on the problem definition, not solution
/// feasibility. [`InstanceError::code`] recovers the stable 1..=35 numbering.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum InstanceError {
    #[error("vertex count differs from 2|R| + 2|K|")]
    VertexCount,
    #[error("expected |R| profit values")]
    ProfitCount,
    #[error("expected |R| release time values")]
    TCreateCount,
    #[error("expected |R| demand values")]
    DemandCount,
    #[error("expected |R| request source vertices")]
    RequestSourceCount,
    #[error("expected |R| request target vertices")]
    RequestTargetCount,
    #[error("expected |K| start time values")]
    TStartCount,
    #[error("expected |K| operating limit values")]
    TLimitCount,
    #[error("expected |K| speed values")]
    SpeedCount,
    #[error("expected |K| capacity values")]
    CapacityCount,
    #[error("expected |K| vehicle source vertices")]
    VehicleSourceCount,
    #[error("expected |K| vehicle target vertices")]
    VehicleTargetCount,
    #[error("expected |V| visit duration values")]
    TVisitCount,
    #[error("expected |V| rows in the length matrix")]
    LengthRowCount,
    #[error("length matrix row {row} is not |V| wide")]
    LengthColumnCount { row: usize },
    #[error("request {request} has a negative profit")]
    NegativeProfit { request: usize },
    #[error("request {request} has a negative release time")]
    NegativeTCreate { request: usize },
    #[error("request {request} has a negative demand")]
    NegativeDemand { request: usize },
    #[error("vehicle {vehicle} has a negative start time")]
    NegativeTStart { vehicle: usize },
    #[error("vehicle {vehicle} has a negative operating limit")]
    NegativeTLimit { vehicle: usize },
    #[error("vehicle {vehicle} has a non-positive speed")]
    NonPositiveSpeed { vehicle: usize },
    #[error("vehicle {vehicle} has a negative capacity")]
    NegativeCapacity { vehicle: usize },
    #[error("request {request} has an out-of-bounds source vertex")]
    RequestSourceOutOfBounds { request: usize },
    #[error("request {request} has an out-of-bounds target vertex")]
    RequestTargetOutOfBounds { request: usize },
    #[error("vehicle {vehicle} has an out-of-bounds source vertex")]
    VehicleSourceOutOfBounds { vehicle: usize },
    #[error("vehicle {vehicle} has an out-of-bounds target vertex")]
    VehicleTargetOutOfBounds { vehicle: usize },
    #[error("the source vertex of request {request} is already in use")]
    RequestSourceReused { request: usize },
    #[error("the target vertex of request {request} is already in use")]
    RequestTargetReused { request: usize },
    #[error("the source vertex of vehicle {vehicle} is already in use")]
    VehicleSourceReused { vehicle: usize },
    #[error("the target vertex of vehicle {vehicle} is already in use")]
    VehicleTargetReused { vehicle: usize },
    #[error("vertex {vertex} is not used exactly once")]
    VertexUseCount { vertex: usize },
    #[error("vertex {vertex} has a negative visit duration")]
    NegativeTVisit { vertex: usize },
    #[error("edge ({from}, {to}) has a negative length")]
    NegativeLength { from: usize, to: usize },
    #[error("edge lengths ({from}, {to}) and ({to}, {from}) are not symmetric")]
    AsymmetricLength { from: usize, to: usize },
    #[error("lengths ({from}, {to}) via {via} violate the triangle inequality")]
    TriangleInequality { from: usize, via: usize, to: usize },
}

impl InstanceError {
    /// Stable numeric code of this defect, in the order the validator checks.
    pub fn code(&self) -> u32 {
        use InstanceError::*;

        match self {
            VertexCount => 1,
            ProfitCount => 2,
            TCreateCount => 3,
            DemandCount => 4,
            RequestSourceCount => 5,
            RequestTargetCount => 6,
            TStartCount => 7,
            TLimitCount => 8,
            SpeedCount => 9,
            CapacityCount => 10,
            VehicleSourceCount => 11,
            VehicleTargetCount => 12,
            TVisitCount => 13,
            LengthRowCount => 14,
            LengthColumnCount { .. } => 15,
            NegativeProfit { .. } => 16,
            NegativeTCreate { .. } => 17,
            NegativeDemand { .. } => 18,
            NegativeTStart { .. } => 19,
            NegativeTLimit { .. } => 20,
            NonPositiveSpeed { .. } => 21,
            NegativeCapacity { .. } => 22,
            RequestSourceOutOfBounds { .. } => 23,
            RequestTargetOutOfBounds { .. } => 24,
            VehicleSourceOutOfBounds { .. } => 25,
            VehicleTargetOutOfBounds { .. } => 26,
            RequestSourceReused { .. } => 27,
            RequestTargetReused { .. } => 28,
            VehicleSourceReused { .. } => 29,
            VehicleTargetReused { .. } => 30,
            VertexUseCount { .. } => 31,
            NegativeTVisit { .. } => 32,
            NegativeLength { .. } => 33,
            AsymmetricLength { .. } => 34,
            TriangleInequality { .. } => 35,
        }
    }
}

/// Immutable MVRPPD problem definition.
#[derive(Clone, Debug, Default)]
pub struct Instance {
    num_requests: usize,
    num_vehicles: usize,
    num_vertices: usize,
    sum_profit: f64,

    profits: Vec<f64>,
    t_creates: Vec<f64>,
    demands_r: Vec<f64>,
    sources_r: Vec<usize>,
    targets_r: Vec<usize>,

    t_starts: Vec<f64>,
    t_limits: Vec<f64>,
    speeds: Vec<f64>,
    capacities: Vec<f64>,
    sources_k: Vec<usize>,
    targets_k: Vec<usize>,

    xs: Vec<f64>,
    ys: Vec<f64>,
    t_visits: Vec<f64>,

    requests_v: Vec<Option<usize>>,
    vehicles_v: Vec<Option<usize>>,
    is_source_v: Vec<bool>,
    is_target_v: Vec<bool>,
    demands_v: Vec<f64>,
    lengths: Vec<Vec<f64>>,
}

impl Instance {
    /// Builds an instance from its raw column-vector form.
    pub fn from_data(data: InstanceData) -> Self {
        let sum_profit = data.profits.iter().sum();

        let mut instance = Instance {
            num_requests: data.num_requests,
            num_vehicles: data.num_vehicles,
            num_vertices: data.num_vertices,
            sum_profit,
            profits: data.profits,
            t_creates: data.t_creates,
            demands_r: data.demands_r,
            sources_r: data.sources_r,
            targets_r: data.targets_r,
            t_starts: data.t_starts,
            t_limits: data.t_limits,
            speeds: data.speeds,
            capacities: data.capacities,
            sources_k: data.sources_k,
            targets_k: data.targets_k,
            xs: data.xs,
            ys: data.ys,
            t_visits: data.t_visits,
            requests_v: Vec::new(),
            vehicles_v: Vec::new(),
            is_source_v: Vec::new(),
            is_target_v: Vec::new(),
            demands_v: Vec::new(),
            lengths: Vec::new(),
        };

        instance.init(data.lengths);
        instance
    }

    /// Builds an instance from declaration lists, allocating two vertices per
    /// vehicle and then two per request, in order.
    pub fn from_parts(vehicles: &[Vehicle], requests: &[Request]) -> Self {
        let mut data = InstanceData::default();

        for vehicle in vehicles {
            data.t_starts.push(vehicle.t_start);
            data.t_limits.push(vehicle.t_limit);
            data.speeds.push(vehicle.speed);
            data.capacities.push(vehicle.capacity);

            let source = push_stop(&mut data, &vehicle.source);
            let target = push_stop(&mut data, &vehicle.target);
            data.sources_k.push(source);
            data.targets_k.push(target);
            data.num_vehicles += 1;
        }

        for request in requests {
            data.profits.push(request.profit);
            data.t_creates.push(request.t_create);
            data.demands_r.push(request.demand);

            let source = push_stop(&mut data, &request.source);
            let target = push_stop(&mut data, &request.target);
            data.sources_r.push(source);
            data.targets_r.push(target);
            data.num_requests += 1;
        }

        Self::from_data(data)
    }

    /// Reads an instance from a `k`/`r` block stream. Any other leading
    /// character terminates parsing; the remainder of the stream is ignored.
    pub fn read(reader: impl Read) -> Result<Self, ReadError> {
        let mut tokens = Tokens::from_reader(reader)?;
        let mut vehicles = Vec::new();
        let mut requests = Vec::new();

        while let Some(token) = tokens.peek() {
            match token.chars().next() {
                Some('k') => {
                    let rest = token[1..].to_string();
                    tokens.advance();

                    vehicles.push(Vehicle {
                        t_start: tokens.number_after_marker(&rest, "vehicle start time")?,
                        t_limit: tokens.number("vehicle operating limit")?,
                        speed: tokens.number("vehicle speed")?,
                        capacity: tokens.number("vehicle capacity")?,
                        source: read_stop(&mut tokens)?,
                        target: read_stop(&mut tokens)?,
                    });
                }
                Some('r') => {
                    let rest = token[1..].to_string();
                    tokens.advance();

                    requests.push(Request {
                        profit: tokens.number_after_marker(&rest, "request profit")?,
                        t_create: tokens.number("request release time")?,
                        demand: tokens.number("request demand")?,
                        source: read_stop(&mut tokens)?,
                        target: read_stop(&mut tokens)?,
                    });
                }
                _ => break,
            }
        }

        Ok(Self::from_parts(&vehicles, &requests))
    }

    /// Reads an instance from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        Self::read(BufReader::new(File::open(path)?))
    }

    /// Writes this instance in the block format understood by [`Instance::read`].
    pub fn write(&self, writer: impl Write) -> io::Result<()> {
        let mut writer = writer;

        for k in 0..self.num_vehicles {
            let src = self.sources_k[k];
            let dst = self.targets_k[k];

            writeln!(
                writer,
                "k{} {} {} {} {} {} {} {} {} {}",
                self.t_starts[k],
                self.t_limits[k],
                self.speeds[k],
                self.capacities[k],
                self.xs[src],
                self.ys[src],
                self.t_visits[src],
                self.xs[dst],
                self.ys[dst],
                self.t_visits[dst],
            )?;
        }

        for r in 0..self.num_requests {
            let src = self.sources_r[r];
            let dst = self.targets_r[r];

            writeln!(
                writer,
                "r{} {} {} {} {} {} {} {} {}",
                self.profits[r],
                self.t_creates[r],
                self.demands_r[r],
                self.xs[src],
                self.ys[src],
                self.t_visits[src],
                self.xs[dst],
                self.ys[dst],
                self.t_visits[dst],
            )?;
        }

        Ok(())
    }

    /// Writes this instance to a file.
    pub fn write_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()
    }

    /// Recovers the raw column-vector form, suitable for JSON serialization.
    pub fn to_data(&self) -> InstanceData {
        InstanceData {
            num_requests: self.num_requests,
            num_vehicles: self.num_vehicles,
            num_vertices: self.num_vertices,
            profits: self.profits.clone(),
            t_creates: self.t_creates.clone(),
            demands_r: self.demands_r.clone(),
            sources_r: self.sources_r.clone(),
            targets_r: self.targets_r.clone(),
            t_starts: self.t_starts.clone(),
            t_limits: self.t_limits.clone(),
            speeds: self.speeds.clone(),
            capacities: self.capacities.clone(),
            sources_k: self.sources_k.clone(),
            targets_k: self.targets_k.clone(),
            xs: self.xs.clone(),
            ys: self.ys.clone(),
            t_visits: self.t_visits.clone(),
            lengths: Some(self.lengths.clone()),
        }
    }

    /// Fills the vertex back-references, the signed per-vertex demands and
    /// the edge-length matrix. Out-of-range vertex ids are left for the
    /// validator to report.
    fn init(&mut self, lengths: Option<Vec<Vec<f64>>>) {
        let n = self.num_vertices;

        self.requests_v = vec![None; n];
        self.vehicles_v = vec![None; n];
        self.is_source_v = vec![false; n];
        self.is_target_v = vec![false; n];
        self.demands_v = vec![0.0; n];

        for r in 0..self.num_requests {
            let source = self.sources_r.get(r).copied();
            let target = self.targets_r.get(r).copied();

            if let Some(v) = source.filter(|&v| v < n) {
                self.requests_v[v] = Some(r);
                self.is_source_v[v] = true;
                self.demands_v[v] = self.demands_r.get(r).copied().unwrap_or(0.0);
            }

            if let Some(v) = target.filter(|&v| v < n) {
                self.requests_v[v] = Some(r);
                self.is_target_v[v] = true;
                self.demands_v[v] = -self.demands_r.get(r).copied().unwrap_or(0.0);
            }
        }

        for k in 0..self.num_vehicles {
            let source = self.sources_k.get(k).copied();
            let target = self.targets_k.get(k).copied();

            if let Some(v) = source.filter(|&v| v < n) {
                self.vehicles_v[v] = Some(k);
                self.is_source_v[v] = true;
            }

            if let Some(v) = target.filter(|&v| v < n) {
                self.vehicles_v[v] = Some(k);
                self.is_target_v[v] = true;
            }
        }

        self.lengths = lengths.unwrap_or_else(|| {
            let coord = |v: usize| {
                (
                    self.xs.get(v).copied().unwrap_or(0.0),
                    self.ys.get(v).copied().unwrap_or(0.0),
                )
            };

            (0..n)
                .map(|u| {
                    let (ux, uy) = coord(u);

                    (0..n)
                        .map(|v| {
                            let (vx, vy) = coord(v);
                            ((ux - vx) * (ux - vx) + (uy - vy) * (uy - vy)).sqrt()
                        })
                        .collect()
                })
                .collect()
        });
    }

    pub fn num_requests(&self) -> usize {
        self.num_requests
    }

    pub fn num_vehicles(&self) -> usize {
        self.num_vehicles
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    /// Sum of all request profits.
    pub fn sum_profit(&self) -> f64 {
        self.sum_profit
    }

    pub fn profit(&self, r: usize) -> f64 {
        self.profits[r]
    }

    pub fn t_create(&self, r: usize) -> f64 {
        self.t_creates[r]
    }

    pub fn demand_r(&self, r: usize) -> f64 {
        self.demands_r[r]
    }

    pub fn source_r(&self, r: usize) -> usize {
        self.sources_r[r]
    }

    pub fn target_r(&self, r: usize) -> usize {
        self.targets_r[r]
    }

    pub fn t_start(&self, k: usize) -> f64 {
        self.t_starts[k]
    }

    pub fn t_limit(&self, k: usize) -> f64 {
        self.t_limits[k]
    }

    pub fn speed(&self, k: usize) -> f64 {
        self.speeds[k]
    }

    pub fn capacity(&self, k: usize) -> f64 {
        self.capacities[k]
    }

    pub fn source_k(&self, k: usize) -> usize {
        self.sources_k[k]
    }

    pub fn target_k(&self, k: usize) -> usize {
        self.targets_k[k]
    }

    pub fn x(&self, v: usize) -> f64 {
        self.xs[v]
    }

    pub fn y(&self, v: usize) -> f64 {
        self.ys[v]
    }

    pub fn t_visit(&self, v: usize) -> f64 {
        self.t_visits[v]
    }

    /// The request owning vertex `v`, if any.
    pub fn request_v(&self, v: usize) -> Option<usize> {
        self.requests_v[v]
    }

    /// The vehicle owning vertex `v`, if any.
    pub fn vehicle_v(&self, v: usize) -> Option<usize> {
        self.vehicles_v[v]
    }

    pub fn is_source(&self, v: usize) -> bool {
        self.is_source_v[v]
    }

    pub fn is_target(&self, v: usize) -> bool {
        self.is_target_v[v]
    }

    /// Signed demand at vertex `v`: `+d_r` at a request source, `-d_r` at a
    /// request target, zero at depots.
    pub fn demand_v(&self, v: usize) -> f64 {
        self.demands_v[v]
    }

    pub fn length(&self, u: usize, v: usize) -> f64 {
        self.lengths[u][v]
    }

    /// Checks the integrity preconditions, in the fixed order that defines
    /// the error codes: size agreement of every per-entity vector, sign
    /// constraints, vertex-id bounds, exactly-once vertex usage, and the
    /// metric properties of the length matrix.
    pub fn validate(&self) -> Result<(), InstanceError> {
        use InstanceError::*;

        if self.num_vertices != 2 * self.num_requests + 2 * self.num_vehicles {
            return Err(VertexCount);
        }

        if self.profits.len() != self.num_requests {
            return Err(ProfitCount);
        }

        if self.t_creates.len() != self.num_requests {
            return Err(TCreateCount);
        }

        if self.demands_r.len() != self.num_requests {
            return Err(DemandCount);
        }

        if self.sources_r.len() != self.num_requests {
            return Err(RequestSourceCount);
        }

        if self.targets_r.len() != self.num_requests {
            return Err(RequestTargetCount);
        }

        if self.t_starts.len() != self.num_vehicles {
            return Err(TStartCount);
        }

        if self.t_limits.len() != self.num_vehicles {
            return Err(TLimitCount);
        }

        if self.speeds.len() != self.num_vehicles {
            return Err(SpeedCount);
        }

        if self.capacities.len() != self.num_vehicles {
            return Err(CapacityCount);
        }

        if self.sources_k.len() != self.num_vehicles {
            return Err(VehicleSourceCount);
        }

        if self.targets_k.len() != self.num_vehicles {
            return Err(VehicleTargetCount);
        }

        if self.t_visits.len() != self.num_vertices {
            return Err(TVisitCount);
        }

        if self.lengths.len() != self.num_vertices {
            return Err(LengthRowCount);
        }

        for (row, lengths) in self.lengths.iter().enumerate() {
            if lengths.len() != self.num_vertices {
                return Err(LengthColumnCount { row });
            }
        }

        for (request, &profit) in self.profits.iter().enumerate() {
            if profit < 0.0 {
                return Err(NegativeProfit { request });
            }
        }

        for (request, &t_create) in self.t_creates.iter().enumerate() {
            if t_create < 0.0 {
                return Err(NegativeTCreate { request });
            }
        }

        for (request, &demand) in self.demands_r.iter().enumerate() {
            if demand < 0.0 {
                return Err(NegativeDemand { request });
            }
        }

        for (vehicle, &t_start) in self.t_starts.iter().enumerate() {
            if t_start < 0.0 {
                return Err(NegativeTStart { vehicle });
            }
        }

        for (vehicle, &t_limit) in self.t_limits.iter().enumerate() {
            if t_limit < 0.0 {
                return Err(NegativeTLimit { vehicle });
            }
        }

        for (vehicle, &speed) in self.speeds.iter().enumerate() {
            if speed <= 0.0 {
                return Err(NonPositiveSpeed { vehicle });
            }
        }

        for (vehicle, &capacity) in self.capacities.iter().enumerate() {
            if capacity < 0.0 {
                return Err(NegativeCapacity { vehicle });
            }
        }

        for (request, &v) in self.sources_r.iter().enumerate() {
            if v >= self.num_vertices {
                return Err(RequestSourceOutOfBounds { request });
            }
        }

        for (request, &v) in self.targets_r.iter().enumerate() {
            if v >= self.num_vertices {
                return Err(RequestTargetOutOfBounds { request });
            }
        }

        for (vehicle, &v) in self.sources_k.iter().enumerate() {
            if v >= self.num_vertices {
                return Err(VehicleSourceOutOfBounds { vehicle });
            }
        }

        for (vehicle, &v) in self.targets_k.iter().enumerate() {
            if v >= self.num_vertices {
                return Err(VehicleTargetOutOfBounds { vehicle });
            }
        }

        let mut used = vec![0u32; self.num_vertices];

        for (request, &v) in self.sources_r.iter().enumerate() {
            if used[v] > 0 {
                return Err(RequestSourceReused { request });
            }

            used[v] += 1;
        }

        for (request, &v) in self.targets_r.iter().enumerate() {
            if used[v] > 0 {
                return Err(RequestTargetReused { request });
            }

            used[v] += 1;
        }

        for (vehicle, &v) in self.sources_k.iter().enumerate() {
            if used[v] > 0 {
                return Err(VehicleSourceReused { vehicle });
            }

            used[v] += 1;
        }

        for (vehicle, &v) in self.targets_k.iter().enumerate() {
            if used[v] > 0 {
                return Err(VehicleTargetReused { vehicle });
            }

            used[v] += 1;
        }

        for (vertex, &count) in used.iter().enumerate() {
            if count != 1 {
                return Err(VertexUseCount { vertex });
            }
        }

        for (vertex, &t_visit) in self.t_visits.iter().enumerate() {
            if t_visit < 0.0 {
                return Err(NegativeTVisit { vertex });
            }
        }

        for from in 0..self.num_vertices {
            for to in 0..self.num_vertices {
                if self.lengths[from][to] < 0.0 {
                    return Err(NegativeLength { from, to });
                }
            }
        }

        for from in 0..self.num_vertices {
            for to in 0..self.num_vertices {
                if (self.lengths[from][to] - self.lengths[to][from]).abs() > FLOAT_EPS {
                    return Err(AsymmetricLength { from, to });
                }
            }
        }

        for from in 0..self.num_vertices {
            for via in 0..self.num_vertices {
                for to in 0..self.num_vertices {
                    if self.lengths[from][to] > self.lengths[from][via] + self.lengths[via][to] + FLOAT_EPS
                    {
                        return Err(TriangleInequality { from, via, to });
                    }
                }
            }
        }

        Ok(())
    }

    /// Whether the integrity preconditions hold.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

fn push_stop(data: &mut InstanceData, stop: &Stop) -> usize {
    let vertex = data.num_vertices;

    data.xs.push(stop.x);
    data.ys.push(stop.y);
    data.t_visits.push(stop.t_visit);
    data.num_vertices += 1;

    vertex
}

fn read_stop(tokens: &mut Tokens) -> Result<Stop, ReadError> {
    Ok(Stop {
        x: tokens.number("vertex x coordinate")?,
        y: tokens.number("vertex y coordinate")?,
        t_visit: tokens.number("vertex visit duration")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> Instance {
        Instance::from_parts(
            &[
                Vehicle {
                    t_start: 0.0,
                    t_limit: 100.0,
                    speed: 1.0,
                    capacity: 10.0,
                    source: Stop { x: 0.0, y: 0.0, t_visit: 0.0 },
                    target: Stop { x: 0.0, y: 0.0, t_visit: 0.0 },
                },
                Vehicle {
                    t_start: 5.0,
                    t_limit: 50.0,
                    speed: 2.0,
                    capacity: 4.0,
                    source: Stop { x: 10.0, y: 0.0, t_visit: 1.0 },
                    target: Stop { x: 10.0, y: 10.0, t_visit: 1.0 },
                },
            ],
            &[
                Request {
                    profit: 3.0,
                    t_create: 0.0,
                    demand: 1.0,
                    source: Stop { x: 1.0, y: 0.0, t_visit: 0.0 },
                    target: Stop { x: 2.0, y: 0.0, t_visit: 0.0 },
                },
                Request {
                    profit: 5.0,
                    t_create: 2.0,
                    demand: 2.0,
                    source: Stop { x: 0.0, y: 3.0, t_visit: 0.5 },
                    target: Stop { x: 0.0, y: 6.0, t_visit: 0.5 },
                },
            ],
        )
    }

    #[test]
    fn vertices_are_numbered_in_declaration_order() {
        let instance = two_by_two();

        assert_eq!(instance.num_vertices(), 8);
        assert_eq!(instance.source_k(0), 0);
        assert_eq!(instance.target_k(0), 1);
        assert_eq!(instance.source_k(1), 2);
        assert_eq!(instance.target_k(1), 3);
        assert_eq!(instance.source_r(0), 4);
        assert_eq!(instance.target_r(0), 5);
        assert_eq!(instance.source_r(1), 6);
        assert_eq!(instance.target_r(1), 7);
    }

    #[test]
    fn back_references_and_demands() {
        let instance = two_by_two();

        assert_eq!(instance.request_v(4), Some(0));
        assert_eq!(instance.request_v(5), Some(0));
        assert_eq!(instance.request_v(0), None);
        assert_eq!(instance.vehicle_v(0), Some(0));
        assert_eq!(instance.vehicle_v(3), Some(1));
        assert_eq!(instance.vehicle_v(6), None);

        assert!(instance.is_source(4) && !instance.is_target(4));
        assert!(instance.is_target(5) && !instance.is_source(5));

        assert_eq!(instance.demand_v(4), 1.0);
        assert_eq!(instance.demand_v(5), -1.0);
        assert_eq!(instance.demand_v(0), 0.0);

        assert_eq!(instance.sum_profit(), 8.0);
    }

    #[test]
    fn lengths_are_euclidean() {
        let instance = two_by_two();

        assert_eq!(instance.length(4, 5), 1.0);
        assert_eq!(instance.length(0, 4), 1.0);
        assert!((instance.length(2, 3) - 10.0).abs() < 1e-12);
        assert_eq!(instance.length(6, 7), 3.0);
        assert_eq!(instance.length(0, 0), 0.0);
    }

    #[test]
    fn valid_instance_passes_validation() {
        assert_eq!(two_by_two().validate(), Ok(()));
    }

    #[test]
    fn parses_glued_block_markers() {
        let text = "k0 100 1 10 0 0 0 0 0 0\nr5 0 1 1 0 0 2 0 0\n";
        let instance = Instance::read(text.as_bytes()).unwrap();

        assert_eq!(instance.num_vehicles(), 1);
        assert_eq!(instance.num_requests(), 1);
        assert_eq!(instance.profit(0), 5.0);
        assert_eq!(instance.x(4), 1.0);
        assert_eq!(instance.x(5), 2.0);
    }

    #[test]
    fn parses_detached_block_markers() {
        let text = "k 0 100 1 10 0 0 0 0 0 0";
        let instance = Instance::read(text.as_bytes()).unwrap();

        assert_eq!(instance.num_vehicles(), 1);
        assert_eq!(instance.t_limit(0), 100.0);
    }

    #[test]
    fn foreign_marker_terminates_parsing() {
        let text = "k0 100 1 10 0 0 0 0 0 0\nstatistics follow here\n";
        let instance = Instance::read(text.as_bytes()).unwrap();

        assert_eq!(instance.num_vehicles(), 1);
        assert_eq!(instance.num_requests(), 0);
    }

    #[test]
    fn truncated_block_is_an_error() {
        let text = "k0 100 1";
        assert!(matches!(
            Instance::read(text.as_bytes()),
            Err(ReadError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn text_round_trip() {
        let instance = two_by_two();

        let mut buffer = Vec::new();
        instance.write(&mut buffer).unwrap();
        let reread = Instance::read(buffer.as_slice()).unwrap();

        let mut rewritten = Vec::new();
        reread.write(&mut rewritten).unwrap();

        assert_eq!(buffer, rewritten);
        assert_eq!(instance.to_data(), reread.to_data());
    }

    #[test]
    fn json_round_trip() {
        let instance = two_by_two();

        let json = serde_json::to_string(&instance.to_data()).unwrap();
        let data: InstanceData = serde_json::from_str(&json).unwrap();
        let reread = Instance::from_data(data);

        assert_eq!(instance.to_data(), reread.to_data());
    }
}
