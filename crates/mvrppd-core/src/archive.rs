//! Bounded archive of mutually comparable solutions.
//!
//! The archive keeps an ordered set of candidate solutions and, on demand,
//! partitions it into fronts by NSGA-II fast non-dominated sorting, orders
//! each front by descending crowding distance, and truncates the whole set
//! back to `max_size` by popping from the tail of the worst front.

use std::collections::BTreeSet;

use crate::solution::Solution;

/// A `max_size`-bounded set of solutions with lazily recomputed
/// non-dominated sorting.
#[derive(Clone, Debug, Default)]
pub struct ParetoArchive {
    max_size: usize,
    solutions: BTreeSet<Solution>,
    fronts: Vec<Vec<Solution>>,
    min_total_profits: Vec<f64>,
    max_total_profits: Vec<f64>,
    min_sum_t_fulfills: Vec<f64>,
    max_sum_t_fulfills: Vec<f64>,
    sorted: bool,
}

impl ParetoArchive {
    pub fn new(max_size: usize) -> Self {
        ParetoArchive {
            max_size,
            ..Default::default()
        }
    }

    /// Builds an archive from an initial solution collection, truncating
    /// immediately if it overflows.
    pub fn with_solutions(max_size: usize, solutions: impl IntoIterator<Item = Solution>) -> Self {
        let mut archive = Self::new(max_size);
        archive.insert_all(solutions);
        archive
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// The current solution set, in the total solution order.
    pub fn solutions(&self) -> &BTreeSet<Solution> {
        &self.solutions
    }

    /// Inserts a solution; duplicates (by path sequences) are ignored. An
    /// overflow past `max_size` triggers sorting and truncation eagerly.
    pub fn insert(&mut self, solution: Solution) {
        self.solutions.insert(solution);
        self.sorted = false;

        if self.solutions.len() > self.max_size {
            self.sort();
        }
    }

    /// Inserts every solution of a collection.
    pub fn insert_all(&mut self, solutions: impl IntoIterator<Item = Solution>) {
        for solution in solutions {
            self.solutions.insert(solution);
        }

        self.sorted = false;

        if self.solutions.len() > self.max_size {
            self.sort();
        }
    }

    /// The non-dominated fronts, best first, each ordered by descending
    /// crowding distance.
    pub fn fronts(&mut self) -> &[Vec<Solution>] {
        self.ensure_sorted();
        &self.fronts
    }

    /// The `f`-th front.
    pub fn front(&mut self, f: usize) -> &[Solution] {
        self.ensure_sorted();
        &self.fronts[f]
    }

    /// Minimum total profit of the `f`-th front.
    pub fn min_total_profit(&mut self, f: usize) -> f64 {
        self.ensure_sorted();
        self.min_total_profits[f]
    }

    /// Maximum total profit of the `f`-th front.
    pub fn max_total_profit(&mut self, f: usize) -> f64 {
        self.ensure_sorted();
        self.max_total_profits[f]
    }

    /// Minimum fulfillment-time sum of the `f`-th front.
    pub fn min_sum_t_fulfill(&mut self, f: usize) -> f64 {
        self.ensure_sorted();
        self.min_sum_t_fulfills[f]
    }

    /// Maximum fulfillment-time sum of the `f`-th front.
    pub fn max_sum_t_fulfill(&mut self, f: usize) -> f64 {
        self.ensure_sorted();
        self.max_sum_t_fulfills[f]
    }

    fn ensure_sorted(&mut self) {
        if !self.sorted {
            self.sort();
        }
    }

    fn sort(&mut self) {
        let solutions: Vec<Solution> = self.solutions.iter().cloned().collect();
        let n = solutions.len();

        // Fast non-dominated sorting: count dominators, remember dominated
        // sets, peel fronts off by repeatedly releasing solutions whose
        // domination count reaches zero.
        let mut dominated: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut domination_count = vec![0usize; n];
        let mut front_indices: Vec<Vec<usize>> = vec![Vec::new()];

        for p in 0..n {
            for q in 0..n {
                if solutions[p].dominates(&solutions[q]) {
                    dominated[p].push(q);
                } else if solutions[q].dominates(&solutions[p]) {
                    domination_count[p] += 1;
                }
            }

            if domination_count[p] == 0 {
                front_indices[0].push(p);
            }
        }

        let mut f = 0;
        while !front_indices[f].is_empty() {
            let mut next = Vec::new();

            for &p in &front_indices[f] {
                for &q in &dominated[p] {
                    domination_count[q] -= 1;

                    if domination_count[q] == 0 {
                        next.push(q);
                    }
                }
            }

            front_indices.push(next);
            f += 1;
        }

        while front_indices.last().is_some_and(Vec::is_empty) {
            front_indices.pop();
        }

        self.fronts = front_indices
            .iter()
            .map(|front| front.iter().map(|&p| solutions[p].clone()).collect())
            .collect();

        self.min_total_profits = vec![f64::MAX; self.fronts.len()];
        self.max_total_profits = vec![f64::MIN; self.fronts.len()];
        self.min_sum_t_fulfills = vec![f64::MAX; self.fronts.len()];
        self.max_sum_t_fulfills = vec![f64::MIN; self.fronts.len()];

        // Crowding distance within each front, accumulated over both
        // objectives; the extremes of either objective are pinned to the
        // maximum distance so truncation touches them last.
        for f in 0..self.fronts.len() {
            let front = self.fronts[f].clone();
            let m = front.len();
            let mut distance = vec![0.0f64; m];

            let mut by_profit: Vec<usize> = (0..m).collect();
            by_profit.sort_by(|&a, &b| {
                front[a]
                    .total_profit()
                    .total_cmp(&front[b].total_profit())
                    .then(a.cmp(&b))
            });

            self.min_total_profits[f] = front[by_profit[0]].total_profit();
            self.max_total_profits[f] = front[by_profit[m - 1]].total_profit();

            distance[by_profit[0]] = f64::MAX;
            distance[by_profit[m - 1]] = f64::MAX;

            let profit_range = self.max_total_profits[f] - self.min_total_profits[f];

            for i in 1..m.saturating_sub(1) {
                if distance[by_profit[i]] < f64::MAX && profit_range > 0.0 {
                    distance[by_profit[i]] += (front[by_profit[i + 1]].total_profit()
                        - front[by_profit[i - 1]].total_profit())
                        / profit_range;
                }
            }

            let mut by_fulfill: Vec<usize> = (0..m).collect();
            by_fulfill.sort_by(|&a, &b| {
                front[a]
                    .sum_t_fulfill()
                    .total_cmp(&front[b].sum_t_fulfill())
                    .then(a.cmp(&b))
            });

            self.min_sum_t_fulfills[f] = front[by_fulfill[0]].sum_t_fulfill();
            self.max_sum_t_fulfills[f] = front[by_fulfill[m - 1]].sum_t_fulfill();

            distance[by_fulfill[0]] = f64::MAX;
            distance[by_fulfill[m - 1]] = f64::MAX;

            let fulfill_range = self.max_sum_t_fulfills[f] - self.min_sum_t_fulfills[f];

            for i in 1..m.saturating_sub(1) {
                if distance[by_fulfill[i]] < f64::MAX && fulfill_range > 0.0 {
                    distance[by_fulfill[i]] += (front[by_fulfill[i + 1]].sum_t_fulfill()
                        - front[by_fulfill[i - 1]].sum_t_fulfill())
                        / fulfill_range;
                }
            }

            let mut by_crowding: Vec<usize> = (0..m).collect();
            by_crowding.sort_by(|&a, &b| {
                distance[b].total_cmp(&distance[a]).then(b.cmp(&a))
            });

            self.fronts[f] = by_crowding.into_iter().map(|i| front[i].clone()).collect();
        }

        // Truncate from the tail of the worst front until the bound holds.
        while self.solutions.len() > self.max_size {
            while self.fronts.last().is_some_and(Vec::is_empty) {
                self.fronts.pop();
            }

            let Some(worst) = self.fronts.last_mut() else {
                break;
            };

            let Some(solution) = worst.pop() else {
                break;
            };

            self.solutions.remove(&solution);
        }

        self.sorted = true;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::instance::{Instance, Request, Stop, Vehicle};
    use crate::solution::Solution;

    /// One vehicle, three collinear requests of increasing profit and
    /// distance; serving farther requests earns more but takes longer.
    fn instance() -> Arc<Instance> {
        let request = |profit: f64, x: f64| Request {
            profit,
            t_create: 0.0,
            demand: 1.0,
            source: Stop { x, y: 0.0, t_visit: 0.0 },
            target: Stop { x: x + 1.0, y: 0.0, t_visit: 0.0 },
        };

        Arc::new(Instance::from_parts(
            &[Vehicle {
                t_start: 0.0,
                t_limit: 1000.0,
                speed: 1.0,
                capacity: 10.0,
                source: Stop { x: 0.0, y: 0.0, t_visit: 0.0 },
                target: Stop { x: 0.0, y: 0.0, t_visit: 0.0 },
            }],
            &[request(3.0, 1.0), request(5.0, 10.0), request(8.0, 100.0)],
        ))
    }

    fn solution(instance: &Arc<Instance>, path: Vec<usize>) -> Solution {
        Solution::from_paths(Arc::clone(instance), vec![path]).unwrap()
    }

    #[test]
    fn first_front_is_exactly_the_non_dominated_set() {
        let instance = instance();
        let mut archive = ParetoArchive::new(16);

        // Profit/time pairs: idle (0, 0), near (3, 2), mid (5, 11),
        // far (8, 101), and a dominated detour with profit 3 but more time.
        archive.insert(solution(&instance, vec![0, 1]));
        archive.insert(solution(&instance, vec![0, 2, 3, 1]));
        archive.insert(solution(&instance, vec![0, 4, 5, 1]));
        archive.insert(solution(&instance, vec![0, 6, 7, 1]));
        archive.insert(solution(&instance, vec![0, 4, 2, 3, 1]));

        let all: Vec<Solution> = archive.solutions().iter().cloned().collect();
        let first_front = archive.front(0).to_vec();

        for p in &all {
            let non_dominated = all.iter().all(|q| !q.dominates(p));
            let in_first = first_front.contains(p);
            assert_eq!(non_dominated, in_first);
        }

        assert_eq!(first_front.len(), 4);
        assert_eq!(archive.fronts().len(), 2);
    }

    #[test]
    fn duplicate_insertions_collapse() {
        let instance = instance();
        let mut archive = ParetoArchive::new(8);

        archive.insert(solution(&instance, vec![0, 2, 3, 1]));
        archive.insert(solution(&instance, vec![0, 2, 3, 1]));

        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn truncation_keeps_the_bound_and_prefers_extremes() {
        let instance = instance();
        let mut archive = ParetoArchive::new(3);

        // Four mutually non-dominated solutions; truncation must evict the
        // most crowded interior one, never an objective extreme.
        archive.insert(solution(&instance, vec![0, 1]));
        archive.insert(solution(&instance, vec![0, 2, 3, 1]));
        archive.insert(solution(&instance, vec![0, 4, 5, 1]));
        archive.insert(solution(&instance, vec![0, 6, 7, 1]));

        assert_eq!(archive.len(), 3);

        let profits: Vec<f64> = archive
            .solutions()
            .iter()
            .map(Solution::total_profit)
            .collect();

        // The extremes (idle and far) survive.
        assert!(profits.contains(&0.0));
        assert!(profits.contains(&8.0));
    }

    #[test]
    fn extremes_lead_the_front_ordering() {
        let instance = instance();
        let mut archive = ParetoArchive::new(16);

        archive.insert(solution(&instance, vec![0, 1]));
        archive.insert(solution(&instance, vec![0, 2, 3, 1]));
        archive.insert(solution(&instance, vec![0, 4, 5, 1]));
        archive.insert(solution(&instance, vec![0, 6, 7, 1]));

        let front = archive.front(0);
        assert_eq!(front.len(), 4);

        // Descending crowding distance: the two objective extremes carry
        // the maximum distance and must come first.
        let leading: Vec<f64> = front[..2].iter().map(Solution::total_profit).collect();
        assert!(leading.contains(&0.0));
        assert!(leading.contains(&8.0));
    }

    #[test]
    fn min_max_trackers_cover_each_front() {
        let instance = instance();
        let mut archive = ParetoArchive::new(16);

        archive.insert(solution(&instance, vec![0, 1]));
        archive.insert(solution(&instance, vec![0, 2, 3, 1]));
        archive.insert(solution(&instance, vec![0, 6, 7, 1]));

        assert_eq!(archive.min_total_profit(0), 0.0);
        assert_eq!(archive.max_total_profit(0), 8.0);
        assert_eq!(archive.min_sum_t_fulfill(0), 0.0);
        assert_eq!(archive.max_sum_t_fulfill(0), 101.0);
    }

    #[test]
    fn later_fronts_hold_dominated_solutions() {
        let instance = instance();
        let mut archive = ParetoArchive::new(16);

        // Chain of three solutions with equal profit and increasing time:
        // each front holds exactly one of them.
        archive.insert(solution(&instance, vec![0, 2, 3, 1]));
        archive.insert(solution(&instance, vec![0, 4, 2, 3, 1]));
        archive.insert(solution(&instance, vec![0, 4, 6, 2, 3, 1]));

        assert_eq!(archive.fronts().len(), 3);

        for f in 0..3 {
            assert_eq!(archive.front(f).len(), 1);
        }
    }
}
