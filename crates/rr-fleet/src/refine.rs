//! Per-vehicle stop reordering.
//!
//! # Objective
//!
//! For a stop order `s₁ … sₙ` starting from node `s₀`:
//!
//! ```text
//! Σₖ cost(sₖ₋₁, sₖ)  +  idle_weight · Σₖ urgency(sₖ) · arrival(sₖ)
//! ```
//!
//! The second term rewrites as a sum over legs of
//! `time(leg) · (urgency still unserved when the leg starts)`, which depends
//! only on the *set* already visited.  That makes Held-Karp exact:
//! the DP state is `(visited set, last stop)`.
//!
//! The stop a vehicle is already driving toward is never moved, and the set
//! of assigned stops never changes, so capacity is untouched.

use rr_core::{RefinePolicy, RefineStrategy, RequestId, VehicleId};
use rr_graph::{Graph, Route, RouteMode, Router};

use crate::{Leg, Stop, Vehicle};

/// Hard ceiling on DP size regardless of configuration (2ⁿ·n states).
pub const MAX_DP_STOPS: usize = 14;

/// Improvements smaller than this are treated as ties, so repeated passes
/// never shuffle equivalent orders.
const EPSILON: f64 = 1e-9;

// ── LegMatrix ─────────────────────────────────────────────────────────────────

/// Pairwise leg cost and time between a start point (index 0) and stops
/// (indices `1..=n`).  Missing legs are infinite.
#[derive(Clone, Debug)]
pub struct LegMatrix {
    size: usize,
    cost: Vec<f64>,
    time: Vec<f64>,
}

impl LegMatrix {
    /// Matrix for `stops` stops plus the start point.
    pub fn new(stops: usize) -> Self {
        let size = stops + 1;
        let mut cost = vec![f64::INFINITY; size * size];
        let mut time = vec![f64::INFINITY; size * size];
        for i in 0..size {
            cost[i * size + i] = 0.0;
            time[i * size + i] = 0.0;
        }
        Self { size, cost, time }
    }

    pub fn stops(&self) -> usize {
        self.size - 1
    }

    pub fn set(&mut self, from: usize, to: usize, cost: f64, time: f64) {
        self.cost[from * self.size + to] = cost;
        self.time[from * self.size + to] = time;
    }

    #[inline]
    pub fn cost(&self, from: usize, to: usize) -> f64 {
        self.cost[from * self.size + to]
    }

    #[inline]
    pub fn time(&self, from: usize, to: usize) -> f64 {
        self.time[from * self.size + to]
    }
}

// ── Order evaluation and solvers ──────────────────────────────────────────────

/// Objective value of visiting stops in `order` (values in `1..=n`).
/// `urgency[k - 1]` is the urgency of stop `k`.
pub fn order_objective(m: &LegMatrix, urgency: &[f64], order: &[usize], idle_weight: f64) -> f64 {
    let mut prev  = 0;
    let mut clock = 0.0;
    let mut total = 0.0;
    for &k in order {
        total += m.cost(prev, k);
        clock += m.time(prev, k);
        total += idle_weight * urgency[k - 1] * clock;
        prev = k;
    }
    total
}

/// Held-Karp.  Optimal for the objective above.  Returns the identity order
/// when no complete tour is finite.
pub fn exact_order(m: &LegMatrix, urgency: &[f64], idle_weight: f64) -> Vec<usize> {
    let n = m.stops();
    let identity: Vec<usize> = (1..=n).collect();
    if n < 2 || n > MAX_DP_STOPS {
        return identity;
    }

    let full = 1usize << n;
    // Urgency already served by each visited set.
    let mut served = vec![0.0; full];
    for mask in 1..full {
        let low = mask.trailing_zeros() as usize;
        served[mask] = served[mask & (mask - 1)] + urgency[low];
    }
    let total_u = served[full - 1];

    let mut dp     = vec![f64::INFINITY; full * n];
    let mut parent = vec![usize::MAX; full * n];
    for j in 0..n {
        dp[(1 << j) * n + j] = m.cost(0, j + 1) + idle_weight * m.time(0, j + 1) * total_u;
    }

    for mask in 1..full {
        let waiting = (total_u - served[mask]).max(0.0);
        for last in 0..n {
            let here = dp[mask * n + last];
            if mask & (1 << last) == 0 || !here.is_finite() {
                continue;
            }
            for next in 0..n {
                if mask & (1 << next) != 0 {
                    continue;
                }
                let leg = m.cost(last + 1, next + 1)
                    + idle_weight * m.time(last + 1, next + 1) * waiting;
                let val = here + leg;
                let slot = (mask | (1 << next)) * n + next;
                if val < dp[slot] {
                    dp[slot] = val;
                    parent[slot] = last;
                }
            }
        }
    }

    let done = full - 1;
    let Some(mut last) = (0..n)
        .filter(|&j| dp[done * n + j].is_finite())
        .min_by(|&a, &b| dp[done * n + a].total_cmp(&dp[done * n + b]))
    else {
        return identity;
    };

    let mut order = Vec::with_capacity(n);
    let mut mask = done;
    loop {
        order.push(last + 1);
        let p = parent[mask * n + last];
        mask &= !(1 << last);
        if p == usize::MAX {
            break;
        }
        last = p;
    }
    order.reverse();
    order
}

/// Pairwise exchange: swap any two stops while doing so improves the
/// objective, for at most `max_rounds` full sweeps.
pub fn exchange_order(
    m: &LegMatrix,
    urgency: &[f64],
    idle_weight: f64,
    mut order: Vec<usize>,
    max_rounds: usize,
) -> Vec<usize> {
    let n = order.len();
    let mut best = order_objective(m, urgency, &order, idle_weight);
    for _ in 0..max_rounds {
        let mut improved = false;
        for i in 0..n {
            for j in (i + 1)..n {
                order.swap(i, j);
                let val = order_objective(m, urgency, &order, idle_weight);
                if val < best - EPSILON {
                    best = val;
                    improved = true;
                } else {
                    order.swap(i, j);
                }
            }
        }
        if !improved {
            break;
        }
    }
    order
}

// ── StopOrderRefiner ──────────────────────────────────────────────────────────

/// A new leg sequence for one vehicle.
#[derive(Clone, Debug)]
pub struct Reorder {
    /// Number of leading legs left untouched.
    pub keep: usize,
    pub legs: Vec<Leg>,
    pub before: f64,
    pub after:  f64,
}

/// Applies the configured [`RefinePolicy`] to vehicles.
#[derive(Clone, Debug, Default)]
pub struct StopOrderRefiner {
    policy: RefinePolicy,
    mode:   RouteMode,
}

impl StopOrderRefiner {
    pub fn new(policy: RefinePolicy, mode: RouteMode) -> Self {
        Self { policy, mode }
    }

    pub fn policy(&self) -> &RefinePolicy {
        &self.policy
    }

    /// Pick a stop order for the matrix under the configured strategy.
    pub fn solve(&self, m: &LegMatrix, urgency: &[f64]) -> Vec<usize> {
        let n = m.stops();
        let identity: Vec<usize> = (1..=n).collect();
        let w = self.policy.idle_weight;
        let dp_limit = self.policy.dp_max_stops.min(MAX_DP_STOPS);
        match self.policy.strategy {
            RefineStrategy::Off => identity,
            RefineStrategy::ExactDp if n <= dp_limit => exact_order(m, urgency, w),
            RefineStrategy::ExactDp => identity,
            RefineStrategy::PairwiseExchange => {
                exchange_order(m, urgency, w, identity, self.policy.max_exchange_rounds)
            }
            RefineStrategy::Auto if n <= dp_limit => exact_order(m, urgency, w),
            RefineStrategy::Auto => {
                exchange_order(m, urgency, w, identity, self.policy.max_exchange_rounds)
            }
        }
    }

    /// Compute a better order for `vehicle`'s movable stops, or `None` if
    /// the current order is already as good.
    pub fn propose<F>(&self, vehicle: &Vehicle, graph: &Graph, router: &dyn Router, urgency_of: &F) -> Option<Reorder>
    where
        F: Fn(RequestId) -> f64 + Sync,
    {
        if self.policy.strategy == RefineStrategy::Off {
            return None;
        }
        let keep = usize::from(vehicle.first_leg_in_motion());
        let movable: Vec<Stop> = vehicle
            .legs()
            .skip(keep)
            .filter_map(|l| l.stop)
            .collect();
        if movable.len() < 2 {
            return None;
        }
        let start = if keep == 1 {
            vehicle.leg(0).and_then(Leg::destination)?
        } else {
            vehicle.anchor()
        };

        let n = movable.len();
        let nodes: Vec<_> = std::iter::once(start).chain(movable.iter().map(|s| s.node)).collect();
        let mut m = LegMatrix::new(n);
        let mut routes: Vec<Option<Route>> = vec![None; (n + 1) * (n + 1)];
        for a in 0..=n {
            for b in 1..=n {
                if a == b {
                    continue;
                }
                if let Ok(route) = router.route(graph, nodes[a], nodes[b], self.mode) {
                    m.set(a, b, route.cost, route.travel_time);
                    routes[a * (n + 1) + b] = Some(route);
                }
            }
        }
        let urgency: Vec<f64> = movable.iter().map(|s| urgency_of(s.request)).collect();

        let identity: Vec<usize> = (1..=n).collect();
        let w = self.policy.idle_weight;
        let before = order_objective(&m, &urgency, &identity, w);
        let order = self.solve(&m, &urgency);
        let after = order_objective(&m, &urgency, &order, w);
        if !after.is_finite() || after >= before - EPSILON {
            return None;
        }

        let mut legs = Vec::with_capacity(n);
        let mut prev = 0;
        for &k in &order {
            let route = routes[prev * (n + 1) + k].take()?;
            legs.push(Leg::to_stop(movable[k - 1], route));
            prev = k;
        }
        Some(Reorder { keep, legs, before, after })
    }

    /// Refine every vehicle in `targets`.  Proposals are computed
    /// independently (on Rayon with the `parallel` feature) and applied in
    /// vehicle order.  Returns the number of vehicles reordered.
    pub fn refine_all<F>(
        &self,
        vehicles:   &mut [Vehicle],
        targets:    &[VehicleId],
        graph:      &Graph,
        router:     &dyn Router,
        urgency_of: &F,
    ) -> usize
    where
        F: Fn(RequestId) -> f64 + Sync,
    {
        if self.policy.strategy == RefineStrategy::Off || targets.is_empty() {
            return 0;
        }
        let picked: Vec<usize> = vehicles
            .iter()
            .enumerate()
            .filter(|(_, v)| targets.contains(&v.id()))
            .map(|(i, _)| i)
            .collect();

        #[cfg(not(feature = "parallel"))]
        let proposals: Vec<(usize, Option<Reorder>)> = {
            let view: &[Vehicle] = vehicles;
            picked
                .iter()
                .map(|&i| (i, self.propose(&view[i], graph, router, urgency_of)))
                .collect()
        };

        #[cfg(feature = "parallel")]
        let proposals: Vec<(usize, Option<Reorder>)> = {
            use rayon::prelude::*;

            let view: &[Vehicle] = vehicles;
            picked
                .par_iter()
                .map(|&i| (i, self.propose(&view[i], graph, router, urgency_of)))
                .collect()
        };

        let mut changed = 0;
        for (i, proposal) in proposals {
            if let Some(r) = proposal {
                tracing::debug!(vehicle = %vehicles[i].id(), before = r.before, after = r.after, "stops reordered");
                vehicles[i].replace_tail(r.keep, r.legs);
                changed += 1;
            }
        }
        changed
    }
}
