//! Core solver types: configuration, per-iteration state and period outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Price-update rule used by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Diagonal Newton step; secant slope when available, else a
    /// finite-difference probe.
    #[default]
    Newton,
    /// Per-market bracketing bisection.
    Bisection,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Newton => f.write_str("newton"),
            Self::Bisection => f.write_str("bisection"),
        }
    }
}

/// Solver configuration, shared by every period of a scenario.
///
/// # Examples
///
/// ```
/// use market_equilibrium::sim::types::{SolverConfig, StrategyKind};
///
/// let cfg = SolverConfig::default();
/// assert_eq!(cfg.strategy, StrategyKind::Newton);
/// assert!(cfg.tolerance > 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Iteration budget per period (must be > 0).
    pub max_iterations: usize,
    /// Converged once every free market has `|fx|` below this.
    pub tolerance: f64,
    /// When set, the last price step must also be below this.
    pub step_tolerance: Option<f64>,
    /// Relative size of the finite-difference price probe.
    pub fd_step: f64,
    /// Derivative magnitude under which the fallback step is taken.
    pub min_derivative: f64,
    /// Fallback step as a fraction of `max(|price|, 1)`.
    pub fallback_fraction: f64,
    /// Markets with demand and supply both below this are solved trivially.
    pub trivial_threshold: f64,
    pub strategy: StrategyKind,
    /// Random restarts allowed after an exhausted period.
    pub restarts: usize,
    /// Seed for restart jitter.
    pub seed: u64,
    /// Evaluate contributors sequentially even with the `parallel` feature.
    pub force_sequential: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
            step_tolerance: None,
            fd_step: 1e-6,
            min_derivative: 1e-12,
            fallback_fraction: 0.1,
            trivial_threshold: 1e-12,
            strategy: StrategyKind::Newton,
            restarts: 3,
            seed: 42,
            force_sequential: false,
        }
    }
}

/// Price interval known to contain a market's equilibrium.
///
/// `low` is the highest price seen with excess demand, `high` the lowest
/// price seen with excess supply.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bracket {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl Bracket {
    /// Narrows the bracket with an observed `(price, fx)` pair.
    ///
    /// Other markets' prices move between observations, so an observation
    /// that contradicts the bracket drops the stale opposite end.
    pub fn observe(&mut self, price: f64, fx: f64) {
        if fx > 0.0 {
            if self.high.is_some_and(|h| price >= h) {
                self.high = None;
            }
            self.low = Some(self.low.map_or(price, |l| l.max(price)));
        } else if fx < 0.0 {
            if self.low.is_some_and(|l| price <= l) {
                self.low = None;
            }
            self.high = Some(self.high.map_or(price, |h| h.min(price)));
        }
    }

    /// Midpoint when both ends are known and consistent.
    pub fn midpoint(&self) -> Option<f64> {
        match (self.low, self.high) {
            (Some(l), Some(h)) if l <= h => Some(0.5 * (l + h)),
            _ => None,
        }
    }
}

/// Prices and excess demands of one evaluated iterate.
#[derive(Debug, Clone, PartialEq)]
pub struct Iterate {
    pub prices: Vec<f64>,
    pub fx: Vec<f64>,
}

/// Read-only snapshot of a period solve, handed to the step strategy.
///
/// A new snapshot is built every iteration; strategies never mutate it.
#[derive(Debug, Clone)]
pub struct SolverState {
    pub period: usize,
    pub iteration: usize,
    /// Current iterate, every market.
    pub current: Iterate,
    /// Previous iterate, absent on the first iteration.
    pub previous: Option<Iterate>,
    /// Solvable flag per market.
    pub solvable: Vec<bool>,
    /// Bracket per market, narrowed by every iterate so far.
    pub brackets: Vec<Bracket>,
}

impl SolverState {
    /// Indices of the markets whose price the solver moves.
    pub fn free_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.solvable
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s)
            .map(|(i, _)| i)
    }
}

/// Price update proposed by a strategy.
///
/// Both vectors cover every market; fixed markets carry zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub deltax: Vec<f64>,
    pub deltafx: Vec<f64>,
}

impl Step {
    pub fn zero(len: usize) -> Self {
        Self {
            deltax: vec![0.0; len],
            deltafx: vec![0.0; len],
        }
    }
}

/// How a period solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveStatus {
    Converged,
    /// Iteration budget reached; prices are the last iterate.
    Exhausted,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => f.pad("converged"),
            Self::Exhausted => f.pad("exhausted"),
        }
    }
}

/// Result of solving one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveOutcome {
    pub period: usize,
    /// Representative calendar year of the period.
    pub year: i32,
    pub status: SolveStatus,
    /// Iterations evaluated, including the final one.
    pub iterations: usize,
    /// Largest `|fx|` over free markets at the final iterate.
    pub residual: f64,
    /// Final price of every market, indexed by market id.
    pub prices: Vec<f64>,
    /// Strategy that produced the outcome.
    pub strategy: StrategyKind,
    /// Random restarts used.
    pub restarts: usize,
}

impl SolveOutcome {
    pub fn is_converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

impl fmt::Display for SolveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "period {:>2} ({}) | {:<9} after {:>3} iterations | residual={:.3e} | {} restart(s)",
            self.period, self.year, self.status, self.iterations, self.residual, self.restarts,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_narrows_from_both_sides() {
        let mut b = Bracket::default();
        b.observe(1.0, 2.0);
        b.observe(4.0, -1.0);
        b.observe(2.0, 0.5);
        b.observe(3.0, -0.5);
        assert_eq!(b.low, Some(2.0));
        assert_eq!(b.high, Some(3.0));
        assert_eq!(b.midpoint(), Some(2.5));
    }

    #[test]
    fn contradicting_observation_drops_stale_end() {
        let mut b = Bracket {
            low: Some(2.0),
            high: Some(3.0),
        };
        b.observe(3.0, 0.5);
        assert_eq!(b.low, Some(3.0));
        assert_eq!(b.high, None);
    }

    #[test]
    fn bracket_without_both_ends_has_no_midpoint() {
        let mut b = Bracket::default();
        b.observe(1.0, 2.0);
        assert_eq!(b.midpoint(), None);
        b.observe(5.0, 0.0);
        assert_eq!(b.high, None);
    }

    #[test]
    fn solver_config_parses_partial_toml() {
        let cfg: SolverConfig = toml::from_str("strategy = \"bisection\"\nmax_iterations = 7")
            .unwrap_or_default();
        assert_eq!(cfg.strategy, StrategyKind::Bisection);
        assert_eq!(cfg.max_iterations, 7);
        assert_eq!(cfg.tolerance, SolverConfig::default().tolerance);
    }

    #[test]
    fn free_indices_skip_fixed_markets() {
        let state = SolverState {
            period: 0,
            iteration: 0,
            current: Iterate {
                prices: vec![1.0, 2.0, 3.0],
                fx: vec![0.0; 3],
            },
            previous: None,
            solvable: vec![true, false, true],
            brackets: vec![Bracket::default(); 3],
        };
        assert_eq!(state.free_indices().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn outcome_display_does_not_panic() {
        let outcome = SolveOutcome {
            period: 1,
            year: 2010,
            status: SolveStatus::Exhausted,
            iterations: 100,
            residual: 1.5e-3,
            prices: vec![1.0],
            strategy: StrategyKind::Newton,
            restarts: 2,
        };
        let s = format!("{outcome}");
        assert!(s.contains("exhausted"));
    }
}
