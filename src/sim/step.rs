//! Price-update strategies.
//!
//! A strategy is a pure function of the [`SolverState`] snapshot. It may ask
//! for extra excess-demand evaluations through `probe`, which never touches
//! the marketplace.

use super::types::{SolverConfig, SolverState, Step, StrategyKind};

/// Excess demand of every market at a trial price vector.
pub type Probe<'a> = dyn Fn(&[f64]) -> Vec<f64> + 'a;

/// Trait implemented by price-update rules.
pub trait StepStrategy {
    /// Proposes the next price step from `state`.
    ///
    /// The returned [`Step`] covers every market; fixed markets get zeros.
    fn step(&self, state: &SolverState, probe: &Probe<'_>) -> Step;

    fn kind(&self) -> StrategyKind;
}

/// Bounded step in the direction that reduces `|fx|`.
///
/// Used whenever the derivative estimate is too small (or not finite) to
/// divide by.
pub fn fallback_step(price: f64, fx: f64, fraction: f64) -> f64 {
    let size = fraction * price.abs().max(1.0);
    if fx > 0.0 {
        size
    } else if fx < 0.0 {
        -size
    } else {
        0.0
    }
}

/// Slope of `fx` for market `j` between the previous and current iterate.
fn secant_slope(state: &SolverState, j: usize) -> Option<f64> {
    let previous = state.previous.as_ref()?;
    let x = state.current.prices[j];
    let dx = x - previous.prices[j];
    if dx.abs() <= f64::EPSILON * x.abs().max(1.0) {
        return None;
    }
    Some((state.current.fx[j] - previous.fx[j]) / dx)
}

/// Diagonal Newton step.
///
/// The derivative of each free market's excess demand with respect to its
/// own price is the secant slope when the price moved since the previous
/// iterate and the slope is downward, and a forward finite difference
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonStep {
    /// Relative probe size for the finite difference.
    pub fd_step: f64,
    /// Derivatives smaller than this trigger the fallback step.
    pub min_derivative: f64,
    pub fallback_fraction: f64,
}

impl NewtonStep {
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            fd_step: config.fd_step,
            min_derivative: config.min_derivative,
            fallback_fraction: config.fallback_fraction,
        }
    }

    fn probe_slope(&self, state: &SolverState, j: usize, probe: &Probe<'_>) -> f64 {
        let x = state.current.prices[j];
        let h = self.fd_step * x.abs().max(1.0);
        let mut trial = state.current.prices.clone();
        trial[j] = x + h;
        (probe(&trial)[j] - state.current.fx[j]) / h
    }
}

impl StepStrategy for NewtonStep {
    fn step(&self, state: &SolverState, probe: &Probe<'_>) -> Step {
        let mut step = Step::zero(state.current.prices.len());
        for j in state.free_indices() {
            let x = state.current.prices[j];
            let fx = state.current.fx[j];
            // a rising secant means cross-market moves dominated; probe instead
            let slope = secant_slope(state, j)
                .filter(|s| *s < 0.0)
                .unwrap_or_else(|| self.probe_slope(state, j, probe));

            step.deltafx[j] = slope;
            step.deltax[j] = if slope.is_finite() && slope.abs() >= self.min_derivative {
                -fx / slope
            } else {
                fallback_step(x, fx, self.fallback_fraction)
            };
        }
        step
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Newton
    }
}

/// Per-market bracketing bisection.
///
/// Moves to the bracket midpoint once both ends are known; until then the
/// price is doubled (excess demand) or halved (excess supply).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BisectionStep;

impl StepStrategy for BisectionStep {
    fn step(&self, state: &SolverState, _probe: &Probe<'_>) -> Step {
        let mut step = Step::zero(state.current.prices.len());
        for j in state.free_indices() {
            let x = state.current.prices[j];
            let fx = state.current.fx[j];
            let target = match state.brackets[j].midpoint() {
                Some(mid) => mid,
                None if fx > 0.0 => x + x.abs().max(1.0),
                None if fx < 0.0 => 0.5 * x,
                None => x,
            };
            step.deltax[j] = target - x;
            step.deltafx[j] = secant_slope(state, j).unwrap_or(0.0);
        }
        step
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Bisection
    }
}

/// Strategy chosen at runtime from [`StrategyKind`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnyStrategy {
    Newton(NewtonStep),
    Bisection(BisectionStep),
}

impl AnyStrategy {
    pub fn new(kind: StrategyKind, config: &SolverConfig) -> Self {
        match kind {
            StrategyKind::Newton => Self::Newton(NewtonStep::from_config(config)),
            StrategyKind::Bisection => Self::Bisection(BisectionStep),
        }
    }
}

impl StepStrategy for AnyStrategy {
    fn step(&self, state: &SolverState, probe: &Probe<'_>) -> Step {
        match self {
            Self::Newton(s) => s.step(state, probe),
            Self::Bisection(s) => s.step(state, probe),
        }
    }

    fn kind(&self) -> StrategyKind {
        match self {
            Self::Newton(s) => s.kind(),
            Self::Bisection(s) => s.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::types::{Bracket, Iterate};

    fn state(prices: Vec<f64>, fx: Vec<f64>, solvable: Vec<bool>) -> SolverState {
        let n = prices.len();
        SolverState {
            period: 0,
            iteration: 0,
            current: Iterate { prices, fx },
            previous: None,
            solvable,
            brackets: vec![Bracket::default(); n],
        }
    }

    // fx = 10 - 2p for market 0, fx = 3 - p for market 1
    fn linear_probe(prices: &[f64]) -> Vec<f64> {
        vec![10.0 - 2.0 * prices[0], 3.0 - prices[1]]
    }

    #[test]
    fn newton_solves_linear_market_in_one_step() {
        let s = state(vec![1.0, 0.0], vec![8.0, 3.0], vec![true, false]);
        let newton = NewtonStep::from_config(&SolverConfig::default());
        let step = newton.step(&s, &linear_probe);
        assert!((step.deltax[0] - 4.0).abs() < 1e-6);
        assert!((step.deltafx[0] + 2.0).abs() < 1e-6);
        assert_eq!(step.deltax[1], 0.0);
        assert_eq!(step.deltafx[1], 0.0);
    }

    #[test]
    fn newton_prefers_secant_slope() {
        let mut s = state(vec![2.0], vec![6.0], vec![true]);
        s.previous = Some(Iterate {
            prices: vec![1.0],
            fx: vec![8.0],
        });
        let newton = NewtonStep::from_config(&SolverConfig::default());
        let never = |_: &[f64]| -> Vec<f64> { panic!("probe should not be called") };
        let step = newton.step(&s, &never);
        assert_eq!(step.deltafx[0], -2.0);
        assert_eq!(step.deltax[0], 3.0);
    }

    #[test]
    fn rising_secant_is_replaced_by_probe() {
        let mut s = state(vec![2.0, 1.0], vec![6.0, 2.0], vec![true, false]);
        s.previous = Some(Iterate {
            prices: vec![1.0, 1.0],
            fx: vec![4.0, 2.0],
        });
        let newton = NewtonStep::from_config(&SolverConfig::default());
        let step = newton.step(&s, &linear_probe);
        assert!((step.deltafx[0] + 2.0).abs() < 1e-6);
    }

    #[test]
    fn zero_derivative_takes_bounded_fallback() {
        let s = state(vec![4.0], vec![5.0], vec![true]);
        let flat = |_: &[f64]| vec![5.0];
        let newton = NewtonStep::from_config(&SolverConfig::default());
        let step = newton.step(&s, &flat);
        assert_eq!(step.deltafx[0], 0.0);
        assert!((step.deltax[0] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn fallback_direction_follows_excess_demand() {
        assert!(fallback_step(0.0, 1.0, 0.1) > 0.0);
        assert!(fallback_step(2.0, -1.0, 0.1) < 0.0);
        assert_eq!(fallback_step(2.0, 0.0, 0.1), 0.0);
    }

    #[test]
    fn bisection_moves_to_bracket_midpoint() {
        let mut s = state(vec![3.0], vec![-1.0], vec![true]);
        s.brackets[0] = Bracket {
            low: Some(1.0),
            high: Some(3.0),
        };
        let step = BisectionStep.step(&s, &linear_probe);
        assert_eq!(step.deltax[0], -1.0);
    }

    #[test]
    fn bisection_expands_without_bracket() {
        let s = state(vec![2.0, 4.0], vec![1.0, -1.0], vec![true, true]);
        let step = BisectionStep.step(&s, &linear_probe);
        assert_eq!(step.deltax[0], 2.0);
        assert_eq!(step.deltax[1], -2.0);
    }

    #[test]
    fn any_strategy_reports_kind() {
        let cfg = SolverConfig::default();
        assert_eq!(
            AnyStrategy::new(StrategyKind::Bisection, &cfg).kind(),
            StrategyKind::Bisection
        );
        assert_eq!(
            AnyStrategy::new(StrategyKind::Newton, &cfg).kind(),
            StrategyKind::Newton
        );
    }
}
