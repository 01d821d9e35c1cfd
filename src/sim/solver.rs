//! Multi-market equilibrium solver.
//!
//! One period at a time, the solver searches for a price vector at which
//! every free market clears. Each iteration evaluates every contributor at
//! the current prices (optionally in parallel), accumulates the quantities
//! into the marketplace, computes excess demand, asks the step strategy for
//! a price update and appends one trace row per market and variable.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use crate::contributors::{Contributor, PriceContext, Side};
use crate::error::SolveError;
use crate::parallel;

use super::market::excess_demand;
use super::marketplace::{MarketId, Marketplace};
use super::step::{AnyStrategy, StepStrategy};
use super::trace::{TraceRow, TraceSink, TraceVariable};
use super::types::{
    Bracket, Iterate, SolveOutcome, SolveStatus, SolverConfig, SolverState, Step,
};

/// Cooperative cancellation flag, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Equilibrium solver, generic over the price-update rule.
pub struct Solver<S: StepStrategy> {
    config: SolverConfig,
    strategy: S,
    cancel: Option<CancelToken>,
}

impl Solver<AnyStrategy> {
    /// Solver using the strategy named in `config`.
    pub fn from_config(config: SolverConfig) -> Self {
        let strategy = AnyStrategy::new(config.strategy, &config);
        Self::new(config, strategy)
    }
}

impl<S: StepStrategy> Solver<S> {
    /// # Panics
    ///
    /// Panics if `config.max_iterations` is zero.
    pub fn new(config: SolverConfig, strategy: S) -> Self {
        assert!(config.max_iterations > 0, "max_iterations must be > 0");
        Self {
            config,
            strategy,
            cancel: None,
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Excess demand of every market at `prices`, without touching any
    /// market accumulator.
    pub fn excess_demand_at<C>(
        &self,
        contributors: &[C],
        market_count: usize,
        period: usize,
        prices: &[f64],
    ) -> Vec<f64>
    where
        C: Deref + Sync,
        C::Target: Contributor,
    {
        let context = PriceContext::new(period, prices);
        let quantities = parallel::map_slice(
            contributors,
            |c| c.quantity(&context),
            self.config.force_sequential,
        );

        let mut demand = vec![0.0; market_count];
        let mut supply = vec![0.0; market_count];
        for (contributor, quantity) in contributors.iter().zip(quantities) {
            let Some(MarketId(i)) = contributor.market() else {
                continue;
            };
            match contributor.side() {
                Side::Demand => demand[i] += quantity,
                Side::Supply => supply[i] += quantity,
            }
        }

        demand
            .iter()
            .zip(&supply)
            .map(|(&d, &s)| excess_demand(d, s, self.config.trivial_threshold))
            .collect()
    }

    /// Solves `period`, starting from the prices currently in the marketplace.
    ///
    /// `contributors` may hold boxes or plain mutable references.
    ///
    /// On return the marketplace holds the final iterate's prices, demands
    /// and supplies.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::Diverged`] when an excess demand or an updated
    /// price is not finite, and [`SolveError::Cancelled`] when the cancel
    /// token fires. Running out of iterations is not an error: the outcome is
    /// flagged [`SolveStatus::Exhausted`].
    pub fn solve_period<C>(
        &self,
        period: usize,
        year: i32,
        contributors: &mut [C],
        marketplace: &mut Marketplace,
        sink: &mut impl TraceSink,
    ) -> Result<SolveOutcome, SolveError>
    where
        C: DerefMut + Sync,
        C::Target: Contributor,
    {
        let n = marketplace.len();
        let solvable: Vec<bool> = marketplace
            .markets()
            .map(|(_, m)| m.is_solvable(period))
            .collect();
        let mut prices = marketplace.prices(period);
        let mut previous: Option<Iterate> = None;
        let mut brackets = vec![Bracket::default(); n];
        let mut last_step = f64::INFINITY;

        debug!(
            period,
            markets = n,
            free = solvable.iter().filter(|&&s| s).count(),
            strategy = %self.strategy.kind(),
            "initializing period solve"
        );

        for iteration in 0..self.config.max_iterations {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(SolveError::Cancelled { period, iteration });
            }

            let fx = self.evaluate(period, &prices, contributors, marketplace);
            let residual = max_free_abs(&fx, &solvable);

            if let Some(i) = fx.iter().position(|v| !v.is_finite()) {
                emit_rows(sink, period, iteration, &solvable, marketplace, &prices, &fx, &Step::zero(n));
                error!(period, iteration, market = i, "excess demand is not finite");
                return Err(SolveError::Diverged {
                    period,
                    iteration,
                    market: MarketId(i),
                    reason: "non-finite excess demand",
                });
            }

            for (i, &f) in fx.iter().enumerate() {
                brackets[i].observe(prices[i], f);
            }

            let converged = residual < self.config.tolerance
                && self.config.step_tolerance.is_none_or(|t| last_step < t);
            let budget_spent = iteration + 1 == self.config.max_iterations;

            let step = if converged || budget_spent {
                Step::zero(n)
            } else {
                let state = SolverState {
                    period,
                    iteration,
                    current: Iterate {
                        prices: prices.clone(),
                        fx: fx.clone(),
                    },
                    previous: previous.take(),
                    solvable: solvable.clone(),
                    brackets: brackets.clone(),
                };
                let probe =
                    |trial: &[f64]| self.excess_demand_at(&*contributors, n, period, trial);
                self.strategy.step(&state, &probe)
            };

            emit_rows(sink, period, iteration, &solvable, marketplace, &prices, &fx, &step);
            debug!(period, iteration, residual, "iteration");

            if converged || budget_spent {
                let status = if converged {
                    info!(period, year, iterations = iteration + 1, residual, "period converged");
                    SolveStatus::Converged
                } else {
                    warn!(period, year, iterations = iteration + 1, residual, "iteration budget exhausted");
                    SolveStatus::Exhausted
                };
                return Ok(SolveOutcome {
                    period,
                    year,
                    status,
                    iterations: iteration + 1,
                    residual,
                    prices,
                    strategy: self.strategy.kind(),
                    restarts: 0,
                });
            }

            let mut next = prices.clone();
            let mut largest_step: f64 = 0.0;
            for (i, &free) in solvable.iter().enumerate() {
                if !free {
                    continue;
                }
                let updated = prices[i] + step.deltax[i];
                if !updated.is_finite() {
                    error!(period, iteration, market = i, "price update is not finite");
                    return Err(SolveError::Diverged {
                        period,
                        iteration,
                        market: MarketId(i),
                        reason: "non-finite price",
                    });
                }
                next[i] = updated.max(0.0);
                largest_step = largest_step.max((next[i] - prices[i]).abs());
            }

            last_step = largest_step;
            previous = Some(Iterate { prices, fx });
            prices = next;
        }

        unreachable!("max_iterations is checked to be > 0 in Solver::new")
    }

    /// Fan-out evaluation followed by the fan-in into the marketplace.
    fn evaluate<C>(
        &self,
        period: usize,
        prices: &[f64],
        contributors: &mut [C],
        marketplace: &mut Marketplace,
    ) -> Vec<f64>
    where
        C: DerefMut + Sync,
        C::Target: Contributor,
    {
        let quantities = {
            let context = PriceContext::new(period, prices);
            parallel::map_slice(
                &*contributors,
                |c| c.quantity(&context),
                self.config.force_sequential,
            )
        };

        marketplace.set_prices(period, prices);
        marketplace.reset(period);
        for (contributor, quantity) in contributors.iter_mut().zip(quantities) {
            contributor.record(quantity, period, marketplace);
        }

        marketplace
            .markets()
            .map(|(_, m)| m.excess_demand(period, self.config.trivial_threshold))
            .collect()
    }
}

fn max_free_abs(fx: &[f64], solvable: &[bool]) -> f64 {
    fx.iter()
        .zip(solvable)
        .filter(|&(_, &s)| s)
        .map(|(f, _)| f.abs())
        .fold(0.0, f64::max)
}

/// Appends one row per variable and market, variable-major then by market id.
#[allow(clippy::too_many_arguments)]
fn emit_rows(
    sink: &mut impl TraceSink,
    period: usize,
    iter: usize,
    solvable: &[bool],
    marketplace: &Marketplace,
    prices: &[f64],
    fx: &[f64],
    step: &Step,
) {
    for variable in TraceVariable::ALL {
        for (id, market) in marketplace.markets() {
            let i = id.0;
            let value = match variable {
                TraceVariable::Price => prices[i],
                TraceVariable::Supply => market.supply(period),
                TraceVariable::Demand => market.demand(period),
                TraceVariable::Fx => fx[i],
                TraceVariable::Deltax => step.deltax[i],
                TraceVariable::Deltafx => step.deltafx[i],
            };
            sink.append(TraceRow {
                period,
                iter,
                variable,
                mktid: id,
                solvable: solvable[i],
                value,
            });
        }
    }
}
