//! Scenario orchestration.
//!
//! Builds the marketplace and its contributors from a [`ScenarioConfig`] and
//! solves every period in calendar order. Each period starts from the
//! previous period's prices, advances every technology's vintage chain and
//! recovers from failed solves where it can: a diverged Newton solve is
//! retried once with bisection, an exhausted solve is restarted from
//! jittered prices up to `solver.restarts` times.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{ConfigError, ScenarioConfig, TechnologyConfig, VintageConfig};
use crate::contributors::{
    Coefficient, Contributor, LinearDemand, LinearSupply, TechnologyDemand, TechnologyInput,
};
use crate::error::{ScenarioError, SolveError};
use crate::sim::calendar::Calendar;
use crate::sim::dependency::DependencyFinder;
use crate::sim::marketplace::{MarketId, Marketplace};
use crate::sim::solver::{CancelToken, Solver};
use crate::sim::step::{AnyStrategy, StepStrategy};
use crate::sim::summary::SummaryReport;
use crate::sim::trace::{SolverTrace, TraceRow, TraceSink};
use crate::sim::types::{SolveOutcome, SolverConfig, StrategyKind};

/// Per-period figures of one technology vintage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnologyRecord {
    pub period: usize,
    pub technology: String,
    pub input: String,
    pub coefficient: Option<f64>,
    pub physical_demand: Option<f64>,
    pub carbon_content: Option<f64>,
}

/// Everything a finished scenario run produced.
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    pub name: String,
    pub calendar: Calendar,
    pub marketplace: Marketplace,
    pub outcomes: Vec<SolveOutcome>,
    pub technologies: Vec<TechnologyRecord>,
    pub trace: SolverTrace,
    pub summary: SummaryReport,
}

/// Builds and solves a scenario, collecting the trace in memory.
///
/// # Errors
///
/// Returns a [`ScenarioError`] if the configuration is invalid or a period
/// cannot be solved.
pub fn run_scenario(config: &ScenarioConfig) -> Result<ScenarioRun, ScenarioError> {
    let mut runner = ScenarioRunner::new(config)?;
    let mut trace = SolverTrace::new();
    let outcomes = runner.run(&mut trace)?;
    let summary = SummaryReport::from_outcomes(&outcomes);
    Ok(ScenarioRun {
        name: runner.name,
        calendar: runner.calendar,
        marketplace: runner.marketplace,
        outcomes,
        technologies: runner.records,
        trace,
        summary,
    })
}

/// Successive vintages of one technology.
struct VintageChain {
    config: TechnologyConfig,
    /// Explicit vintages keyed by the period their year falls in.
    explicit: BTreeMap<usize, VintageConfig>,
    current: Option<TechnologyDemand>,
}

impl VintageChain {
    fn build(
        &self,
        coefficient: Option<Coefficient>,
        calibration: Option<f64>,
        fixed_output: Option<f64>,
        period_count: usize,
    ) -> TechnologyDemand {
        let c = &self.config;
        let mut input = TechnologyInput::new(c.input.clone(), period_count)
            .with_price_unit_conversion(c.price_unit_conversion)
            .with_income_elasticity(c.income_elasticity);
        if let Some(coefficient) = coefficient {
            input = input.with_coefficient(coefficient);
        }
        if let Some(calibration) = calibration {
            input = input.with_calibration(calibration);
        }
        if let Some(rate) = c.tech_change {
            input = input.with_tech_change(rate);
        }

        let mut technology =
            TechnologyDemand::new(c.name.clone(), c.sector.clone(), c.region.clone(), input, c.base_output)
                .with_price_response(c.price_elasticity, c.reference_price);
        if let Some(output) = fixed_output {
            technology = technology.with_fixed_output(output);
        }
        technology
    }
}

/// Adds a fixed offset to the iteration number of every row.
///
/// Keeps iteration numbers increasing across retries of the same period.
struct OffsetSink<'a, S: TraceSink> {
    inner: &'a mut S,
    offset: usize,
}

impl<S: TraceSink> TraceSink for OffsetSink<'_, S> {
    fn append(&mut self, mut row: TraceRow) {
        row.iter += self.offset;
        self.inner.append(row);
    }
}

/// Owns a scenario's state between periods.
pub struct ScenarioRunner {
    name: String,
    calendar: Calendar,
    solver_config: SolverConfig,
    marketplace: Marketplace,
    dependencies: DependencyFinder,
    curves: Vec<Box<dyn Contributor>>,
    chains: Vec<VintageChain>,
    records: Vec<TechnologyRecord>,
    cancel: Option<CancelToken>,
}

fn resolve(
    marketplace: &Marketplace,
    name: &str,
    region: &str,
    field: String,
) -> Result<MarketId, ScenarioError> {
    marketplace.market_id(name, region).ok_or_else(|| {
        ScenarioError::Config(vec![ConfigError {
            field,
            message: format!("unknown market \"{name}\" in region \"{region}\""),
        }])
    })
}

impl ScenarioRunner {
    /// Validates `config` and builds markets, curves and vintage chains.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Config`] listing every validation failure,
    /// or [`ScenarioError::Calendar`] if the calendar cannot be built.
    pub fn new(config: &ScenarioConfig) -> Result<Self, ScenarioError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ScenarioError::Config(errors));
        }

        let calendar = Calendar::new(config.calendar.clone())?;
        let mut marketplace = Marketplace::new(calendar.period_count());
        for m in &config.markets {
            let id = marketplace.add_market(&m.name, &m.region, m.initial_price, m.solvable);
            if let Some(coefficient) = m.co2_coefficient {
                marketplace.set_co2_coefficient(id, coefficient);
            }
        }

        let mut curves: Vec<Box<dyn Contributor>> = Vec::new();
        for (i, s) in config.supplies.iter().enumerate() {
            let id = resolve(&marketplace, &s.market, &s.region, format!("supplies[{i}].market"))?;
            curves.push(Box::new(LinearSupply::new(id, s.intercept, s.slope)));
        }
        for (i, d) in config.demands.iter().enumerate() {
            let id = resolve(&marketplace, &d.market, &d.region, format!("demands[{i}].market"))?;
            let mut demand = LinearDemand::new(id, d.intercept, d.slope);
            for (j, c) in d.cross.iter().enumerate() {
                let other = resolve(
                    &marketplace,
                    &c.market,
                    &c.region,
                    format!("demands[{i}].cross[{j}].market"),
                )?;
                demand = demand.with_cross_price(other, c.coefficient);
            }
            curves.push(Box::new(demand));
        }

        let mut chains = Vec::with_capacity(config.technologies.len());
        for (i, t) in config.technologies.iter().enumerate() {
            let mut explicit = BTreeMap::new();
            for (j, v) in t.vintages.iter().enumerate() {
                let period = calendar.year_to_period(v.year)?;
                if period == calendar.base_period() || explicit.insert(period, v.clone()).is_some() {
                    return Err(ScenarioError::Config(vec![ConfigError {
                        field: format!("technologies[{i}].vintages[{j}].year"),
                        message: format!("year {} does not start a new vintage period", v.year),
                    }]));
                }
            }
            if marketplace.market_id(&t.input, &t.region).is_none() {
                warn!(technology = %t.name, input = %t.input, "input market not found; technology is ignored");
            }
            chains.push(VintageChain {
                config: t.clone(),
                explicit,
                current: None,
            });
        }

        Ok(Self {
            name: config.name.clone(),
            calendar,
            solver_config: config.solver.clone(),
            marketplace,
            dependencies: DependencyFinder::new(),
            curves,
            chains,
            records: Vec::new(),
            cancel: None,
        })
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn marketplace(&self) -> &Marketplace {
        &self.marketplace
    }

    pub fn dependencies(&self) -> &DependencyFinder {
        &self.dependencies
    }

    /// Solves every period in order, streaming trace rows into `sink`.
    ///
    /// # Errors
    ///
    /// Stops at the first period that diverges even after the bisection
    /// retry, or when the cancel token fires.
    pub fn run(&mut self, sink: &mut impl TraceSink) -> Result<Vec<SolveOutcome>, ScenarioError> {
        let mut outcomes = Vec::with_capacity(self.calendar.period_count());
        for period in self.calendar.periods() {
            self.prepare_period(period);
            self.warm_start(period);

            let year = self
                .calendar
                .period_to_year(period)
                .unwrap_or_else(|| self.calendar.start_year());
            let outcome = self.solve_with_recovery(period, year, sink)?;
            info!(period, year, status = %outcome.status, iterations = outcome.iterations, "period solved");

            self.record_technologies(period);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Advances every vintage chain to `period` and tabulates fixed demand.
    fn prepare_period(&mut self, period: usize) {
        let period_count = self.calendar.period_count();
        // years elapsed since the previous period's representative year
        let years = period
            .checked_sub(1)
            .and_then(|previous| self.calendar.timestep_of(previous))
            .unwrap_or(0);

        for chain in &mut self.chains {
            let mut next = match chain.current.take() {
                None => {
                    let c = &chain.config;
                    let mut base = chain.build(c.coefficient, c.calibration, c.fixed_output, period_count);
                    base.complete_init(&self.marketplace, &mut self.dependencies);
                    base
                }
                Some(previous) => {
                    let mut next = match chain.explicit.get(&period) {
                        Some(v) => chain.build(v.coefficient, v.calibration, v.fixed_output, period_count),
                        None => previous.clone_forward(),
                    };
                    next.complete_init(&self.marketplace, &mut self.dependencies);
                    previous.input().copy_params_into(next.input_mut(), period);
                    next
                }
            };

            next.init_calc(period, &self.marketplace);
            if period > self.calendar.base_period() {
                next.input_mut().apply_technical_change(period, years);
            }
            next.tabulate_fixed_quantity(period, true, &mut self.marketplace);
            chain.current = Some(next);
        }
    }

    /// Starts free markets from the previous period's solution.
    fn warm_start(&mut self, period: usize) {
        if period == self.calendar.base_period() {
            return;
        }
        let ids: Vec<MarketId> = self.marketplace.free_markets(period);
        for id in ids {
            let price = self.marketplace.market(id).price(period - 1);
            self.marketplace.set_price(id, period, price);
        }
    }

    fn solver(&self, strategy: StrategyKind) -> Solver<AnyStrategy> {
        let config = self.solver_config.clone();
        let solver = Solver::new(config.clone(), AnyStrategy::new(strategy, &config));
        match &self.cancel {
            Some(token) => solver.with_cancel_token(token.clone()),
            None => solver,
        }
    }

    fn attempt<S: StepStrategy>(
        &mut self,
        solver: &Solver<S>,
        period: usize,
        year: i32,
        sink: &mut OffsetSink<'_, impl TraceSink>,
    ) -> Result<SolveOutcome, SolveError> {
        let mut contributors: Vec<&mut (dyn Contributor + 'static)> =
            self.curves.iter_mut().map(|c| c.as_mut()).collect();
        for chain in &mut self.chains {
            if let Some(technology) = chain.current.as_mut() {
                contributors.push(technology);
            }
        }
        solver.solve_period(period, year, &mut contributors, &mut self.marketplace, sink)
    }

    fn solve_with_recovery(
        &mut self,
        period: usize,
        year: i32,
        sink: &mut impl TraceSink,
    ) -> Result<SolveOutcome, ScenarioError> {
        let start = self.marketplace.prices(period);
        let mut sink = OffsetSink {
            inner: sink,
            offset: 0,
        };

        let primary = self.solver(self.solver_config.strategy);
        let mut outcome = match self.attempt(&primary, period, year, &mut sink) {
            Ok(outcome) => outcome,
            Err(SolveError::Diverged { iteration, .. })
                if self.solver_config.strategy != StrategyKind::Bisection =>
            {
                warn!(period, iteration, "solve diverged; retrying with bisection");
                sink.offset += iteration + 1;
                self.marketplace.set_prices(period, &start);
                let fallback = self.solver(StrategyKind::Bisection);
                self.attempt(&fallback, period, year, &mut sink)?
            }
            Err(e) => return Err(e.into()),
        };

        let mut rng = StdRng::seed_from_u64(self.solver_config.seed.wrapping_add(period as u64));
        let solver = self.solver(outcome.strategy);
        let mut restarts = 0;
        while !outcome.is_converged() && restarts < self.solver_config.restarts {
            restarts += 1;
            sink.offset += outcome.iterations;
            let jittered = self.jitter(period, &start, &mut rng);
            warn!(period, restart = restarts, residual = outcome.residual, "restarting from jittered prices");
            self.marketplace.set_prices(period, &jittered);
            outcome = self.attempt(&solver, period, year, &mut sink)?;
        }

        outcome.restarts = restarts;
        Ok(outcome)
    }

    /// Scales every free market's starting price by a factor in `[0.5, 1.5)`.
    fn jitter(&self, period: usize, start: &[f64], rng: &mut StdRng) -> Vec<f64> {
        start
            .iter()
            .enumerate()
            .map(|(i, &price)| {
                if !self.marketplace.market(MarketId(i)).is_solvable(period) {
                    price
                } else if price > 0.0 {
                    price * rng.random_range(0.5..1.5)
                } else {
                    rng.random_range(0.0..1.0)
                }
            })
            .collect()
    }

    fn record_technologies(&mut self, period: usize) {
        for chain in &self.chains {
            let Some(technology) = chain.current.as_ref() else {
                continue;
            };
            let input = technology.input();
            self.records.push(TechnologyRecord {
                period,
                technology: technology.name.clone(),
                input: input.name().to_string(),
                coefficient: input.coefficient(period),
                physical_demand: input.physical_demand(period),
                carbon_content: input.carbon_content(period),
            });
        }
    }
}
