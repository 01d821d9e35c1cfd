//! Model period calendar.
//!
//! Converts the sparse calendar inputs (start year, two kink years, end year,
//! three regime timesteps and a reporting grid) into the dense period tables
//! every other component indexes by.
//!
//! Period `k` starts at boundary year `b_k` and covers `[b_k, b_{k+1})`; the
//! last period also owns `end_year`. The representative year of a period is
//! its first year, so `period_to_year(year_to_period(y)) <= y`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::CalendarError;

/// Raw calendar inputs as read from the scenario configuration.
///
/// # Examples
///
/// ```
/// use market_equilibrium::sim::calendar::{Calendar, CalendarConfig};
///
/// let calendar = Calendar::new(CalendarConfig::default()).unwrap();
/// assert_eq!(calendar.base_period(), 0);
/// assert_eq!(calendar.period_to_year(0), Some(2005));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalendarConfig {
    pub start_year: i32,
    /// End of the first (short step) regime.
    pub inter_year1: i32,
    /// End of the second (medium step) regime.
    pub inter_year2: i32,
    pub end_year: i32,
    pub time_step1: i32,
    pub time_step2: i32,
    pub time_step3: i32,
    /// Last year of the reporting grid.
    pub data_end_year: i32,
    /// Step of the reporting grid.
    pub data_time_step: i32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            start_year: 2005,
            inter_year1: 2020,
            inter_year2: 2050,
            end_year: 2100,
            time_step1: 5,
            time_step2: 10,
            time_step3: 25,
            data_end_year: 2100,
            data_time_step: 5,
        }
    }
}

impl CalendarConfig {
    /// Checks timesteps and year ordering.
    ///
    /// # Errors
    ///
    /// Returns every [`CalendarError::Configuration`] found, in field order.
    pub fn validate(&self) -> Result<(), Vec<CalendarError>> {
        let mut errors = Vec::new();

        for (field, step) in [
            ("time_step1", self.time_step1),
            ("time_step2", self.time_step2),
            ("time_step3", self.time_step3),
            ("data_time_step", self.data_time_step),
        ] {
            if step <= 0 {
                errors.push(CalendarError::Configuration {
                    field,
                    message: format!("must be > 0, got {step}"),
                });
            }
        }

        let ordered = [
            ("inter_year1", self.start_year, self.inter_year1),
            ("inter_year2", self.inter_year1, self.inter_year2),
            ("end_year", self.inter_year2, self.end_year),
        ];
        for (field, lower, year) in ordered {
            if year <= lower {
                errors.push(CalendarError::Configuration {
                    field,
                    message: format!("must be > {lower}, got {year}"),
                });
            }
        }

        if self.data_end_year < self.start_year || self.data_end_year > self.end_year {
            errors.push(CalendarError::Configuration {
                field: "data_end_year",
                message: format!(
                    "must lie in [{}, {}], got {}",
                    self.start_year, self.end_year, self.data_end_year
                ),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Period layout of one of the three calendar regimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Regime {
    /// Number of full-length steps.
    pub whole_steps: usize,
    /// Length of the trailing shorter period, or 0 if the interval divides evenly.
    pub remainder_years: i32,
    pub time_step: i32,
}

impl Regime {
    fn new(from: i32, to: i32, time_step: i32) -> Self {
        let span = to - from;
        Self {
            whole_steps: (span / time_step) as usize,
            remainder_years: span % time_step,
            time_step,
        }
    }

    /// Whole steps plus the remainder period, if any.
    pub fn period_count(&self) -> usize {
        self.whole_steps + usize::from(self.remainder_years != 0)
    }
}

/// Non-fatal calendar diagnostic recorded by [`Calendar::build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarWarning {
    /// Regime number, 1 to 3.
    pub regime: usize,
    pub interval_years: i32,
    pub time_step: i32,
}

impl fmt::Display for CalendarWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "regime {} interval of {} years is not divisible by its timestep {}",
            self.regime, self.interval_years, self.time_step
        )
    }
}

/// Dense period index derived from a validated [`CalendarConfig`].
///
/// Built once per scenario and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calendar {
    config: CalendarConfig,
    regimes: [Regime; 3],
    period_to_time_step: Vec<i32>,
    year_to_period: BTreeMap<i32, usize>,
    period_to_year: Vec<i32>,
    data_offset: Vec<i32>,
    data_period_to_period: Vec<usize>,
    warnings: Vec<CalendarWarning>,
}

impl Calendar {
    /// Validates the inputs and builds every derived table.
    ///
    /// # Errors
    ///
    /// Returns the first [`CalendarError::Configuration`] if the inputs are invalid.
    pub fn new(config: CalendarConfig) -> Result<Self, CalendarError> {
        let mut calendar = Self::configure(config)?;
        calendar.build();
        Ok(calendar)
    }

    /// Validates the inputs without building the derived tables.
    ///
    /// # Errors
    ///
    /// Returns the first [`CalendarError::Configuration`] if the inputs are invalid.
    pub fn configure(config: CalendarConfig) -> Result<Self, CalendarError> {
        if let Err(mut errors) = config.validate() {
            return Err(errors.remove(0));
        }
        Ok(Self {
            config,
            regimes: [Regime::new(0, 0, 1); 3],
            period_to_time_step: Vec::new(),
            year_to_period: BTreeMap::new(),
            period_to_year: Vec::new(),
            data_offset: Vec::new(),
            data_period_to_period: Vec::new(),
            warnings: Vec::new(),
        })
    }

    /// Computes the derived tables from scratch. Calling it again is a no-op
    /// in effect: the tables are rebuilt identically.
    pub fn build(&mut self) {
        let c = &self.config;
        self.regimes = [
            Regime::new(c.start_year, c.inter_year1, c.time_step1),
            Regime::new(c.inter_year1, c.inter_year2, c.time_step2),
            Regime::new(c.inter_year2, c.end_year, c.time_step3),
        ];

        self.warnings.clear();
        self.period_to_time_step.clear();
        for (i, regime) in self.regimes.iter().enumerate() {
            self.period_to_time_step
                .extend(std::iter::repeat_n(regime.time_step, regime.whole_steps));
            if regime.remainder_years != 0 {
                self.period_to_time_step.push(regime.remainder_years);
                let warning = CalendarWarning {
                    regime: i + 1,
                    interval_years: regime.whole_steps as i32 * regime.time_step
                        + regime.remainder_years,
                    time_step: regime.time_step,
                };
                warn!(%warning, "calendar regime has a remainder period");
                self.warnings.push(warning);
            }
        }

        self.year_to_period.clear();
        self.period_to_year.clear();
        let mut year = self.config.start_year;
        for (period, &step) in self.period_to_time_step.iter().enumerate() {
            self.period_to_year.push(year);
            for y in year..year + step {
                self.year_to_period.insert(y, period);
            }
            year += step;
        }
        if let Some(last) = self.period_to_time_step.len().checked_sub(1) {
            self.year_to_period.insert(self.config.end_year, last);
        }

        self.build_data_grid();
    }

    fn build_data_grid(&mut self) {
        let c = &self.config;
        let data_periods = ((c.data_end_year - c.start_year) / c.data_time_step + 1) as usize;
        let period_count = self.period_count();

        self.data_offset.clear();
        self.data_period_to_period.clear();
        for i in 0..data_periods {
            let year = c.start_year + i as i32 * c.data_time_step;
            let period = self.year_to_period.get(&year).copied().unwrap_or(0);
            let offset = if data_periods == period_count {
                0
            } else {
                c.data_time_step / self.period_to_time_step[period]
            };
            self.data_offset.push(offset);
            self.data_period_to_period.push(period);
        }
    }

    /// Returns the period containing `year`.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::YearOutOfRange`] (and logs it) when `year` lies
    /// outside `[start_year, end_year]`.
    pub fn year_to_period(&self, year: i32) -> Result<usize, CalendarError> {
        self.year_to_period.get(&year).copied().ok_or_else(|| {
            error!(year, "invalid year passed to the period calendar");
            CalendarError::YearOutOfRange { year }
        })
    }

    /// Returns `period` if the calendar contains it.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::PeriodOutOfRange`] past the last period.
    pub fn check_period(&self, period: usize) -> Result<usize, CalendarError> {
        let count = self.period_count();
        if period < count {
            Ok(period)
        } else {
            Err(CalendarError::PeriodOutOfRange { period, count })
        }
    }

    /// Representative (first) year of `period`.
    pub fn period_to_year(&self, period: usize) -> Option<i32> {
        self.period_to_year.get(period).copied()
    }

    /// Number of calendar years spanned by `period`.
    pub fn timestep_of(&self, period: usize) -> Option<i32> {
        self.period_to_time_step.get(period).copied()
    }

    pub fn period_count(&self) -> usize {
        self.period_to_time_step.len()
    }

    /// The period containing `start_year`. Always 0.
    pub fn base_period(&self) -> usize {
        0
    }

    /// Iterates over all period indices in order.
    pub fn periods(&self) -> std::ops::Range<usize> {
        0..self.period_count()
    }

    pub fn start_year(&self) -> i32 {
        self.config.start_year
    }

    pub fn end_year(&self) -> i32 {
        self.config.end_year
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn regimes(&self) -> &[Regime; 3] {
        &self.regimes
    }

    /// Remainder warnings recorded by the last [`build`](Self::build).
    pub fn warnings(&self) -> &[CalendarWarning] {
        &self.warnings
    }

    pub fn period_to_time_step(&self) -> &[i32] {
        &self.period_to_time_step
    }

    /// Number of points on the reporting grid.
    pub fn data_period_count(&self) -> usize {
        self.data_period_to_period.len()
    }

    /// Ratio of the reporting step to the model period length at a reporting point.
    pub fn data_offset(&self, data_period: usize) -> Option<i32> {
        self.data_offset.get(data_period).copied()
    }

    /// Model period containing a reporting point.
    pub fn data_period_to_period(&self, data_period: usize) -> Option<usize> {
        self.data_period_to_period.get(data_period).copied()
    }

    /// Samples a per-period series onto the reporting grid.
    ///
    /// Reporting points whose model period has no value are skipped.
    pub fn to_data_grid(&self, per_period: &[f64]) -> Vec<f64> {
        self.data_period_to_period
            .iter()
            .filter_map(|&p| per_period.get(p).copied())
            .collect()
    }
}
