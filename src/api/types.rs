//! API response and query types.

use serde::{Deserialize, Serialize};

use crate::runner::TechnologyRecord;
use crate::sim::calendar::Calendar;
use crate::sim::summary::SummaryReport;
use crate::sim::types::SolveOutcome;

/// One model period.
#[derive(Debug, Serialize)]
pub struct PeriodRecord {
    pub period: usize,
    /// Representative (first) year of the period.
    pub year: i32,
    /// Years covered by the period.
    pub timestep: i32,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub start_year: i32,
    pub end_year: i32,
    pub period_count: usize,
    pub periods: Vec<PeriodRecord>,
}

impl From<&Calendar> for CalendarResponse {
    fn from(calendar: &Calendar) -> Self {
        let periods = calendar
            .periods()
            .filter_map(|period| {
                Some(PeriodRecord {
                    period,
                    year: calendar.period_to_year(period)?,
                    timestep: calendar.timestep_of(period)?,
                })
            })
            .collect();
        Self {
            start_year: calendar.start_year(),
            end_year: calendar.end_year(),
            period_count: calendar.period_count(),
            periods,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OutcomesResponse<'a> {
    pub scenario: &'a str,
    pub summary: &'a SummaryReport,
    pub outcomes: &'a [SolveOutcome],
    pub technologies: &'a [TechnologyRecord],
    /// Solved prices per market id, sampled onto the reporting grid.
    pub reporting_prices: Vec<Vec<f64>>,
}

/// Samples each market's solved price series onto the calendar's reporting grid.
pub fn reporting_prices(
    calendar: &Calendar,
    outcomes: &[SolveOutcome],
    market_count: usize,
) -> Vec<Vec<f64>> {
    (0..market_count)
        .map(|m| {
            let series: Vec<f64> = outcomes
                .iter()
                .filter_map(|o| o.prices.get(m).copied())
                .collect();
            calendar.to_data_grid(&series)
        })
        .collect()
}

/// Optional filters for the trace endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct TraceQuery {
    pub period: Option<usize>,
    /// Trace variable name, e.g. `price` or `fx`.
    pub variable: Option<String>,
    /// Market id.
    pub market: Option<usize>,
}

/// Error response body for 400-class errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::calendar::CalendarConfig;
    use crate::sim::types::{SolveStatus, StrategyKind};

    #[test]
    fn calendar_response_lists_every_period() {
        let calendar = Calendar::new(CalendarConfig::default());
        let response = calendar.as_ref().map(CalendarResponse::from).ok();
        let periods = response.map(|r| r.periods).unwrap_or_default();
        assert_eq!(periods.len(), 8);
        assert_eq!(periods[0].year, 2005);
        assert_eq!(periods[4].year, 2030);
        assert_eq!(periods[4].timestep, 10);
    }

    #[test]
    fn reporting_prices_follow_data_grid() {
        let calendar = Calendar::new(CalendarConfig::default()).expect("valid");
        let outcomes: Vec<SolveOutcome> = calendar
            .periods()
            .map(|period| SolveOutcome {
                period,
                year: calendar.period_to_year(period).unwrap_or_default(),
                status: SolveStatus::Converged,
                iterations: 1,
                residual: 0.0,
                prices: vec![period as f64, 10.0 * period as f64],
                strategy: StrategyKind::Newton,
                restarts: 0,
            })
            .collect();
        let grid = reporting_prices(&calendar, &outcomes, 2);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].len(), calendar.data_period_count());
        assert_eq!(grid[0].last(), Some(&7.0));
        assert_eq!(grid[1].last(), Some(&70.0));
    }
}
