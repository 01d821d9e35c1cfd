//! Error taxonomy shared by the calendar, solver and scenario runner.

use std::io;

use crate::config::ConfigError;
use crate::sim::marketplace::MarketId;

/// Failures raised while configuring or querying the period calendar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    /// Invalid calendar parameters. Fatal; caught before any period is solved.
    #[error("calendar configuration error: {field}: {message}")]
    Configuration {
        /// Calendar input that failed validation (e.g. `"time_step1"`).
        field: &'static str,
        /// Human-readable constraint description.
        message: String,
    },

    /// A calendar year with no registered model period.
    #[error("year {year} is outside the model calendar")]
    YearOutOfRange { year: i32 },

    /// A period index past the end of the calendar.
    #[error("period {period} is outside the model calendar ({count} periods)")]
    PeriodOutOfRange { period: usize, count: usize },
}

/// Hard failures of a single period solve.
///
/// Running out of iterations is not an error: it is reported through
/// [`SolveStatus::Exhausted`](crate::sim::types::SolveStatus) on an otherwise
/// usable outcome.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    /// A price update or excess demand became non-finite.
    #[error("period {period} diverged at iteration {iteration} in market {market}: {reason}")]
    Diverged {
        period: usize,
        iteration: usize,
        market: MarketId,
        reason: &'static str,
    },

    /// The solve was cancelled between iterations.
    #[error("period {period} cancelled before iteration {iteration}")]
    Cancelled { period: usize, iteration: usize },
}

/// Anything that can stop a scenario run.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("invalid scenario configuration ({} error(s)): {}", .0.len(), join_errors(.0))]
    Config(Vec<ConfigError>),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_error_names_the_field() {
        let err = CalendarError::Configuration {
            field: "time_step2",
            message: "must be > 0".into(),
        };
        assert!(err.to_string().contains("time_step2"));
    }

    #[test]
    fn scenario_error_lists_config_errors() {
        let err = ScenarioError::Config(vec![
            ConfigError {
                field: "solver.tolerance".into(),
                message: "must be > 0".into(),
            },
            ConfigError {
                field: "markets".into(),
                message: "at least one market is required".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("2 error(s)"));
        assert!(msg.contains("solver.tolerance"));
    }
}
