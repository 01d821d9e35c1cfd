//! Post-hoc summary of a scenario's period outcomes.

use std::fmt;

use serde::Serialize;

use super::types::{SolveOutcome, SolveStatus};

/// Aggregate figures derived from the outcomes of a complete scenario run.
///
/// Computed after the fact from `&[SolveOutcome]` so the report can never
/// disagree with the per-period records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    /// Periods solved.
    pub periods: usize,
    /// Periods that met the convergence criterion.
    pub converged: usize,
    /// Periods that ran out of iterations.
    pub exhausted: usize,
    /// Iterations summed over every period.
    pub total_iterations: usize,
    /// Largest iteration count of any single period.
    pub max_iterations: usize,
    /// Largest final residual of any period.
    pub worst_residual: f64,
    /// Period with the largest final residual.
    pub worst_period: Option<usize>,
    /// Random restarts used across the run.
    pub restarts: usize,
}

impl SummaryReport {
    /// Computes the report from every period outcome of a run.
    pub fn from_outcomes(outcomes: &[SolveOutcome]) -> Self {
        let mut report = Self {
            periods: outcomes.len(),
            converged: 0,
            exhausted: 0,
            total_iterations: 0,
            max_iterations: 0,
            worst_residual: 0.0,
            worst_period: None,
            restarts: 0,
        };

        for o in outcomes {
            match o.status {
                SolveStatus::Converged => report.converged += 1,
                SolveStatus::Exhausted => report.exhausted += 1,
            }
            report.total_iterations += o.iterations;
            report.max_iterations = report.max_iterations.max(o.iterations);
            report.restarts += o.restarts;
            if report.worst_period.is_none() || o.residual > report.worst_residual {
                report.worst_residual = o.residual;
                report.worst_period = Some(o.period);
            }
        }

        report
    }

    pub fn all_converged(&self) -> bool {
        self.exhausted == 0
    }

    /// Mean iterations per period, 0 for an empty run.
    pub fn mean_iterations(&self) -> f64 {
        if self.periods == 0 {
            0.0
        } else {
            self.total_iterations as f64 / self.periods as f64
        }
    }
}

impl fmt::Display for SummaryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Solver Summary ---")?;
        writeln!(f, "Periods solved:        {}", self.periods)?;
        writeln!(f, "Converged:             {}", self.converged)?;
        writeln!(f, "Exhausted:             {}", self.exhausted)?;
        writeln!(
            f,
            "Iterations:            {} total, {:.1} mean, {} max",
            self.total_iterations,
            self.mean_iterations(),
            self.max_iterations
        )?;
        match self.worst_period {
            Some(p) => writeln!(
                f,
                "Worst residual:        {:.3e} (period {p})",
                self.worst_residual
            )?,
            None => writeln!(f, "Worst residual:        n/a")?,
        }
        write!(f, "Random restarts:       {}", self.restarts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::types::StrategyKind;

    fn outcome(period: usize, status: SolveStatus, iterations: usize, residual: f64) -> SolveOutcome {
        SolveOutcome {
            period,
            year: 2005 + 5 * period as i32,
            status,
            iterations,
            residual,
            prices: vec![1.0],
            strategy: StrategyKind::Newton,
            restarts: usize::from(status == SolveStatus::Exhausted),
        }
    }

    #[test]
    fn empty_run_reports_zeros() {
        let report = SummaryReport::from_outcomes(&[]);
        assert_eq!(report.periods, 0);
        assert_eq!(report.worst_period, None);
        assert_eq!(report.mean_iterations(), 0.0);
        assert!(report.all_converged());
    }

    #[test]
    fn counts_and_worst_period() {
        let outcomes = vec![
            outcome(0, SolveStatus::Converged, 4, 1e-10),
            outcome(1, SolveStatus::Exhausted, 100, 3e-2),
            outcome(2, SolveStatus::Converged, 6, 1e-9),
        ];
        let report = SummaryReport::from_outcomes(&outcomes);
        assert_eq!(report.converged, 2);
        assert_eq!(report.exhausted, 1);
        assert_eq!(report.total_iterations, 110);
        assert_eq!(report.max_iterations, 100);
        assert_eq!(report.worst_period, Some(1));
        assert_eq!(report.restarts, 1);
        assert!(!report.all_converged());
    }

    #[test]
    fn display_does_not_panic() {
        let report = SummaryReport::from_outcomes(&[outcome(0, SolveStatus::Converged, 3, 0.0)]);
        let s = format!("{report}");
        assert!(s.contains("Solver Summary"));
    }
}
