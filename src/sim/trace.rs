//! Append-only solver trace: one row per (period, iteration, market, variable).
//!
//! The solver never reads the trace back. Rows are emitted iteration by
//! iteration, variable by variable, market by market, so inside any
//! `(period, variable)` group they are already sorted by `(iter, mktid)`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::marketplace::MarketId;

/// Quantity recorded in a trace row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceVariable {
    Price,
    Supply,
    Demand,
    /// Excess demand, `demand - supply`.
    Fx,
    /// Price step taken from this iterate.
    Deltax,
    /// Derivative estimate used for the step.
    Deltafx,
}

impl TraceVariable {
    /// Emission order within an iteration.
    pub const ALL: [Self; 6] = [
        Self::Price,
        Self::Supply,
        Self::Demand,
        Self::Fx,
        Self::Deltax,
        Self::Deltafx,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Supply => "supply",
            Self::Demand => "demand",
            Self::Fx => "fx",
            Self::Deltax => "deltax",
            Self::Deltafx => "deltafx",
        }
    }
}

impl fmt::Display for TraceVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TraceVariable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("unknown trace variable \"{s}\""))
    }
}

/// One trace record. Field names are the column names of the trace stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceRow {
    pub period: usize,
    pub iter: usize,
    pub variable: TraceVariable,
    pub mktid: MarketId,
    pub solvable: bool,
    pub value: f64,
}

/// Destination for trace rows.
pub trait TraceSink {
    fn append(&mut self, row: TraceRow);
}

impl TraceSink for Vec<TraceRow> {
    fn append(&mut self, row: TraceRow) {
        self.push(row);
    }
}

/// Discards every row.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn append(&mut self, _row: TraceRow) {}
}

/// In-memory trace for a whole scenario.
#[derive(Debug, Clone, Default)]
pub struct SolverTrace {
    rows: Vec<TraceRow>,
}

impl SolverTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[TraceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<TraceRow> {
        self.rows
    }

    /// Rows of one `(period, variable)` group, in emission order.
    pub fn group(
        &self,
        period: usize,
        variable: TraceVariable,
    ) -> impl Iterator<Item = &TraceRow> {
        self.rows
            .iter()
            .filter(move |r| r.period == period && r.variable == variable)
    }

    /// Last iteration recorded for `period`, if any.
    pub fn last_iteration(&self, period: usize) -> Option<usize> {
        self.rows
            .iter()
            .filter(|r| r.period == period)
            .map(|r| r.iter)
            .max()
    }

    /// `true` when every `(period, variable)` group is sorted by `(iter, mktid)`.
    pub fn is_group_sorted(&self) -> bool {
        is_group_sorted(&self.rows)
    }
}

impl TraceSink for SolverTrace {
    fn append(&mut self, row: TraceRow) {
        self.rows.push(row);
    }
}

/// Checks the `(iter, mktid)` ordering inside every `(period, variable)` group.
pub fn is_group_sorted(rows: &[TraceRow]) -> bool {
    use std::collections::HashMap;

    let mut last: HashMap<(usize, TraceVariable), (usize, MarketId)> = HashMap::new();
    for row in rows {
        let key = (row.period, row.variable);
        let pos = (row.iter, row.mktid);
        if let Some(prev) = last.insert(key, pos) {
            if prev >= pos {
                return false;
            }
        }
    }
    true
}
