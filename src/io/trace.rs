//! CSV export of the solver trace and the market key.
//!
//! The trace stream opens with a three-line preamble: a title line and a
//! metadata line (both `#`-prefixed), then the column header
//! `period,iter,variable,mktid,solvable,value`. Rows follow in emission
//! order, which keeps every `(period, variable)` group sorted by
//! `(iter, mktid)`.
//!
//! The key stream maps `(period, mktid)` to the market's `region:name` label.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::error::ScenarioError;
use crate::sim::marketplace::Marketplace;
use crate::sim::trace::TraceRow;

/// Title line of the trace preamble.
pub const TRACE_TITLE: &str = "# market-equilibrium solver trace";

/// Column header of the key stream.
const KEY_HEADER: [&str; 3] = ["period", "mktid", "mktname"];

/// Run-level facts written to the second preamble line.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceMetadata {
    pub scenario: String,
    pub periods: usize,
    pub markets: usize,
    pub strategy: String,
}

/// Writes the trace to a file at `path`.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_trace(rows: &[TraceRow], metadata: &TraceMetadata, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_trace(rows, metadata, io::BufWriter::new(file))
}

/// Writes the preamble and every trace row to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_trace(rows: &[TraceRow], metadata: &TraceMetadata, mut writer: impl Write) -> io::Result<()> {
    writeln!(writer, "{TRACE_TITLE}")?;
    writeln!(
        writer,
        "# scenario={} periods={} markets={} strategy={}",
        metadata.scenario, metadata.periods, metadata.markets, metadata.strategy
    )?;

    // the header row comes from TraceRow's field names
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    if rows.is_empty() {
        wtr.write_record(["period", "iter", "variable", "mktid", "solvable", "value"])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parses a trace stream written by [`write_trace`], skipping the preamble.
///
/// # Errors
///
/// Returns a `csv::Error` on malformed rows.
pub fn read_trace(reader: impl Read) -> Result<Vec<TraceRow>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .from_reader(reader);
    rdr.deserialize().collect()
}

/// Reads a trace file written by [`export_trace`].
///
/// # Errors
///
/// Returns [`ScenarioError::Io`] if the file cannot be opened and
/// [`ScenarioError::Csv`] on malformed rows.
pub fn import_trace(path: &Path) -> Result<Vec<TraceRow>, ScenarioError> {
    let file = File::open(path)?;
    Ok(read_trace(io::BufReader::new(file))?)
}

/// Writes the market key to a file at `path`.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_key(marketplace: &Marketplace, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_key(marketplace, io::BufWriter::new(file))
}

/// Writes one `period,mktid,mktname` row per market and period.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_key(marketplace: &Marketplace, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(KEY_HEADER)?;

    for period in 0..marketplace.period_count() {
        for (id, market) in marketplace.markets() {
            wtr.write_record(&[period.to_string(), id.to_string(), market.label()])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
