//! Tabular export: one row per observation, images excluded.

use crate::error::{ReportError, Result};
use crate::report::Report;

pub const SERIAL_HEADER: &str = "Sr. No.";
pub const PRIORITY_HEADER: &str = "Priority";
pub const OBSERVATION_HEADER: &str = "Observation";
pub const RECOMMENDATION_HEADER: &str = "Recommendation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    pub include_priority: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            include_priority: true,
        }
    }
}

pub fn header(options: TableOptions) -> Vec<&'static str> {
    let mut cols = vec![SERIAL_HEADER];
    if options.include_priority {
        cols.push(PRIORITY_HEADER);
    }
    cols.push(OBSERVATION_HEADER);
    cols.push(RECOMMENDATION_HEADER);
    cols
}

/// Encodes the report as UTF-8 CSV. An empty report yields an empty payload.
pub fn encode(report: &Report, options: TableOptions) -> Result<Vec<u8>> {
    if report.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = ::csv::WriterBuilder::new()
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(header(options))?;
    for (serial, obs) in report.numbered() {
        let serial = serial.to_string();
        let mut row: Vec<&str> = vec![serial.as_str()];
        if options.include_priority {
            row.push(obs.priority().as_str());
        }
        row.push(obs.observation_text());
        row.push(obs.recommendation());
        writer.write_record(&row)?;
    }

    writer.into_inner().map_err(|e| ReportError::Export {
        message: format!("CSV flush failed: {}", e.error()),
    })
}
