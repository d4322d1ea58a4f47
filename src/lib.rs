pub mod clients;
pub mod config;
pub mod error;
pub mod export;
pub mod prompts;
pub mod report;
pub mod session;
pub mod tui;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{ReportError, Result};
use crate::export::ExportFormat;
use crate::report::{ImageAttachment, Priority};
use crate::session::{ObservationDraft, ReportSession};

/// One worksheet row for batch mode
#[derive(Debug, Deserialize)]
pub struct WorksheetRow {
    #[serde(rename = "Observation")]
    pub observation: String,
    #[serde(rename = "Image", default)]
    pub image: Option<String>,
    #[serde(rename = "Priority", default)]
    pub priority: Option<String>,
}

#[derive(Debug, Default)]
pub struct BatchStats {
    pub rows: usize,
    pub added: usize,
    pub skipped: usize,
    /// Worksheet line where each skipped record starts
    pub skipped_lines: Vec<u64>,
    pub exported: Vec<PathBuf>,
}

impl BatchStats {
    fn skip(&mut self, line: u64) {
        self.skipped += 1;
        self.skipped_lines.push(line);
    }
}

impl WorksheetRow {
    /// Turns the row into a draft; image paths resolve against `base_dir`.
    pub fn into_draft(self, base_dir: &Path) -> Result<ObservationDraft> {
        let mut draft = ObservationDraft::new(self.observation);
        if let Some(priority) = self.priority.filter(|p| !p.trim().is_empty()) {
            draft = draft.with_priority(priority.parse::<Priority>()?);
        }
        if let Some(image) = self.image.filter(|p| !p.trim().is_empty()) {
            let path = base_dir.join(image.trim());
            draft = draft.with_image(ImageAttachment::from_path(path)?);
        }
        Ok(draft)
    }
}

/// Builds a report from a CSV worksheet and exports it.
///
/// Rows are submitted in file order, so the last row ends up newest. A row
/// that fails validation or generation is logged and skipped.
pub async fn run_batch(
    session: &mut ReportSession,
    worksheet: &Path,
    formats: &[ExportFormat],
    output_dir: &Path,
) -> Result<BatchStats> {
    let base_dir = worksheet
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(worksheet)
        .map_err(|e| ReportError::validation(format!("cannot read worksheet: {}", e)))?;

    let headers = rdr
        .headers()
        .map_err(|e| ReportError::validation(format!("cannot read worksheet header: {}", e)))?
        .clone();

    let mut stats = BatchStats::default();
    for record in rdr.records() {
        stats.rows += 1;
        let (line, row) = match record {
            Ok(record) => {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                let row = record
                    .deserialize::<WorksheetRow>(Some(&headers))
                    .map_err(|e| ReportError::validation(e.to_string()));
                (line, row)
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                (line, Err(ReportError::validation(e.to_string())))
            }
        };
        let draft = match row.and_then(|r| r.into_draft(&base_dir)) {
            Ok(draft) => draft,
            Err(e) => {
                warn!("Row at line {} skipped: {}", line, e);
                stats.skip(line);
                continue;
            }
        };
        match session.submit(draft).await {
            Ok(obs) => {
                info!("Row at line {} recorded as {}", line, obs.id());
                stats.added += 1;
            }
            Err(e) if e.is_submission_error() => {
                warn!("Row at line {} skipped: {}", line, e);
                stats.skip(line);
            }
            Err(e) => return Err(e),
        }
    }

    for format in formats {
        stats.exported.push(session.export_to_dir(*format, output_dir)?);
    }
    Ok(stats)
}
