//! Report export: CSV table and paginated PDF.
//!
//! Both encoders are pure functions of a report snapshot. File names and MIME
//! types are fixed so downstream consumers can rely on them.

pub mod csv;
pub mod pdf;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

pub use self::csv::TableOptions;
pub use self::pdf::PdfDocument;

use crate::error::{ReportError, Result};
use crate::report::Report;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Csv,
    Pdf,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 2] = [ExportFormat::Csv, ExportFormat::Pdf];

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "audit_report.csv",
            ExportFormat::Pdf => "audit_report.pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(ReportError::validation(format!(
                "unknown export format '{}'",
                other
            ))),
        }
    }
}

/// An encoded download payload
#[derive(Debug)]
pub struct Export {
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
    /// Per-observation problems that were replaced by inline notes
    pub diagnostics: Vec<ReportError>,
}

impl Export {
    pub fn file_name(&self) -> &'static str {
        self.format.file_name()
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

pub fn encode(report: &Report, format: ExportFormat, options: TableOptions) -> Result<Export> {
    match format {
        ExportFormat::Csv => Ok(Export {
            format,
            bytes: csv::encode(report, options)?,
            diagnostics: Vec::new(),
        }),
        ExportFormat::Pdf => {
            let PdfDocument { bytes, diagnostics } = pdf::encode(report)?;
            Ok(Export {
                format,
                bytes,
                diagnostics,
            })
        }
    }
}

/// Encodes the report and writes it to `<dir>/<fixed file name>`.
///
/// The payload is fully encoded before the file is touched, so a failed
/// export never leaves a partial file behind.
pub fn write_to_dir(
    report: &Report,
    format: ExportFormat,
    dir: &Path,
    options: TableOptions,
) -> Result<(PathBuf, Export)> {
    let export = encode(report, format, options)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format.file_name());
    std::fs::write(&path, &export.bytes)?;
    info!(
        "Exported {} observation(s) to {} ({} bytes, {} warning(s))",
        report.len(),
        path.display(),
        export.bytes.len(),
        export.diagnostics.len()
    );
    Ok((path, export))
}
