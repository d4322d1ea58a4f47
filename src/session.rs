//! Report session: the boundary the interactive shell and CLI drive.
//!
//! A submission is validated, sent to the recommender, and only then turned
//! into an observation. Validation and generation failures leave the report
//! exactly as it was.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::{GenerationError, Recommender};
use crate::error::{ReportError, Result};
use crate::export::{self, Export, ExportFormat, TableOptions};
use crate::report::{ImageAttachment, Observation, ObservationId, Priority, Report};

/// Raw user input for one submission
#[derive(Debug, Clone, Default)]
pub struct ObservationDraft {
    pub text: String,
    pub image: Option<ImageAttachment>,
    pub priority: Option<Priority>,
}

impl ObservationDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

pub struct ReportSession {
    recommender: Arc<dyn Recommender>,
    report: Report,
    table_options: TableOptions,
}

impl ReportSession {
    pub fn new(recommender: Arc<dyn Recommender>) -> Self {
        Self {
            recommender,
            report: Report::new(),
            table_options: TableOptions::default(),
        }
    }

    pub fn with_table_options(mut self, options: TableOptions) -> Self {
        self.table_options = options;
        self
    }

    pub fn recommender_name(&self) -> &str {
        self.recommender.name()
    }

    /// Validates the draft, asks for a recommendation and records the new
    /// observation at the front of the report.
    pub async fn submit(&mut self, draft: ObservationDraft) -> Result<&Observation> {
        if draft.text.trim().is_empty() {
            return Err(ReportError::validation(
                "Please provide a description for the observation.",
            ));
        }

        let generated = self
            .recommender
            .generate(&draft.text, draft.image.as_ref())
            .await
            .and_then(|text| {
                if text.trim().is_empty() {
                    Err(GenerationError::Malformed("empty recommendation".to_string()))
                } else {
                    Ok(text)
                }
            });
        let recommendation = match generated {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Recommendation via {} failed, nothing recorded: {}",
                    self.recommender.name(),
                    e
                );
                return Err(e.into());
            }
        };

        let observation = Observation::new(
            draft.text,
            draft.image,
            draft.priority.unwrap_or_default(),
            recommendation,
        );
        info!(
            "Observation {} added (priority={}, image={}, total={})",
            observation.id(),
            observation.priority(),
            observation.image().is_some(),
            self.report.len() + 1
        );
        Ok(self.report.insert_front(observation))
    }

    /// No-op when `id` is unknown.
    pub fn remove(&mut self, id: ObservationId) -> Option<Observation> {
        let removed = self.report.remove(id);
        if removed.is_some() {
            info!("Observation {} removed", id);
        }
        removed
    }

    pub fn clear(&mut self) {
        info!("Report cleared ({} observation(s) dropped)", self.report.len());
        self.report.clear();
    }

    pub fn list(&self) -> &Report {
        &self.report
    }

    pub fn export(&self, format: ExportFormat) -> Result<Export> {
        export::encode(&self.report, format, self.table_options)
    }

    pub fn export_to_dir(&self, format: ExportFormat, dir: &Path) -> Result<PathBuf> {
        let (path, export) = export::write_to_dir(&self.report, format, dir, self.table_options)?;
        for diagnostic in &export.diagnostics {
            warn!("{} export: {}", format, diagnostic);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::CannedRecommender;

    #[tokio::test]
    async fn submit_defaults_priority_to_medium() {
        let mut session = ReportSession::new(Arc::new(CannedRecommender::new()));
        let obs = session.submit(ObservationDraft::new("wet floor")).await.unwrap();
        assert_eq!(obs.priority(), Priority::Medium);
        assert!(obs.recommendation().contains("wet floor"));
    }

    #[tokio::test]
    async fn whitespace_text_is_rejected() {
        let mut session = ReportSession::new(Arc::new(CannedRecommender::new()));
        let err = session
            .submit(ObservationDraft::new(" \n\t "))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Validation { .. }));
        assert!(session.list().is_empty());
    }

    #[tokio::test]
    async fn explicit_priority_is_kept() {
        let mut session = ReportSession::new(Arc::new(CannedRecommender::new()));
        let obs = session
            .submit(ObservationDraft::new("exposed wiring").with_priority(Priority::High))
            .await
            .unwrap();
        assert_eq!(obs.priority(), Priority::High);
    }
}
