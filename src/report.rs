//! Observation records and the in-memory, newest-first report that holds them.

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ReportError, Result};

/// File extensions accepted for attachments
pub const ACCEPTED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Low,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Priority::Low => Priority::High,
            Priority::Medium => Priority::Low,
            Priority::High => Priority::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(ReportError::validation(format!(
                "unknown priority '{}' (expected low, medium or high)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservationId(Uuid);

impl ObservationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ObservationId {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ReportError::validation(format!("invalid observation id: {}", e)))
    }
}

/// Image payload attached to an observation.
///
/// Bytes are kept exactly as supplied; decoding only happens when a consumer
/// (the vision backend or the PDF encoder) needs it, so a corrupt upload is
/// still accepted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    bytes: Vec<u8>,
    mime_type: String,
    file_name: Option<String>,
}

impl ImageAttachment {
    pub fn from_bytes(bytes: Vec<u8>, file_name: Option<String>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Self {
            bytes,
            mime_type,
            file_name,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !ACCEPTED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ReportError::validation(format!(
                "unsupported image type '{}' (accepted: {})",
                path.display(),
                ACCEPTED_IMAGE_EXTENSIONS.join(", ")
            )));
        }
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Ok(Self::from_bytes(bytes, file_name))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One audited finding. Only constructible once a recommendation exists.
#[derive(Debug, Clone)]
pub struct Observation {
    id: ObservationId,
    image: Option<ImageAttachment>,
    observation_text: String,
    priority: Priority,
    recommendation: String,
    created_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(
        observation_text: impl Into<String>,
        image: Option<ImageAttachment>,
        priority: Priority,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            id: ObservationId::new(),
            image,
            observation_text: observation_text.into(),
            priority,
            recommendation: recommendation.into(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ObservationId {
        self.id
    }

    pub fn image(&self) -> Option<&ImageAttachment> {
        self.image.as_ref()
    }

    pub fn observation_text(&self) -> &str {
        &self.observation_text
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn recommendation(&self) -> &str {
        &self.recommendation
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Ordered, newest-first collection of observations for one session.
#[derive(Debug, Default)]
pub struct Report {
    entries: VecDeque<Observation>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `obs` as the newest entry (index 0).
    pub fn insert_front(&mut self, obs: Observation) -> &Observation {
        debug_assert!(self.position(obs.id()).is_none(), "duplicate observation id");
        self.entries.push_front(obs);
        &self.entries[0]
    }

    /// Removes the entry with `id`; returns None when no such entry exists.
    pub fn remove(&mut self, id: ObservationId) -> Option<Observation> {
        let index = self.position(id)?;
        self.entries.remove(index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.entries.get(index)
    }

    pub fn find(&self, id: ObservationId) -> Option<&Observation> {
        self.entries.iter().find(|o| o.id() == id)
    }

    pub fn position(&self, id: ObservationId) -> Option<usize> {
        self.entries.iter().position(|o| o.id() == id)
    }

    /// Newest to oldest.
    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, Observation> {
        self.entries.iter()
    }

    /// Display serial for the entry at `index`: the oldest entry is 1, the
    /// newest is `len`.
    pub fn serial_for(&self, index: usize) -> usize {
        self.entries.len().saturating_sub(index)
    }

    /// Entries in display order paired with their serial numbers.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &Observation)> + '_ {
        let total = self.entries.len();
        self.entries
            .iter()
            .enumerate()
            .map(move |(index, obs)| (total - index, obs))
    }
}

impl<'a> IntoIterator for &'a Report {
    type Item = &'a Observation;
    type IntoIter = std::collections::vec_deque::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
