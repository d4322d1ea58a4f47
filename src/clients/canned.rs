use async_trait::async_trait;

use crate::clients::traits::{GenerationError, Recommender};
use crate::report::ImageAttachment;

/// Deterministic, local recommender for offline use and tests (no network)
#[derive(Debug, Default, Clone)]
pub struct CannedRecommender;

impl CannedRecommender {
    pub fn new() -> Self {
        Self
    }

    fn compose(text: &str, image: Option<&ImageAttachment>) -> String {
        let subject = text.trim();
        let evidence = match image {
            Some(_) => " Compare the site against the attached photo once the fix is in place.",
            None => "",
        };
        format!(
            "Isolate the area around \"{}\", assign a responsible owner to correct the condition, \
             and verify the correction before normal work resumes.{}",
            subject, evidence
        )
    }
}

#[async_trait]
impl Recommender for CannedRecommender {
    async fn generate(
        &self,
        text: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<String, GenerationError> {
        Ok(Self::compose(text, image))
    }

    fn name(&self) -> &str {
        "canned"
    }
}
