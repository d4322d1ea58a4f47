//! Prompt templates sent to the recommendation backend.

/// Persona line shared by both templates
const AUDITOR_PERSONA: &str = "You are an expert safety auditor reviewing an observation.";

const STYLE_GUIDANCE: &str = "The tone should be professional and clear.";

/// Which evidence the backend is given alongside the instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    TextOnly,
    ImageAndText,
}

impl Evidence {
    fn describe(self) -> &'static str {
        match self {
            Evidence::TextOnly => "text",
            Evidence::ImageAndText => "image and text",
        }
    }
}

/// Builds the auditor prompt embedding the user's observation text.
pub fn recommendation_prompt(observation: &str, evidence: Evidence) -> String {
    format!(
        "{persona}\n\
         Based on the following {evidence}, provide a concise, actionable recommendation to rectify the issue.\n\
         {style}\n\
         Observation: \"{observation}\"\n",
        persona = AUDITOR_PERSONA,
        evidence = evidence.describe(),
        style = STYLE_GUIDANCE,
        observation = observation,
    )
}
