use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::traits::{GenerationError, Recommender};
use crate::config::GeneratorConfig;
use crate::prompts::{Evidence, recommendation_prompt};
use crate::report::ImageAttachment;

/// Which model family handles a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Text,
    Vision,
}

impl Backend {
    pub fn for_image(image: Option<&ImageAttachment>) -> Self {
        if image.is_some() {
            Backend::Vision
        } else {
            Backend::Text
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Gemini `generateContent` client
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: Client,
    api_base: String,
    api_key: String,
    text_model: String,
    vision_model: String,
}

impl GeminiClient {
    pub fn new(config: &GeneratorConfig, api_key: impl Into<String>) -> Result<Self, GenerationError> {
        let mut builder = Client::builder();
        if let Some(ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder.build().map_err(|e| {
            GenerationError::NotConfigured(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
        })
    }

    pub fn model_for(&self, backend: Backend) -> &str {
        match backend {
            Backend::Text => &self.text_model,
            Backend::Vision => &self.vision_model,
        }
    }

    pub fn endpoint(&self, backend: Backend) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base,
            self.model_for(backend)
        )
    }

    /// Request body for an observation; the image part is only added on the
    /// vision branch.
    pub fn build_request(text: &str, image: Option<&ImageAttachment>) -> GenerateRequest {
        let evidence = match image {
            Some(_) => Evidence::ImageAndText,
            None => Evidence::TextOnly,
        };
        let mut parts = vec![RequestPart::Text {
            text: recommendation_prompt(text, evidence),
        }];
        if let Some(image) = image {
            parts.push(RequestPart::Inline {
                inline_data: InlineData {
                    mime_type: image.mime_type().to_string(),
                    data: STANDARD.encode(image.bytes()),
                },
            });
        }
        GenerateRequest {
            contents: vec![Content { parts }],
        }
    }
}

fn extract_text(body: &str) -> Result<String, GenerationError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Malformed(format!("invalid JSON: {}", e)))?;

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        let reason = parsed
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!(" (blocked: {})", r))
            .unwrap_or_default();
        return Err(GenerationError::Malformed(format!(
            "response contained no candidates{}",
            reason
        )));
    };

    let texts: Vec<String> = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    if texts.is_empty() {
        return Err(GenerationError::Malformed(
            "candidate contained no text parts".to_string(),
        ));
    }
    let text = texts.concat();
    if text.trim().is_empty() {
        return Err(GenerationError::Malformed(
            "empty recommendation".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl Recommender for GeminiClient {
    async fn generate(
        &self,
        text: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<String, GenerationError> {
        let backend = Backend::for_image(image);
        debug!(
            "Requesting recommendation (model={}, chars={}, image_bytes={})",
            self.model_for(backend),
            text.len(),
            image.map(|i| i.len()).unwrap_or(0)
        );

        let body = Self::build_request(text, image);
        let res = self
            .client
            .post(self.endpoint(backend))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        let raw = res.text().await?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: raw,
            });
        }

        extract_text(&raw)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> GeminiClient {
        let config = GeneratorConfig {
            api_base: "http://localhost:9/v1beta/".to_string(),
            ..GeneratorConfig::default()
        };
        GeminiClient::new(&config, "test-key").unwrap()
    }

    #[test]
    fn backend_follows_image_presence() {
        let image = ImageAttachment::from_bytes(vec![1, 2, 3], None);
        assert_eq!(Backend::for_image(None), Backend::Text);
        assert_eq!(Backend::for_image(Some(&image)), Backend::Vision);
    }

    #[test]
    fn endpoint_uses_configured_models() {
        let c = client();
        assert_eq!(
            c.endpoint(Backend::Text),
            "http://localhost:9/v1beta/models/gemini-pro:generateContent"
        );
        assert_eq!(
            c.endpoint(Backend::Vision),
            "http://localhost:9/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn text_request_has_single_part() {
        let body = serde_json::to_value(GeminiClient::build_request("leak near pump", None)).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0]["text"].as_str().unwrap().contains("leak near pump"));
    }

    #[test]
    fn vision_request_inlines_base64_image() {
        let image = ImageAttachment::from_bytes(b"abc".to_vec(), None);
        let body =
            serde_json::to_value(GeminiClient::build_request("loose railing", Some(&image))).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["inlineData"]["data"], json!("YWJj"));
        assert_eq!(
            parts[1]["inlineData"]["mimeType"],
            json!("application/octet-stream")
        );
    }

    #[test]
    fn extract_text_concatenates_parts_unmodified() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Install guard rails. " }, { "text": "Inspect weekly.\n" }] }
            }]
        })
        .to_string();
        assert_eq!(
            extract_text(&body).unwrap(),
            "Install guard rails. Inspect weekly.\n"
        );
    }

    #[test]
    fn extract_text_reports_block_reason() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } }).to_string();
        let err = extract_text(&body).unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(ref m) if m.contains("SAFETY")));
    }

    #[test]
    fn extract_text_rejects_garbage() {
        assert!(matches!(
            extract_text("<html>oops</html>"),
            Err(GenerationError::Malformed(_))
        ));
        let no_text = json!({ "candidates": [{ "content": { "parts": [] } }] }).to_string();
        assert!(extract_text(&no_text).is_err());
    }

    #[test]
    fn extract_text_rejects_blank_reply() {
        for blank in ["", "  \n"] {
            let body = json!({
                "candidates": [{ "content": { "parts": [{ "text": blank }] } }]
            })
            .to_string();
            let err = extract_text(&body).unwrap_err();
            assert!(matches!(err, GenerationError::Malformed(ref m) if m == "empty recommendation"));
        }
    }
}
