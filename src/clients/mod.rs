pub mod canned;
pub mod gemini;
pub mod traits;

use std::sync::Arc;

use tracing::info;

pub use canned::CannedRecommender;
pub use gemini::{Backend, GeminiClient};
pub use traits::{GenerationError, Recommender};

use crate::config::{Config, Provider};
use crate::error::{ReportError, Result};

/// Factory selecting the recommendation backend from configuration
pub fn create_recommender(config: &Config) -> Result<Arc<dyn Recommender>> {
    match config.generator.provider {
        Provider::Gemini => {
            let Some(key) = config.runtime.google_api_key.clone() else {
                return Err(ReportError::config(
                    "Google API key not found. Set GOOGLE_API_KEY in the environment or a .env file, \
                     or run with --offline.",
                ));
            };
            info!(
                "Using Gemini recommendations (text={}, vision={})",
                config.generator.text_model, config.generator.vision_model
            );
            let client = GeminiClient::new(&config.generator, key).map_err(setup_error)?;
            Ok(Arc::new(client))
        }
        Provider::Canned => {
            info!("Using canned recommendations (offline)");
            Ok(Arc::new(CannedRecommender::new()))
        }
    }
}

/// Client construction only happens at startup; failing there is a setup error.
fn setup_error(err: GenerationError) -> ReportError {
    ReportError::config(format!("cannot set up recommendation client: {}", err))
}
