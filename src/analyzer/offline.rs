use async_trait::async_trait;

use super::{ModelError, SummaryModel, VisionModel};

/// Stand-in for runs without credentials or network; every call fails so the
/// analyzer takes its simulated path.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineModel;

#[async_trait]
impl VisionModel for OfflineModel {
    async fn analyze(&self, image_reference: &str, _prompt: &str) -> Result<String, ModelError> {
        Err(ModelError::Unavailable(format!(
            "offline mode, {image_reference} not sent"
        )))
    }
}

#[async_trait]
impl SummaryModel for OfflineModel {
    async fn summarize(&self, _prompt: &str) -> Result<String, ModelError> {
        Err(ModelError::Unavailable("offline mode".to_string()))
    }
}
