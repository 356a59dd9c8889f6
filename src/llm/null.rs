//! Null generation backend.

use super::{CompletionRequest, GenerationError, TextGenerator};
use async_trait::async_trait;

/// Backend used when generation is disabled. Never available, every
/// completion fails with [`GenerationError::Unavailable`].
#[derive(Debug, Default, Clone)]
pub struct NullGenerator;

impl NullGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextGenerator for NullGenerator {
    fn model(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, GenerationError> {
        Err(GenerationError::Unavailable)
    }
}
