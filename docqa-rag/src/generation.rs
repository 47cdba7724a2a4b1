//! Text generation capability used to synthesize answers.

use async_trait::async_trait;

use crate::error::Result;

/// A language model that turns a fully formatted prompt into text.
///
/// The core never streams; it waits for the complete output.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
