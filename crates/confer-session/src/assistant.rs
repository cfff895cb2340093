//! Assistant collaborator contract.
//!
//! Response generation is an opaque remote capability: the manager hands it
//! a fully interpolated prompt and gets text back. Failures surface to the
//! caller and are never retried here.

use async_trait::async_trait;

use confer_core::error::Result;

/// Produces assistant replies from interpolated prompts.
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Offline assistant producing a canned outline, used by the demo binary.
pub struct CannedAssistant;

#[async_trait]
impl Assistant for CannedAssistant {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = prompt.lines().last().unwrap_or(prompt).trim();
        Ok(format!(
            "Here is a starting point for \"{}\":\n\
             1. Name the outcome you want and when you want it.\n\
             2. List what you already have that moves you toward it.\n\
             3. Pick the single next step you can finish this week.",
            request
        ))
    }
}
