// Description rewriting seam
//
// Optional capability: the factory returns None when no API key is
// configured and the pipeline passes descriptions through untouched.
// Errors from a configured rewriter must never abort an upload; the
// pipeline falls back to the original text.

pub mod llm;

use async_trait::async_trait;

use crate::config::RewriteConfig;
use crate::error::Result;

/// Main trait for description rewriting
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DescriptionRewriter: Send + Sync {
    /// Rewrite raw description text into a sanitized version
    async fn rewrite(&self, text: &str) -> Result<String>;
}

/// Factory for creating rewriter instances
pub struct RewriterFactory;

impl RewriterFactory {
    /// Create a rewriter when the capability is configured
    pub fn create_optional(config: RewriteConfig) -> Option<Box<dyn DescriptionRewriter>> {
        config
            .api_key
            .is_some()
            .then(|| Box::new(llm::LlmRewriter::new(config)) as Box<dyn DescriptionRewriter>)
    }
}
