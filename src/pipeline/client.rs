//! The extraction-service seam: one instruction + one page image in, raw
//! response text out.
//!
//! The pipeline never talks to a provider SDK directly; it goes through
//! [`ExtractionClient`], a one-method trait. The production implementation
//! ([`VisionClient`]) wraps an `edgequake-llm` provider; tests substitute a
//! scripted mock and the rest of the pipeline cannot tell the difference.
//!
//! Transport/service failures surface here as [`TransportError`].
//! Malformed *content* is not this layer's concern — the page processor
//! parses the returned text and classifies bad JSON separately, because the
//! two failure modes have different retry semantics.

use crate::config::ExtractionConfig;
use crate::error::ExamError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// The extraction call itself failed: network, service, or provider error.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Interface to the multimodal extraction service.
///
/// A single synchronous request carrying one instruction and one image;
/// no batching.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Send the page image with its task instruction, returning the raw
    /// response text.
    async fn extract(&self, instruction: &str, image: ImageData) -> Result<String, TransportError>;
}

/// Production [`ExtractionClient`] backed by an `edgequake-llm` vision
/// provider.
pub struct VisionClient {
    provider: Arc<dyn LLMProvider>,
    max_tokens: usize,
    temperature: f32,
}

impl VisionClient {
    pub fn new(provider: Arc<dyn LLMProvider>, max_tokens: usize, temperature: f32) -> Self {
        VisionClient {
            provider,
            max_tokens,
            temperature,
        }
    }
}

#[async_trait]
impl ExtractionClient for VisionClient {
    async fn extract(&self, instruction: &str, image: ImageData) -> Result<String, TransportError> {
        // One user turn: the instruction text plus the page as an attachment,
        // mirroring the single-message shape the extraction prompts assume.
        let messages = vec![ChatMessage::user_with_images(instruction, vec![image])];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        debug!(
            "extraction response: {} in / {} out tokens, {} chars",
            response.prompt_tokens,
            response.completion_tokens,
            response.content.len()
        );
        Ok(response.content)
    }
}

/// Resolve the extraction client, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.client`) — used as-is; this is how tests
///    inject a mock and how callers add middleware.
/// 2. **Named provider** (`config.provider_name`) — reads the matching API
///    key (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, …) from the environment.
/// 3. **Auto-detection** — `ProviderFactory::from_env()` scans the known key
///    variables and picks the first configured provider.
///
/// A missing credential is a fatal configuration error reported before any
/// page work starts; there is no partial processing without a client.
pub fn resolve_client(config: &ExtractionConfig) -> Result<Arc<dyn ExtractionClient>, ExamError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    let default_model = "claude-sonnet-4-20250514";

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(default_model);
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            ExamError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        })?;
        return Ok(Arc::new(VisionClient::new(
            provider,
            config.max_tokens,
            config.temperature,
        )));
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExamError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No extraction provider could be auto-detected from environment.\n\
                Set ANTHROPIC_API_KEY, OPENAI_API_KEY, or pass --provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(Arc::new(VisionClient::new(
        provider,
        config.max_tokens,
        config.temperature,
    )))
}
