//! The seam between the pipeline and the model.
//!
//! Stages only ever see [`InferenceService`]: images plus a prompt in, text
//! and/or an image out. That keeps every stage testable with a scripted
//! service, and lets a caller plug in any backend. [`LlmInference`] is the
//! production implementation over an `edgequake_llm` provider.
//!
//! ## Retry Strategy
//!
//! Transport failures (HTTP 429/5xx, timeouts) are retried with exponential
//! backoff (`retry_backoff_ms * 2^attempt`). This is transport-level only:
//! a well-formed but *wrong* answer is never retried here, it surfaces as
//! the calling stage's parse error.

use crate::config::PipelineConfig;
use crate::error::InferenceError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// What the caller expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseModality {
    /// Free text, expected to contain one JSON object.
    Text,
    /// An edited image, inline in the response.
    Image,
}

/// One call to the inference service.
#[derive(Clone)]
pub struct InferenceRequest {
    pub images: Vec<ImageData>,
    pub prompt: String,
    pub modality: ResponseModality,
}

impl InferenceRequest {
    pub fn text(prompt: impl Into<String>, images: Vec<ImageData>) -> Self {
        Self {
            images,
            prompt: prompt.into(),
            modality: ResponseModality::Text,
        }
    }

    pub fn image_edit(prompt: impl Into<String>, images: Vec<ImageData>) -> Self {
        Self {
            images,
            prompt: prompt.into(),
            modality: ResponseModality::Image,
        }
    }
}

impl fmt::Debug for InferenceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceRequest")
            .field("images", &self.images.len())
            .field("prompt_len", &self.prompt.len())
            .field("modality", &self.modality)
            .finish()
    }
}

/// The service's answer.
#[derive(Debug, Clone, Default)]
pub struct InferenceResponse {
    pub text: String,
    /// Raw encoded image bytes (PNG/JPEG/WebP), when one was returned.
    pub image: Option<Vec<u8>>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Anything that can answer an [`InferenceRequest`].
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError>;
}

const SYSTEM_PROMPT: &str = "You are part of an automated pipeline that produces social-media carousel images. Follow the output format you are given exactly.";

const IMAGE_OUTPUT_INSTRUCTION: &str = "\n\nReturn the edited slide as an inline image data URI (data:image/png;base64,...) and nothing else.";

/// [`InferenceService`] over an `edgequake_llm` provider.
pub struct LlmInference {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl LlmInference {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl InferenceService for LlmInference {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let prompt = match request.modality {
            ResponseModality::Text => request.prompt,
            ResponseModality::Image => format!("{}{}", request.prompt, IMAGE_OUTPUT_INSTRUCTION),
        };
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user_with_images(prompt.as_str(), request.images),
        ];
        let options = self.build_options();
        let call_timeout = Duration::from_secs(self.api_timeout_secs);

        let mut last_err: Option<InferenceError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Inference retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(call_timeout, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Inference: {} input tokens, {} output tokens",
                        response.prompt_tokens, response.completion_tokens
                    );
                    let image = match request.modality {
                        ResponseModality::Image => extract_inline_image(&response.content),
                        ResponseModality::Text => None,
                    };
                    return Ok(InferenceResponse {
                        text: response.content,
                        image,
                        input_tokens: response.prompt_tokens as u64,
                        output_tokens: response.completion_tokens as u64,
                    });
                }
                Ok(Err(e)) => {
                    warn!("Inference attempt {} failed — {}", attempt + 1, e);
                    last_err = Some(InferenceError::Provider {
                        attempts: attempt + 1,
                        detail: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(
                        "Inference attempt {} timed out after {}s",
                        attempt + 1,
                        self.api_timeout_secs
                    );
                    last_err = Some(InferenceError::Timeout {
                        secs: self.api_timeout_secs,
                    });
                }
            }
        }

        Err(last_err.unwrap_or(InferenceError::Provider {
            attempts: 0,
            detail: "no attempt was made".into(),
        }))
    }
}

/// Delay before retry number `attempt` (1-based).
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

static RE_DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"data:image/(?:png|jpe?g|webp);base64,([A-Za-z0-9+/]+=*)").unwrap()
});

/// Find and decode the first inline `data:image/...;base64,` payload.
pub fn extract_inline_image(text: &str) -> Option<Vec<u8>> {
    let caps = RE_DATA_URI.captures(text)?;
    match STANDARD.decode(&caps[1]) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => None,
        Err(e) => {
            debug!("Inline image payload was not valid base64: {}", e);
            None
        }
    }
}
