use anyhow::Result;
use axum::async_trait;
use axum::body::Bytes;
use serde_json::Value;

pub mod workers_ai;

/// What gets handed to the hosted model for a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceInput {
    pub prompt: String,
    /// Raw upload bytes, exactly as received.
    pub image: Option<Bytes>,
}

impl InferenceInput {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    pub fn with_image(prompt: impl Into<String>, image: Bytes) -> Self {
        Self {
            prompt: prompt.into(),
            image: Some(image),
        }
    }
}

/// A hosted vision-language model: given an instruction and optional image bytes it
/// produces some JSON. The shape of that JSON is not ours to interpret.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn infer(&self, model: &str, input: InferenceInput) -> Result<Value>;
}
