use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{FailureKind, GatewayError, GatewayResult};
use crate::inference::{InferenceClient, InferenceInput};
use crate::task::{Task, CONSENT_PROMPT};
use crate::bail_gateway;

pub const LIVENESS_MESSAGE: &str =
    "Manga OCR API is running! Use POST /ocr to extract text from images.";

pub const MISSING_IMAGE_MESSAGE: &str = "Image file is required";

/// A fully buffered upload, handed to the model untouched.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Binds each task to its prompt and forwards it to the injected model client.
pub struct Dispatcher {
    client: Arc<dyn InferenceClient>,
    model: String,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn InferenceClient>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn probe(&self) -> Value {
        json!({ "message": LIVENESS_MESSAGE })
    }

    #[tracing::instrument(level = "info", skip(self), fields(model = %self.model))]
    pub async fn consent(&self) -> GatewayResult<Value> {
        let result = self.invoke(InferenceInput::text(CONSENT_PROMPT)).await?;
        info!("Model terms accepted");
        Ok(json!({ "status": "agreed", "result": result }))
    }

    #[tracing::instrument(level = "info", skip(self, image), fields(model = %self.model))]
    pub async fn run(&self, task: Task, image: Option<UploadedImage>) -> GatewayResult<Value> {
        let Some(image) = image else {
            return Err(GatewayError::missing_input(MISSING_IMAGE_MESSAGE));
        };
        info!(
            bytes = image.bytes.len(),
            content_type = image.content_type.as_deref().unwrap_or("unknown"),
            "Dispatching image"
        );

        self.invoke(InferenceInput::with_image(task.prompt(), image.bytes))
            .await
    }

    async fn invoke(&self, input: InferenceInput) -> GatewayResult<Value> {
        match tokio::time::timeout(self.timeout, self.client.infer(&self.model, input)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!("Inference failed: {:#}", err);
                Err(err.into())
            }
            Err(_) => {
                warn!("Inference timed out after {:?}", self.timeout);
                bail_gateway!(
                    FailureKind::CapabilityError,
                    "Inference timed out after {}s",
                    self.timeout.as_secs()
                );
            }
        }
    }
}
