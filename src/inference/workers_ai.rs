use anyhow::{anyhow, bail, Context, Result};
use axum::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::inference::{InferenceClient, InferenceInput};

/// Client for the Workers AI REST endpoint (`/accounts/{id}/ai/run/{model}`).
#[derive(Clone, Debug)]
pub struct WorkersAiClient {
    http: reqwest::Client,
    api_base: String,
    account_id: String,
    api_token: String,
}

#[derive(Serialize)]
struct RunRequest<'a> {
    prompt: &'a str,
    // Workers AI takes images for this model as a plain array of byte values
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a [u8]>,
}

#[derive(Deserialize, Debug)]
struct RunResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Deserialize, Debug)]
struct ApiMessage {
    code: Option<i64>,
    message: String,
}

impl WorkersAiClient {
    pub fn new(api_base: &str, account_id: &str, api_token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
        })
    }

    fn run_url(&self, model: &str) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.api_base,
            self.account_id,
            model.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl InferenceClient for WorkersAiClient {
    #[tracing::instrument(level = "info", skip(self, input), fields(image_len = input.image.as_ref().map(|i| i.len())))]
    async fn infer(&self, model: &str, input: InferenceInput) -> Result<Value> {
        let body = RunRequest {
            prompt: &input.prompt,
            image: input.image.as_deref(),
        };

        let response = self
            .http
            .post(self.run_url(model))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(%status, len = text.len(), "Workers AI responded");

        let envelope: RunResponse = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => bail!("Workers AI returned {}: {}", status, text),
            Err(err) => return Err(anyhow!(err).context("Malformed Workers AI response")),
        };

        if !envelope.success || !status.is_success() {
            if envelope.errors.is_empty() {
                bail!("Workers AI returned {} without a result", status);
            }
            let messages: Vec<String> = envelope
                .errors
                .iter()
                .map(|e| match e.code {
                    Some(code) => format!("{}: {}", code, e.message),
                    None => e.message.clone(),
                })
                .collect();
            bail!("{}", messages.join("; "));
        }

        Ok(envelope.result)
    }
}
