use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde_json::Value;

const DEFAULT_URL: &str = "http://127.0.0.1:8787/";

fn check(url: Url) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let response = client.get(url).send()?;
    if !response.status().is_success() {
        bail!("Gateway answered {}", response.status());
    }

    let body: Value = response.json().context("Liveness response is not JSON")?;
    if !body.get("message").is_some_and(Value::is_string) {
        bail!("Liveness response has no message: {}", body);
    }
    Ok(())
}

fn main() -> ExitCode {
    let url = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());
    let result = Url::parse(&url)
        .with_context(|| format!("Invalid URL {}", url))
        .and_then(check);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Unhealthy: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
