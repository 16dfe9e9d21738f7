use std::time::Duration;

use anyhow::{bail, Result};
use clap_serde_derive::ClapSerde;

#[derive(ClapSerde, Debug)]
pub struct Config {
    /// The address the listener binds to
    #[default("0.0.0.0".to_string())]
    #[arg(short, long, env)]
    pub(crate) address: String,

    /// The port the listener binds to
    #[default(8787)]
    #[arg(short, long, env)]
    pub(crate) port: u16,

    /// Maximum accepted size of an upload request in bytes
    #[default(10_000_000)]
    #[arg(long, env)]
    pub(crate) body_limit: usize,

    /// Base URL of the Workers AI REST API
    #[default("https://api.cloudflare.com/client/v4".to_string())]
    #[arg(long, env)]
    pub(crate) api_base: String,

    /// Account that owns the Workers AI binding
    #[arg(long, env)]
    pub(crate) account_id: Option<String>,

    /// API token with Workers AI read permission
    #[arg(long, env)]
    pub(crate) api_token: Option<String>,

    /// Vision model used for every task
    #[default("@cf/meta/llama-3.2-11b-vision-instruct".to_string())]
    #[arg(short, long, env)]
    pub(crate) model: String,

    /// Seconds to wait for the model before giving up
    #[default(120)]
    #[arg(long, env)]
    pub(crate) inference_timeout: u64,

    /// OTLP collector endpoint, traces and metrics are only exported when set
    #[arg(long, env)]
    pub(crate) otel_endpoint: Option<String>,

    /// PEM certificate, enables TLS together with tls_key_path
    #[arg(long, env)]
    pub(crate) tls_cert_path: Option<String>,

    /// PEM private key for tls_cert_path
    #[arg(long, env)]
    pub(crate) tls_key_path: Option<String>,
}

impl Config {
    pub fn opt_from_toml(path: &str) -> Result<<Config as ClapSerde>::Opt> {
        let str = std::fs::read_to_string(path)?;
        let opt = toml::from_str(&str)?;
        Ok(opt)
    }

    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (self.account_id.as_deref(), self.api_token.as_deref()) {
            (Some(account), Some(token)) if !account.is_empty() && !token.is_empty() => {
                Ok((account, token))
            }
            (None, _) | (Some(""), _) => bail!("Missing account_id for Workers AI"),
            _ => bail!("Missing api_token for Workers AI"),
        }
    }

    pub fn tls_paths(&self) -> Result<Option<(&str, &str)>> {
        match (self.tls_cert_path.as_deref(), self.tls_key_path.as_deref()) {
            (Some(cert), Some(key)) => Ok(Some((cert, key))),
            (None, None) => Ok(None),
            _ => bail!("Both tls_cert_path and tls_key_path must be set to enable TLS"),
        }
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout)
    }
}
