use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{header, Client};
use serde::Serialize;
use url::Url;

use crate::config::MailConfig;

/// Client for an HTTP mail relay that accepts JSON messages.
pub struct HttpMailer {
    http: Client,
    endpoint: Option<Url>,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let endpoint = match config.endpoint.trim() {
            "" => None,
            raw => Some(Url::parse(raw).with_context(|| format!("invalid mail endpoint: {raw}"))?),
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("failed to build mail http client")?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            from: config.from.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Deliver one plain-text message. Failures are logged and reported as `false`.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> bool {
        match self.try_send(to, subject, body).await {
            Ok(()) => {
                tracing::info!(to, subject, "mail delivered to relay");
                true
            }
            Err(err) => {
                tracing::warn!(to, subject, error = %err, "mail delivery failed");
                false
            }
        }
    }

    async fn try_send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| anyhow!("mail endpoint not configured"))?;

        let mut request = self
            .http
            .post(endpoint.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&MailRequest {
                from: &self.from,
                to,
                subject,
                text: body,
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.context("mail relay request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("mail relay returned {status}: {body}"));
        }

        Ok(())
    }
}
