use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::MailConfig;

/// Outbound notification capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Delivers mail through a JSON HTTP relay.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(endpoint: &str, token: Option<String>, from: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build mail http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            token,
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let mut req = self.client.post(&self.endpoint).json(&OutgoingMail {
            from: &self.from,
            to,
            subject,
            text: body,
        });
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.context("mail relay request")?;
        let status = resp.status();
        anyhow::ensure!(status.is_success(), "mail relay returned {status}");
        debug!(%to, %subject, "mail handed to relay");
        Ok(())
    }
}

/// Used when no relay is configured. Every send fails so callers never
/// report a message as delivered. Never logs the body.
#[derive(Clone, Default)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        warn!(%to, %subject, "mail delivery disabled; message dropped");
        anyhow::bail!("mail delivery disabled")
    }
}

pub fn from_config(cfg: &MailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    let mailer: Arc<dyn Mailer> = match &cfg.api_url {
        Some(url) => Arc::new(HttpMailer::new(url, cfg.api_token.clone(), &cfg.from)?),
        None => Arc::new(DisabledMailer),
    };
    Ok(mailer)
}
