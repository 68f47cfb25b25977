use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use remind_core::{Notify, NotifyError};
use remind_model::{Contact, Task};

use crate::compose::compose;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for the HTTP mail gateway.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// Gateway base URL; messages are posted to `<endpoint>/v1/messages`.
    pub endpoint: String,
    /// Bearer token, if the gateway requires one.
    pub token: Option<String>,
    /// Sender address stamped on every message.
    pub from: String,
    /// Request timeout; an elapsed timeout surfaces as a transport failure.
    pub timeout: Duration,
}

impl MailerConfig {
    pub fn new(endpoint: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            from: from.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Email delivery through an HTTP mail-gateway API.
#[derive(Debug)]
pub struct HttpMailer {
    cfg: MailerConfig,
    client: reqwest::Client,
}

impl HttpMailer {
    pub fn new(cfg: MailerConfig) -> Result<Self, NotifyError> {
        if cfg.endpoint.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("mail endpoint is empty".into()));
        }
        if cfg.from.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("sender address is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self { cfg, client })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMailRequest {
    from: String,
    to: String,
    subject: String,
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SendMailResponse {
    success: bool,
    #[serde(default)]
    message: String,
}

#[async_trait]
impl Notify for HttpMailer {
    async fn send(&self, contact: &Contact, task: &Task) -> Result<(), NotifyError> {
        let msg = compose(contact, task);
        let request = SendMailRequest {
            from: self.cfg.from.clone(),
            to: contact.address.clone(),
            subject: msg.subject,
            text: msg.body,
        };

        let url = format!("{}/v1/messages", self.cfg.endpoint.trim_end_matches('/'));
        let mut call = self.client.post(url).json(&request);
        if let Some(token) = &self.cfg.token {
            call = call.bearer_auth(token);
        }

        let response = call
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(format!(
                "mail gateway returned {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        let parsed: SendMailResponse = serde_json::from_str(&body).map_err(|e| {
            NotifyError::Transport(format!("failed to parse response: {e}, body: {body}"))
        })?;

        if !parsed.success {
            return Err(NotifyError::Rejected(parsed.message));
        }

        debug!(to = %contact.address, task_id = %task.id, "reminder mail accepted by gateway");
        Ok(())
    }
}
