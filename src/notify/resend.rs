//! Email notifications through the Resend HTTP API
//!
//! SECURITY: the API key is read from the environment and held as a
//! `SecretString`. There is no built-in fallback credential; a missing key,
//! sender or recipient is a configuration error.

use super::{Notifier, TransferEvent, TEST_SUBJECT, TRANSFER_SUBJECT};
use crate::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Environment variable names
pub mod env_vars {
    pub const RESEND_API_KEY: &str = "RESEND_API_KEY";
    pub const FROM_EMAIL: &str = "FROM_EMAIL";
    pub const NOTIFICATION_EMAIL: &str = "NOTIFICATION_EMAIL";
}

const RESEND_EMAILS_URL: &str = "https://api.resend.com/emails";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

pub struct ResendNotifier {
    client: reqwest::Client,
    endpoint: Url,
    api_key: SecretString,
    from_email: String,
    recipient: String,
}

impl std::fmt::Debug for ResendNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendNotifier")
            .field("endpoint", &self.endpoint.as_str())
            .field("from_email", &self.from_email)
            .field("recipient", &self.recipient)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ResendNotifier {
    pub fn new(api_key: SecretString, from_email: String, recipient: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let endpoint = Url::parse(RESEND_EMAILS_URL)
            .map_err(|e| Error::Config(format!("Invalid Resend URL: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            from_email,
            recipient,
        })
    }

    /// Build from `RESEND_API_KEY`, `FROM_EMAIL` and `NOTIFICATION_EMAIL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("{} must be set for email notifications", name)))
        };

        let api_key = SecretString::from(required(env_vars::RESEND_API_KEY)?);
        let from_email = required(env_vars::FROM_EMAIL)?;
        let recipient = required(env_vars::NOTIFICATION_EMAIL)?;
        Self::new(api_key, from_email, recipient)
    }

    /// Point at a different API endpoint (e.g. a local mock).
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Send a test email to `recipient`.
    pub async fn send_test(&self, recipient: &str) -> Result<()> {
        let text = "Test Notification\n\n\
                    This is a test email from your Mock Web3 Wallet!\n\
                    If you received this, email notifications are working correctly.";
        let html = "<html><body style=\"font-family: Arial, sans-serif;\">\
                    <h2 style=\"color: #007bff;\">Test Notification</h2>\
                    <p>This is a test email from your Mock Web3 Wallet!</p>\
                    <p>If you received this, email notifications are working correctly.</p>\
                    </body></html>";
        self.send(recipient, TEST_SUBJECT, html, text).await
    }

    async fn send(&self, recipient: &str, subject: &str, html: &str, text: &str) -> Result<()> {
        let request = EmailRequest {
            from: &self.from_email,
            to: [recipient],
            subject,
            html,
            text,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notification(format!(
                "Resend returned {}: {}",
                status, body
            )));
        }

        tracing::info!(recipient = %recipient, subject = %subject, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn transaction_completed(&self, event: &TransferEvent) -> Result<()> {
        self.send(
            &self.recipient,
            TRANSFER_SUBJECT,
            &event.html_body(),
            &event.text_body(),
        )
        .await
    }
}
