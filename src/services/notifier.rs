use crate::config::NotifierSettings;
use crate::services::ports::{Notifier, ServiceError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when sending notifications
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Mail API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Unauthorized: invalid API key")]
    Unauthorized,
}

impl NotifyError {
    pub fn is_transient(&self) -> bool {
        match self {
            NotifyError::RequestError(e) => e.is_timeout() || e.is_connect(),
            NotifyError::ApiError { status, .. } => *status >= 500 || *status == 429,
            NotifyError::Unauthorized => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct MailMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: String,
}

/// Transactional mail client used to tell users they were matched
pub struct MailNotifier {
    endpoint: String,
    api_key: String,
    sender: String,
    subject: String,
    client: Client,
}

impl MailNotifier {
    pub fn new(
        endpoint: String,
        api_key: String,
        sender: String,
        subject: String,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint,
            api_key,
            sender,
            subject,
            client,
        })
    }

    pub fn from_settings(settings: &NotifierSettings) -> Result<Self, NotifyError> {
        Self::new(
            settings.endpoint.clone(),
            settings.api_key.clone(),
            settings.sender.clone(),
            settings.subject.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }

    /// Send the "you have been matched" mail to one address
    pub async fn send_match_mail(&self, address: &str, group_name: &str) -> Result<(), NotifyError> {
        let message = MailMessage {
            from: &self.sender,
            to: address,
            subject: &self.subject,
            text: match_mail_body(group_name),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(NotifyError::Unauthorized);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read body".to_string());
        tracing::error!("Mail API error: {} - {}", status, body);

        Err(NotifyError::ApiError {
            status: status.as_u16(),
            message: body,
        })
    }
}

fn match_mail_body(group_name: &str) -> String {
    format!(
        "Good news! You have been matched into \"{}\". Open the app to meet your group and start chatting.",
        group_name
    )
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn notify_matched(&self, address: &str, group_name: &str) -> Result<(), ServiceError> {
        Ok(self.send_match_mail(address, group_name).await?)
    }
}
