use crate::config::ChatSettings;
use crate::services::ports::{ChannelProvisioner, ServiceError};
use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Errors that can occur when talking to the chat service
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Failed to sign server token: {0}")]
    TokenError(#[from] jsonwebtoken::errors::Error),

    #[error("API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Unauthorized: invalid API key or secret")]
    Unauthorized,
}

impl ChatError {
    pub fn is_transient(&self) -> bool {
        match self {
            ChatError::RequestError(e) => e.is_timeout() || e.is_connect(),
            ChatError::ApiError { status, .. } => *status >= 500 || *status == 429,
            ChatError::TokenError(_) | ChatError::Unauthorized => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct ServerClaims {
    server: bool,
}

/// Chat API client
///
/// Provisions one messaging channel per matched group. Channels are created
/// through the get-or-create query endpoint, so provisioning the same group
/// twice is not an error. Requests are signed with a server-side JWT.
pub struct ChatClient {
    base_url: String,
    api_key: String,
    api_secret: String,
    channel_type: String,
    bot_user_id: String,
    client: Client,
    bot_ready: OnceCell<()>,
}

impl ChatClient {
    /// Create a new chat client
    pub fn new(
        base_url: String,
        api_key: String,
        api_secret: String,
        channel_type: String,
        bot_user_id: String,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            api_secret,
            channel_type,
            bot_user_id,
            client,
            bot_ready: OnceCell::new(),
        })
    }

    pub fn from_settings(settings: &ChatSettings) -> Result<Self, ChatError> {
        Self::new(
            settings.base_url.clone(),
            settings.api_key.clone(),
            settings.api_secret.clone(),
            settings.channel_type.clone(),
            settings.bot_user_id.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }

    fn server_token(&self) -> Result<String, ChatError> {
        let token = encode(
            &Header::default(),
            &ServerClaims { server: true },
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )?;
        Ok(token)
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}?api_key={}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/'),
            urlencoding::encode(&self.api_key)
        )
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response, ChatError> {
        let response = self
            .client
            .post(self.url(path))
            .header("Authorization", self.server_token()?)
            .header("Stream-Auth-Type", "jwt")
            .json(&body)
            .send()
            .await?;
        Ok(response)
    }

    /// Make sure the system user that creates channels exists
    pub async fn upsert_bot_user(&self) -> Result<(), ChatError> {
        let mut users = serde_json::Map::new();
        users.insert(
            self.bot_user_id.clone(),
            json!({ "id": &self.bot_user_id, "name": "System Bot" }),
        );
        let body = json!({ "users": users });

        let response = self.post("users", body).await?;
        check_status(response, "upsert bot user").await?;

        tracing::debug!("Chat bot user {} is present", self.bot_user_id);
        Ok(())
    }

    /// Create the channel for a group, or reuse it if it already exists
    pub async fn get_or_create_channel(
        &self,
        channel_id: &str,
        name: &str,
        member_ids: &[String],
    ) -> Result<(), ChatError> {
        self.bot_ready
            .get_or_try_init(|| self.upsert_bot_user())
            .await?;

        let path = format!(
            "channels/{}/{}/query",
            urlencoding::encode(&self.channel_type),
            urlencoding::encode(channel_id)
        );
        let body = json!({
            "data": {
                "name": name,
                "members": member_ids,
                "created_by_id": &self.bot_user_id,
            },
            "state": false,
            "watch": false,
            "presence": false,
        });

        let response = self.post(&path, body).await?;

        if response.status() == StatusCode::CONFLICT {
            tracing::debug!("Channel {} already exists, reusing it", channel_id);
            return Ok(());
        }

        check_status(response, "provision channel").await?;

        tracing::debug!("Provisioned channel {} for {} members", channel_id, member_ids.len());
        Ok(())
    }
}

async fn check_status(response: reqwest::Response, action: &str) -> Result<(), ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ChatError::Unauthorized);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read body".to_string());
    tracing::error!("Chat API failed to {}: {} - {}", action, status, body);

    Err(ChatError::ApiError {
        status: status.as_u16(),
        message: body,
    })
}

#[async_trait]
impl ChannelProvisioner for ChatClient {
    async fn provision(
        &self,
        group_id: &str,
        group_name: &str,
        member_ids: &[String],
    ) -> Result<(), ServiceError> {
        Ok(self.get_or_create_channel(group_id, group_name, member_ids).await?)
    }
}
