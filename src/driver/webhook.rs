//! A generic outbound-webhook driver: the simplest possible platform
//! adapter, and the reference implementation of the [`Driver`] contract.
//!
//! Most chat platforms let you post into a channel by `POST`ing a JSON body
//! to a per-channel webhook URL, optionally overriding the display name and
//! avatar for impersonation. This driver speaks that lowest common
//! denominator: it holds no gateway connection and can't receive inbound
//! messages on its own, but it can fan a [`MessageContent`] out to any
//! webhook-shaped endpoint. Concrete platform drivers (Discord, Revolt,
//! Fluxer, …) are out of this core's scope (§1); this one exists so the
//! bridge core has at least one real `Driver` to exercise end to end.

use super::Driver;
use crate::error::{DriverError, Result};
use crate::model::{Channel, ContentBlock, Id, Member, Message, MessageContent, Server, User, Webhook};

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// JSON payload shape accepted by Discord-style and Revolt-style incoming
/// webhooks: content plus an optional display-identity override.
#[derive(serde::Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
}

struct Caches {
    users: HashMap<Id, User>,
    servers: HashMap<Id, Server>,
    channels: HashMap<Id, Channel>,
    webhooks: HashMap<Id, Webhook>,
    /// `channel_id -> webhook post URL`. Populated out of band (e.g. from
    /// the extension loader's capability handle) since the URL itself is a
    /// bearer credential, not a routable id.
    webhook_urls: HashMap<Id, String>,
}

/// Drivers own a webhook cache consulted before any network fetch (§4.2).
/// This one also owns the HTTP client used to actually post.
pub struct WebhookDriver {
    platform: String,
    http: reqwest::Client,
    caches: RwLock<Caches>,
}

impl WebhookDriver {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            http: reqwest::Client::new(),
            caches: RwLock::new(Caches {
                users: HashMap::new(),
                servers: HashMap::new(),
                channels: HashMap::new(),
                webhooks: HashMap::new(),
                webhook_urls: HashMap::new(),
            }),
        }
    }

    pub async fn register_channel(&self, channel: Channel) {
        let mut caches = self.caches.write().await;
        caches.servers.insert(channel.server.id.clone(), channel.server.clone());
        caches.channels.insert(channel.id.clone(), channel);
    }

    pub async fn register_webhook(&self, webhook: Webhook, post_url: impl Into<String>) {
        let mut caches = self.caches.write().await;
        caches.webhook_urls.insert(webhook.channel_id.clone(), post_url.into());
        caches.webhooks.insert(webhook.id.clone(), webhook);
    }

    async fn post(&self, url: &str, payload: &WebhookPayload<'_>) -> Result<()> {
        let response = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(anyhow::Error::from)?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "webhook post to {url} failed with status {}",
                response.status()
            )
            .into());
        }
        Ok(())
    }
}

fn render(content: &MessageContent) -> String {
    let mut rendered = content.to_plaintext();
    for block in &content.blocks {
        if let ContentBlock::Embed(embed) = block
            && let Some(title) = &embed.title
        {
            if !rendered.is_empty() {
                rendered.push('\n');
            }
            rendered.push_str(title);
        }
    }
    rendered
}

impl Driver for WebhookDriver {
    fn platform(&self) -> &str {
        &self.platform
    }

    fn get_user(&self, id: &Id) -> Option<User> {
        self.caches.try_read().ok()?.users.get(id).cloned()
    }

    fn get_server(&self, id: &Id) -> Option<Server> {
        self.caches.try_read().ok()?.servers.get(id).cloned()
    }

    fn get_channel(&self, id: &Id) -> Option<Channel> {
        self.caches.try_read().ok()?.channels.get(id).cloned()
    }

    fn get_webhook(&self, id: &Id) -> Option<Webhook> {
        self.caches.try_read().ok()?.webhooks.get(id).cloned()
    }

    async fn fetch_user(&self, id: &Id) -> Result<User> {
        self.get_user(id)
            .ok_or_else(|| DriverError::Unsupported(format!("{}: fetch_user requires a platform gateway", self.platform)).into())
    }

    async fn fetch_server(&self, id: &Id) -> Result<Server> {
        self.get_server(id)
            .ok_or_else(|| DriverError::Unsupported(format!("{}: fetch_server requires a platform gateway", self.platform)).into())
    }

    async fn fetch_channel(&self, id: &Id) -> Result<Channel> {
        self.get_channel(id)
            .ok_or_else(|| DriverError::Unsupported(format!("{}: fetch_channel requires a platform gateway", self.platform)).into())
    }

    async fn fetch_webhook(&self, id: &Id) -> Result<Webhook> {
        self.get_webhook(id)
            .ok_or_else(|| DriverError::Unsupported(format!("{}: fetch_webhook requires a platform gateway", self.platform)).into())
    }

    async fn get_member(&self, server: &Server, member_id: &Id) -> Result<Option<Member>> {
        if server.platform.as_ref() != self.platform {
            return Err(DriverError::PlatformMismatch {
                expected: self.platform.clone(),
                actual: server.platform.to_string(),
            }
            .into());
        }
        let Some(user) = self.get_user(member_id) else {
            return Ok(None);
        };
        Ok(Some(Member::new(user, server.clone())))
    }

    async fn send(
        &self,
        destination: &Channel,
        content: &MessageContent,
        send_as: Option<&Member>,
        webhook_id: Option<&Id>,
        self_send: bool,
    ) -> Result<Option<Message>> {
        if destination.id == content.original_channel_id && !self_send {
            let author = send_as.map(|m| m.id().to_string()).unwrap_or_default();
            let mut message = Message::new(content.original_id.clone(), self.platform.clone().into(), author.into());
            message.channel = Some(destination.clone());
            return Ok(Some(message));
        }

        let Some(url) = self.caches.read().await.webhook_urls.get(&destination.id).cloned() else {
            tracing::warn!(platform = %self.platform, channel = %destination.id, "no webhook url registered for channel");
            return Ok(None);
        };

        let rendered = render(content);
        let username = send_as.map(|member| member.user.display_name.as_str());
        let avatar_url = send_as.and_then(|member| member.user.avatar_url.as_deref());
        self.post(
            &url,
            &WebhookPayload {
                content: &rendered,
                username,
                avatar_url,
            },
        )
        .await?;

        let mut message = Message::new(
            format!("{}-{}", destination.id, uuid::Uuid::new_v4()).into(),
            self.platform.clone().into(),
            send_as.map(|m| m.id().to_string()).unwrap_or_default().into(),
        );
        message.channel = Some(destination.clone());
        message.attachments_count = content.files.len();
        message.webhook_id = webhook_id.cloned();
        Ok(Some(message))
    }

    async fn edit(&self, _message: &Message, _content: &MessageContent) -> Result<()> {
        // Plain incoming webhooks have no message-edit endpoint; a platform
        // whose webhooks do support it overrides this method.
        Err(DriverError::Unsupported(format!("{}: webhook driver cannot edit", self.platform)).into())
    }

    async fn delete(&self, _message: &Message) -> Result<()> {
        Err(DriverError::Unsupported(format!("{}: webhook driver cannot delete", self.platform)).into())
    }

    fn supports_parallel(&self) -> bool {
        false
    }

    fn supports_concurrent(&self) -> bool {
        true
    }
}

/// Shareable handle to a [`WebhookDriver`], the shape the registry expects.
pub type SharedWebhookDriver = Arc<WebhookDriver>;
