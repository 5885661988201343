//! Bridge Core (component F): eligibility checks, the filter pipeline, and
//! fan-out across every Driver registered for a Space's member platforms.

use crate::cache::MessageCache;
use crate::driver::DriverRegistry;
use crate::error::{BlockedReason, BridgeError, DriverError, Result};
use crate::filter::{FilterConfig, FilterEngine};
use crate::model::{Member, Message, MessageContent, MessageGroup, Space, SpaceOptions};
use crate::space::SpaceRegistry;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-Space filter configuration is persisted as `{filter_id → JSON object}`;
/// the filter engine wants `{filter_id → {key → value}}`. Non-object values
/// (or a missing entry) degrade to an empty per-filter config rather than an
/// error — a malformed stored config shouldn't make every send fail.
fn filter_configs(options: &SpaceOptions) -> HashMap<String, FilterConfig> {
    options
        .filter_configs
        .iter()
        .map(|(filter_id, value)| {
            let config = value
                .as_object()
                .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            (filter_id.clone(), config)
        })
        .collect()
}

pub struct BridgeCore {
    spaces: Arc<SpaceRegistry>,
    drivers: Arc<DriverRegistry>,
    filters: Arc<FilterEngine>,
    cache: Arc<MessageCache>,
    ready: Arc<AtomicBool>,
    cancellation: CancellationToken,
    enable_multi: bool,
}

impl BridgeCore {
    pub fn new(
        spaces: Arc<SpaceRegistry>,
        drivers: Arc<DriverRegistry>,
        filters: Arc<FilterEngine>,
        cache: Arc<MessageCache>,
        enable_multi: bool,
    ) -> Self {
        Self {
            spaces,
            drivers,
            filters,
            cache,
            ready: Arc::new(AtomicBool::new(false)),
            cancellation: CancellationToken::new(),
            enable_multi,
        }
    }

    /// Loads persisted Spaces and bridge-paused directives, then arms
    /// readiness: immediately if the driver registry has no outstanding
    /// reservations, or on the registry's setup callback otherwise. Must be
    /// called exactly once, before any `send`/`edit`/`delete`/`can_send`.
    pub async fn load_data(&self) -> Result<()> {
        self.spaces.load().await?;

        if self.drivers.is_ready().await {
            self.ready.store(true, Ordering::SeqCst);
        } else {
            let ready = Arc::clone(&self.ready);
            self.drivers
                .set_setup_callback(move || {
                    ready.store(true, Ordering::SeqCst);
                })
                .await;
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// A child token of the core's cancellation token. Cancel it (or the
    /// core's own [`BridgeCore::shutdown`]) to abort any fan-out in flight.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.child_token()
    }

    pub fn shutdown(&self) {
        self.cancellation.cancel();
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(BridgeError::NotInitialized.into())
        }
    }

    /// Pure eligibility check: would `send` currently accept this message?
    /// Unlike `send`, this never mutates `content` even when a filter would
    /// have substituted `safe_content` — it reports the verdict only.
    pub async fn can_send(
        &self,
        author: &Member,
        space: &Space,
        content: &MessageContent,
        webhook_id: Option<&crate::model::Id>,
        skip_filters: bool,
    ) -> Option<BlockedReason> {
        if self.spaces.is_bridge_paused(author.id(), &content.to_plaintext()).await {
            return Some(BlockedReason::BridgePaused);
        }
        if skip_filters {
            return None;
        }

        let mut scratch = content.clone();
        let configs = filter_configs(&space.options);
        match self
            .filters
            .run(&space.options.filters, &author.server.id, author, &mut scratch, webhook_id, &configs)
            .await
        {
            Ok(_) => None,
            Err((filter_id, message)) => Some(BlockedReason::FilterBlocked { filter_id, message }),
        }
    }

    /// Bridges one message into every other member of `space`. The origin
    /// member's own platform is included in fan-out, but its driver is
    /// contractually required to skip the outbound call and fabricate a
    /// same-id echo instead (see [`crate::driver::Driver::send`]).
    pub async fn send(
        &self,
        author: Member,
        space: Space,
        mut content: MessageContent,
        webhook_id: Option<crate::model::Id>,
    ) -> Result<MessageGroup> {
        self.ensure_ready()?;

        let driver = self
            .drivers
            .get(author.platform())
            .await
            .ok_or_else(|| DriverError::NotRegistered(author.platform().to_string()))?;
        let origin_channel = driver
            .get_channel(&content.original_channel_id)
            .ok_or_else(|| DriverError::Unsupported(format!("channel {} not cached by its driver", content.original_channel_id)))?;

        if space.options.nsfw != origin_channel.nsfw || (space.options.nsfw && !driver.supports_agegate()) {
            return Err(BridgeError::AgeGateMismatch.into());
        }

        if self.spaces.is_bridge_paused(author.id(), &content.to_plaintext()).await {
            return Err(BridgeError::Blocked(BlockedReason::BridgePaused).into());
        }

        let configs = filter_configs(&space.options);
        if let Err((filter_id, message)) = self
            .filters
            .run(&space.options.filters, &author.server.id, &author, &mut content, webhook_id.as_ref(), &configs)
            .await
        {
            return Err(BridgeError::Blocked(BlockedReason::FilterBlocked { filter_id, message }).into());
        }

        let messages = self.fan_out_send(&space, &author, &content, webhook_id.as_ref()).await;

        let mut group = MessageGroup::new(author.id().clone(), space.id);
        group.replies = content.replies.iter().filter_map(|r| Uuid::parse_str(r).ok()).collect();
        group.messages = messages;

        for message in &group.messages {
            self.cache.add_message(message.clone(), false).await;
        }
        self.cache.add_group(group.clone(), true).await;

        Ok(group)
    }

    /// Looks up the group owning `message.id`; no-op if it isn't cached, or
    /// if the owning Space has `relay_edits` disabled. Fans the new content
    /// out to every other platform's message in the group.
    pub async fn edit(&self, message: Message, content: MessageContent) -> Result<()> {
        self.ensure_ready()?;

        let Some(mut group) = self.cache.get_group_from_message(message.id.as_ref()).await else {
            return Ok(());
        };
        if let Some(space) = self.spaces.get(&group.space_id)
            && !space.options.relay_edits
        {
            return Ok(());
        }

        for target in group.messages.iter_mut() {
            if target.id == message.id {
                continue;
            }
            let Some(driver) = self.drivers.get(target.platform.as_ref()).await else {
                continue;
            };

            tokio::select! {
                result = driver.edit(target, &content) => {
                    if let Err(error) = result {
                        tracing::warn!(%error, platform = %target.platform, "driver edit failed");
                        continue;
                    }
                }
                _ = self.cancellation.cancelled() => break,
            }
            target.content = Some(content.clone());
        }

        self.cache.add_group(group, true).await;
        Ok(())
    }

    /// Looks up the group owning `message.id`; no-op if it isn't cached, or
    /// if the owning Space has `relay_deletes` disabled. Deletes every other
    /// platform's message in the group, then drops the group from cache.
    pub async fn delete(&self, message: Message) -> Result<()> {
        self.ensure_ready()?;

        let Some(group) = self.cache.get_group_from_message(message.id.as_ref()).await else {
            return Ok(());
        };
        if let Some(space) = self.spaces.get(&group.space_id)
            && !space.options.relay_deletes
        {
            return Ok(());
        }

        for target in &group.messages {
            if target.id == message.id {
                continue;
            }
            let Some(driver) = self.drivers.get(target.platform.as_ref()).await else {
                continue;
            };

            tokio::select! {
                result = driver.delete(target) => {
                    if let Err(error) = result {
                        tracing::warn!(%error, platform = %target.platform, "driver delete failed");
                    }
                }
                _ = self.cancellation.cancelled() => break,
            }
        }

        self.cache.remove_group(&group.id, true).await;
        Ok(())
    }

    /// Groups `space`'s members by driver and fans the send out to each
    /// group, choosing Sequential / Concurrent / Parallel per-driver based
    /// on its declared capabilities (see `Driver::supports_parallel` /
    /// `supports_concurrent`).
    async fn fan_out_send(
        &self,
        space: &Space,
        author: &Member,
        content: &MessageContent,
        webhook_id: Option<&crate::model::Id>,
    ) -> Vec<Message> {
        let mut results = Vec::new();

        for driver in self.drivers.all().await {
            let members: Vec<_> = space
                .members
                .iter()
                .filter(|m| m.platform.as_ref() == driver.platform() && !m.partial)
                .collect();
            if members.is_empty() {
                continue;
            }

            let sends = members.into_iter().map(|member| {
                let driver = Arc::clone(&driver);
                let content = content.clone();
                let author = author.clone();
                let webhook_id = member.webhook_id.clone();
                let channel_id = member.channel_id.clone();
                async move {
                    let Some(channel) = driver.get_channel(&channel_id) else {
                        tracing::warn!(platform = driver.platform(), %channel_id, "channel not cached by driver, skipping fan-out");
                        return None;
                    };
                    match driver.send(&channel, &content, Some(&author), webhook_id.as_ref(), false).await {
                        Ok(message) => message,
                        Err(error) => {
                            tracing::warn!(%error, platform = driver.platform(), "driver send failed");
                            None
                        }
                    }
                }
            });

            let platform_results: Vec<Option<Message>> = if driver.supports_parallel() && self.enable_multi {
                let handles: Vec<_> = sends.map(tokio::spawn).collect();
                futures::future::join_all(handles)
                    .await
                    .into_iter()
                    .map(|joined| joined.unwrap_or(None))
                    .collect()
            } else if driver.supports_concurrent() {
                tokio::select! {
                    results = futures::future::join_all(sends) => results,
                    _ = self.cancellation.cancelled() => Vec::new(),
                }
            } else {
                let mut out = Vec::new();
                for fut in sends {
                    tokio::select! {
                        result = fut => out.push(result),
                        _ = self.cancellation.cancelled() => break,
                    }
                }
                out
            };

            results.extend(platform_results.into_iter().flatten());
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Driver;
    use crate::model::{Channel, Id, MessageContent, Server, SpaceMember, SpaceOptions, User, Webhook};
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::RwLock;

    struct FakeDriver {
        platform: &'static str,
        channels: RwLock<StdHashMap<Id, Channel>>,
        sent: Arc<StdMutex<Vec<(Id, String)>>>,
        deleted: Arc<StdMutex<Vec<Id>>>,
        edited: Arc<StdMutex<Vec<(Id, String)>>>,
        parallel: bool,
        concurrent: bool,
    }

    impl FakeDriver {
        fn new(platform: &'static str, channels: Vec<Channel>, sent: Arc<StdMutex<Vec<(Id, String)>>>) -> Self {
            Self {
                platform,
                channels: RwLock::new(channels.into_iter().map(|c| (c.id.clone(), c)).collect()),
                sent,
                deleted: Arc::new(StdMutex::new(Vec::new())),
                edited: Arc::new(StdMutex::new(Vec::new())),
                parallel: false,
                concurrent: true,
            }
        }

        fn deleted(&self) -> Arc<StdMutex<Vec<Id>>> {
            Arc::clone(&self.deleted)
        }

        fn edited(&self) -> Arc<StdMutex<Vec<(Id, String)>>> {
            Arc::clone(&self.edited)
        }
    }

    impl Driver for FakeDriver {
        fn platform(&self) -> &str {
            self.platform
        }
        fn get_user(&self, _id: &Id) -> Option<User> {
            None
        }
        fn get_server(&self, _id: &Id) -> Option<Server> {
            None
        }
        fn get_channel(&self, id: &Id) -> Option<Channel> {
            self.channels.try_read().ok().and_then(|c| c.get(id).cloned())
        }
        fn get_webhook(&self, _id: &Id) -> Option<Webhook> {
            None
        }
        async fn fetch_user(&self, _id: &Id) -> Result<User> {
            Err(DriverError::Unsupported("fake.fetch_user".into()).into())
        }
        async fn fetch_server(&self, _id: &Id) -> Result<Server> {
            Err(DriverError::Unsupported("fake.fetch_server".into()).into())
        }
        async fn fetch_channel(&self, _id: &Id) -> Result<Channel> {
            Err(DriverError::Unsupported("fake.fetch_channel".into()).into())
        }
        async fn fetch_webhook(&self, _id: &Id) -> Result<Webhook> {
            Err(DriverError::Unsupported("fake.fetch_webhook".into()).into())
        }
        async fn get_member(&self, _server: &Server, _member_id: &Id) -> Result<Option<Member>> {
            Ok(None)
        }
        async fn send(
            &self,
            destination: &Channel,
            content: &MessageContent,
            send_as: Option<&Member>,
            _webhook_id: Option<&Id>,
            self_send: bool,
        ) -> Result<Option<Message>> {
            if destination.id == content.original_channel_id && !self_send {
                let mut message = Message::new(content.original_id.clone(), self.platform.into(), "origin".into());
                message.channel = Some(destination.clone());
                return Ok(Some(message));
            }
            self.sent
                .lock()
                .unwrap()
                .push((destination.id.clone(), content.to_plaintext()));
            let mut message = Message::new(format!("{}-sent", destination.id).into(), self.platform.into(), send_as.map(|m| m.id().to_string()).unwrap_or_default().into());
            message.channel = Some(destination.clone());
            Ok(Some(message))
        }
        async fn edit(&self, message: &Message, content: &MessageContent) -> Result<()> {
            self.edited.lock().unwrap().push((message.id.clone(), content.to_plaintext()));
            Ok(())
        }
        async fn delete(&self, message: &Message) -> Result<()> {
            self.deleted.lock().unwrap().push(message.id.clone());
            Ok(())
        }
        fn supports_parallel(&self) -> bool {
            self.parallel
        }
        fn supports_concurrent(&self) -> bool {
            self.concurrent
        }
    }

    fn server(id: &str, platform: &str) -> Server {
        Server::new(id.into(), platform.into(), "srv")
    }

    fn member(user_id: &str, platform: &str, server: Server) -> Member {
        Member::new(
            User {
                id: user_id.into(),
                platform: platform.into(),
                name: "alice".into(),
                display_name: "Alice".into(),
                avatar_url: None,
                bot: false,
            },
            server,
        )
    }

    async fn ready_core() -> (Arc<BridgeCore>, Arc<DriverRegistry>, Arc<SpaceRegistry>, Arc<MessageCache>) {
        let spaces = Arc::new(SpaceRegistry::new());
        let drivers = Arc::new(DriverRegistry::new());
        let filters = Arc::new(FilterEngine::with_builtins());
        let cache = Arc::new(MessageCache::new(100));
        let core = Arc::new(BridgeCore::new(
            Arc::clone(&spaces),
            Arc::clone(&drivers),
            filters,
            Arc::clone(&cache),
            true,
        ));
        core.load_data().await.unwrap();
        (core, drivers, spaces, cache)
    }

    #[tokio::test]
    async fn send_fans_out_and_skips_origin_echo() {
        let (core, drivers, spaces, _cache) = ready_core().await;

        let origin_server = server("s1", "discord");
        let origin_channel = Channel::new("c1".into(), "discord".into(), origin_server.clone(), "general".into(), false);
        let far_server = server("s2", "slack");
        let far_channel = Channel::new("c2".into(), "slack".into(), far_server.clone(), "general".into(), false);

        let discord_sent = Arc::new(StdMutex::new(Vec::new()));
        let discord = FakeDriver::new("discord", vec![origin_channel.clone()], Arc::clone(&discord_sent));
        drivers.register("discord", discord).await.unwrap();

        let slack_sent = Arc::new(StdMutex::new(Vec::new()));
        let slack = FakeDriver::new("slack", vec![far_channel.clone()], Arc::clone(&slack_sent));
        drivers.register("slack", slack).await.unwrap();

        let mut space = Space::new("test", SpaceOptions::default());
        space
            .join(SpaceMember::new("discord".into(), "s1".into(), "c1".into()), None, true, 0)
            .unwrap();
        space
            .join(SpaceMember::new("slack".into(), "s2".into(), "c2".into()), None, true, 0)
            .unwrap();
        spaces.add(space.clone());

        let author = member("u1", "discord", origin_server);
        let content = MessageContent::new("m1".into(), "c1".into()).with_text("hello");
        let group = core.send(author, space, content, None).await.unwrap();

        assert_eq!(group.messages.len(), 2);
        let origin_message = group.message_for_platform("discord").unwrap();
        assert_eq!(origin_message.id.as_ref(), "m1", "origin entry must carry the original id");
        assert!(discord_sent.lock().unwrap().is_empty(), "origin platform must not receive an outbound call");

        let far_message = group.message_for_platform("slack").unwrap();
        assert_eq!(far_message.channel.as_ref().unwrap().id.as_ref(), "c2");
        let sent = slack_sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "hello");
    }

    #[tokio::test]
    async fn bridge_paused_blocks_send() {
        let (core, drivers, spaces, _cache) = ready_core().await;

        let origin_server = server("s1", "discord");
        let origin_channel = Channel::new("c1".into(), "discord".into(), origin_server.clone(), "general".into(), false);
        let discord = FakeDriver::new("discord", vec![origin_channel.clone()], Arc::new(StdMutex::new(Vec::new())));
        drivers.register("discord", discord).await.unwrap();

        let mut space = Space::new("test", SpaceOptions::default());
        space
            .join(SpaceMember::new("discord".into(), "s1".into(), "c1".into()), None, true, 0)
            .unwrap();
        spaces.add(space.clone());

        let author = member("u1", "discord", origin_server);
        spaces
            .set_bridge_paused(
                author.id().clone(),
                crate::space::BridgePaused {
                    inclusive: true,
                    entries: vec![crate::space::BridgePausedEntry {
                        prefix: "//".to_string(),
                        suffix: String::new(),
                    }],
                },
            )
            .await;

        let content = MessageContent::new("m1".into(), "c1".into()).with_text("//private note");
        let error = core.send(author, space, content, None).await.unwrap_err();
        match error {
            crate::error::Error::Bridge(BridgeError::Blocked(BlockedReason::BridgePaused)) => {}
            other => panic!("expected BridgePaused, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_fans_out_to_every_platform_except_origin_and_drops_group() {
        let (core, drivers, spaces, cache) = ready_core().await;

        let origin_server = server("s1", "discord");
        let origin_channel = Channel::new("c1".into(), "discord".into(), origin_server.clone(), "general".into(), false);
        let far_server = server("s2", "slack");
        let far_channel = Channel::new("c2".into(), "slack".into(), far_server.clone(), "general".into(), false);

        let discord = FakeDriver::new("discord", vec![origin_channel.clone()], Arc::new(StdMutex::new(Vec::new())));
        let discord_deleted = discord.deleted();
        drivers.register("discord", discord).await.unwrap();

        let slack = FakeDriver::new("slack", vec![far_channel.clone()], Arc::new(StdMutex::new(Vec::new())));
        let slack_deleted = slack.deleted();
        drivers.register("slack", slack).await.unwrap();

        let mut space = Space::new("test", SpaceOptions::default());
        space
            .join(SpaceMember::new("discord".into(), "s1".into(), "c1".into()), None, true, 0)
            .unwrap();
        space
            .join(SpaceMember::new("slack".into(), "s2".into(), "c2".into()), None, true, 0)
            .unwrap();
        spaces.add(space.clone());

        let author = member("u1", "discord", origin_server);
        let content = MessageContent::new("m1".into(), "c1".into()).with_text("hello");
        let group = core.send(author, space, content, None).await.unwrap();
        let origin_message = group.message_for_platform("discord").unwrap().clone();

        assert!(cache.get_group(&group.id).await.is_some(), "group must be cached before delete");

        core.delete(origin_message).await.unwrap();

        assert!(
            discord_deleted.lock().unwrap().is_empty(),
            "the origin platform's own driver must not receive a delete call"
        );
        assert_eq!(slack_deleted.lock().unwrap().len(), 1, "every non-origin platform's message must be deleted");
        assert!(cache.get_group(&group.id).await.is_none(), "group must be removed from cache after delete");
    }

    #[tokio::test]
    async fn edit_fans_out_new_content_to_every_platform_except_origin() {
        let (core, drivers, spaces, _cache) = ready_core().await;

        let origin_server = server("s1", "discord");
        let origin_channel = Channel::new("c1".into(), "discord".into(), origin_server.clone(), "general".into(), false);
        let far_server = server("s2", "slack");
        let far_channel = Channel::new("c2".into(), "slack".into(), far_server.clone(), "general".into(), false);

        let discord = FakeDriver::new("discord", vec![origin_channel.clone()], Arc::new(StdMutex::new(Vec::new())));
        let discord_edited = discord.edited();
        drivers.register("discord", discord).await.unwrap();

        let slack = FakeDriver::new("slack", vec![far_channel.clone()], Arc::new(StdMutex::new(Vec::new())));
        let slack_edited = slack.edited();
        drivers.register("slack", slack).await.unwrap();

        let mut space = Space::new("test", SpaceOptions::default());
        space
            .join(SpaceMember::new("discord".into(), "s1".into(), "c1".into()), None, true, 0)
            .unwrap();
        space
            .join(SpaceMember::new("slack".into(), "s2".into(), "c2".into()), None, true, 0)
            .unwrap();
        spaces.add(space.clone());

        let author = member("u1", "discord", origin_server);
        let content = MessageContent::new("m1".into(), "c1".into()).with_text("hello");
        let group = core.send(author, space, content, None).await.unwrap();
        let origin_message = group.message_for_platform("discord").unwrap().clone();

        let edited_content = MessageContent::new("m1".into(), "c1".into()).with_text("hello, edited");
        core.edit(origin_message, edited_content).await.unwrap();

        assert!(
            discord_edited.lock().unwrap().is_empty(),
            "the origin platform's own driver must not receive an edit call"
        );
        let edited = slack_edited.lock().unwrap();
        assert_eq!(edited.len(), 1, "every non-origin platform's message must be edited");
        assert_eq!(edited[0].1, "hello, edited");
    }

    #[tokio::test]
    async fn not_ready_core_rejects_send() {
        let spaces = Arc::new(SpaceRegistry::new());
        let drivers = Arc::new(DriverRegistry::new());
        let filters = Arc::new(FilterEngine::with_builtins());
        let cache = Arc::new(MessageCache::new(10));
        drivers.reserve("discord").await;
        let core = BridgeCore::new(spaces, drivers, filters, cache, true);
        assert!(!core.is_ready());

        let server = server("s1", "discord");
        let author = member("u1", "discord", server.clone());
        let space = Space::new("test", SpaceOptions::default());
        let content = MessageContent::new("m1".into(), "c1".into());
        let error = core.send(author, space, content, None).await.unwrap_err();
        assert!(matches!(error, crate::error::Error::Bridge(BridgeError::NotInitialized)));
    }
}
