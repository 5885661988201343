//! Message Cache (component B): a bounded, insertion-order-evicting map of
//! individual cross-platform messages and their owning groups.

use crate::model::{Message, MessageGroup};
use crate::store::SecureFiles;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

const DEFAULT_CACHE_LIMIT: usize = 10_000;
const CACHE_FILE_NAME: &str = "cache";

struct BoundedMap<V> {
    limit: usize,
    order: VecDeque<String>,
    entries: HashMap<String, V>,
}

impl<V> BoundedMap<V> {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    /// Insert, evicting the single oldest entry if this push would exceed
    /// the configured limit. Re-inserting an existing key does not change
    /// its place in the eviction order.
    fn insert(&mut self, key: String, value: V) {
        if !self.entries.contains_key(&key) {
            self.order.push_back(key.clone());
            if self.order.len() > self.limit
                && let Some(oldest) = self.order.pop_front()
            {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, value);
    }

    fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    fn remove(&mut self, key: &str) -> Option<V> {
        self.order.retain(|k| k != key);
        self.entries.remove(key)
    }

    fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }
}

#[derive(Default, Serialize, Deserialize)]
struct CacheDocument {
    messages: Vec<Message>,
    groups: Vec<MessageGroup>,
}

pub struct MessageCache {
    messages: RwLock<BoundedMap<Message>>,
    groups: RwLock<BoundedMap<MessageGroup>>,
    store: Option<Arc<SecureFiles>>,
}

impl MessageCache {
    pub fn new(cache_limit: usize) -> Self {
        Self {
            messages: RwLock::new(BoundedMap::new(cache_limit)),
            groups: RwLock::new(BoundedMap::new(cache_limit)),
            store: None,
        }
    }

    pub fn with_store(cache_limit: usize, store: Arc<SecureFiles>) -> Self {
        Self {
            store: Some(store),
            ..Self::new(cache_limit)
        }
    }

    pub async fn add_message(self: &Arc<Self>, message: Message, save: bool) {
        self.messages.write().await.insert(message.id.to_string(), message);
        if save {
            self.spawn_save();
        }
    }

    pub async fn add_group(self: &Arc<Self>, group: MessageGroup, save: bool) {
        self.groups.write().await.insert(group.id.to_string(), group);
        if save {
            self.spawn_save();
        }
    }

    pub async fn get_message(&self, id: &str) -> Option<Message> {
        self.messages.read().await.get(id).cloned()
    }

    pub async fn get_group(&self, id: &uuid::Uuid) -> Option<MessageGroup> {
        self.groups.read().await.get(&id.to_string()).cloned()
    }

    /// Linear scan over cached groups for the one containing `message_id`.
    /// Acceptable at expected scale; a secondary `{msg_id -> group_id}`
    /// index could be added later if profiling demands it.
    pub async fn get_group_from_message(&self, message_id: &str) -> Option<MessageGroup> {
        self.groups
            .read()
            .await
            .values()
            .find(|group| group.contains_message_id(message_id))
            .cloned()
    }

    pub async fn remove_group(self: &Arc<Self>, group_id: &uuid::Uuid, save: bool) {
        self.groups.write().await.remove(&group_id.to_string());
        if save {
            self.spawn_save();
        }
    }

    /// Offloads cache persistence to a detached task — this is I/O bound
    /// (JSON encode + encrypted write) and must never block the caller of
    /// `add_message`/`add_group`/`remove_group`.
    fn spawn_save(self: &Arc<Self>) {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(error) = cache.save().await {
                tracing::warn!(%error, "failed to persist message cache");
            }
        });
    }

    pub async fn save(&self) -> crate::error::Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let document = CacheDocument {
            messages: self.messages.read().await.values().cloned().collect(),
            groups: self.groups.read().await.values().cloned().collect(),
        };
        let value = serde_json::to_value(&document).map_err(anyhow::Error::from)?;
        store.save_json(CACHE_FILE_NAME, &value).await?;
        Ok(())
    }

    pub async fn load(&self) -> crate::error::Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let Some(value) = store.read_json(CACHE_FILE_NAME).await? else {
            return Ok(());
        };
        let document: CacheDocument = serde_json::from_value(value).map_err(anyhow::Error::from)?;

        let mut messages = self.messages.write().await;
        for message in document.messages {
            messages.insert(message.id.to_string(), message);
        }
        let mut groups = self.groups.write().await;
        for group in document.groups {
            groups.insert(group.id.to_string(), group);
        }
        Ok(())
    }
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_LIMIT)
    }
}

impl<V: Clone> Clone for BoundedMap<V> {
    fn clone(&self) -> Self {
        Self {
            limit: self.limit,
            order: self.order.clone(),
            entries: self.entries.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str) -> Message {
        Message::new(id.into(), "discord".into(), "author".into())
    }

    #[tokio::test]
    async fn inserting_past_capacity_evicts_exactly_one() {
        let cache = Arc::new(MessageCache::new(2));
        cache.add_message(message("m1"), false).await;
        cache.add_message(message("m2"), false).await;
        cache.add_message(message("m3"), false).await;

        assert!(cache.get_message("m1").await.is_none(), "oldest entry must be evicted");
        assert!(cache.get_message("m2").await.is_some());
        assert!(cache.get_message("m3").await.is_some());
    }

    #[tokio::test]
    async fn get_group_from_message_finds_owning_group() {
        let cache = Arc::new(MessageCache::new(10));
        let mut group = MessageGroup::new("author".into(), uuid::Uuid::new_v4());
        group.messages.push(message("m1"));
        let group_id = group.id;
        cache.add_group(group, false).await;

        let found = cache.get_group_from_message("m1").await.unwrap();
        assert_eq!(found.id, group_id);
    }

    #[tokio::test]
    async fn remove_group_drops_it_from_cache() {
        let cache = Arc::new(MessageCache::new(10));
        let group = MessageGroup::new("author".into(), uuid::Uuid::new_v4());
        let group_id = group.id;
        cache.add_group(group, false).await;

        cache.remove_group(&group_id, false).await;
        assert!(cache.get_group(&group_id).await.is_none());
    }
}
