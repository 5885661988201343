//! Space Registry (component C): the set of Spaces and the per-user
//! bridge-paused directives that gate them, persisted through the Encrypted
//! Store.

use crate::error::Result;
use crate::model::{Id, Space};
use crate::store::SecureFiles;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

const SPACES_FILE_NAME: &str = "spaces";

/// One `(prefix, suffix)` rule a bridge-paused directive matches against.
/// A rule matches `text` when the text both starts with `prefix` and ends
/// with `suffix` (either half may be empty, which makes that half vacuous).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgePausedEntry {
    pub prefix: String,
    pub suffix: String,
}

impl BridgePausedEntry {
    fn matches(&self, text: &str) -> bool {
        text.starts_with(self.prefix.as_str()) && text.ends_with(self.suffix.as_str())
    }
}

/// A user's bridge-paused directive: with `inclusive: true` a block-list of
/// patterns that get paused, with everything else bridged; with
/// `inclusive: false` an allow-list of patterns that get bridged, with
/// everything else paused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgePaused {
    pub inclusive: bool,
    pub entries: Vec<BridgePausedEntry>,
}

impl BridgePaused {
    /// `true` means the message carrying `text` should NOT be bridged.
    fn blocks(&self, text: &str) -> bool {
        let any_match = self.entries.iter().any(|entry| entry.matches(text));
        if self.inclusive { any_match } else { !any_match }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SpaceDocument {
    spaces: HashMap<Uuid, Space>,
    bridge_paused: HashMap<String, BridgePaused>,
}

/// `{space_id → Space}` plus `{user_id → BridgePaused}`. Spaces are swapped
/// wholesale on mutation — this registry is read far more often (once per
/// bridged message, per member) than it's written (joins/leaves/option
/// edits), so the whole-map-clone-and-swap cost of `ArcSwap` beats a lock
/// held across every read.
pub struct SpaceRegistry {
    spaces: ArcSwap<HashMap<Uuid, Space>>,
    bridge_paused: RwLock<HashMap<Id, BridgePaused>>,
    store: Option<Arc<SecureFiles>>,
}

impl SpaceRegistry {
    pub fn new() -> Self {
        Self {
            spaces: ArcSwap::from_pointee(HashMap::new()),
            bridge_paused: RwLock::new(HashMap::new()),
            store: None,
        }
    }

    pub fn with_store(store: Arc<SecureFiles>) -> Self {
        Self {
            store: Some(store),
            ..Self::new()
        }
    }

    pub fn add(&self, space: Space) {
        self.mutate(|spaces| {
            spaces.insert(space.id, space);
        });
    }

    pub fn get(&self, id: &Uuid) -> Option<Space> {
        self.spaces.load().get(id).cloned()
    }

    pub fn delete(&self, id: &Uuid) -> Option<Space> {
        let mut removed = None;
        self.mutate(|spaces| {
            removed = spaces.remove(id);
        });
        removed
    }

    /// Replaces an existing space's snapshot in place, e.g. after a
    /// `join`/`leave`/option edit performed by the caller on a cloned copy.
    pub fn replace(&self, space: Space) {
        self.mutate(|spaces| {
            spaces.insert(space.id, space);
        });
    }

    pub fn all(&self) -> Vec<Space> {
        self.spaces.load().values().cloned().collect()
    }

    /// Finds the (at most one, by invariant) Space a channel belongs to.
    pub fn get_space_for_channel(&self, channel_id: &Id) -> Option<Space> {
        self.spaces
            .load()
            .values()
            .find(|space| space.get_member_for_channel(channel_id).is_some())
            .cloned()
    }

    fn mutate(&self, edit: impl FnOnce(&mut HashMap<Uuid, Space>)) {
        let mut next = (**self.spaces.load()).clone();
        edit(&mut next);
        self.spaces.store(Arc::new(next));
    }

    pub async fn set_bridge_paused(&self, user_id: Id, directive: BridgePaused) {
        self.bridge_paused.write().await.insert(user_id, directive);
    }

    pub async fn clear_bridge_paused(&self, user_id: &Id) {
        self.bridge_paused.write().await.remove(user_id);
    }

    /// `true` means a message from `user_id` containing `text` must not be
    /// bridged. Users with no directive are never paused.
    pub async fn is_bridge_paused(&self, user_id: &Id, text: &str) -> bool {
        self.bridge_paused
            .read()
            .await
            .get(user_id)
            .is_some_and(|directive| directive.blocks(text))
    }

    pub async fn save(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let document = SpaceDocument {
            spaces: (**self.spaces.load()).clone(),
            bridge_paused: self
                .bridge_paused
                .read()
                .await
                .iter()
                .map(|(id, directive)| (id.to_string(), directive.clone()))
                .collect(),
        };
        let value = serde_json::to_value(&document).map_err(anyhow::Error::from)?;
        store.save_json(SPACES_FILE_NAME, &value).await?;
        Ok(())
    }

    pub async fn load(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let Some(value) = store.read_json(SPACES_FILE_NAME).await? else {
            return Ok(());
        };
        let document: SpaceDocument = serde_json::from_value(value).map_err(anyhow::Error::from)?;

        self.spaces.store(Arc::new(document.spaces));
        let mut bridge_paused = self.bridge_paused.write().await;
        for (id, directive) in document.bridge_paused {
            bridge_paused.insert(crate::model::id(id), directive);
        }
        Ok(())
    }
}

impl Default for SpaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SpaceOptions;

    fn id(s: &str) -> Id {
        s.into()
    }

    #[test]
    fn add_get_delete_round_trip() {
        let registry = SpaceRegistry::new();
        let space = Space::new("test", SpaceOptions::default());
        let space_id = space.id;

        registry.add(space);
        assert!(registry.get(&space_id).is_some());

        let removed = registry.delete(&space_id).unwrap();
        assert_eq!(removed.id, space_id);
        assert!(registry.get(&space_id).is_none());
    }

    #[test]
    fn get_space_for_channel_finds_owning_space() {
        let registry = SpaceRegistry::new();
        let mut space = Space::new("test", SpaceOptions::default());
        space
            .join(
                crate::model::SpaceMember::new(id("discord"), id("s1"), id("c1")),
                None,
                true,
                0,
            )
            .unwrap();
        let space_id = space.id;
        registry.add(space);

        let found = registry.get_space_for_channel(&id("c1")).unwrap();
        assert_eq!(found.id, space_id);
        assert!(registry.get_space_for_channel(&id("unknown")).is_none());
    }

    #[tokio::test]
    async fn inclusive_bridge_paused_blocks_matching_prefix() {
        // Spec §8 S4: inclusive=true, entries=[{prefix:"//"}]; "//note" is
        // blocked, "ok" is not.
        let registry = SpaceRegistry::new();
        registry
            .set_bridge_paused(
                id("u1"),
                BridgePaused {
                    inclusive: true,
                    entries: vec![BridgePausedEntry {
                        prefix: "//".to_string(),
                        suffix: String::new(),
                    }],
                },
            )
            .await;

        assert!(registry.is_bridge_paused(&id("u1"), "//note to self").await);
        assert!(!registry.is_bridge_paused(&id("u1"), "ok").await);
    }

    #[tokio::test]
    async fn exclusive_bridge_paused_is_an_allow_list() {
        let registry = SpaceRegistry::new();
        registry
            .set_bridge_paused(
                id("u1"),
                BridgePaused {
                    inclusive: false,
                    entries: vec![BridgePausedEntry {
                        prefix: "!".to_string(),
                        suffix: String::new(),
                    }],
                },
            )
            .await;

        assert!(!registry.is_bridge_paused(&id("u1"), "!bridge me").await);
        assert!(registry.is_bridge_paused(&id("u1"), "quiet thought").await);
    }

    #[tokio::test]
    async fn users_without_a_directive_are_never_paused() {
        let registry = SpaceRegistry::new();
        assert!(!registry.is_bridge_paused(&id("nobody"), "anything").await);
    }
}
