use super::Id;
use crate::error::SpaceError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single-use-limited, expiring invite code into a private [`Space`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceInvite {
    pub code: String,
    pub expiry_unix: i64,
    pub max_uses: u32,
    pub uses: u32,
}

impl SpaceInvite {
    pub fn is_expired(&self, now_unix: i64) -> bool {
        self.expiry_unix <= now_unix || (self.max_uses > 0 && self.uses >= self.max_uses)
    }
}

/// A server's registration into a Space. Equality (and therefore "already a
/// member" checks) is by `server.id` only — a server can hold at most one
/// membership per Space, regardless of which channel or webhook it uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceMember {
    pub platform: Id,
    pub server_id: Id,
    pub channel_id: Id,
    pub webhook_id: Option<Id>,
    pub invite_code: Option<String>,
    /// True when the driver for `platform` wasn't registered yet at join
    /// time — the membership carries only raw ids until reified.
    pub partial: bool,
}

impl PartialEq for SpaceMember {
    fn eq(&self, other: &Self) -> bool {
        self.server_id == other.server_id
    }
}
impl Eq for SpaceMember {}

impl SpaceMember {
    pub fn new(platform: Id, server_id: Id, channel_id: Id) -> Self {
        Self {
            platform,
            server_id,
            channel_id,
            webhook_id: None,
            invite_code: None,
            partial: false,
        }
    }

    pub fn partial(platform: Id, server_id: Id, channel_id: Id) -> Self {
        Self {
            partial: true,
            ..Self::new(platform, server_id, channel_id)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceOptions {
    pub private: bool,
    pub private_owner_id: Option<Id>,
    pub nsfw: bool,
    pub relay_deletes: bool,
    pub relay_edits: bool,
    pub convert_large_files: bool,
    pub filters: Vec<String>,
    pub filter_configs: HashMap<String, serde_json::Value>,
}

impl Default for SpaceOptions {
    fn default() -> Self {
        Self {
            private: false,
            private_owner_id: None,
            nsfw: false,
            relay_deletes: true,
            relay_edits: true,
            convert_large_files: false,
            filters: Vec::new(),
            filter_configs: HashMap::new(),
        }
    }
}

/// A logical room spanning one channel per participating server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    pub id: uuid::Uuid,
    pub name: String,
    pub emoji: Option<String>,
    pub members: Vec<SpaceMember>,
    pub invites: Vec<SpaceInvite>,
    pub bans: Vec<Id>,
    pub options: SpaceOptions,
}

impl Space {
    pub fn new(name: impl Into<String>, options: SpaceOptions) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            emoji: None,
            members: Vec::new(),
            invites: Vec::new(),
            bans: Vec::new(),
            options,
        }
    }

    pub fn is_banned(&self, server_id: &Id) -> bool {
        self.bans.iter().any(|banned| banned == server_id)
    }

    pub fn get_member(&self, server_id: &Id) -> Option<&SpaceMember> {
        self.members.iter().find(|m| &m.server_id == server_id)
    }

    pub fn get_member_for_channel(&self, channel_id: &Id) -> Option<&SpaceMember> {
        self.members.iter().find(|m| &m.channel_id == channel_id)
    }

    /// Enforces, in order: not-already-joined, ban, and (if private and not
    /// forced) a valid unexpired invite that gets consumed. An `AlreadyJoined`
    /// error must never consume an invite use — that's why the already-joined
    /// check runs before the invite is even looked up.
    pub fn join(
        &mut self,
        member: SpaceMember,
        invite_code: Option<&str>,
        force: bool,
        now_unix: i64,
    ) -> Result<(), SpaceError> {
        if self.get_member(&member.server_id).is_some() {
            return Err(SpaceError::AlreadyJoined);
        }
        if self.get_member_for_channel(&member.channel_id).is_some() {
            return Err(SpaceError::AlreadyJoined);
        }
        if self.is_banned(&member.server_id) {
            return Err(SpaceError::Banned);
        }
        if self.options.private && !force {
            let code = invite_code.ok_or(SpaceError::NoInvite)?;
            let index = self.invites.iter().position(|invite| invite.code == code).ok_or(SpaceError::InvalidInvite)?;
            if self.invites[index].is_expired(now_unix) {
                self.invites.remove(index);
                return Err(SpaceError::InvalidInvite);
            }
            self.invites[index].uses += 1;
        }
        self.members.push(member);
        Ok(())
    }

    pub fn leave(&mut self, server_id: &Id) -> Result<SpaceMember, SpaceError> {
        let index = self
            .members
            .iter()
            .position(|m| &m.server_id == server_id)
            .ok_or(SpaceError::NotJoined)?;
        Ok(self.members.remove(index))
    }

    /// Creates a placeholder membership for a platform whose driver isn't
    /// registered yet. Reification is allowed but not required.
    pub fn partial_join(&mut self, platform: Id, server_id: Id, channel_id: Id) -> Result<(), SpaceError> {
        self.join(SpaceMember::partial(platform, server_id, channel_id), None, true, 0)
    }

    pub fn reify_member(&mut self, server_id: &Id) {
        if let Some(member) = self.members.iter_mut().find(|m| &m.server_id == server_id) {
            member.partial = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Id {
        s.into()
    }

    fn member(server: &str, channel: &str) -> SpaceMember {
        SpaceMember::new(id("discord"), id(server), id(channel))
    }

    #[test]
    fn join_then_leave_clears_membership() {
        let mut space = Space::new("test", SpaceOptions::default());
        space.join(member("s1", "c1"), None, false, 0).unwrap();
        assert!(space.get_member(&id("s1")).is_some());

        space.leave(&id("s1")).unwrap();
        assert!(space.get_member(&id("s1")).is_none());
    }

    #[test]
    fn join_twice_fails_without_consuming_invite() {
        let mut options = SpaceOptions::default();
        options.private = true;
        let mut space = Space::new("test", options);
        space.invites.push(SpaceInvite {
            code: "abc".into(),
            expiry_unix: 1_000_000,
            max_uses: 5,
            uses: 0,
        });

        space.join(member("s1", "c1"), Some("abc"), false, 0).unwrap();
        assert_eq!(space.invites[0].uses, 1);

        let err = space.join(member("s1", "c2"), Some("abc"), false, 0).unwrap_err();
        assert!(matches!(err, SpaceError::AlreadyJoined));
        assert_eq!(space.invites[0].uses, 1, "AlreadyJoined must not consume a use");
    }

    #[test]
    fn private_space_without_invite_is_rejected() {
        let mut options = SpaceOptions::default();
        options.private = true;
        let mut space = Space::new("test", options);

        let err = space.join(member("s1", "c1"), None, false, 0).unwrap_err();
        assert!(matches!(err, SpaceError::NoInvite));
    }

    #[test]
    fn banned_server_cannot_join() {
        let mut space = Space::new("test", SpaceOptions::default());
        space.bans.push(id("s1"));

        let err = space.join(member("s1", "c1"), None, false, 0).unwrap_err();
        assert!(matches!(err, SpaceError::Banned));
    }

    #[test]
    fn force_join_bypasses_private_invite_requirement() {
        let mut options = SpaceOptions::default();
        options.private = true;
        let mut space = Space::new("test", options);

        space.join(member("s1", "c1"), None, true, 0).unwrap();
        assert!(space.get_member(&id("s1")).is_some());
    }

    #[test]
    fn expired_invite_is_removed_on_detection() {
        let mut options = SpaceOptions::default();
        options.private = true;
        let mut space = Space::new("test", options);
        space.invites.push(SpaceInvite {
            code: "abc".into(),
            expiry_unix: 10,
            max_uses: 0,
            uses: 0,
        });

        let err = space.join(member("s1", "c1"), Some("abc"), false, 20).unwrap_err();
        assert!(matches!(err, SpaceError::InvalidInvite));
        assert!(!space.invites.iter().any(|i| i.code == "abc"), "expired invite removed on detection");
    }
}
