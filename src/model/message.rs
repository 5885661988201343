use super::{Channel, Id, MessageContent, Server};
use serde::{Deserialize, Serialize};

/// One concrete message sent on one platform. The cache prefers to minimize
/// on-disk payload, so `content` is dropped once it's no longer needed for
/// edit/delete fan-out bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Id,
    pub platform: Id,
    pub author: Id,
    pub server: Option<Server>,
    pub channel: Option<Channel>,
    pub content: Option<MessageContent>,
    pub attachments_count: usize,
    pub replies: Vec<Id>,
    pub webhook_id: Option<Id>,
}

impl Message {
    pub fn new(id: Id, platform: Id, author: Id) -> Self {
        Self {
            id,
            platform,
            author,
            server: None,
            channel: None,
            content: None,
            attachments_count: 0,
            replies: Vec::new(),
            webhook_id: None,
        }
    }
}

/// The canonical "same logical message across platforms" record. Exactly one
/// is emitted per successful bridge call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageGroup {
    pub id: uuid::Uuid,
    pub author_id: Id,
    pub space_id: uuid::Uuid,
    /// One entry per platform that produced a message for this send.
    pub messages: Vec<Message>,
    pub replies: Vec<uuid::Uuid>,
}

impl MessageGroup {
    pub fn new(author_id: Id, space_id: uuid::Uuid) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            author_id,
            space_id,
            messages: Vec::new(),
            replies: Vec::new(),
        }
    }

    pub fn message_for_platform(&self, platform: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.platform.as_ref() == platform)
    }

    pub fn contains_message_id(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id.as_ref() == id)
    }
}
