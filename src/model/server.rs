use super::Id;
use serde::{Deserialize, Serialize};

/// A remote community on a platform. Immutable after construction; the registry
/// may replace it wholesale with a fresher snapshot fetched from the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: Id,
    pub platform: Id,
    pub name: String,
    /// Largest single-file upload this server's platform allows, if known.
    pub filesize_limit: Option<u64>,
}

impl Server {
    pub fn new(id: Id, platform: Id, name: impl Into<String>) -> Self {
        Self {
            id,
            platform,
            name: name.into(),
            filesize_limit: None,
        }
    }
}

/// A channel subordinate to a [`Server`]. Age-gated iff `nsfw` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Id,
    pub platform: Id,
    pub server: Server,
    pub name: String,
    pub nsfw: bool,
}

impl Channel {
    pub fn new(id: Id, platform: Id, server: Server, name: impl Into<String>, nsfw: bool) -> Self {
        Self {
            id,
            platform,
            server,
            name: name.into(),
            nsfw,
        }
    }

    pub fn server_id(&self) -> &Id {
        &self.server.id
    }
}
