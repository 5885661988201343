use super::{Id, server::Server};
use serde::{Deserialize, Serialize};

/// A display identity as seen on a single platform. The core never persists
/// user records; it only carries them through a `send` call for fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub platform: Id,
    pub name: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bot: bool,
}

/// A [`User`] scoped to a particular [`Server`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub user: User,
    pub server: Server,
}

impl Member {
    pub fn new(user: User, server: Server) -> Self {
        Self { user, server }
    }

    pub fn id(&self) -> &Id {
        &self.user.id
    }

    pub fn platform(&self) -> &Id {
        &self.user.platform
    }

    pub fn bot(&self) -> bool {
        self.user.bot
    }
}
