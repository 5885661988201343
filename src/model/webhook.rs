use super::Id;
use serde::{Deserialize, Serialize};

/// A per-channel sender-impersonation handle owned by a driver. Transport-only:
/// the core treats it as an opaque routing token, never inspecting its contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: Id,
    pub platform: Id,
    pub server_id: Id,
    pub channel_id: Id,
}
