//! The neutral data model shared by every driver and the bridge core.

mod content;
mod message;
mod server;
mod space;
mod user;
mod webhook;

pub use content::{ContentBlock, EmbedAuthor, EmbedField, EmbedFooter, File, MessageContent};
pub use message::{Message, MessageGroup};
pub use server::{Channel, Server};
pub use space::{Space, SpaceInvite, SpaceMember, SpaceOptions};
pub use user::{Member, User};
pub use webhook::Webhook;

/// Opaque identifier. The core never parses these; it only compares and routes on them.
pub type Id = std::sync::Arc<str>;

/// Build an [`Id`] from anything stringish.
pub fn id(value: impl Into<String>) -> Id {
    value.into().into()
}
