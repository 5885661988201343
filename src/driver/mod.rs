//! The Driver Contract: the one interface a platform adapter must implement,
//! and the registry that holds however many of them are active.

mod registry;
pub mod webhook;

pub use registry::DriverRegistry;
pub use webhook::WebhookDriver;

use crate::error::Result;
use crate::model::{Channel, Id, Member, Message, MessageContent, Server, User, Webhook};
use std::future::Future;
use std::pin::Pin;

/// Static trait for driver implementations. Use this when writing a concrete
/// adapter — the `impl Future` return types let implementations stay `async
/// fn` bodies without boxing, the way `Messaging` does for chat adapters.
pub trait Driver: Send + Sync + 'static {
    /// Immutable identifier used as a routing key. Never changes for the
    /// lifetime of the driver.
    fn platform(&self) -> &str;

    fn get_user(&self, id: &Id) -> Option<User>;
    fn get_server(&self, id: &Id) -> Option<Server>;
    fn get_channel(&self, id: &Id) -> Option<Channel>;
    fn get_webhook(&self, id: &Id) -> Option<Webhook>;

    fn fetch_user(&self, id: &Id) -> impl Future<Output = Result<User>> + Send;
    fn fetch_server(&self, id: &Id) -> impl Future<Output = Result<Server>> + Send;
    fn fetch_channel(&self, id: &Id) -> impl Future<Output = Result<Channel>> + Send;
    fn fetch_webhook(&self, id: &Id) -> impl Future<Output = Result<Webhook>> + Send;

    /// `server` must belong to this driver's platform, or the call fails
    /// with `DriverError::PlatformMismatch`.
    fn get_member(
        &self,
        server: &Server,
        member_id: &Id,
    ) -> impl Future<Output = Result<Option<Member>>> + Send;

    /// `None` means the destination was unreachable, not an error. When
    /// `destination.id == content.original_channel_id` and `self_send` is
    /// false, implementations must skip the outbound call entirely and
    /// fabricate a `Message` carrying `content.original_id` — this is what
    /// lets the origin channel sit in a Space's membership list without
    /// echoing its own message back to itself.
    fn send(
        &self,
        destination: &Channel,
        content: &MessageContent,
        send_as: Option<&Member>,
        webhook_id: Option<&Id>,
        self_send: bool,
    ) -> impl Future<Output = Result<Option<Message>>> + Send;

    /// Idempotent replacement of the message's rendered payload.
    fn edit(&self, message: &Message, content: &MessageContent) -> impl Future<Output = Result<()>> + Send;

    /// Idempotent; a missing target is not an error.
    fn delete(&self, message: &Message) -> impl Future<Output = Result<()>> + Send;

    /// Escape mentions/pings in platform-native text before re-emission on
    /// another platform. Identity by default.
    fn sanitize_inbound(&self, text: &str) -> String {
        text.to_owned()
    }

    /// Resolve neutral mention tokens to this platform's native form.
    /// Identity by default.
    fn sanitize_outbound(&self, text: &str) -> String {
        text.to_owned()
    }

    /// Declares OS-thread-parallel fan-out support. False by default.
    fn supports_parallel(&self) -> bool {
        false
    }

    /// Declares cooperative-concurrent fan-out support. False by default.
    fn supports_concurrent(&self) -> bool {
        false
    }

    /// Declares whether this platform has a notion of age-gated channels at all.
    fn supports_agegate(&self) -> bool {
        true
    }

    fn file_count_limit(&self) -> usize {
        10
    }

    /// Per-server upload size limit in bytes, if this platform has one.
    fn get_filesize_limit(&self, server: Option<&Server>) -> u64 {
        server
            .and_then(|s| s.filesize_limit)
            .unwrap_or(25 * 1024 * 1024)
    }
}

/// Dyn-compatible companion to [`Driver`]. The registry stores
/// `Arc<dyn DriverDyn>` so it can hold drivers of unrelated concrete types.
pub trait DriverDyn: Send + Sync + 'static {
    fn platform(&self) -> &str;

    fn get_user(&self, id: &Id) -> Option<User>;
    fn get_server(&self, id: &Id) -> Option<Server>;
    fn get_channel(&self, id: &Id) -> Option<Channel>;
    fn get_webhook(&self, id: &Id) -> Option<Webhook>;

    fn fetch_user<'a>(&'a self, id: &'a Id) -> Pin<Box<dyn Future<Output = Result<User>> + Send + 'a>>;
    fn fetch_server<'a>(&'a self, id: &'a Id) -> Pin<Box<dyn Future<Output = Result<Server>> + Send + 'a>>;
    fn fetch_channel<'a>(&'a self, id: &'a Id) -> Pin<Box<dyn Future<Output = Result<Channel>> + Send + 'a>>;
    fn fetch_webhook<'a>(&'a self, id: &'a Id) -> Pin<Box<dyn Future<Output = Result<Webhook>> + Send + 'a>>;

    fn get_member<'a>(
        &'a self,
        server: &'a Server,
        member_id: &'a Id,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Member>>> + Send + 'a>>;

    fn send<'a>(
        &'a self,
        destination: &'a Channel,
        content: &'a MessageContent,
        send_as: Option<&'a Member>,
        webhook_id: Option<&'a Id>,
        self_send: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Message>>> + Send + 'a>>;

    fn edit<'a>(
        &'a self,
        message: &'a Message,
        content: &'a MessageContent,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn delete<'a>(&'a self, message: &'a Message) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn sanitize_inbound(&self, text: &str) -> String;
    fn sanitize_outbound(&self, text: &str) -> String;
    fn supports_parallel(&self) -> bool;
    fn supports_concurrent(&self) -> bool;
    fn supports_agegate(&self) -> bool;
    fn file_count_limit(&self) -> usize;
    fn get_filesize_limit(&self, server: Option<&Server>) -> u64;
}

impl<T: Driver> DriverDyn for T {
    fn platform(&self) -> &str {
        Driver::platform(self)
    }

    fn get_user(&self, id: &Id) -> Option<User> {
        Driver::get_user(self, id)
    }
    fn get_server(&self, id: &Id) -> Option<Server> {
        Driver::get_server(self, id)
    }
    fn get_channel(&self, id: &Id) -> Option<Channel> {
        Driver::get_channel(self, id)
    }
    fn get_webhook(&self, id: &Id) -> Option<Webhook> {
        Driver::get_webhook(self, id)
    }

    fn fetch_user<'a>(&'a self, id: &'a Id) -> Pin<Box<dyn Future<Output = Result<User>> + Send + 'a>> {
        Box::pin(Driver::fetch_user(self, id))
    }
    fn fetch_server<'a>(&'a self, id: &'a Id) -> Pin<Box<dyn Future<Output = Result<Server>> + Send + 'a>> {
        Box::pin(Driver::fetch_server(self, id))
    }
    fn fetch_channel<'a>(&'a self, id: &'a Id) -> Pin<Box<dyn Future<Output = Result<Channel>> + Send + 'a>> {
        Box::pin(Driver::fetch_channel(self, id))
    }
    fn fetch_webhook<'a>(&'a self, id: &'a Id) -> Pin<Box<dyn Future<Output = Result<Webhook>> + Send + 'a>> {
        Box::pin(Driver::fetch_webhook(self, id))
    }

    fn get_member<'a>(
        &'a self,
        server: &'a Server,
        member_id: &'a Id,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Member>>> + Send + 'a>> {
        Box::pin(Driver::get_member(self, server, member_id))
    }

    fn send<'a>(
        &'a self,
        destination: &'a Channel,
        content: &'a MessageContent,
        send_as: Option<&'a Member>,
        webhook_id: Option<&'a Id>,
        self_send: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Message>>> + Send + 'a>> {
        Box::pin(Driver::send(self, destination, content, send_as, webhook_id, self_send))
    }

    fn edit<'a>(
        &'a self,
        message: &'a Message,
        content: &'a MessageContent,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(Driver::edit(self, message, content))
    }

    fn delete<'a>(&'a self, message: &'a Message) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(Driver::delete(self, message))
    }

    fn sanitize_inbound(&self, text: &str) -> String {
        Driver::sanitize_inbound(self, text)
    }
    fn sanitize_outbound(&self, text: &str) -> String {
        Driver::sanitize_outbound(self, text)
    }
    fn supports_parallel(&self) -> bool {
        Driver::supports_parallel(self)
    }
    fn supports_concurrent(&self) -> bool {
        Driver::supports_concurrent(self)
    }
    fn supports_agegate(&self) -> bool {
        Driver::supports_agegate(self)
    }
    fn file_count_limit(&self) -> usize {
        Driver::file_count_limit(self)
    }
    fn get_filesize_limit(&self, server: Option<&Server>) -> u64 {
        Driver::get_filesize_limit(self, server)
    }
}
