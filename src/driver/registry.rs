use super::DriverDyn;
use crate::error::DriverError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

type SetupCallback = Box<dyn Fn() + Send + Sync>;

struct Inner {
    drivers: HashMap<String, Arc<dyn DriverDyn>>,
    reserved: HashSet<String>,
    enable_allow_list: bool,
    allow_list: HashSet<String>,
    setup_callback: Option<SetupCallback>,
    setup_fired: bool,
}

/// Holds `{platform_id → driver}` plus a set of platforms known to be
/// pending async initialization. The Bridge Core treats "no reservations
/// outstanding" as its readiness signal, so a driver that boots
/// asynchronously must call [`DriverRegistry::reserve`] before yielding
/// control back to the bootstrap path, or the core will consider itself
/// ready before that driver can possibly register.
pub struct DriverRegistry {
    inner: RwLock<Inner>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                drivers: HashMap::new(),
                reserved: HashSet::new(),
                enable_allow_list: false,
                allow_list: HashSet::new(),
                setup_callback: None,
                setup_fired: false,
            }),
        }
    }

    pub fn with_allow_list(allowed: impl IntoIterator<Item = String>) -> Self {
        let registry = Self::new();
        {
            let mut inner = registry.inner.try_write().expect("fresh registry is uncontended");
            inner.enable_allow_list = true;
            inner.allow_list = allowed.into_iter().collect();
        }
        registry
    }

    pub async fn reserve(&self, platform: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.reserved.insert(platform.into());
    }

    pub async fn unreserve(&self, platform: &str) {
        let mut inner = self.inner.write().await;
        inner.reserved.remove(platform);
        Self::maybe_fire_setup(&mut inner);
    }

    pub async fn register(
        &self,
        platform: impl Into<String>,
        driver: impl DriverDyn,
    ) -> Result<(), DriverError> {
        let platform = platform.into();
        let mut inner = self.inner.write().await;
        if inner.enable_allow_list && !inner.allow_list.contains(&platform) {
            return Err(DriverError::NotAllowed(platform));
        }
        inner.drivers.insert(platform.clone(), Arc::new(driver));
        inner.reserved.remove(&platform);
        Self::maybe_fire_setup(&mut inner);
        Ok(())
    }

    pub async fn remove(&self, platform: &str, silent: bool) {
        let mut inner = self.inner.write().await;
        let existed = inner.drivers.remove(platform).is_some();
        if !existed && !silent {
            tracing::warn!(platform, "attempted to remove a driver that was never registered");
        }
    }

    pub async fn get(&self, platform: &str) -> Option<Arc<dyn DriverDyn>> {
        self.inner.read().await.drivers.get(platform).cloned()
    }

    pub async fn all(&self) -> Vec<Arc<dyn DriverDyn>> {
        self.inner.read().await.drivers.values().cloned().collect()
    }

    pub async fn is_ready(&self) -> bool {
        self.inner.read().await.reserved.is_empty()
    }

    /// Fired exactly once, the moment the last outstanding reservation
    /// resolves (via `register` or `unreserve`). If no reservations were
    /// ever made, it never fires — the caller is expected to treat
    /// "nothing ever reserved" as already-ready and not wait on this.
    pub async fn set_setup_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        let mut inner = self.inner.write().await;
        inner.setup_callback = Some(Box::new(callback));
        Self::maybe_fire_setup(&mut inner);
    }

    fn maybe_fire_setup(inner: &mut Inner) {
        if inner.reserved.is_empty() && !inner.setup_fired
            && let Some(callback) = inner.setup_callback.as_ref()
        {
            callback();
            inner.setup_fired = true;
        }
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Driver;
    use crate::error::Result;
    use crate::model::{Channel, Id, Member, Message, MessageContent, Server, User, Webhook};

    struct NullDriver;

    impl Driver for NullDriver {
        fn platform(&self) -> &str {
            "null"
        }
        fn get_user(&self, _id: &Id) -> Option<User> {
            None
        }
        fn get_server(&self, _id: &Id) -> Option<Server> {
            None
        }
        fn get_channel(&self, _id: &Id) -> Option<Channel> {
            None
        }
        fn get_webhook(&self, _id: &Id) -> Option<Webhook> {
            None
        }
        async fn fetch_user(&self, id: &Id) -> Result<User> {
            Ok(User {
                id: id.clone(),
                platform: "null".into(),
                name: String::new(),
                display_name: String::new(),
                avatar_url: None,
                bot: false,
            })
        }
        async fn fetch_server(&self, _id: &Id) -> Result<Server> {
            Err(DriverError::Unsupported("null.fetch_server".into()).into())
        }
        async fn fetch_channel(&self, _id: &Id) -> Result<Channel> {
            Err(DriverError::Unsupported("null.fetch_channel".into()).into())
        }
        async fn fetch_webhook(&self, _id: &Id) -> Result<Webhook> {
            Err(DriverError::Unsupported("null.fetch_webhook".into()).into())
        }
        async fn get_member(&self, _server: &Server, _member_id: &Id) -> Result<Option<Member>> {
            Ok(None)
        }
        async fn send(
            &self,
            _destination: &Channel,
            _content: &MessageContent,
            _send_as: Option<&Member>,
            _webhook_id: Option<&Id>,
            _self_send: bool,
        ) -> Result<Option<Message>> {
            Ok(None)
        }
        async fn edit(&self, _message: &Message, _content: &MessageContent) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _message: &Message) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn ready_with_no_reservations() {
        let registry = DriverRegistry::new();
        assert!(registry.is_ready().await);
    }

    #[tokio::test]
    async fn reservation_blocks_readiness_until_registered() {
        let registry = DriverRegistry::new();
        registry.reserve("null").await;
        assert!(!registry.is_ready().await);

        registry.register("null", NullDriver).await.unwrap();
        assert!(registry.is_ready().await);
    }

    #[tokio::test]
    async fn setup_callback_fires_exactly_once_on_last_reservation() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let registry = DriverRegistry::new();
        registry.reserve("a").await;
        registry.reserve("b").await;

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        registry.set_setup_callback(move || { fired_clone.fetch_add(1, Ordering::SeqCst); }).await;

        registry.unreserve("a").await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        registry.unreserve("b").await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        registry.unreserve("b").await;
        assert_eq!(fired.load(Ordering::SeqCst), 1, "must fire exactly once");
    }

    #[tokio::test]
    async fn allow_list_rejects_unlisted_platforms() {
        let registry = DriverRegistry::with_allow_list(["discord".to_string()]);
        let err = registry.register("null", NullDriver).await.unwrap_err();
        assert!(matches!(err, DriverError::NotAllowed(_)));
    }
}
