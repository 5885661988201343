use super::{Filter, FilterConfig, FilterResult};
use crate::model::{Id, Member, MessageContent};

/// Blocks messages that arrived through a webhook.
pub struct WebhooksFilter;

impl Filter for WebhooksFilter {
    fn id(&self) -> &'static str {
        "webhooks"
    }
    fn name(&self) -> &'static str {
        "Webhooks Filter"
    }
    fn description(&self) -> &'static str {
        "A filter that blocks webhook messages."
    }

    fn check(
        &self,
        _author: &Member,
        _content: &MessageContent,
        webhook_id: Option<&Id>,
        _config: &FilterConfig,
        _data: Option<&serde_json::Value>,
    ) -> FilterResult {
        if webhook_id.is_some() {
            FilterResult::block("Webhook messages may not talk in this Room.")
        } else {
            FilterResult::allow()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Server, User};

    fn member() -> Member {
        Member::new(
            User {
                id: "u1".into(),
                platform: "discord".into(),
                name: "a".into(),
                display_name: "a".into(),
                avatar_url: None,
                bot: false,
            },
            Server::new("s1".into(), "discord".into(), "server"),
        )
    }

    #[test]
    fn blocks_when_webhook_id_present() {
        let content = MessageContent::new("m1".into(), "c1".into());
        let webhook_id: Id = "wh1".into();
        let result = WebhooksFilter.check(&member(), &content, Some(&webhook_id), &FilterConfig::new(), None);
        assert!(!result.allowed);
    }

    #[test]
    fn allows_without_webhook_id() {
        let content = MessageContent::new("m1".into(), "c1".into());
        let result = WebhooksFilter.check(&member(), &content, None, &FilterConfig::new(), None);
        assert!(result.allowed);
    }
}
