use super::{Filter, FilterConfig, FilterResult};
use crate::model::{Id, Member, MessageContent};

/// Blocks mass-ping tokens (`@everyone`, `@here`).
pub struct MasspingFilter;

impl Filter for MasspingFilter {
    fn id(&self) -> &'static str {
        "massping"
    }
    fn name(&self) -> &'static str {
        "Massping Filter"
    }
    fn description(&self) -> &'static str {
        "Blocks mass pings from being sent."
    }

    fn check(
        &self,
        _author: &Member,
        content: &MessageContent,
        _webhook_id: Option<&Id>,
        _config: &FilterConfig,
        data: Option<&serde_json::Value>,
    ) -> FilterResult {
        let plaintext = content.to_plaintext();
        let hit = plaintext.contains("@everyone") || plaintext.contains("@here");

        FilterResult {
            allowed: !hit,
            data: data.cloned(),
            message: Some("Mass pings are not allowed.".to_string()),
            should_log: true,
            should_contribute: true,
            safe_content: None,
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
    fn blocks_everyone_ping() {
        let content = MessageContent::new("m1".into(), "c1".into()).with_text("@everyone please read");
        let result = MasspingFilter.check(&member(), &content, None, &FilterConfig::new(), None);
        assert!(!result.allowed);
    }

    #[test]
    fn blocks_here_ping() {
        let content = MessageContent::new("m1".into(), "c1".into()).with_text("@here incoming");
        let result = MasspingFilter.check(&member(), &content, None, &FilterConfig::new(), None);
        assert!(!result.allowed);
    }

    #[test]
    fn allows_normal_mentions() {
        let content = MessageContent::new("m1".into(), "c1".into()).with_text("hey @someone");
        let result = MasspingFilter.check(&member(), &content, None, &FilterConfig::new(), None);
        assert!(result.allowed);
    }
}
