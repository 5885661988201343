use super::{Filter, FilterConfig, FilterResult};
use crate::model::{Id, Member, MessageContent};
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r#"(?i)\b((?:https?://|www\d{0,3}[.]|[a-z0-9.\-]+[.][a-z]{2,4}/)(?:[^\s()<>]+|\([^\s()<>]*\))+(?:\([^\s()<>]*\)|[^\s`!()\[\]{};:'".,<>?]))"#,
    )
    .expect("static URL pattern compiles")
});

/// Blocks any message whose plaintext contains what looks like a URL.
pub struct LinksFilter;

impl LinksFilter {
    pub fn find_urls(text: &str) -> Vec<&str> {
        URL_PATTERN.find_iter(text).map(|m| m.as_str()).collect()
    }
}

impl Filter for LinksFilter {
    fn id(&self) -> &'static str {
        "links"
    }
    fn name(&self) -> &'static str {
        "Links Filter"
    }
    fn description(&self) -> &'static str {
        "A filter that blocks links."
    }

    fn check(
        &self,
        _author: &Member,
        content: &MessageContent,
        _webhook_id: Option<&Id>,
        _config: &FilterConfig,
        _data: Option<&serde_json::Value>,
    ) -> FilterResult {
        let plaintext = content.to_plaintext();
        FilterResult {
            allowed: Self::find_urls(&plaintext).is_empty(),
            message: Some("Links are not allowed here.".to_string()),
            should_log: true,
            ..Default::default()
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
    fn blocks_plain_http_url() {
        let content = MessageContent::new("m1".into(), "c1".into()).with_text("check out https://example.com/page");
        let result = LinksFilter.check(&member(), &content, None, &FilterConfig::new(), None);
        assert!(!result.allowed);
        assert!(result.should_log);
    }

    #[test]
    fn allows_plain_text() {
        let content = MessageContent::new("m1".into(), "c1".into()).with_text("no links here");
        let result = LinksFilter.check(&member(), &content, None, &FilterConfig::new(), None);
        assert!(result.allowed);
    }
}
