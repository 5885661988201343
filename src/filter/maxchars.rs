use super::{ConfigSpec, ConfigValueType, Filter, FilterConfig, FilterResult};
use crate::model::{Id, Member, MessageContent};
use std::collections::HashMap;

const DEFAULT_LIMIT: i64 = 2000;

/// Limits the maximum plaintext length of a single message.
#[derive(Default)]
pub struct MaxcharsFilter;

impl MaxcharsFilter {
    fn limit(config: &FilterConfig) -> i64 {
        config
            .get("limit")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(DEFAULT_LIMIT)
    }
}

impl Filter for MaxcharsFilter {
    fn id(&self) -> &'static str {
        "maxchars"
    }
    fn name(&self) -> &'static str {
        "Max Characters"
    }
    fn description(&self) -> &'static str {
        "Limits maximum characters that can be sent in a message."
    }

    fn configs(&self) -> HashMap<&'static str, ConfigSpec> {
        HashMap::from([(
            "limit",
            ConfigSpec {
                display_name: "Limit".to_string(),
                description: "Sets the character limit.".to_string(),
                value_type: ConfigValueType::Integer,
                default: serde_json::json!(DEFAULT_LIMIT),
                limits: Some((0.0, 2000.0)),
            },
        )])
    }

    fn check(
        &self,
        _author: &Member,
        content: &MessageContent,
        _webhook_id: Option<&Id>,
        config: &FilterConfig,
        _data: Option<&serde_json::Value>,
    ) -> FilterResult {
        let limit = Self::limit(config);
        let length = content.to_plaintext().chars().count() as i64;

        FilterResult {
            allowed: length <= limit,
            message: Some(format!("Your message should be {limit} characters or less.")),
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
    fn blocks_over_configured_limit() {
        let mut config = FilterConfig::new();
        config.insert("limit".to_string(), serde_json::json!(5));
        let content = MessageContent::new("m1".into(), "c1".into()).with_text("abcdef");

        let result = MaxcharsFilter.check(&member(), &content, None, &config, None);
        assert!(!result.allowed);
    }

    #[test]
    fn allows_default_limit() {
        let content = MessageContent::new("m1".into(), "c1".into()).with_text("short message");
        let result = MaxcharsFilter.check(&member(), &content, None, &FilterConfig::new(), None);
        assert!(result.allowed);
    }
}
