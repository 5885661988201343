use super::{ConfigSpec, ConfigValueType, Filter, FilterConfig, FilterResult};
use crate::model::{Id, Member, MessageContent};
use std::collections::HashMap;

const DEFAULT_SLOWDOWN: i64 = 0;

/// Enforces a per-user cooldown between sends into a Space.
///
/// The state map is keyed by `author.id` on both read and write. An earlier
/// version of this filter (see the design ledger) wrote the cooldown under
/// the wrong key, which silently defeated the cooldown for every user whose
/// send path didn't happen to share that key; this version keys
/// consistently.
#[derive(Default)]
pub struct SlowmodeFilter;

impl Filter for SlowmodeFilter {
    fn id(&self) -> &'static str {
        "slowmode"
    }
    fn name(&self) -> &'static str {
        "Slowmode"
    }
    fn description(&self) -> &'static str {
        "Enforces slowmode in rooms."
    }

    fn configs(&self) -> HashMap<&'static str, ConfigSpec> {
        HashMap::from([(
            "slowdown",
            ConfigSpec {
                display_name: "Slowdown".to_string(),
                description: "Sets the slowmode duration.".to_string(),
                value_type: ConfigValueType::Integer,
                default: serde_json::json!(DEFAULT_SLOWDOWN),
                limits: None,
            },
        )])
    }

    fn check(
        &self,
        author: &Member,
        _content: &MessageContent,
        _webhook_id: Option<&Id>,
        config: &FilterConfig,
        data: Option<&serde_json::Value>,
    ) -> FilterResult {
        let slowdown = config
            .get("slowdown")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(DEFAULT_SLOWDOWN);
        let now = chrono::Utc::now().timestamp();
        let author_id = author.id().as_ref();

        let mut state = data
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();

        if let Some(next_allowed) = state.get(author_id).and_then(serde_json::Value::as_i64)
            && now < next_allowed
        {
            return FilterResult {
                allowed: false,
                data: Some(serde_json::Value::Object(state)),
                message: Some(format!(
                    "Slowmode is enabled. Try again in {} seconds.",
                    next_allowed - now
                )),
                should_log: true,
                ..Default::default()
            };
        }

        state.insert(author_id.to_string(), serde_json::json!(now + slowdown));
        FilterResult {
            allowed: true,
            data: Some(serde_json::Value::Object(state)),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Server, User};

    fn member(id: &str) -> Member {
        Member::new(
            User {
                id: id.into(),
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
    fn second_send_within_window_is_blocked() {
        let mut config = FilterConfig::new();
        config.insert("slowdown".to_string(), serde_json::json!(60));
        let content = MessageContent::new("m1".into(), "c1".into());

        let first = SlowmodeFilter.check(&member("u1"), &content, None, &config, None);
        assert!(first.allowed);

        let second = SlowmodeFilter.check(&member("u1"), &content, None, &config, first.data.as_ref());
        assert!(!second.allowed, "second send within the slowdown window must be blocked");
    }

    #[test]
    fn different_authors_have_independent_cooldowns() {
        let mut config = FilterConfig::new();
        config.insert("slowdown".to_string(), serde_json::json!(60));
        let content = MessageContent::new("m1".into(), "c1".into());

        let first = SlowmodeFilter.check(&member("u1"), &content, None, &config, None);
        let second = SlowmodeFilter.check(&member("u2"), &content, None, &config, first.data.as_ref());
        assert!(second.allowed, "a different author must not inherit u1's cooldown");
    }

    #[test]
    fn zero_slowdown_never_blocks() {
        let config = FilterConfig::new();
        let content = MessageContent::new("m1".into(), "c1".into());

        let first = SlowmodeFilter.check(&member("u1"), &content, None, &config, None);
        let second = SlowmodeFilter.check(&member("u1"), &content, None, &config, first.data.as_ref());
        assert!(second.allowed);
    }
}
