use super::{Filter, FilterConfig, FilterResult};
use crate::model::{Id, Member, MessageContent};

/// Blocks messages whose author is a bot account.
pub struct BotsFilter;

impl Filter for BotsFilter {
    fn id(&self) -> &'static str {
        "bots"
    }
    fn name(&self) -> &'static str {
        "Bots Filter"
    }
    fn description(&self) -> &'static str {
        "A filter that blocks bot messages (excluding system messages)."
    }

    fn check(
        &self,
        author: &Member,
        _content: &MessageContent,
        _webhook_id: Option<&Id>,
        _config: &FilterConfig,
        _data: Option<&serde_json::Value>,
    ) -> FilterResult {
        if author.bot() {
            FilterResult::block("Bots may not talk in this Room.")
        } else {
            FilterResult::allow()
        }
    }
}
