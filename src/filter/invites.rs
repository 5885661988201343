use super::{Filter, FilterConfig, FilterResult};
use crate::model::{Id, Member, MessageContent};

const KEYWORDS: &[&str] = &[
    "discord.gg/",
    "discord.com/invite/",
    "discordapp.com/invite/",
    "rvlt.gg",
    "fluxer.gg",
];

/// Blocks messages containing another platform's server-invite link. A plain
/// substring match, matching the source's observable behavior — it will
/// also fire on a bare mention of e.g. `rvlt.gg` with no real invite path
/// following it (see the design ledger for why this wasn't tightened).
pub struct InvitesFilter;

impl Filter for InvitesFilter {
    fn id(&self) -> &'static str {
        "invites"
    }
    fn name(&self) -> &'static str {
        "Invites Filter"
    }
    fn description(&self) -> &'static str {
        "A filter that blocks server invites."
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
        let hit = KEYWORDS.iter().any(|keyword| plaintext.contains(keyword));

        FilterResult {
            allowed: !hit,
            message: Some("Server invites are not allowed here.".to_string()),
            should_log: true,
            should_contribute: true,
            ..Default::default()
        }
    }
}
