use super::{Filter, FilterConfig, FilterResult};
use crate::model::{Id, Member, MessageContent};

/// A small built-in profanity dictionary, checked case-insensitively on
/// whole words so it doesn't fire on substrings of unrelated words.
const DICTIONARY: &[&str] = &[
    "fuck", "shit", "bitch", "asshole", "bastard", "cunt", "dick", "piss",
];

/// Blocks messages containing profanity from the built-in dictionary.
pub struct SwearingFilter;

impl SwearingFilter {
    fn contains_profanity(text: &str) -> bool {
        let lower = text.to_lowercase();
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| DICTIONARY.contains(&word))
    }
}

impl Filter for SwearingFilter {
    fn id(&self) -> &'static str {
        "swearing"
    }
    fn name(&self) -> &'static str {
        "Swearing Filter"
    }
    fn description(&self) -> &'static str {
        "Keep your chat family-friendly!"
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
            allowed: !Self::contains_profanity(&plaintext),
            message: Some("No swearing allowed!".to_string()),
            should_log: true,
            ..Default::default()
        }
    }
}
