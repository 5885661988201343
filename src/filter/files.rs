use super::{Filter, FilterConfig, FilterResult};
use crate::model::{Id, Member, MessageContent};

/// Blocks any message carrying one or more attachments.
pub struct FilesFilter;

impl Filter for FilesFilter {
    fn id(&self) -> &'static str {
        "files"
    }
    fn name(&self) -> &'static str {
        "Files Filter"
    }
    fn description(&self) -> &'static str {
        "A filter that blocks files from being bridged."
    }

    fn check(
        &self,
        _author: &Member,
        content: &MessageContent,
        _webhook_id: Option<&Id>,
        _config: &FilterConfig,
        _data: Option<&serde_json::Value>,
    ) -> FilterResult {
        if content.files.is_empty() {
            FilterResult::allow()
        } else {
            FilterResult::block("Attachments are not allowed here.")
        }
    }
}
