//! The Filter Engine: an ordered pipeline of content predicates with
//! per-Space configuration and per-server persisted state.

mod bots;
mod files;
mod invites;
mod links;
mod massping;
mod maxchars;
mod slowmode;
mod swearing;
mod webhooks;

pub use bots::BotsFilter;
pub use files::FilesFilter;
pub use invites::InvitesFilter;
pub use links::LinksFilter;
pub use massping::MasspingFilter;
pub use maxchars::MaxcharsFilter;
pub use slowmode::SlowmodeFilter;
pub use swearing::SwearingFilter;
pub use webhooks::WebhooksFilter;

use crate::error::FilterError;
use crate::model::{Id, Member, MessageContent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValueType {
    String,
    Integer,
    Float,
    Boolean,
}

#[derive(Debug, Clone)]
pub struct ConfigSpec {
    pub display_name: String,
    pub description: String,
    pub value_type: ConfigValueType,
    pub default: serde_json::Value,
    /// Inclusive numeric bounds, for `Integer`/`Float` configs only.
    pub limits: Option<(f64, f64)>,
}

/// Per-(filter, space) configuration, keyed by config key.
pub type FilterConfig = HashMap<String, serde_json::Value>;

/// The verdict a filter returns for one message.
#[derive(Debug, Clone, Default)]
pub struct FilterResult {
    pub allowed: bool,
    /// Updated persisted state for this `(filter, server)` pair, if changed.
    pub data: Option<serde_json::Value>,
    pub message: Option<String>,
    pub should_log: bool,
    pub should_contribute: bool,
    /// When set on a block, the pipeline substitutes the content's Text
    /// blocks with this instead of rejecting outright.
    pub safe_content: Option<String>,
}

impl FilterResult {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            ..Default::default()
        }
    }

    pub fn block(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// A single content predicate. Filters are pure with respect to external
/// state except for the `data` they return in [`FilterResult`], which the
/// engine persists per `(filter_id, server_id)` on the filter's behalf.
pub trait Filter: Send + Sync + 'static {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    /// Declared config keys and their types/defaults/bounds.
    fn configs(&self) -> HashMap<&'static str, ConfigSpec> {
        HashMap::new()
    }

    fn check(
        &self,
        author: &Member,
        content: &MessageContent,
        webhook_id: Option<&Id>,
        config: &FilterConfig,
        data: Option<&serde_json::Value>,
    ) -> FilterResult;
}

/// Outcome of running the full pipeline against one message: either it's
/// allowed (with `content` possibly rewritten in place by a `safe_content`
/// substitution) or it's blocked with the first failing filter's detail.
pub struct PipelineOutcome {
    pub should_log: bool,
    pub should_contribute: bool,
}

pub struct FilterEngine {
    filters: HashMap<String, Arc<dyn Filter>>,
    /// `(filter_id, server_id) → persisted state`.
    state: RwLock<HashMap<(String, String), serde_json::Value>>,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self {
            filters: HashMap::new(),
            state: RwLock::new(HashMap::new()),
        }
    }

    /// An engine pre-loaded with every built-in filter, the way a fresh
    /// bridge core is expected to boot.
    pub fn with_builtins() -> Self {
        let mut engine = Self::new();
        engine.register(BotsFilter);
        engine.register(FilesFilter);
        engine.register(InvitesFilter);
        engine.register(LinksFilter);
        engine.register(MasspingFilter);
        engine.register(MaxcharsFilter::default());
        engine.register(SlowmodeFilter::default());
        engine.register(SwearingFilter);
        engine.register(WebhooksFilter);
        engine
    }

    pub fn register(&mut self, filter: impl Filter) {
        self.filters.insert(filter.id().to_string(), Arc::new(filter));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Filter>> {
        self.filters.get(id).cloned()
    }

    /// Runs every filter id in `filter_ids` in order against `content`,
    /// mutating `content` in place on a `safe_content` substitution and
    /// persisting any returned `data`. Returns `Ok(outcome)` if every
    /// filter allowed the message (after substitutions), or the blocking
    /// filter's id/message on the first outright block.
    pub async fn run(
        &self,
        filter_ids: &[String],
        server_id: &str,
        author: &Member,
        content: &mut MessageContent,
        webhook_id: Option<&Id>,
        configs: &HashMap<String, FilterConfig>,
    ) -> Result<PipelineOutcome, (String, String)> {
        let mut should_log = false;
        let mut should_contribute = false;

        for filter_id in filter_ids {
            let Some(filter) = self.get(filter_id) else {
                continue;
            };
            let empty_config = FilterConfig::new();
            let config = configs.get(filter_id).unwrap_or(&empty_config);
            let key = (filter_id.clone(), server_id.to_string());
            let existing_data = self.state.read().await.get(&key).cloned();

            let filter_clone = filter.clone();
            let author_clone = author.clone();
            let content_snapshot = content.clone();
            let config_clone = config.clone();
            let webhook_id_owned = webhook_id.cloned();

            // Filter checks are CPU-bound predicates; run them off the main
            // task so a pathological regex or dictionary scan can't stall
            // the event loop that's driving fan-out for other sends.
            let result = tokio::task::spawn_blocking(move || {
                filter_clone.check(
                    &author_clone,
                    &content_snapshot,
                    webhook_id_owned.as_ref(),
                    &config_clone,
                    existing_data.as_ref(),
                )
            })
            .await
            .map_err(|_| (filter_id.clone(), "filter task panicked".to_string()))?;

            if let Some(data) = result.data.clone() {
                self.state.write().await.insert(key, data);
            }

            should_log |= result.should_log;
            should_contribute |= result.should_contribute;

            if !result.allowed {
                match result.safe_content {
                    Some(safe_content) => {
                        content.replace_text_blocks(safe_content);
                    }
                    None => {
                        return Err((filter_id.clone(), result.message.unwrap_or_default()));
                    }
                }
            }
        }

        Ok(PipelineOutcome {
            should_log,
            should_contribute,
        })
    }

    pub fn validate_config(
        &self,
        filter_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), FilterError> {
        let filter = self.get(filter_id).ok_or_else(|| FilterError::NotFound(filter_id.to_string()))?;
        let spec = filter
            .configs()
            .get(key)
            .cloned()
            .ok_or_else(|| FilterError::InvalidConfig {
                filter: filter_id.to_string(),
                key: key.to_string(),
                reason: "unknown config key".to_string(),
            })?;

        if let (ConfigValueType::Integer | ConfigValueType::Float, Some((min, max))) =
            (spec.value_type, spec.limits)
            && let Some(number) = value.as_f64()
            && (number < min || number > max)
        {
            return Err(FilterError::InvalidConfig {
                filter: filter_id.to_string(),
                key: key.to_string(),
                reason: format!("{number} is outside bounds {min}..={max}"),
            });
        }
        Ok(())
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new()
    }
}
