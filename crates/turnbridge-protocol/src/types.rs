use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::{f64_field, u64_field, value_field};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SendOptions {
    /// Bypass the outbound queue and deliver mid-turn.
    pub steer: bool,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Token counts from an item's usage sub-object, accepting the
    /// historical field spellings engines have shipped. Returns `None`
    /// when no usage object is present or every count is zero.
    pub fn from_item_value(item: &Value) -> Option<Self> {
        let usage = value_field(item, &["usage", "tokenUsage", "token_usage"])?;
        Self::from_usage_value(usage)
    }

    /// Token counts read directly off a usage object.
    pub fn from_usage_value(usage: &Value) -> Option<Self> {
        let input_tokens = u64_field(
            usage,
            &["inputTokens", "input_tokens", "promptTokens", "prompt_tokens"],
        )
        .unwrap_or(0);
        let cached_input_tokens = u64_field(
            usage,
            &[
                "cachedInputTokens",
                "cached_input_tokens",
                "cacheReadInputTokens",
                "cache_read_input_tokens",
            ],
        )
        .unwrap_or(0);
        let output_tokens = u64_field(
            usage,
            &[
                "outputTokens",
                "output_tokens",
                "completionTokens",
                "completion_tokens",
            ],
        )
        .unwrap_or(0);
        let reasoning_output_tokens = u64_field(
            usage,
            &["reasoningOutputTokens", "reasoning_output_tokens"],
        )
        .unwrap_or(0);
        let total_tokens = u64_field(usage, &["totalTokens", "total_tokens"])
            .unwrap_or(input_tokens + output_tokens);

        let usage = Self {
            input_tokens,
            cached_input_tokens,
            output_tokens,
            reasoning_output_tokens,
            total_tokens,
        };
        if usage.has_positive_count() {
            Some(usage)
        } else {
            None
        }
    }

    pub fn has_positive_count(&self) -> bool {
        self.input_tokens > 0
            || self.cached_input_tokens > 0
            || self.output_tokens > 0
            || self.reasoning_output_tokens > 0
            || self.total_tokens > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitWindow {
    pub used_percent: f64,
    pub window_minutes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub primary: Option<RateLimitWindow>,
    pub secondary: Option<RateLimitWindow>,
}

impl RateLimitSnapshot {
    pub fn from_params(params: &Value) -> Option<Self> {
        let limits = value_field(params, &["rateLimits", "rate_limits"]).unwrap_or(params);
        let primary = rate_limit_window(limits, &["primary", "primaryWindow", "primary_window"]);
        let secondary =
            rate_limit_window(limits, &["secondary", "secondaryWindow", "secondary_window"]);
        if primary.is_none() && secondary.is_none() {
            return None;
        }
        Some(Self { primary, secondary })
    }
}

fn rate_limit_window(limits: &Value, keys: &[&str]) -> Option<RateLimitWindow> {
    let window = value_field(limits, keys)?;
    let used_percent = f64_field(window, &["usedPercent", "used_percent"])?;
    let window_minutes = u64_field(window, &["windowMinutes", "window_minutes"]);
    Some(RateLimitWindow {
        used_percent,
        window_minutes,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn token_usage_reads_camel_case_usage_object() {
        let item = json!({
            "usage": {
                "inputTokens": 120,
                "cachedInputTokens": 40,
                "outputTokens": 9,
                "totalTokens": 129
            }
        });
        let usage = TokenUsage::from_item_value(&item).expect("usage");
        assert_eq!(usage.input_tokens, 120);
        assert_eq!(usage.cached_input_tokens, 40);
        assert_eq!(usage.output_tokens, 9);
        assert_eq!(usage.total_tokens, 129);
    }

    #[test]
    fn token_usage_reads_snake_case_and_prompt_spellings() {
        let item = json!({
            "token_usage": {
                "prompt_tokens": 5,
                "completion_tokens": 7
            }
        });
        let usage = TokenUsage::from_item_value(&item).expect("usage");
        assert_eq!(usage.input_tokens, 5);
        assert_eq!(usage.output_tokens, 7);
        assert_eq!(usage.total_tokens, 12);
    }

    #[test]
    fn token_usage_with_all_zero_counts_is_none() {
        let item = json!({ "usage": { "inputTokens": 0, "outputTokens": 0 } });
        assert_eq!(TokenUsage::from_item_value(&item), None);
        assert_eq!(TokenUsage::from_item_value(&json!({})), None);
    }

    #[test]
    fn rate_limit_snapshot_reads_nested_windows() {
        let params = json!({
            "rateLimits": {
                "primary": { "usedPercent": 42.5, "windowMinutes": 300 },
                "secondary_window": { "used_percent": 10.0 }
            }
        });
        let snapshot = RateLimitSnapshot::from_params(&params).expect("snapshot");
        let primary = snapshot.primary.expect("primary window");
        assert!((primary.used_percent - 42.5).abs() < f64::EPSILON);
        assert_eq!(primary.window_minutes, Some(300));
        assert!(snapshot.secondary.is_some());
    }
}
