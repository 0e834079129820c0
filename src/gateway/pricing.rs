//! Model pricing registry for vision-capable chat models.
//!
//! Costs are in nanodollars (1e-9 USD) per token. Image inputs are billed as
//! prompt tokens by the provider, so the same rates apply.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Pricing information for a model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    /// Cost per input token in nanodollars.
    pub input_nanos_per_token: i64,
    /// Cost per output token in nanodollars.
    pub output_nanos_per_token: i64,
}

impl ModelPricing {
    const fn new(input: i64, output: i64) -> Self {
        Self {
            input_nanos_per_token: input,
            output_nanos_per_token: output,
        }
    }

    /// Calculate cost for a request.
    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> i64 {
        (input_tokens as i64) * self.input_nanos_per_token
            + (output_tokens as i64) * self.output_nanos_per_token
    }
}

// =============================================================================
// PRICING DATA
// =============================================================================

// OpenRouter pricing (verify periodically against OpenRouter model pages)
// GPT-4o-mini: $0.15/1M input, $0.60/1M output
// GPT-4o: $2.50/1M input, $10.00/1M output
// Claude 3.5 Sonnet: $3.00/1M input, $15.00/1M output
// Gemini 1.5 Flash: $0.075/1M input, $0.30/1M output

const GPT_4O_MINI: ModelPricing = ModelPricing::new(150, 600);
const GPT_4O: ModelPricing = ModelPricing::new(2_500, 10_000);
const CLAUDE_35_SONNET: ModelPricing = ModelPricing::new(3_000, 15_000);
const GEMINI_15_FLASH: ModelPricing = ModelPricing::new(75, 300);

/// Fallback for unknown models: a mid-range vision model.
const DEFAULT_PRICING: ModelPricing = ModelPricing::new(1_000, 5_000);

static PRICING_MAP: OnceLock<HashMap<&'static str, ModelPricing>> = OnceLock::new();

fn init_pricing() -> HashMap<&'static str, ModelPricing> {
    let mut map = HashMap::new();
    map.insert("openai/gpt-4o-mini", GPT_4O_MINI);
    map.insert("openai/gpt-4o-mini-2024-07-18", GPT_4O_MINI);
    map.insert("openai/gpt-4o", GPT_4O);
    map.insert("anthropic/claude-3.5-sonnet", CLAUDE_35_SONNET);
    map.insert("anthropic/claude-3-5-sonnet", CLAUDE_35_SONNET);
    map.insert("google/gemini-flash-1.5", GEMINI_15_FLASH);
    map
}

/// Get pricing for a model.
pub fn get_pricing(model_id: &str) -> Option<ModelPricing> {
    let map = PRICING_MAP.get_or_init(init_pricing);
    map.get(model_id).copied()
}

/// Calculate chat cost.
pub fn chat_cost(model: &str, input_tokens: u32, output_tokens: u32) -> i64 {
    get_pricing(model)
        .unwrap_or(DEFAULT_PRICING)
        .calculate_cost(input_tokens, output_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_cost() {
        // 1K input + 1K output for GPT-4o-mini
        // Input: 1000 * 150 = 150,000 nanos
        // Output: 1000 * 600 = 600,000 nanos
        let cost = chat_cost("openai/gpt-4o-mini", 1_000, 1_000);
        assert_eq!(cost, 750_000);
    }

    #[test]
    fn unknown_model_uses_default() {
        assert_eq!(chat_cost("someone/unknown", 1, 1), 6_000);
    }
}
