//! Token usage and cost accounting

use crate::llm::Usage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-token prices in USD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_token: f64,
    pub output_per_token: f64,
    /// Cache writes cost this multiple of the input price
    #[serde(default = "default_cache_write_multiplier")]
    pub cache_write_multiplier: f64,
    /// Cache reads cost this multiple of the input price
    #[serde(default = "default_cache_read_multiplier")]
    pub cache_read_multiplier: f64,
}

fn default_cache_write_multiplier() -> f64 {
    1.25
}

fn default_cache_read_multiplier() -> f64 {
    0.1
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            input_per_token: 5.0 / 1_000_000.0,
            output_per_token: 25.0 / 1_000_000.0,
            cache_write_multiplier: default_cache_write_multiplier(),
            cache_read_multiplier: default_cache_read_multiplier(),
        }
    }
}

impl Pricing {
    /// Cost of a single response
    pub fn cost_of(&self, usage: &Usage) -> f64 {
        usage.input_tokens as f64 * self.input_per_token
            + usage.output_tokens as f64 * self.output_per_token
            + usage.cache_creation_input_tokens as f64
                * self.input_per_token
                * self.cache_write_multiplier
            + usage.cache_read_input_tokens as f64
                * self.input_per_token
                * self.cache_read_multiplier
    }
}

/// Accumulates usage across every model call of a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageTracker {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub api_calls: usize,
    pub api_seconds: f64,
    pub wall_seconds: f64,
    pub iterations: usize,
    pub pricing: Pricing,
}

impl UsageTracker {
    pub fn new(pricing: Pricing) -> Self {
        Self {
            pricing,
            ..Default::default()
        }
    }

    /// Add one response's usage, returning its cost
    pub fn record(&mut self, usage: &Usage, api_time: Duration) -> f64 {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.cache_creation_input_tokens += usage.cache_creation_input_tokens;
        self.cache_read_input_tokens += usage.cache_read_input_tokens;
        self.api_calls += 1;
        self.api_seconds += api_time.as_secs_f64();
        self.iterations += 1;
        self.pricing.cost_of(usage)
    }

    /// Estimated total cost in USD
    pub fn cost(&self) -> f64 {
        self.pricing.cost_of(&Usage {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            cache_creation_input_tokens: self.cache_creation_input_tokens,
            cache_read_input_tokens: self.cache_read_input_tokens,
        })
    }

    /// Input tokens including cache writes and reads
    pub fn total_input_tokens(&self) -> u64 {
        self.input_tokens + self.cache_creation_input_tokens + self.cache_read_input_tokens
    }

    pub fn finish(&mut self, wall_time: Duration) {
        self.wall_seconds = wall_time.as_secs_f64();
    }

    /// One-line summary for the current iteration
    pub fn step_summary(
        &self,
        iteration: usize,
        max_iterations: usize,
        step_cost: f64,
        api_time: Duration,
    ) -> String {
        format!(
            "[step {}/{}] step=${:.4} cumulative=${:.4} api={:.1}s cumulative_api={:.1}s",
            iteration,
            max_iterations,
            step_cost,
            self.cost(),
            api_time.as_secs_f64(),
            self.api_seconds
        )
    }

    /// Multi-line report for the end of a run
    pub fn summary(&self) -> String {
        [
            "=== Usage Summary ===".to_string(),
            format!("Iterations:    {}", self.iterations),
            format!("API calls:     {}", self.api_calls),
            format!(
                "Input tokens:  {} (uncached={} cache_write={} cache_read={})",
                group_thousands(self.total_input_tokens()),
                group_thousands(self.input_tokens),
                group_thousands(self.cache_creation_input_tokens),
                group_thousands(self.cache_read_input_tokens)
            ),
            format!("Output tokens: {}", group_thousands(self.output_tokens)),
            format!("API time:      {:.1}s", self.api_seconds),
            format!("Wall time:     {:.1}s", self.wall_seconds),
            format!("Est. cost:     ${:.4}", self.cost()),
        ]
        .join("\n")
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
