//! Diff token budget for a model's context window

use crate::limits::{ModelLimitsTable, PromptSizeTable};
use diffbudget_core::config::{Config, DEFAULT_FILES_LIST_RESERVE, DEFAULT_SAFETY_MARGIN};

/// Smallest budget ever handed out, however large the reservations are.
pub const MIN_DIFF_TOKENS: usize = 1000;

/// Tokens set aside for everything that is not diff content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservations {
    /// Room for the model's response
    pub output_reserve: usize,
    /// Room for the list of changed files
    pub files_list_reserve: usize,
    pub safety_margin: usize,
}

impl Reservations {
    /// Reserve `output_reserve` for the answer and defaults for the rest.
    pub fn new(output_reserve: usize) -> Self {
        Self {
            output_reserve,
            files_list_reserve: DEFAULT_FILES_LIST_RESERVE,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }

    pub fn total(&self) -> usize {
        self.output_reserve
            .saturating_add(self.files_list_reserve)
            .saturating_add(self.safety_margin)
    }
}

/// `model_limit - prompt_tokens - reservations`, never below
/// [`MIN_DIFF_TOKENS`].
pub fn calculate_max_diff_tokens(
    model_limit: usize,
    prompt_tokens: usize,
    reservations: &Reservations,
) -> usize {
    let remaining = model_limit as i128 - prompt_tokens as i128 - reservations.total() as i128;
    if remaining < MIN_DIFF_TOKENS as i128 {
        MIN_DIFF_TOKENS
    } else {
        usize::try_from(remaining).unwrap_or(usize::MAX)
    }
}

/// Breakdown of one budget computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub provider: String,
    pub model: String,
    pub prompt_style: String,
    pub model_limit: usize,
    pub prompt_tokens: usize,
    pub reservations: Reservations,
    pub max_diff_tokens: usize,
}

impl Allocation {
    /// True when the floor raised the budget above what the window leaves.
    pub fn is_floored(&self) -> bool {
        self.model_limit
            .saturating_sub(self.prompt_tokens)
            .saturating_sub(self.reservations.total())
            < self.max_diff_tokens
    }
}

/// Budget calculator bound to one provider.
#[derive(Debug, Clone)]
pub struct BudgetAllocator {
    provider: String,
    limits: ModelLimitsTable,
    prompt_sizes: PromptSizeTable,
}

impl BudgetAllocator {
    /// Allocator over the built-in tables
    pub fn new(provider: impl Into<String>) -> Self {
        Self::with_tables(
            provider,
            ModelLimitsTable::builtin(),
            PromptSizeTable::builtin(),
        )
    }

    pub fn with_tables(
        provider: impl Into<String>,
        limits: ModelLimitsTable,
        prompt_sizes: PromptSizeTable,
    ) -> Self {
        Self {
            provider: provider.into(),
            limits,
            prompt_sizes,
        }
    }

    /// Built-in tables extended with the `[limits]` and `[prompt_sizes]`
    /// sections of `config`.
    pub fn from_config(provider: impl Into<String>, config: &Config) -> Self {
        let mut limits = ModelLimitsTable::builtin();
        limits.extend(&config.limits);
        let mut prompt_sizes = PromptSizeTable::builtin();
        prompt_sizes.extend(&config.prompt_sizes);
        Self::with_tables(provider, limits, prompt_sizes)
    }

    pub fn limits(&self) -> &ModelLimitsTable {
        &self.limits
    }

    pub fn get_model_limit(&self, model: &str) -> usize {
        self.limits.get_model_limit(&self.provider, model)
    }

    pub fn prompt_size(&self, prompt_style: &str) -> usize {
        self.prompt_sizes.get(prompt_style)
    }

    pub fn calculate_max_diff_tokens(
        &self,
        model: &str,
        prompt_style: &str,
        reservations: &Reservations,
    ) -> usize {
        self.allocate(model, prompt_style, reservations)
            .max_diff_tokens
    }

    pub fn allocate(
        &self,
        model: &str,
        prompt_style: &str,
        reservations: &Reservations,
    ) -> Allocation {
        let model_limit = self.get_model_limit(model);
        let prompt_tokens = self.prompt_size(prompt_style);
        let max_diff_tokens = calculate_max_diff_tokens(model_limit, prompt_tokens, reservations);

        tracing::debug!(
            provider = %self.provider,
            model,
            model_limit,
            prompt_tokens,
            reserved = reservations.total(),
            max_diff_tokens,
            "allocated diff budget"
        );

        Allocation {
            provider: self.provider.clone(),
            model: model.to_string(),
            prompt_style: prompt_style.to_string(),
            model_limit,
            prompt_tokens,
            reservations: *reservations,
            max_diff_tokens,
        }
    }
}
