//! Context window and prompt overhead tables

use std::collections::{BTreeMap, HashMap};

/// Context window assumed for unknown providers or models. Small on purpose:
/// under-allocating is safer than a provider-side rejection.
pub const DEFAULT_MODEL_LIMIT: usize = 8000;

/// Prompt overhead assumed for unknown prompt styles.
pub const DEFAULT_PROMPT_SIZE: usize = 700;

const BUILTIN_LIMITS: &[(&str, &str, usize)] = &[
    ("openai", "gpt-4o-mini", 128_000),
    ("openai", "gpt-4o", 128_000),
    ("openai", "gpt-4-turbo", 128_000),
    ("openai", "gpt-4", 8_192),
    ("openai", "gpt-3.5-turbo", 16_385),
    ("groq", "qwen/qwen3-32b", 32_768),
    ("groq", "llama-3.1-70b-versatile", 131_072),
    ("groq", "llama-3.1-8b-instant", 131_072),
    ("groq", "mixtral-8x7b-32768", 32_768),
    ("groq", "gemma2-9b-it", 8_192),
    ("claude", "claude-sonnet-4-5", 200_000),
    ("claude", "claude-sonnet-4", 200_000),
    ("claude", "claude-opus-4", 200_000),
    ("claude", "claude-opus-4-1", 200_000),
    ("claude", "claude-3-5-sonnet-20241022", 200_000),
    ("claude", "claude-3-5-sonnet-20240620", 200_000),
    ("claude", "claude-3-opus-20240229", 200_000),
    ("claude", "claude-3-sonnet-20240229", 200_000),
    ("claude", "claude-3-haiku-20240307", 200_000),
];

const BUILTIN_PROMPT_SIZES: &[(&str, usize)] = &[
    ("commit_conventional", 700),
    ("commit_detailed", 850),
    ("commit_simple", 500),
];

/// Context window sizes keyed by provider, then model.
#[derive(Debug, Clone)]
pub struct ModelLimitsTable {
    limits: HashMap<String, HashMap<String, usize>>,
}

impl ModelLimitsTable {
    pub fn empty() -> Self {
        Self {
            limits: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for (provider, model, limit) in BUILTIN_LIMITS {
            table.insert(provider, model, *limit);
        }
        table
    }

    pub fn insert(&mut self, provider: &str, model: &str, limit: usize) {
        self.limits
            .entry(provider.to_string())
            .or_default()
            .insert(model.to_string(), limit);
    }

    /// Add or replace entries, e.g. from the `[limits]` config section.
    pub fn extend(&mut self, overrides: &HashMap<String, HashMap<String, usize>>) {
        for (provider, models) in overrides {
            for (model, limit) in models {
                self.insert(provider, model, *limit);
            }
        }
    }

    pub fn lookup(&self, provider: &str, model: &str) -> Option<usize> {
        self.limits.get(provider)?.get(model).copied()
    }

    /// Context window for `model` under `provider`, [`DEFAULT_MODEL_LIMIT`]
    /// when either is unknown.
    pub fn get_model_limit(&self, provider: &str, model: &str) -> usize {
        self.lookup(provider, model).unwrap_or_else(|| {
            tracing::debug!(provider, model, "unknown model, using default limit");
            DEFAULT_MODEL_LIMIT
        })
    }

    /// Entries sorted by provider then model, optionally for one provider.
    pub fn entries(&self, provider: Option<&str>) -> Vec<(String, String, usize)> {
        let sorted: BTreeMap<(&String, &String), usize> = self
            .limits
            .iter()
            .filter(|(name, _)| provider.map_or(true, |p| p == name.as_str()))
            .flat_map(|(name, models)| {
                models
                    .iter()
                    .map(move |(model, limit)| ((name, model), *limit))
            })
            .collect();

        sorted
            .into_iter()
            .map(|((provider, model), limit)| (provider.clone(), model.clone(), limit))
            .collect()
    }
}

impl Default for ModelLimitsTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Estimated fixed prompt overhead per prompt style.
#[derive(Debug, Clone)]
pub struct PromptSizeTable {
    sizes: HashMap<String, usize>,
}

impl PromptSizeTable {
    pub fn builtin() -> Self {
        Self {
            sizes: BUILTIN_PROMPT_SIZES
                .iter()
                .map(|(style, size)| (style.to_string(), *size))
                .collect(),
        }
    }

    pub fn insert(&mut self, style: &str, size: usize) {
        self.sizes.insert(style.to_string(), size);
    }

    pub fn extend(&mut self, overrides: &HashMap<String, usize>) {
        self.sizes
            .extend(overrides.iter().map(|(style, size)| (style.clone(), *size)));
    }

    /// Overhead for `style`, [`DEFAULT_PROMPT_SIZE`] when unknown.
    pub fn get(&self, style: &str) -> usize {
        self.sizes.get(style).copied().unwrap_or(DEFAULT_PROMPT_SIZE)
    }
}

impl Default for PromptSizeTable {
    fn default() -> Self {
        Self::builtin()
    }
}
