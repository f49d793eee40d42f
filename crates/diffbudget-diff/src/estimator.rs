//! Token counting strategies

use thiserror::Error;
use tiktoken_rs::CoreBPE;

/// Characters per token assumed when no exact tokenizer is available.
/// Code and diffs tokenize densely, so this over-counts rather than under-counts.
pub const CHARS_PER_TOKEN: usize = 3;

/// UTF-8 sequences are at most four bytes, so a cut never needs to move
/// further than this to land on a character boundary.
const MAX_BOUNDARY_BACKOFF: usize = 4;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("tokenizer unavailable: {0}")]
    Unavailable(String),
}

/// Counts tokens in text.
///
/// Implementations never fail: a strategy that cannot count exactly must
/// still return a deterministic estimate.
pub trait TokenEstimator: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;

    /// Leading part of `text` made of at most `max_tokens` tokens, cut on
    /// token boundaries. `None` when the strategy has no notion of token
    /// boundaries and the caller has to approximate.
    fn take_leading(&self, _text: &str, _max_tokens: usize) -> Option<String> {
        None
    }

    /// Trailing counterpart of [`TokenEstimator::take_leading`].
    fn take_trailing(&self, _text: &str, _max_tokens: usize) -> Option<String> {
        None
    }

    /// Short name of the strategy, for diagnostics.
    fn name(&self) -> &'static str;
}

/// `chars / 3` estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count() / CHARS_PER_TOKEN
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// Exact counts with the `cl100k_base` encoding (GPT-4, GPT-3.5 and a
/// close approximation for Claude).
pub struct ExactEstimator {
    bpe: CoreBPE,
}

impl ExactEstimator {
    pub fn cl100k() -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| TokenizerError::Unavailable(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl std::fmt::Debug for ExactEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactEstimator")
            .field("encoding", &"cl100k_base")
            .finish()
    }
}

impl TokenEstimator for ExactEstimator {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn take_leading(&self, text: &str, max_tokens: usize) -> Option<String> {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return Some(text.to_string());
        }

        // A cut inside a multi-byte character does not decode; back off.
        let mut end = max_tokens;
        for _ in 0..=MAX_BOUNDARY_BACKOFF {
            if let Ok(decoded) = self.bpe.decode(tokens[..end].to_vec()) {
                return Some(decoded);
            }
            if end == 0 {
                break;
            }
            end -= 1;
        }

        tracing::debug!(max_tokens, "no decodable token prefix");
        None
    }

    fn take_trailing(&self, text: &str, max_tokens: usize) -> Option<String> {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return Some(text.to_string());
        }

        let mut start = tokens.len() - max_tokens;
        for _ in 0..=MAX_BOUNDARY_BACKOFF {
            if let Ok(decoded) = self.bpe.decode(tokens[start..].to_vec()) {
                return Some(decoded);
            }
            if start == tokens.len() {
                break;
            }
            start += 1;
        }

        tracing::debug!(max_tokens, "no decodable token suffix");
        None
    }

    fn name(&self) -> &'static str {
        "cl100k_base"
    }
}

/// The estimator a caller builds once and shares by reference.
#[derive(Debug)]
pub enum Estimator {
    Exact(ExactEstimator),
    Heuristic(HeuristicEstimator),
}

impl Estimator {
    /// Use the exact tokenizer when it can be loaded, the heuristic otherwise.
    ///
    /// Loading is attempted once here; a failure is not retried later.
    pub fn detect() -> Self {
        match ExactEstimator::cl100k() {
            Ok(exact) => Estimator::Exact(exact),
            Err(e) => {
                tracing::warn!("{}; estimating 1 token per {} chars", e, CHARS_PER_TOKEN);
                Estimator::Heuristic(HeuristicEstimator)
            }
        }
    }

    pub fn heuristic() -> Self {
        Estimator::Heuristic(HeuristicEstimator)
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Estimator::Exact(_))
    }

    fn inner(&self) -> &dyn TokenEstimator {
        match self {
            Estimator::Exact(exact) => exact as &dyn TokenEstimator,
            Estimator::Heuristic(heuristic) => heuristic as &dyn TokenEstimator,
        }
    }
}

impl TokenEstimator for Estimator {
    fn count_tokens(&self, text: &str) -> usize {
        self.inner().count_tokens(text)
    }

    fn take_leading(&self, text: &str, max_tokens: usize) -> Option<String> {
        self.inner().take_leading(text, max_tokens)
    }

    fn take_trailing(&self, text: &str, max_tokens: usize) -> Option<String> {
        self.inner().take_trailing(text, max_tokens)
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}
