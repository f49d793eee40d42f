//! Token budgeting for git diffs sent to language models
//!
//! Works out how many tokens of diff a model can take once the prompt, the
//! expected answer and a safety margin are reserved, then cuts the diff down
//! to that budget along file boundaries so no file section is left half
//! emitted.

mod budget;
mod estimator;
mod limits;
mod segment;
mod truncate;

pub use budget::{
    calculate_max_diff_tokens, Allocation, BudgetAllocator, Reservations, MIN_DIFF_TOKENS,
};
pub use estimator::{
    Estimator, ExactEstimator, HeuristicEstimator, TokenEstimator, TokenizerError,
    CHARS_PER_TOKEN,
};
pub use limits::{
    ModelLimitsTable, PromptSizeTable, DEFAULT_MODEL_LIMIT, DEFAULT_PROMPT_SIZE,
};
pub use segment::{split_file_segments, FileSegment, DIFF_MARKER};
pub use truncate::{
    TruncationNotices, TruncationRequest, TruncationResult, Truncator, FILES_NOTICE,
    GENERIC_NOTICE, LEADING_NOTICE, LIMIT_NOTICE,
};

#[cfg(test)]
mod tests;
