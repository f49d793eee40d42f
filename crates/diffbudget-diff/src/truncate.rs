//! Fitting a diff into a token budget

use crate::estimator::{TokenEstimator, CHARS_PER_TOKEN};
use crate::segment::{split_file_segments, FileSegment};
use diffbudget_core::config::TruncationConfig;

/// Appended when trailing file sections were dropped
pub const FILES_NOTICE: &str = "\n\n... (remaining files truncated - too large for context window)";

/// Appended when a diff without file sections was cut
pub const GENERIC_NOTICE: &str = "\n\n... (diff truncated - too large for context window)";

/// Prepended when the start of the diff was dropped to keep its end
pub const LEADING_NOTICE: &str = "... (earlier changes truncated - too large for context window)\n\n";

/// Suffix for plain [`Truncator::truncate_to_limit`] calls
pub const LIMIT_NOTICE: &str = "\n\n... (diff truncated for token limit)";

/// Exact cuts are re-measured; if the decoded text tokenizes longer than the
/// slice it came from, the cut is retried this many times.
const MAX_RECUT_ATTEMPTS: usize = 3;

/// Wording of the markers added to truncated output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationNotices {
    pub files: String,
    pub generic: String,
    pub leading: String,
}

impl Default for TruncationNotices {
    fn default() -> Self {
        Self {
            files: FILES_NOTICE.to_string(),
            generic: GENERIC_NOTICE.to_string(),
            leading: LEADING_NOTICE.to_string(),
        }
    }
}

impl TruncationNotices {
    pub fn from_config(config: &TruncationConfig) -> Self {
        let defaults = Self::default();
        Self {
            files: config.files_notice.clone().unwrap_or(defaults.files),
            generic: config.generic_notice.clone().unwrap_or(defaults.generic),
            leading: config.leading_notice.clone().unwrap_or(defaults.leading),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncationRequest<'a> {
    pub diff_text: &'a str,
    pub max_tokens: usize,
    /// Keep the beginning of the diff (true) or its end (false)
    pub preserve_start: bool,
}

impl<'a> TruncationRequest<'a> {
    pub fn new(diff_text: &'a str, max_tokens: usize) -> Self {
        Self {
            diff_text,
            max_tokens,
            preserve_start: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationResult {
    pub text: String,
    pub original_tokens: usize,
    /// Measured on `text` itself
    pub final_tokens: usize,
    /// Paths of file sections left out, in diff order
    pub dropped_files: Vec<String>,
}

impl TruncationResult {
    fn unchanged(text: &str, tokens: usize) -> Self {
        Self {
            text: text.to_string(),
            original_tokens: tokens,
            final_tokens: tokens,
            dropped_files: Vec::new(),
        }
    }

    pub fn was_truncated(&self) -> bool {
        self.final_tokens != self.original_tokens || !self.dropped_files.is_empty()
    }
}

/// Cuts text down to a token budget with a shared estimator.
pub struct Truncator<'e> {
    estimator: &'e dyn TokenEstimator,
    notices: TruncationNotices,
}

impl<'e> Truncator<'e> {
    pub fn new(estimator: &'e dyn TokenEstimator) -> Self {
        Self::with_notices(estimator, TruncationNotices::default())
    }

    pub fn with_notices(estimator: &'e dyn TokenEstimator, notices: TruncationNotices) -> Self {
        Self { estimator, notices }
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.estimator.count_tokens(text)
    }

    pub fn apply(&self, request: &TruncationRequest<'_>) -> TruncationResult {
        self.truncate_intelligently(request.diff_text, request.max_tokens, request.preserve_start)
    }

    /// Fit `diff_text` into `max_tokens`, dropping whole file sections.
    ///
    /// With `preserve_start` the leading sections are kept and later ones
    /// dropped; otherwise the trailing ones are kept. A diff with fewer than
    /// two file sections is cut as plain text instead.
    pub fn truncate_intelligently(
        &self,
        diff_text: &str,
        max_tokens: usize,
        preserve_start: bool,
    ) -> TruncationResult {
        let original_tokens = self.count_tokens(diff_text);
        if original_tokens <= max_tokens {
            return TruncationResult::unchanged(diff_text, original_tokens);
        }

        let segments = split_file_segments(diff_text);
        let file_sections = segments.iter().filter(|s| s.is_file_section()).count();
        if file_sections < 2 {
            tracing::debug!(file_sections, "no per-file structure, cutting as plain text");
            return if preserve_start {
                self.truncate_to_limit(diff_text, max_tokens, &self.notices.generic)
            } else {
                self.truncate_tail_to_limit(diff_text, max_tokens, &self.notices.leading)
            };
        }

        let result = if preserve_start {
            self.keep_leading_segments(&segments, original_tokens, max_tokens)
        } else {
            self.keep_trailing_segments(&segments, original_tokens, max_tokens)
        };

        tracing::debug!(
            original_tokens,
            final_tokens = result.final_tokens,
            dropped = result.dropped_files.len(),
            "truncated diff at file boundaries"
        );
        result
    }

    fn keep_leading_segments(
        &self,
        segments: &[FileSegment<'_>],
        original_tokens: usize,
        max_tokens: usize,
    ) -> TruncationResult {
        let notice = &self.notices.files;
        let notice_tokens = self.count_tokens(notice);

        let leading_first = segments.iter().map(|s| s.as_str());
        let mut kept = self
            .fitting_prefix_len(leading_first, notice_tokens, max_tokens)
            .min(segments.len() - 1);

        loop {
            let mut text: String = segments[..kept].iter().map(|s| s.as_str()).collect();
            text.push_str(notice);

            let final_tokens = self.count_tokens(&text);
            if final_tokens <= max_tokens || kept == 0 {
                return self.finish(text, original_tokens, final_tokens, &segments[kept..]);
            }
            tracing::debug!(kept, final_tokens, max_tokens, "assembled diff over budget");
            kept -= 1;
        }
    }

    fn keep_trailing_segments(
        &self,
        segments: &[FileSegment<'_>],
        original_tokens: usize,
        max_tokens: usize,
    ) -> TruncationResult {
        let notice = &self.notices.leading;
        let notice_tokens = self.count_tokens(notice);

        let trailing_first = segments.iter().rev().map(|s| s.as_str());
        let mut kept = self
            .fitting_prefix_len(trailing_first, notice_tokens, max_tokens)
            .min(segments.len() - 1);

        loop {
            let first_kept = segments.len() - kept;
            let mut text = notice.clone();
            text.extend(segments[first_kept..].iter().map(|s| s.as_str()));

            let final_tokens = self.count_tokens(&text);
            if final_tokens <= max_tokens || kept == 0 {
                return self.finish(text, original_tokens, final_tokens, &segments[..first_kept]);
            }
            tracing::debug!(kept, final_tokens, max_tokens, "assembled diff over budget");
            kept -= 1;
        }
    }

    /// Number of segments, in iteration order, whose running total plus the
    /// notice stays within `max_tokens`.
    ///
    /// Per-segment counts need not add up to the count of the joined text, so
    /// callers re-measure what they assemble and drop more segments while it
    /// is still over budget. The whole diff is already known to be over
    /// budget, so at least one segment is always dropped.
    fn fitting_prefix_len<'s>(
        &self,
        segments: impl Iterator<Item = &'s str>,
        notice_tokens: usize,
        max_tokens: usize,
    ) -> usize {
        let mut running = 0usize;
        let mut kept = 0usize;
        for segment in segments {
            let segment_tokens = self.count_tokens(segment);
            if running + segment_tokens + notice_tokens > max_tokens {
                break;
            }
            running += segment_tokens;
            kept += 1;
        }
        kept
    }

    fn finish(
        &self,
        text: String,
        original_tokens: usize,
        final_tokens: usize,
        dropped: &[FileSegment<'_>],
    ) -> TruncationResult {
        TruncationResult {
            text,
            original_tokens,
            final_tokens,
            dropped_files: dropped
                .iter()
                .filter_map(|s| s.path())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Keep the start of `text` and append `suffix` so the whole fits
    /// `max_tokens`.
    ///
    /// The bound is exact with a tokenizer that can cut on token boundaries.
    /// Otherwise the cut is placed with the text's own characters-per-token
    /// ratio and may overshoot slightly.
    pub fn truncate_to_limit(
        &self,
        text: &str,
        max_tokens: usize,
        suffix: &str,
    ) -> TruncationResult {
        self.cut_plain_text(text, max_tokens, suffix, Keep::Start)
    }

    /// Keep the end of `text`, prefixed with `prefix`.
    pub fn truncate_tail_to_limit(
        &self,
        text: &str,
        max_tokens: usize,
        prefix: &str,
    ) -> TruncationResult {
        self.cut_plain_text(text, max_tokens, prefix, Keep::End)
    }

    fn cut_plain_text(
        &self,
        text: &str,
        max_tokens: usize,
        notice: &str,
        keep: Keep,
    ) -> TruncationResult {
        let original_tokens = self.count_tokens(text);
        if original_tokens <= max_tokens {
            return TruncationResult::unchanged(text, original_tokens);
        }

        let notice_tokens = self.count_tokens(notice);
        let mut available = max_tokens.saturating_sub(notice_tokens);

        for _ in 0..MAX_RECUT_ATTEMPTS {
            let exact = match keep {
                Keep::Start => self.estimator.take_leading(text, available),
                Keep::End => self.estimator.take_trailing(text, available),
            };
            let Some(kept) = exact else {
                break;
            };

            let result = keep.join(&kept, notice);
            let final_tokens = self.count_tokens(&result);
            if final_tokens <= max_tokens || available == 0 {
                return TruncationResult {
                    text: result,
                    original_tokens,
                    final_tokens,
                    dropped_files: Vec::new(),
                };
            }
            available = available.saturating_sub(final_tokens - max_tokens);
        }

        let chars = text.chars().count();
        let chars_per_token = if original_tokens > 0 {
            chars as f64 / original_tokens as f64
        } else {
            CHARS_PER_TOKEN as f64
        };
        let max_chars = ((available as f64) * chars_per_token) as usize;

        let kept = match keep {
            Keep::Start => leading_chars(text, max_chars),
            Keep::End => trailing_chars(text, chars, max_chars),
        };
        let result = keep.join(kept, notice);
        let final_tokens = self.count_tokens(&result);

        TruncationResult {
            text: result,
            original_tokens,
            final_tokens,
            dropped_files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Keep {
    Start,
    End,
}

impl Keep {
    fn join(self, kept: &str, notice: &str) -> String {
        match self {
            Keep::Start => format!("{kept}{notice}"),
            Keep::End => format!("{notice}{kept}"),
        }
    }
}

fn leading_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn trailing_chars(text: &str, total_chars: usize, max_chars: usize) -> &str {
    if max_chars >= total_chars {
        return text;
    }
    match text.char_indices().nth(total_chars - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}
