use super::*;

/// One token per character, cut exactly on characters.
struct CharCounter;

impl TokenEstimator for CharCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count()
    }

    fn take_leading(&self, text: &str, max_tokens: usize) -> Option<String> {
        Some(text.chars().take(max_tokens).collect())
    }

    fn take_trailing(&self, text: &str, max_tokens: usize) -> Option<String> {
        let skip = text.chars().count().saturating_sub(max_tokens);
        Some(text.chars().skip(skip).collect())
    }

    fn name(&self) -> &'static str {
        "chars"
    }
}

/// Charges extra for every file header after the first, so a whole diff
/// costs more than its sections counted one by one.
struct HeaderPenaltyCounter;

impl TokenEstimator for HeaderPenaltyCounter {
    fn count_tokens(&self, text: &str) -> usize {
        let headers = split_file_segments(text)
            .iter()
            .filter(|s| s.is_file_section())
            .count();
        text.chars().count() + 100 * headers.saturating_sub(1)
    }

    fn name(&self) -> &'static str {
        "penalty"
    }
}

const SHORT_NOTICE: &str = "\n\n[files truncated]\n";

/// A file section exactly `size` characters long
fn file_section(path: &str, size: usize) -> String {
    let header = format!("diff --git a/{path} b/{path}\n");
    let fill = size - header.len() - 1;
    format!("{}{}\n", header, "x".repeat(fill))
}

fn short_notices() -> TruncationNotices {
    TruncationNotices {
        files: SHORT_NOTICE.to_string(),
        ..TruncationNotices::default()
    }
}

fn sample_diff() -> String {
    [
        file_section("one.rs", 2000),
        file_section("two.rs", 3000),
        file_section("three.rs", 4000),
    ]
    .concat()
}

#[test]
fn test_under_budget_is_unchanged() {
    let estimator = Estimator::heuristic();
    let truncator = Truncator::new(&estimator);
    let diff = sample_diff();
    let tokens = estimator.count_tokens(&diff);

    for max_tokens in [tokens, tokens + 1, usize::MAX] {
        let result = truncator.truncate_intelligently(&diff, max_tokens, true);
        assert_eq!(result.text, diff);
        assert_eq!(result.original_tokens, tokens);
        assert_eq!(result.final_tokens, tokens);
        assert!(!result.was_truncated());
    }
}

#[test]
fn test_keeps_whole_leading_files() {
    assert_eq!(SHORT_NOTICE.chars().count(), 20);

    let truncator = Truncator::with_notices(&CharCounter, short_notices());
    let diff = sample_diff();

    let result = truncator.truncate_intelligently(&diff, 5500, true);

    let expected = format!(
        "{}{}{}",
        file_section("one.rs", 2000),
        file_section("two.rs", 3000),
        SHORT_NOTICE
    );
    assert_eq!(result.text, expected);
    assert_eq!(result.original_tokens, 9000);
    assert_eq!(result.final_tokens, 5020);
    assert!(result.final_tokens <= 5500);
    assert_eq!(result.dropped_files, vec!["three.rs".to_string()]);
    assert!(result.was_truncated());
}

#[test]
fn test_no_partial_sections_and_order_kept() {
    let truncator = Truncator::with_notices(&CharCounter, short_notices());
    let sections: Vec<String> = (0..8)
        .map(|i| file_section(&format!("src/file_{i}.rs"), 300 + i * 50))
        .collect();
    let diff = sections.concat();

    for max_tokens in [400, 1000, 1700, 2500, 3000] {
        let result = truncator.truncate_intelligently(&diff, max_tokens, true);
        assert!(result.final_tokens <= max_tokens);

        let body = result
            .text
            .strip_suffix(SHORT_NOTICE)
            .expect("notice appended");
        let kept: Vec<&str> = split_file_segments(body)
            .iter()
            .map(|s| s.as_str())
            .collect();
        assert_eq!(kept.len() + result.dropped_files.len(), sections.len());
        for (segment, original) in kept.iter().zip(&sections) {
            assert_eq!(*segment, original.as_str());
        }
    }
}

#[test]
fn test_first_section_too_large_keeps_only_notice() {
    let truncator = Truncator::with_notices(&CharCounter, short_notices());
    let diff = sample_diff();

    let result = truncator.truncate_intelligently(&diff, 1500, true);
    assert_eq!(result.text, SHORT_NOTICE);
    assert_eq!(result.dropped_files, vec!["one.rs", "two.rs", "three.rs"]);
}

#[test]
fn test_preserve_end_keeps_trailing_files() {
    let notices = TruncationNotices {
        leading: "[earlier files truncated]\n".to_string(),
        ..TruncationNotices::default()
    };
    let truncator = Truncator::with_notices(&CharCounter, notices);
    let diff = sample_diff();

    let result = truncator.truncate_intelligently(&diff, 7100, false);
    assert_eq!(
        result.text,
        format!(
            "[earlier files truncated]\n{}{}",
            file_section("two.rs", 3000),
            file_section("three.rs", 4000)
        )
    );
    assert!(result.final_tokens <= 7100);
    assert_eq!(result.dropped_files, vec!["one.rs"]);
}

#[test]
fn test_preamble_is_kept_in_place() {
    let truncator = Truncator::with_notices(&CharCounter, short_notices());
    let preamble = "Combined staged and unstaged changes\n\n";
    let diff = format!("{preamble}{}", sample_diff());

    let result = truncator.truncate_intelligently(&diff, 2100, true);
    assert_eq!(
        result.text,
        format!("{preamble}{}{SHORT_NOTICE}", file_section("one.rs", 2000))
    );
    assert_eq!(result.dropped_files, vec!["two.rs", "three.rs"]);
}

#[test]
fn test_whole_diff_over_budget_drops_last_section() {
    let truncator = Truncator::new(&HeaderPenaltyCounter);
    let diff = sample_diff();
    assert_eq!(HeaderPenaltyCounter.count_tokens(&diff), 9200);

    // every section fits on its own count, the joined diff does not
    let result = truncator.truncate_intelligently(&diff, 9150, true);
    assert_eq!(
        result.text,
        format!(
            "{}{}{}",
            file_section("one.rs", 2000),
            file_section("two.rs", 3000),
            FILES_NOTICE
        )
    );
    assert_eq!(result.original_tokens, 9200);
    assert_eq!(result.final_tokens, 5000 + FILES_NOTICE.len() + 100);
    assert_eq!(result.dropped_files, vec!["three.rs"]);
}

#[test]
fn test_assembled_sections_are_remeasured() {
    let truncator = Truncator::with_notices(&HeaderPenaltyCounter, short_notices());
    let diff = sample_diff();

    // one.rs + two.rs + notice is 5020 by running total, 5120 once joined
    let result = truncator.truncate_intelligently(&diff, 5100, true);
    assert_eq!(
        result.text,
        format!("{}{SHORT_NOTICE}", file_section("one.rs", 2000))
    );
    assert_eq!(result.final_tokens, 2020);
    assert_eq!(result.dropped_files, vec!["two.rs", "three.rs"]);
}

#[test]
fn test_assembled_trailing_sections_are_remeasured() {
    let notices = TruncationNotices {
        leading: "[earlier files truncated]\n".to_string(),
        ..TruncationNotices::default()
    };
    let truncator = Truncator::with_notices(&HeaderPenaltyCounter, notices);
    let diff = sample_diff();

    let result = truncator.truncate_intelligently(&diff, 7100, false);
    assert_eq!(
        result.text,
        format!("[earlier files truncated]\n{}", file_section("three.rs", 4000))
    );
    assert_eq!(result.final_tokens, 4026);
    assert_eq!(result.dropped_files, vec!["one.rs", "two.rs"]);
}

#[test]
fn test_heuristic_section_cut_stays_within_budget() {
    let estimator = Estimator::heuristic();
    let truncator = Truncator::new(&estimator);
    let diff: String = (0..30)
        .map(|i| file_section(&format!("f{i:02}.rs"), 32))
        .collect();
    assert_eq!(estimator.count_tokens(&file_section("f00.rs", 32)), 10);
    assert_eq!(estimator.count_tokens(&diff), 320);

    for preserve_start in [true, false] {
        for max_tokens in 30..150 {
            let result = truncator.truncate_intelligently(&diff, max_tokens, preserve_start);
            assert!(
                result.final_tokens <= max_tokens,
                "max_tokens={max_tokens} preserve_start={preserve_start} final={}",
                result.final_tokens
            );
            assert_eq!(result.final_tokens, estimator.count_tokens(&result.text));
            assert!(!result.dropped_files.is_empty());
        }
    }
}

#[test]
fn test_single_file_falls_back_to_plain_cut() {
    let estimator = Estimator::heuristic();
    let truncator = Truncator::new(&estimator);
    let diff = file_section("big.rs", 30_000);

    let result = truncator.truncate_intelligently(&diff, 1000, true);
    assert!(result.text.ends_with(GENERIC_NOTICE));
    assert!(result.text.contains("too large for context window"));
    assert!(result.text.starts_with("diff --git a/big.rs b/big.rs\n"));
    assert_eq!(result.original_tokens, 10_000);
    assert!(result.final_tokens <= 1000);
    assert!(result.dropped_files.is_empty());
}

#[test]
fn test_plain_text_falls_back_to_plain_cut() {
    let truncator = Truncator::new(&CharCounter);
    let text = "no diff structure here\n".repeat(100);

    let result = truncator.truncate_intelligently(&text, 200, true);
    let kept = result.text.strip_suffix(GENERIC_NOTICE).expect("generic notice");
    assert!(text.starts_with(kept));
    assert_eq!(result.final_tokens, 200);
}

#[test]
fn test_plain_cut_keeping_end() {
    let truncator = Truncator::new(&CharCounter);
    let text = "0123456789".repeat(30);

    let result = truncator.truncate_tail_to_limit(&text, 100, "[cut]");
    assert!(result.text.starts_with("[cut]"));
    assert!(text.ends_with(&result.text["[cut]".len()..]));
    assert_eq!(result.final_tokens, 100);
}

#[test]
fn test_heuristic_cut_uses_char_ratio() {
    let estimator = Estimator::heuristic();
    let truncator = Truncator::new(&estimator);
    let text = "a".repeat(3000);

    let result = truncator.truncate_to_limit(&text, 100, LIMIT_NOTICE);
    let notice_tokens = estimator.count_tokens(LIMIT_NOTICE);
    let kept = result.text.strip_suffix(LIMIT_NOTICE).unwrap();
    assert_eq!(kept.len(), (100 - notice_tokens) * 3);
    assert!(result.final_tokens <= 100);
}

#[test]
fn test_heuristic_cut_respects_char_boundaries() {
    let estimator = Estimator::heuristic();
    let truncator = Truncator::new(&estimator);
    let text = "登录功能实现".repeat(200);

    let result = truncator.truncate_to_limit(&text, 50, "…");
    assert!(result.text.ends_with('…'));
    assert!(text.starts_with(result.text.trim_end_matches('…')));
}

#[test]
fn test_apply_request() {
    let truncator = Truncator::with_notices(&CharCounter, short_notices());
    let diff = sample_diff();

    let mut request = TruncationRequest::new(&diff, 5500);
    assert!(request.preserve_start);
    assert_eq!(truncator.apply(&request).final_tokens, 5020);

    request.preserve_start = false;
    let result = truncator.apply(&request);
    assert_eq!(result.dropped_files, vec!["one.rs", "two.rs"]);
}

#[test]
fn test_exact_tokenizer_bound() {
    let Ok(exact) = ExactEstimator::cl100k() else {
        return;
    };
    let truncator = Truncator::new(&exact);

    let diff: String = (0..40)
        .map(|i| {
            let mut section = format!(
                "diff --git a/src/module_{i}.rs b/src/module_{i}.rs\n\
                 index 0000000..1111111 100644\n\
                 --- a/src/module_{i}.rs\n\
                 +++ b/src/module_{i}.rs\n\
                 @@ -1,20 +1,20 @@\n"
            );
            for line in 0..20 {
                section.push_str(&format!("-    let value_{line} = compute({line});\n"));
                section.push_str(&format!("+    let value_{line} = compute_checked({line})?;\n"));
            }
            section
        })
        .collect();

    let original = exact.count_tokens(&diff);
    for max_tokens in [original / 2, original / 5, original / 10] {
        let result = truncator.truncate_intelligently(&diff, max_tokens, true);
        assert_eq!(result.original_tokens, original);
        assert!(result.final_tokens <= max_tokens);
        assert_eq!(result.final_tokens, exact.count_tokens(&result.text));
        assert!(result.text.ends_with(FILES_NOTICE));
    }

    let single = diff
        .split_inclusive('\n')
        .take(45)
        .collect::<String>();
    let budget = exact.count_tokens(&single) / 3;
    let result = truncator.truncate_intelligently(&single, budget, true);
    assert!(result.final_tokens <= budget);
    assert!(result.text.ends_with(GENERIC_NOTICE));
}

#[test]
fn test_budget_then_truncate() {
    let allocator = BudgetAllocator::new("openai");
    let max_tokens = allocator.calculate_max_diff_tokens(
        "gpt-4",
        "commit_conventional",
        &Reservations::new(1500),
    );
    assert_eq!(max_tokens, 5392);

    let truncator = Truncator::with_notices(&CharCounter, short_notices());
    let result = truncator.truncate_intelligently(&sample_diff(), max_tokens, true);
    assert_eq!(result.final_tokens, 5020);
}
