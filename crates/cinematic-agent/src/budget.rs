//! Token budgeting for the conversation window
//!
//! The completion endpoint has a fixed context limit. Before each request the
//! history is trimmed from the oldest end so that the fixed preamble plus the
//! retained suffix stays under a working ceiling.

use cinematic_ai::Turn;

/// Working ceiling: a 4096-token model limit minus headroom for the response
pub const DEFAULT_CEILING: f64 = 4000.0;

/// Estimate token cost of a text (chars/4 heuristic with a 1% margin)
pub fn estimate_tokens(text: &str) -> f64 {
    text.chars().count() as f64 / 4.0 * 1.01
}

/// Estimate total token cost of a slice of turns
pub fn estimate_total_tokens(turns: &[Turn]) -> f64 {
    turns.iter().map(|t| estimate_tokens(&t.content)).sum()
}

/// Trims history to fit a fixed token ceiling
#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    pub ceiling: f64,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_CEILING,
        }
    }
}

impl TokenBudget {
    pub fn new(ceiling: f64) -> Self {
        Self { ceiling }
    }

    /// Return the longest suffix of `history` that fits alongside `baseline`.
    ///
    /// History is walked newest to oldest and the walk stops at the first turn
    /// that would push the total over the ceiling; everything older is dropped
    /// even if it would fit. Chronological order of the suffix is preserved.
    pub fn window(&self, baseline: &[Turn], history: &[Turn]) -> Vec<Turn> {
        let start = self.first_kept_index(baseline, history);
        history[start..].to_vec()
    }

    /// Index of the oldest history turn that survives [`window`](Self::window).
    pub fn first_kept_index(&self, baseline: &[Turn], history: &[Turn]) -> usize {
        let mut tokens = estimate_total_tokens(baseline);
        let mut start = history.len();

        for (idx, turn) in history.iter().enumerate().rev() {
            tokens += estimate_tokens(&turn.content);
            if tokens > self.ceiling {
                break;
            }
            start = idx;
        }

        start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn_of_len(len: usize) -> Turn {
        Turn::user("x".repeat(len))
    }

    #[test]
    fn test_estimate_tokens() {
        assert!((estimate_tokens("abcd") - 1.01).abs() < 1e-9);
        assert_eq!(estimate_tokens(""), 0.0);
        // characters, not bytes
        assert!((estimate_tokens("💬💬💬💬") - 1.01).abs() < 1e-9);
    }

    #[test]
    fn test_empty_history_is_empty() {
        let budget = TokenBudget::default();
        assert!(budget.window(&[Turn::system("preamble")], &[]).is_empty());
    }

    #[test]
    fn test_everything_fits() {
        let budget = TokenBudget::default();
        let history = vec![Turn::user("hi"), Turn::assistant("hello"), Turn::user("add alien")];
        assert_eq!(budget.window(&[], &history), history);
    }

    #[test]
    fn test_drops_oldest_first_and_preserves_order() {
        let budget = TokenBudget::new(100.0);
        // 200 chars ~ 50.5 tokens each: only the newest fits after the first
        let history = vec![
            Turn::user("oldest".to_string() + &"a".repeat(194)),
            Turn::assistant("middle".to_string() + &"b".repeat(194)),
            Turn::user("n1"),
            Turn::assistant("n2"),
        ];

        let kept = budget.window(&[], &history);
        assert_eq!(kept.len(), 3);
        assert!(kept[0].content.starts_with("middle"));
        assert_eq!(kept[1].content, "n1");
        assert_eq!(kept[2].content, "n2");
    }

    #[test]
    fn test_baseline_counts_against_ceiling() {
        let budget = TokenBudget::new(100.0);
        let baseline = vec![turn_of_len(360)]; // ~90.9 tokens
        let history = vec![turn_of_len(40), turn_of_len(20)]; // ~10.1, ~5.05

        let kept = budget.window(&baseline, &history);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content.len(), 20);
    }

    #[test]
    fn test_stops_at_first_overflow_even_if_older_fits() {
        let budget = TokenBudget::new(50.0);
        let history = vec![turn_of_len(4), turn_of_len(400), turn_of_len(4)];

        let kept = budget.window(&[], &history);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_single_oversized_newest_yields_empty() {
        let budget = TokenBudget::default();
        let history = vec![Turn::user("short"), turn_of_len(20_000)];
        assert!(budget.window(&[], &history).is_empty());
    }

    #[test]
    fn test_retained_total_never_exceeds_ceiling() {
        let budget = TokenBudget::new(300.0);
        let baseline = vec![turn_of_len(200)];
        let history: Vec<Turn> = (1..40).map(|i| turn_of_len(i * 7)).collect();

        let kept = budget.window(&baseline, &history);
        let total = estimate_total_tokens(&baseline) + estimate_total_tokens(&kept);
        assert!(total <= 300.0, "total {} over ceiling", total);
        // contiguous suffix
        let start = history.len() - kept.len();
        assert_eq!(&history[start..], kept.as_slice());
        // one more turn would not have fit
        if start > 0 {
            assert!(total + estimate_tokens(&history[start - 1].content) > 300.0);
        }
    }
}
