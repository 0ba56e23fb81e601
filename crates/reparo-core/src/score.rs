//! Presentation-only run score.

use crate::config::ScoringConfig;
use crate::domain::ScoreBreakdown;

/// Score a finished run from its elapsed whole seconds and successful fixes.
pub fn compute_score(elapsed_secs: u64, fixes_applied: u32, config: &ScoringConfig) -> ScoreBreakdown {
    let time_bonus = if elapsed_secs < config.time_bonus_under_secs {
        config.time_bonus
    } else {
        0
    };
    let excess = fixes_applied.saturating_sub(config.commit_penalty_threshold);
    let commit_penalty = -(config.commit_penalty_per_fix * i64::from(excess));

    ScoreBreakdown {
        base: config.base,
        time_bonus,
        commit_penalty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_run_gets_bonus() {
        let score = compute_score(42, 3, &ScoringConfig::default());
        assert_eq!(score.base, 100);
        assert_eq!(score.time_bonus, 10);
        assert_eq!(score.commit_penalty, 0);
        assert_eq!(score.total(), 110);
    }

    #[test]
    fn test_bonus_threshold_is_exclusive() {
        let score = compute_score(300, 0, &ScoringConfig::default());
        assert_eq!(score.time_bonus, 0);
        assert_eq!(score.total(), 100);
    }

    #[test]
    fn test_penalty_beyond_threshold() {
        let score = compute_score(1_000, 25, &ScoringConfig::default());
        assert_eq!(score.commit_penalty, -10);
        assert_eq!(score.total(), 90);

        let at_threshold = compute_score(1_000, 20, &ScoringConfig::default());
        assert_eq!(at_threshold.commit_penalty, 0);
    }
}
