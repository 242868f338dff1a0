//! Cue rules — regex heuristics scoring how actionable a piece of text is.
//!
//! Four cue categories (date, time, action verb, deadline) are checked for
//! presence against the lowercased text. The score is the sum of the weights
//! of the categories that matched; a category contributes its weight once no
//! matter how many of its patterns hit. Coverage heuristic, not a grammar.

use regex::Regex;

const DATE_WEIGHT: f64 = 0.4;
const TIME_WEIGHT: f64 = 0.2;
const VERB_WEIGHT: f64 = 0.3;
const DEADLINE_WEIGHT: f64 = 0.1;

/// Compiled cue pattern lists.
pub struct CueRules {
    date_patterns: Vec<Regex>,
    time_patterns: Vec<Regex>,
    verb_patterns: Vec<Regex>,
    deadline_patterns: Vec<Regex>,
}

impl CueRules {
    /// Build the default Korean/English cue lists.
    pub fn default_rules() -> Self {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
        };

        Self {
            date_patterns: compile(&[
                "오늘",
                "내일",
                "모레",
                "이번주",
                "이번 주",
                "이번달",
                "이번 달",
                "다음주",
                "다음 달",
                r"\b(today|tomorrow|next week|next month)\b",
            ]),
            time_patterns: compile(&[
                r"\b\d{1,2}시(\d{1,2}분)?",
                r"\b\d{1,2}:\d{2}",
                r"오전\s*\d{1,2}시",
                r"오후\s*\d{1,2}시",
                r"\b(am|pm)\s*\d{1,2}(:\d{2})?",
            ]),
            verb_patterns: compile(&[
                "확인", "검토", "보내", "답장", "신청", "제출", "request", "review", "reply",
                "submit",
            ]),
            deadline_patterns: compile(&["마감", "까지", "due", "deadline"]),
        }
    }

    /// Score text in [0, 1] by cue-category coverage. Capped at 1.0; a
    /// full-coverage sum accumulates float error past it otherwise.
    pub fn score(&self, text: &str) -> f64 {
        let normalized = text.to_lowercase();
        let mut score = 0.0;
        if matches_any(&self.date_patterns, &normalized) {
            score += DATE_WEIGHT;
        }
        if matches_any(&self.time_patterns, &normalized) {
            score += TIME_WEIGHT;
        }
        if matches_any(&self.verb_patterns, &normalized) {
            score += VERB_WEIGHT;
        }
        if matches_any(&self.deadline_patterns, &normalized) {
            score += DEADLINE_WEIGHT;
        }
        score.min(1.0)
    }
}

fn matches_any(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> CueRules {
        CueRules::default_rules()
    }

    #[test]
    fn all_four_categories_score_one() {
        // date + time + verb + deadline
        let text = "내일 오후 2시까지 검토 부탁드립니다";
        assert_eq!(rules().score(text), 1.0);
    }

    #[test]
    fn all_four_categories_english() {
        let text = "please review by tomorrow, due pm 3";
        assert_eq!(rules().score(text), 1.0);
    }

    #[test]
    fn no_cues_scores_zero() {
        assert_eq!(rules().score("hello"), 0.0);
        assert_eq!(rules().score(""), 0.0);
    }

    #[test]
    fn individual_category_weights() {
        assert_eq!(rules().score("오늘"), 0.4);
        assert_eq!(rules().score("14:30"), 0.2);
        assert_eq!(rules().score("검토"), 0.3);
        assert_eq!(rules().score("마감"), 0.1);
    }

    #[test]
    fn category_does_not_saturate_past_its_weight() {
        // Three date cues still contribute 0.4, once.
        assert_eq!(rules().score("오늘 내일 모레"), 0.4);
        // Two deadline cues still contribute 0.1.
        assert_eq!(rules().score("마감 deadline"), 0.1);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(rules().score("REVIEW this"), 0.3);
        assert_eq!(rules().score("Due Tomorrow"), 0.5);
    }

    #[test]
    fn date_and_verb_combination() {
        // "다음주 회의 자료 제출" — date 0.4 + verb 0.3
        let score = rules().score("다음주 회의 자료 제출");
        assert!((score - 0.7).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn korean_time_forms_count_as_time() {
        assert_eq!(rules().score("3시"), 0.2);
        assert_eq!(rules().score("오후 5시"), 0.2);
        assert_eq!(rules().score("2시30분"), 0.2);
    }
}
