//! Study priority scoring for queue ordering.
//!
//! Base 50, adjusted by recency, journal allow-list, keyword overlap and AI
//! confidence, then clamped to `[0, 100]`. Uncertain AI triage raises the
//! score so human attention goes where the machine is least sure.

use serde::{Deserialize, Serialize};

use crate::entities::Work;

pub const BASE_SCORE: i64 = 50;
pub const MAX_KEYWORD_BONUS: i64 = 20;
pub const KEYWORD_MATCH_POINTS: i64 = 5;

/// Project-specific scoring inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCriteria {
    /// Journals that earn the allow-list bonus (case-insensitive).
    #[serde(default)]
    pub journals: Vec<String>,
    /// Keywords searched for in title, abstract and work keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Per-factor breakdown of a computed score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub recency: i64,
    pub journal: i64,
    pub keywords: i64,
    pub ai: i64,
    pub score: u32,
}

fn recency_points(publication_year: Option<i32>, current_year: i32) -> i64 {
    let Some(year) = publication_year else {
        return 0;
    };
    match current_year - year {
        age if age <= 2 => 20,
        age if age <= 5 => 10,
        age if age > 10 => -10,
        _ => 0,
    }
}

fn journal_points(journal: Option<&str>, criteria: &PriorityCriteria) -> i64 {
    let Some(journal) = journal.map(str::trim).filter(|j| !j.is_empty()) else {
        return 0;
    };
    if criteria
        .journals
        .iter()
        .any(|allowed| allowed.trim().eq_ignore_ascii_case(journal))
    {
        15
    } else {
        0
    }
}

fn keyword_points(work: &Work, criteria: &PriorityCriteria) -> i64 {
    if criteria.keywords.is_empty() {
        return 0;
    }
    let mut haystack = work.title.to_lowercase();
    if let Some(abstract_text) = &work.abstract_text {
        haystack.push(' ');
        haystack.push_str(&abstract_text.to_lowercase());
    }
    for keyword in &work.keywords {
        haystack.push(' ');
        haystack.push_str(&keyword.to_lowercase());
    }

    let matches = criteria
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && haystack.contains(k.as_str()))
        .count();
    (i64::try_from(matches).unwrap_or(i64::MAX) * KEYWORD_MATCH_POINTS).min(MAX_KEYWORD_BONUS)
}

fn ai_points(ai_confidence: Option<f64>) -> i64 {
    match ai_confidence {
        Some(c) if c < 0.6 => 15,
        Some(c) if c > 0.9 => -5,
        _ => 0,
    }
}

/// Score a study's work against `criteria` as of `current_year`.
#[must_use]
pub fn score(
    work: &Work,
    ai_confidence: Option<f64>,
    criteria: &PriorityCriteria,
    current_year: i32,
) -> PriorityBreakdown {
    let recency = recency_points(work.publication_year, current_year);
    let journal = journal_points(work.journal.as_deref(), criteria);
    let keywords = keyword_points(work, criteria);
    let ai = ai_points(ai_confidence);
    let total = (BASE_SCORE + recency + journal + keywords + ai).clamp(0, 100);

    PriorityBreakdown {
        recency,
        journal,
        keywords,
        ai,
        score: u32::try_from(total).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn work(year: Option<i32>, journal: Option<&str>) -> Work {
        Work {
            id: "wrk-00000001".into(),
            title: "Statin therapy in adult sepsis".into(),
            abstract_text: Some("A randomized controlled trial of mortality outcomes".into()),
            journal: journal.map(String::from),
            publication_year: year,
            keywords: vec!["critical care".into()],
        }
    }

    #[rstest]
    #[case(Some(2026), 20)]
    #[case(Some(2024), 20)]
    #[case(Some(2023), 10)]
    #[case(Some(2021), 10)]
    #[case(Some(2018), 0)]
    #[case(Some(2016), 0)]
    #[case(Some(2015), -10)]
    #[case(None, 0)]
    fn recency_bands(#[case] year: Option<i32>, #[case] expected: i64) {
        assert_eq!(recency_points(year, 2026), expected);
    }

    #[test]
    fn base_score_without_signals() {
        let b = score(&work(None, None), None, &PriorityCriteria::default(), 2026);
        assert_eq!(b.score, 50);
    }

    #[test]
    fn journal_match_is_case_insensitive() {
        let criteria = PriorityCriteria {
            journals: vec!["The Lancet".into()],
            keywords: Vec::new(),
        };
        let b = score(&work(None, Some("the lancet")), None, &criteria, 2026);
        assert_eq!(b.journal, 15);
        assert_eq!(b.score, 65);
    }

    #[test]
    fn keyword_bonus_is_capped() {
        let criteria = PriorityCriteria {
            journals: Vec::new(),
            keywords: vec![
                "statin".into(),
                "sepsis".into(),
                "randomized".into(),
                "mortality".into(),
                "critical care".into(),
                "pediatric".into(),
            ],
        };
        let b = score(&work(None, None), None, &criteria, 2026);
        assert_eq!(b.keywords, MAX_KEYWORD_BONUS);
    }

    #[test]
    fn keyword_partial_overlap() {
        let criteria = PriorityCriteria {
            journals: Vec::new(),
            keywords: vec!["sepsis".into(), "pediatric".into()],
        };
        let b = score(&work(None, None), None, &criteria, 2026);
        assert_eq!(b.keywords, 5);
    }

    #[rstest]
    #[case(Some(0.3), 15)]
    #[case(Some(0.59), 15)]
    #[case(Some(0.6), 0)]
    #[case(Some(0.9), 0)]
    #[case(Some(0.95), -5)]
    #[case(None, 0)]
    fn ai_adjustments(#[case] confidence: Option<f64>, #[case] expected: i64) {
        assert_eq!(ai_points(confidence), expected);
    }

    #[test]
    fn score_is_clamped() {
        let criteria = PriorityCriteria {
            journals: vec!["NEJM".into()],
            keywords: vec![
                "statin".into(),
                "sepsis".into(),
                "randomized".into(),
                "mortality".into(),
            ],
        };
        let b = score(&work(Some(2026), Some("NEJM")), Some(0.1), &criteria, 2026);
        // 50 + 20 + 15 + 20 + 15 = 120
        assert_eq!(b.score, 100);

        let old = score(&work(Some(1990), None), Some(0.99), &PriorityCriteria::default(), 2026);
        assert_eq!(old.score, 35);
    }
}
