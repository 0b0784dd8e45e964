//! Screening queue ordering strategies.
//!
//! Input studies must already be in creation (FIFO) order; every strategy
//! uses a stable sort so ties keep that order.

use std::cmp::Ordering;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::entities::Study;
use crate::enums::QueueStrategy;

/// Descending AI confidence, studies without a confidence last.
fn confident_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ascending AI confidence, studies without a confidence first.
fn uncertain_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Alternate between the least and the most confident remaining studies.
fn interleave_extremes(mut studies: Vec<Study>) -> Vec<Study> {
    studies.sort_by(|a, b| uncertain_first(a.ai_confidence(), b.ai_confidence()));
    let mut out = Vec::with_capacity(studies.len());
    let mut low = 0usize;
    let mut high = studies.len();
    let mut take_low = true;
    while low < high {
        if take_low {
            out.push(low);
            low += 1;
        } else {
            high -= 1;
            out.push(high);
        }
        take_low = !take_low;
    }
    let mut slots: Vec<Option<Study>> = studies.into_iter().map(Some).collect();
    out.into_iter().filter_map(|i| slots[i].take()).collect()
}

/// Order `studies` for a reviewer using `strategy`.
///
/// `seed` makes [`QueueStrategy::Random`] reproducible; without it the
/// thread RNG is used.
#[must_use]
pub fn order(mut studies: Vec<Study>, strategy: QueueStrategy, seed: Option<u64>) -> Vec<Study> {
    match strategy {
        QueueStrategy::Fifo => studies,
        QueueStrategy::Priority => {
            studies.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
            studies
        }
        QueueStrategy::AiConfident => {
            studies.sort_by(|a, b| confident_first(a.ai_confidence(), b.ai_confidence()));
            studies
        }
        QueueStrategy::AiUncertain => {
            studies.sort_by(|a, b| uncertain_first(a.ai_confidence(), b.ai_confidence()));
            studies
        }
        QueueStrategy::Balanced => interleave_extremes(studies),
        QueueStrategy::Random => {
            match seed {
                Some(seed) => studies.shuffle(&mut StdRng::seed_from_u64(seed)),
                None => studies.shuffle(&mut rand::thread_rng()),
            }
            studies
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::entities::AiAssessment;
    use crate::enums::{FinalDecision, Phase, StudyStatus, Verdict};

    fn study(id: &str, priority: u32, confidence: Option<f64>) -> Study {
        let now = Utc::now();
        Study {
            id: id.into(),
            project_id: "prj-00000001".into(),
            work_id: format!("wrk-{id}"),
            phase: Phase::TitleAbstract,
            status: StudyStatus::Pending,
            final_decision: FinalDecision::Undecided,
            priority_score: priority,
            ai: confidence.map(|confidence| AiAssessment {
                suggestion: Verdict::Include,
                confidence,
                reasoning: None,
            }),
            created_at: now,
            updated_at: now,
        }
    }

    fn ids(studies: &[Study]) -> Vec<&str> {
        studies.iter().map(|s| s.id.as_str()).collect()
    }

    fn sample() -> Vec<Study> {
        vec![
            study("a", 40, Some(0.9)),
            study("b", 80, None),
            study("c", 80, Some(0.2)),
            study("d", 10, Some(0.5)),
            study("e", 60, Some(0.7)),
        ]
    }

    #[test]
    fn fifo_keeps_creation_order() {
        let out = order(sample(), QueueStrategy::Fifo, None);
        assert_eq!(ids(&out), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn priority_descending_with_creation_tiebreak() {
        let out = order(sample(), QueueStrategy::Priority, None);
        assert_eq!(ids(&out), vec!["b", "c", "e", "a", "d"]);
    }

    #[test]
    fn ai_confident_puts_nulls_last() {
        let out = order(sample(), QueueStrategy::AiConfident, None);
        assert_eq!(ids(&out), vec!["a", "e", "d", "c", "b"]);
    }

    #[test]
    fn ai_uncertain_puts_nulls_first() {
        let out = order(sample(), QueueStrategy::AiUncertain, None);
        assert_eq!(ids(&out), vec!["b", "c", "d", "e", "a"]);
    }

    #[test]
    fn balanced_alternates_low_and_high() {
        // ascending: b(null) c(.2) d(.5) e(.7) a(.9)
        let out = order(sample(), QueueStrategy::Balanced, None);
        assert_eq!(ids(&out), vec!["b", "a", "c", "e", "d"]);
    }

    #[test]
    fn random_is_a_permutation_and_seed_reproducible() {
        let first = order(sample(), QueueStrategy::Random, Some(7));
        let second = order(sample(), QueueStrategy::Random, Some(7));
        assert_eq!(ids(&first), ids(&second));

        let mut sorted = ids(&first);
        sorted.sort_unstable();
        assert_eq!(sorted, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn empty_queue_for_every_strategy() {
        for strategy in [
            QueueStrategy::Fifo,
            QueueStrategy::Priority,
            QueueStrategy::AiConfident,
            QueueStrategy::AiUncertain,
            QueueStrategy::Balanced,
            QueueStrategy::Random,
        ] {
            assert!(order(Vec::new(), strategy, None).is_empty());
        }
    }
}
