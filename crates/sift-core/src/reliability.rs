//! Inter-rater agreement: Cohen's Kappa and pairwise reliability reports.
//!
//! Kappa is computed over the categories the two raters actually used. MAYBE
//! is only folded into EXCLUDE when [`KappaOptions::collapse_maybe`] is set.
//! With more than two reviewers every pair that shares studies gets its own
//! kappa and the report averages the defined ones; no omnibus statistic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::Verdict;

/// Fewer co-screened studies than this leaves kappa undefined.
pub const MIN_SHARED_STUDIES: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KappaOptions {
    /// Treat MAYBE as EXCLUDE before building the contingency table.
    #[serde(default)]
    pub collapse_maybe: bool,
}

impl KappaOptions {
    const fn category(self, verdict: Verdict) -> Verdict {
        match verdict {
            Verdict::Maybe if self.collapse_maybe => Verdict::Exclude,
            other => other,
        }
    }
}

/// Landis & Koch interpretation bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Interpretation {
    Poor,
    Slight,
    Fair,
    Moderate,
    Substantial,
    AlmostPerfect,
}

impl Interpretation {
    #[must_use]
    pub fn from_kappa(kappa: f64) -> Self {
        if kappa < 0.0 {
            Self::Poor
        } else if kappa <= 0.20 {
            Self::Slight
        } else if kappa <= 0.40 {
            Self::Fair
        } else if kappa <= 0.60 {
            Self::Moderate
        } else if kappa <= 0.80 {
            Self::Substantial
        } else {
            Self::AlmostPerfect
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Slight => "slight",
            Self::Fair => "fair",
            Self::Moderate => "moderate",
            Self::Substantial => "substantial",
            Self::AlmostPerfect => "almost_perfect",
        }
    }
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cohen's Kappa for two raters over a shared set of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KappaResult {
    pub kappa: f64,
    /// Observed agreement proportion `po`.
    pub observed: f64,
    /// Chance agreement `pe` from the marginals.
    pub expected: f64,
    pub items: usize,
    pub categories: Vec<Verdict>,
    pub interpretation: Interpretation,
}

/// Compute Cohen's Kappa over paired ratings `(rater_a, rater_b)`.
///
/// Returns `None` when fewer than [`MIN_SHARED_STUDIES`] pairs exist. When
/// chance agreement is 1 (both raters used one identical category) kappa is
/// defined as 1.0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cohen_kappa(pairs: &[(Verdict, Verdict)], options: KappaOptions) -> Option<KappaResult> {
    if pairs.len() < MIN_SHARED_STUDIES {
        return None;
    }
    let n = pairs.len() as f64;

    let mut marginal_a: BTreeMap<Verdict, usize> = BTreeMap::new();
    let mut marginal_b: BTreeMap<Verdict, usize> = BTreeMap::new();
    let mut agreements = 0usize;
    for (a, b) in pairs {
        let (a, b) = (options.category(*a), options.category(*b));
        *marginal_a.entry(a).or_default() += 1;
        *marginal_b.entry(b).or_default() += 1;
        if a == b {
            agreements += 1;
        }
    }

    let categories: Vec<Verdict> = marginal_a
        .keys()
        .chain(marginal_b.keys())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let observed = agreements as f64 / n;
    let expected: f64 = categories
        .iter()
        .map(|c| {
            let pa = marginal_a.get(c).copied().unwrap_or(0) as f64 / n;
            let pb = marginal_b.get(c).copied().unwrap_or(0) as f64 / n;
            pa * pb
        })
        .sum();

    let kappa = if (1.0 - expected).abs() < f64::EPSILON {
        1.0
    } else {
        (observed - expected) / (1.0 - expected)
    };

    Some(KappaResult {
        kappa,
        observed,
        expected,
        items: pairs.len(),
        categories,
        interpretation: Interpretation::from_kappa(kappa),
    })
}

/// Kappa for one reviewer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PairwiseKappa {
    pub reviewer_a: String,
    pub reviewer_b: String,
    pub shared_studies: usize,
    /// `None` when the pair shares fewer than two studies.
    pub result: Option<KappaResult>,
}

/// Agreement across every reviewer pair of a project phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReliabilityReport {
    pub reviewers: Vec<String>,
    pub pairs: Vec<PairwiseKappa>,
    /// Mean of the defined pairwise kappas.
    pub average_kappa: Option<f64>,
    pub interpretation: Option<Interpretation>,
}

/// Ratings keyed by reviewer, then by study.
pub type Ratings = BTreeMap<String, BTreeMap<String, Verdict>>;

/// Build the pairwise kappa matrix for all reviewers with shared studies.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn pairwise_report(ratings: &Ratings, options: KappaOptions) -> ReliabilityReport {
    let reviewers: Vec<String> = ratings.keys().cloned().collect();
    let mut pairs = Vec::new();

    for (i, a) in reviewers.iter().enumerate() {
        for b in &reviewers[i + 1..] {
            let (ra, rb) = (&ratings[a], &ratings[b]);
            let shared: Vec<(Verdict, Verdict)> = ra
                .iter()
                .filter_map(|(study, va)| rb.get(study).map(|vb| (*va, *vb)))
                .collect();
            if shared.is_empty() {
                continue;
            }
            pairs.push(PairwiseKappa {
                reviewer_a: a.clone(),
                reviewer_b: b.clone(),
                shared_studies: shared.len(),
                result: cohen_kappa(&shared, options),
            });
        }
    }

    let defined: Vec<f64> = pairs
        .iter()
        .filter_map(|p| p.result.as_ref().map(|r| r.kappa))
        .collect();
    let average_kappa = if defined.is_empty() {
        None
    } else {
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    };

    ReliabilityReport {
        reviewers,
        pairs,
        average_kappa,
        interpretation: average_kappa.map(Interpretation::from_kappa),
    }
}
