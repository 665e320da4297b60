//! Weighted intersection of two datasets' attribute sets.

use std::collections::BTreeSet;

use datamap_ingest::{AttributeKind, DatasetAttributes};

use crate::model::{NodeId, SimilarityEdge};
use crate::weights::{Weighting, UNIFORM_EDGE_WEIGHT};

/// Intersection of one attribute kind between two datasets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KindOverlap {
    /// Shared attribute names, sorted.
    pub shared: BTreeSet<String>,
    /// Sum of the judged weight of every shared attribute.
    pub weight: f64,
    /// `|shared| / min(|A|, |B|)` over distinct attributes, rounded to 2 places.
    pub proportion: f64,
}

impl KindOverlap {
    pub fn count(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }
}

/// Round to two decimal places.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Intersect `a` and `b` (exact string equality) and weigh the result.
pub fn weighted_intersection(
    kind: AttributeKind,
    a: &[String],
    b: &[String],
    weighting: &Weighting,
) -> KindOverlap {
    let set_a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: BTreeSet<&str> = b.iter().map(String::as_str).collect();

    let shared: BTreeSet<String> = set_a
        .intersection(&set_b)
        .map(|s| s.to_string())
        .collect();
    if shared.is_empty() {
        return KindOverlap::default();
    }

    let weight: f64 = shared
        .iter()
        .map(|attr| weighting.attribute_weight(kind, attr))
        .sum();
    let denominator = set_a.len().min(set_b.len());
    let proportion = round2(shared.len() as f64 / denominator as f64);

    KindOverlap {
        shared,
        weight,
        proportion,
    }
}

/// Both kinds of overlap for one pair of datasets.
#[derive(Debug, Clone, PartialEq)]
pub struct PairOverlap {
    pub tags: KindOverlap,
    pub variables: KindOverlap,
    /// Combined edge weight for the pair.
    pub weight: f64,
}

impl PairOverlap {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.variables.is_empty()
    }

    pub fn shared_count(&self) -> usize {
        self.tags.count() + self.variables.count()
    }

    /// Shared tags then shared variables, comma separated.
    pub fn label(&self) -> String {
        self.tags
            .shared
            .iter()
            .chain(self.variables.shared.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The single merged edge for this pair, or `None` when nothing is shared.
    pub fn to_edge(&self, a: NodeId, b: NodeId) -> Option<SimilarityEdge> {
        if self.is_empty() {
            return None;
        }
        Some(SimilarityEdge {
            source: a.min(b),
            target: a.max(b),
            weight: self.weight,
            shared_count: self.shared_count(),
            tag_proportion: self.tags.proportion,
            variable_proportion: self.variables.proportion,
            label: self.label(),
            color: None,
        })
    }
}

/// Compare two datasets on tags and on variables, then merge both kinds into
/// one combined weight.
pub fn compare(a: &DatasetAttributes, b: &DatasetAttributes, weighting: &Weighting) -> PairOverlap {
    let tags = weighted_intersection(AttributeKind::Tag, &a.hxl_tags, &b.hxl_tags, weighting);
    let variables = weighted_intersection(
        AttributeKind::Variable,
        &a.variables,
        &b.variables,
        weighting,
    );
    let weight = if tags.is_empty() && variables.is_empty() {
        0.0
    } else if weighting.is_uniform() {
        UNIFORM_EDGE_WEIGHT
    } else {
        tags.weight + variables.weight
    };
    PairOverlap {
        tags,
        variables,
        weight,
    }
}
