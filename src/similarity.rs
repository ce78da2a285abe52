// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Descriptor distance and match classification
//!
//! Similarity is `(1 - euclidean_distance) * 100`. Two faces are considered the
//! same person when the best similarity against any registered reference reaches
//! the threshold (60 by default).

use serde::{Deserialize, Serialize};

use crate::{FinderError, Result};

/// Default similarity cutoff on the 0-100 scale
pub const DEFAULT_THRESHOLD: f32 = 60.0;

/// Face descriptor produced by the embedding model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(pub Vec<f32>);

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for Descriptor {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Euclidean distance between two descriptors of equal length
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(FinderError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    Ok(sum.sqrt())
}

/// Map a distance onto the 0-100 similarity scale
pub fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - distance) * 100.0
}

/// Best similarity of `candidate` against every reference.
///
/// Floored at 0. `None` when there are no references.
pub fn best_similarity(candidate: &Descriptor, references: &[Descriptor]) -> Result<Option<f32>> {
    if references.is_empty() {
        return Ok(None);
    }
    let mut best = 0.0_f32;
    for reference in references {
        let distance = euclidean_distance(reference.as_slice(), candidate.as_slice())?;
        best = best.max(similarity_from_distance(distance));
    }
    Ok(Some(best))
}

/// Outcome of classifying one descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchDecision {
    pub similarity: Option<f32>,
    pub is_match: bool,
}

/// Threshold classifier
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    threshold: f32,
}

impl Classifier {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn classify(&self, candidate: &Descriptor, references: &[Descriptor]) -> Result<MatchDecision> {
        let similarity = best_similarity(candidate, references)?;
        let is_match = similarity.is_some_and(|s| s >= self.threshold);
        Ok(MatchDecision { similarity, is_match })
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
