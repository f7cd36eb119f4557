//! Pairwise similarity score matrices over collections of spectra
use rayon::prelude::*;
use tracing::debug;

use crate::scorer::{ScoringError, SimilarityScore, SpectralSimilarity};
use crate::spectrum::FeatureSpectrum;

/// A dense matrix of [`SimilarityScore`] with one row per reference spectrum
/// and one column per query spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    n_references: usize,
    n_queries: usize,
    scores: Vec<SimilarityScore>,
    /// Whether the references and queries are the same collection
    pub is_symmetric: bool,
}

impl ScoreMatrix {
    /// Create a matrix from row-major `scores`.
    ///
    /// # Panics
    /// If `scores.len() != n_references * n_queries`
    pub fn new(
        n_references: usize,
        n_queries: usize,
        scores: Vec<SimilarityScore>,
        is_symmetric: bool,
    ) -> Self {
        assert_eq!(
            scores.len(),
            n_references * n_queries,
            "Score matrix data does not match its shape"
        );
        Self {
            n_references,
            n_queries,
            scores,
            is_symmetric,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_references, self.n_queries)
    }

    pub fn get(&self, reference: usize, query: usize) -> Option<&SimilarityScore> {
        if reference >= self.n_references || query >= self.n_queries {
            return None;
        }
        self.scores.get(reference * self.n_queries + query)
    }

    pub fn row(&self, reference: usize) -> &[SimilarityScore] {
        let start = reference * self.n_queries;
        &self.scores[start..start + self.n_queries]
    }

    pub fn rows(&self) -> std::slice::Chunks<'_, SimilarityScore> {
        self.scores.chunks(self.n_queries.max(1))
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Score every reference spectrum against every query spectrum.
///
/// When `is_symmetric` is true, `references` and `queries` must be the same
/// collection, and only the upper triangle is computed if the similarity measure
/// is commutative. Rows are scored in parallel.
pub fn calculate_scores<S: SpectralSimilarity + Sync>(
    references: &[FeatureSpectrum],
    queries: &[FeatureSpectrum],
    similarity: &S,
    is_symmetric: bool,
) -> Result<ScoreMatrix, ScoringError> {
    if references.is_empty() || queries.is_empty() {
        return Err(ScoringError::EmptyCollection);
    }
    if is_symmetric && references.len() != queries.len() {
        return Err(ScoringError::AsymmetricInput(
            references.len(),
            queries.len(),
        ));
    }
    let upper_triangle = is_symmetric && similarity.is_commutative();

    let rows: Vec<Vec<SimilarityScore>> = references
        .par_iter()
        .enumerate()
        .map(|(i, reference)| -> Result<Vec<SimilarityScore>, ScoringError> {
            let start = if upper_triangle { i } else { 0 };
            let mut row = vec![SimilarityScore::default(); queries.len()];
            for (j, query) in queries.iter().enumerate().skip(start) {
                row[j] = similarity.pair(reference, query)?;
            }
            Ok(row)
        })
        .collect::<Result<_, ScoringError>>()?;

    let n_queries = queries.len();
    let mut scores: Vec<SimilarityScore> = rows.into_iter().flatten().collect();
    if upper_triangle {
        for i in 0..n_queries {
            for j in 0..i {
                scores[i * n_queries + j] = scores[j * n_queries + i];
            }
        }
    }
    debug!(
        "Computed {} x {} similarity scores",
        references.len(),
        n_queries
    );
    Ok(ScoreMatrix::new(
        references.len(),
        n_queries,
        scores,
        is_symmetric,
    ))
}
