//! Spectral similarity measures comparing pairs of tandem mass spectra
use mzpeaks::CentroidPeak;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spectrum::FeatureSpectrum;

pub type ScoreType = f64;

/// The outcome of comparing two spectra
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SimilarityScore {
    /// The similarity, between 0 and 1 for the cosine family of measures
    pub score: ScoreType,
    /// The number of peak pairs that contributed to `score`
    pub matches: usize,
}

impl SimilarityScore {
    pub fn new(score: ScoreType, matches: usize) -> Self {
        Self { score, matches }
    }
}

/// An error that might occur while scoring spectra against each other
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("Spectrum {0} does not have a precursor m/z")]
    MissingPrecursorMz(String),
    #[error("Cannot compute similarity scores for an empty collection of spectra")]
    EmptyCollection,
    #[error("Symmetric scoring requires identical collections, received {0} references and {1} queries")]
    AsymmetricInput(usize, usize),
}

/// A measure of similarity between two spectra
pub trait SpectralSimilarity {
    fn pair(
        &self,
        reference: &FeatureSpectrum,
        query: &FeatureSpectrum,
    ) -> Result<SimilarityScore, ScoringError>;

    /// Whether `pair(a, b)` is equal to `pair(b, a)`
    fn is_commutative(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct PeakPair {
    reference: usize,
    query: usize,
    weight: ScoreType,
}

#[inline]
fn peak_weight(peak: &CentroidPeak, mz_power: f64, intensity_power: f64) -> ScoreType {
    peak.mz.powf(mz_power) * (peak.intensity as f64).powf(intensity_power)
}

/// Find all pairs of peaks whose m/z are within `tolerance` after adding `shift`
/// to the query peaks' m/z. Both peak lists must be sorted by m/z.
fn find_matches(
    reference: &[CentroidPeak],
    query: &[CentroidPeak],
    tolerance: f64,
    shift: f64,
) -> Vec<(usize, usize)> {
    let mut lowest_idx = 0;
    let mut matches = Vec::new();
    for (i, ref_peak) in reference.iter().enumerate() {
        let low_bound = ref_peak.mz - tolerance;
        let high_bound = ref_peak.mz + tolerance;
        for (j, query_peak) in query.iter().enumerate().skip(lowest_idx) {
            let mz = query_peak.mz + shift;
            if mz > high_bound {
                break;
            }
            if mz < low_bound {
                lowest_idx = j + 1;
            } else {
                matches.push((i, j));
            }
        }
    }
    matches
}

fn collect_peak_pairs(
    reference: &[CentroidPeak],
    query: &[CentroidPeak],
    tolerance: f64,
    shift: f64,
    mz_power: f64,
    intensity_power: f64,
) -> Vec<PeakPair> {
    find_matches(reference, query, tolerance, shift)
        .into_iter()
        .map(|(i, j)| PeakPair {
            reference: i,
            query: j,
            weight: peak_weight(&reference[i], mz_power, intensity_power)
                * peak_weight(&query[j], mz_power, intensity_power),
        })
        .collect()
}

fn norm(peaks: &[CentroidPeak], mz_power: f64, intensity_power: f64) -> ScoreType {
    peaks
        .iter()
        .map(|p| peak_weight(p, mz_power, intensity_power).powi(2))
        .sum::<ScoreType>()
        .sqrt()
}

/// Greedily accept the highest weighted peak pairs such that no peak is used twice,
/// and normalize the accumulated weight by both spectra's norms.
fn score_best_matches(
    mut pairs: Vec<PeakPair>,
    reference: &[CentroidPeak],
    query: &[CentroidPeak],
    mz_power: f64,
    intensity_power: f64,
) -> SimilarityScore {
    pairs.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then(a.reference.cmp(&b.reference))
            .then(a.query.cmp(&b.query))
    });

    let mut used_reference = vec![false; reference.len()];
    let mut used_query = vec![false; query.len()];
    let mut total = 0.0;
    let mut matches = 0;
    for pair in pairs {
        if used_reference[pair.reference] || used_query[pair.query] {
            continue;
        }
        used_reference[pair.reference] = true;
        used_query[pair.query] = true;
        total += pair.weight;
        matches += 1;
    }

    let denominator =
        norm(reference, mz_power, intensity_power) * norm(query, mz_power, intensity_power);
    if denominator == 0.0 {
        return SimilarityScore::default();
    }
    SimilarityScore::new(total / denominator, matches)
}

/// The cosine similarity between two peak lists, matching peaks greedily
/// within an m/z tolerance.
///
/// Each matched pair contributes
/// ```math
/// (mz_r^{p_{mz}} \cdot I_r^{p_I}) \times (mz_q^{p_{mz}} \cdot I_q^{p_I})
/// ```
/// and the sum is divided by the norms of both weighted intensity vectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CosineGreedy {
    /// The maximum m/z difference in Daltons between two matched peaks
    pub tolerance: f64,
    pub mz_power: f64,
    pub intensity_power: f64,
}

impl CosineGreedy {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Default::default()
        }
    }
}

impl Default for CosineGreedy {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            mz_power: 0.0,
            intensity_power: 1.0,
        }
    }
}

impl SpectralSimilarity for CosineGreedy {
    fn pair(
        &self,
        reference: &FeatureSpectrum,
        query: &FeatureSpectrum,
    ) -> Result<SimilarityScore, ScoringError> {
        let ref_peaks = reference.peak_slice();
        let query_peaks = query.peak_slice();
        let pairs = collect_peak_pairs(
            ref_peaks,
            query_peaks,
            self.tolerance,
            0.0,
            self.mz_power,
            self.intensity_power,
        );
        Ok(score_best_matches(
            pairs,
            ref_peaks,
            query_peaks,
            self.mz_power,
            self.intensity_power,
        ))
    }
}

/// The modified cosine similarity, which also matches fragment peaks that are
/// displaced by the difference between the two spectra's precursor m/z.
///
/// This lets two spectra of compounds that differ by a single modification
/// match on the fragments that carry the modification as well as those that don't.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModifiedCosine {
    /// The maximum m/z difference in Daltons between two matched peaks
    pub tolerance: f64,
    pub mz_power: f64,
    pub intensity_power: f64,
}

impl ModifiedCosine {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Default::default()
        }
    }
}

impl Default for ModifiedCosine {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            mz_power: 0.0,
            intensity_power: 1.0,
        }
    }
}

impl SpectralSimilarity for ModifiedCosine {
    fn pair(
        &self,
        reference: &FeatureSpectrum,
        query: &FeatureSpectrum,
    ) -> Result<SimilarityScore, ScoringError> {
        let ref_precursor = reference
            .precursor_mz
            .ok_or_else(|| ScoringError::MissingPrecursorMz(reference.feature_id.clone()))?;
        let query_precursor = query
            .precursor_mz
            .ok_or_else(|| ScoringError::MissingPrecursorMz(query.feature_id.clone()))?;
        let shift = ref_precursor - query_precursor;

        let ref_peaks = reference.peak_slice();
        let query_peaks = query.peak_slice();

        let mut pairs = collect_peak_pairs(
            ref_peaks,
            query_peaks,
            self.tolerance,
            0.0,
            self.mz_power,
            self.intensity_power,
        );
        pairs.extend(collect_peak_pairs(
            ref_peaks,
            query_peaks,
            self.tolerance,
            shift,
            self.mz_power,
            self.intensity_power,
        ));
        Ok(score_best_matches(
            pairs,
            ref_peaks,
            query_peaks,
            self.mz_power,
            self.intensity_power,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_reference() -> FeatureSpectrum {
        FeatureSpectrum::from_pairs(
            "ref",
            Some(300.0),
            &[(100.0, 100.0), (150.0, 50.0), (200.0, 80.0)],
        )
    }

    fn make_shifted() -> FeatureSpectrum {
        FeatureSpectrum::from_pairs(
            "shifted",
            Some(314.0),
            &[(114.0, 100.0), (164.0, 50.0), (214.0, 80.0)],
        )
    }

    #[test]
    fn test_find_matches() {
        let reference = make_reference();
        let query = FeatureSpectrum::from_pairs(
            "q",
            Some(300.0),
            &[(99.95, 1.0), (100.02, 1.0), (175.0, 1.0), (200.3, 1.0)],
        );
        let matches = find_matches(reference.peak_slice(), query.peak_slice(), 0.1, 0.0);
        assert_eq!(matches, vec![(0, 0), (0, 1)]);

        let matches = find_matches(reference.peak_slice(), query.peak_slice(), 0.1, -25.0);
        assert_eq!(matches, vec![(1, 2)]);
    }

    #[test]
    fn test_identical() {
        let reference = make_reference();
        let score = CosineGreedy::default()
            .pair(&reference, &reference)
            .unwrap();
        assert!((score.score - 1.0).abs() < 1e-9, "{}", score.score);
        assert_eq!(score.matches, 3);

        let score = ModifiedCosine::default()
            .pair(&reference, &reference)
            .unwrap();
        assert!((score.score - 1.0).abs() < 1e-9, "{}", score.score);
        assert_eq!(score.matches, 3);
    }

    #[test]
    fn test_shifted_fragments() {
        let reference = make_reference();
        let query = make_shifted();

        let cosine = CosineGreedy::default().pair(&reference, &query).unwrap();
        assert_eq!(cosine.matches, 0);
        assert_eq!(cosine.score, 0.0);

        let modified = ModifiedCosine::default().pair(&reference, &query).unwrap();
        assert_eq!(modified.matches, 3);
        assert!((modified.score - 1.0).abs() < 1e-9, "{}", modified.score);

        let reverse = ModifiedCosine::default().pair(&query, &reference).unwrap();
        assert!((reverse.score - modified.score).abs() < 1e-9);
    }

    #[test]
    fn test_partial_overlap() {
        let reference = make_reference();
        let query = FeatureSpectrum::from_pairs(
            "partial",
            Some(314.0),
            &[(100.0, 90.0), (150.0, 55.0), (214.0, 80.0)],
        );
        let score = ModifiedCosine::new(0.02).pair(&reference, &query).unwrap();
        let expected = (100.0 * 90.0 + 50.0 * 55.0 + 80.0 * 80.0)
            / ((100.0f64.powi(2) + 50.0f64.powi(2) + 80.0f64.powi(2)).sqrt()
                * (90.0f64.powi(2) + 55.0f64.powi(2) + 80.0f64.powi(2)).sqrt());
        assert!((score.score - expected).abs() < 1e-9, "{} != {expected}", score.score);
        assert_eq!(score.matches, 3);
    }

    #[test]
    fn test_peaks_used_once() {
        let reference = FeatureSpectrum::from_pairs("a", Some(200.0), &[(100.0, 10.0)]);
        let query = FeatureSpectrum::from_pairs(
            "b",
            Some(200.0),
            &[(99.99, 10.0), (100.01, 5.0)],
        );
        let score = CosineGreedy::default().pair(&reference, &query).unwrap();
        assert_eq!(score.matches, 1);
        assert!(score.score < 1.0);
    }

    #[test]
    fn test_missing_precursor() {
        let reference = make_reference();
        let query = FeatureSpectrum::from_pairs("no-precursor", None, &[(100.0, 1.0)]);
        let err = ModifiedCosine::default()
            .pair(&reference, &query)
            .unwrap_err();
        assert_eq!(
            err,
            ScoringError::MissingPrecursorMz("no-precursor".to_string())
        );
        assert!(CosineGreedy::default().pair(&reference, &query).is_ok());
    }

    #[test]
    fn test_params_from_json() -> serde_json::Result<()> {
        let similarity: ModifiedCosine = serde_json::from_str(
            r#"{"tolerance": 0.02, "mz_power": 0.0, "intensity_power": 0.5}"#,
        )?;
        assert_eq!(similarity.tolerance, 0.02);
        assert_eq!(similarity.intensity_power, 0.5);

        let cosine = CosineGreedy::new(0.05);
        let text = serde_json::to_string(&cosine)?;
        let parsed: CosineGreedy = serde_json::from_str(&text)?;
        assert_eq!(parsed, cosine);
        Ok(())
    }

    #[test]
    fn test_empty_spectrum() {
        let reference = make_reference();
        let query = FeatureSpectrum::from_pairs("empty", Some(300.0), &[]);
        let score = ModifiedCosine::default().pair(&reference, &query).unwrap();
        assert_eq!(score, SimilarityScore::default());
    }
}
