//! Feature-level tandem mass spectra and reading them from files supported by `mzdata`
use std::collections::HashMap;
use std::io;
use std::path::Path;

use mzdata::params::ParamDescribed;
use mzdata::prelude::*;
use mzdata::spectrum::bindata::ArrayRetrievalError;
use mzdata::spectrum::MultiLayerSpectrum;
use mzpeaks::{CentroidPeak, MZPeakSetType};
use tracing::{debug, warn};

pub type PeakList = MZPeakSetType<CentroidPeak>;

/// The metadata keys searched, in order, for a spectrum's feature identifier
pub const FEATURE_ID_KEYS: [&str; 2] = ["feature_id", "scans"];

/// A single MS/MS spectrum representing one feature of a data set.
///
/// The peak list is only consumed by similarity scoring. Everything else
/// about the spectrum lives in [`FeatureSpectrum::metadata`], keyed by lower-case
/// header names.
#[derive(Debug, Clone)]
pub struct FeatureSpectrum {
    /// The identifier of the feature, unique within a data set
    pub feature_id: String,
    /// The m/z of the precursor ion that was isolated to produce this spectrum
    pub precursor_mz: Option<f64>,
    /// Centroided fragment peaks, sorted by m/z
    pub peaks: PeakList,
    pub metadata: HashMap<String, String>,
}

impl FeatureSpectrum {
    pub fn new(
        feature_id: impl Into<String>,
        precursor_mz: Option<f64>,
        peaks: Vec<CentroidPeak>,
    ) -> Self {
        let peaks = peaks.into_iter().filter(|p| p.intensity > 0.0).collect();
        Self {
            feature_id: feature_id.into(),
            precursor_mz,
            peaks: MZPeakSetType::new(peaks),
            metadata: HashMap::new(),
        }
    }

    /// Build a spectrum from `(m/z, intensity)` pairs
    pub fn from_pairs(
        feature_id: impl Into<String>,
        precursor_mz: Option<f64>,
        pairs: &[(f64, f32)],
    ) -> Self {
        let peaks = pairs
            .iter()
            .enumerate()
            .map(|(i, (mz, intensity))| CentroidPeak::new(*mz, *intensity, i as u32))
            .collect();
        Self::new(feature_id, precursor_mz, peaks)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|v| v.as_str())
    }

    pub fn peak_slice(&self) -> &[CentroidPeak] {
        &self.peaks[0..]
    }

    pub fn len(&self) -> usize {
        self.peak_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peak_slice().is_empty()
    }

    /// Convert a spectrum read by `mzdata` into a [`FeatureSpectrum`].
    ///
    /// The feature identifier is taken from the first of [`FEATURE_ID_KEYS`] present
    /// in the spectrum's parameters, falling back to the spectrum's native ID.
    /// Peaks are read from the centroid peak list if one is present, otherwise
    /// from the raw m/z and intensity arrays.
    pub fn from_spectrum(spectrum: &MultiLayerSpectrum) -> Result<Self, ArrayRetrievalError> {
        let metadata: HashMap<String, String> = spectrum
            .description()
            .params()
            .iter()
            .map(|p| (p.name.to_lowercase(), p.value.to_string()))
            .collect();

        let feature_id = FEATURE_ID_KEYS
            .iter()
            .find_map(|k| metadata.get(*k))
            .cloned()
            .unwrap_or_else(|| spectrum.id().to_string());

        let precursor_mz = spectrum.precursor().map(|prec| prec.ion().mz);

        let peaks: Vec<CentroidPeak> = if let Some(peaks) = spectrum.peaks.as_ref() {
            peaks[0..].to_vec()
        } else if let Some(arrays) = spectrum.arrays.as_ref() {
            let mzs = arrays.mzs()?;
            let intensities = arrays.intensities()?;
            mzs.iter()
                .zip(intensities.iter())
                .enumerate()
                .map(|(i, (mz, intensity))| CentroidPeak::new(*mz, *intensity, i as u32))
                .collect()
        } else {
            Vec::new()
        };

        let mut this = Self::new(feature_id, precursor_mz, peaks);
        this.metadata = metadata;
        Ok(this)
    }
}

/// Read every MSn spectrum from `path` in any format `mzdata` can detect.
///
/// MS1 spectra are skipped. Spectra without a precursor m/z are kept, but
/// will fail precursor-aware scoring.
pub fn read_spectra<P: AsRef<Path>>(path: P) -> io::Result<Vec<FeatureSpectrum>> {
    let path = path.as_ref();
    let reader = mzdata::MZReader::open_path(path)?;
    let mut spectra = Vec::new();
    let mut ms1_skipped = 0usize;
    for spectrum in reader {
        if spectrum.ms_level() < 2 {
            ms1_skipped += 1;
            continue;
        }
        let spec = FeatureSpectrum::from_spectrum(&spectrum)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if spec.precursor_mz.is_none() {
            warn!("Spectrum {} does not have a precursor m/z", spec.feature_id);
        }
        spectra.push(spec);
    }
    debug!(
        "Read {} MSn spectra from {}, skipping {ms1_skipped} MS1 spectra",
        spectra.len(),
        path.display()
    );
    Ok(spectra)
}
