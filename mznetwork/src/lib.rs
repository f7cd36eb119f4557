//! Build molecular networks from tandem mass spectra.
//!
//! Spectra are scored against each other with a spectral similarity measure, the scores
//! are thresholded into a sparse [`SimilarityNetwork`], and each feature is labeled with
//! the connected component it belongs to. Components with only one member share the
//! label [`SINGLETON_COMPONENT`].
//!
//! The entry point is [`generate_molecular_network`], which writes the network as GraphML
//! or Cytoscape JSON and the component labels as a tab-separated table.
pub mod api;
pub mod components;
pub mod export;
pub mod network;
pub mod scorer;
pub mod scores;
pub mod spectrum;
pub mod table;

pub use crate::api::{
    build_molecular_network, generate_molecular_network, label_components, MolecularNetworkError,
    MolecularNetworkParams,
};
pub use crate::components::{ComponentAssignment, ComponentId, SINGLETON_COMPONENT};
pub use crate::export::{ExportError, GraphFormat};
pub use crate::network::{LinkMethod, NetworkBuilder, NetworkError, NetworkParams, SimilarityNetwork};
pub use crate::scorer::{CosineGreedy, ModifiedCosine, ScoringError, SimilarityScore, SpectralSimilarity};
pub use crate::scores::{calculate_scores, ScoreMatrix};
pub use crate::spectrum::{read_spectra, FeatureSpectrum};
pub use crate::table::{ComponentRow, ComponentTable};
