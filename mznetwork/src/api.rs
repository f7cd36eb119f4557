//! Building, labeling and writing molecular networks in one call
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::components::{partition_components, relabel_singletons};
use crate::export::{export_graph, export_table, ExportError, GraphFormat};
use crate::network::{LinkMethod, NetworkBuilder, NetworkError, NetworkParams, SimilarityNetwork};
use crate::scorer::{ModifiedCosine, ScoreType, ScoringError};
use crate::scores::calculate_scores;
use crate::spectrum::FeatureSpectrum;
use crate::table::ComponentTable;

/// Parameters for [`generate_molecular_network`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MolecularNetworkParams {
    /// The fragment m/z tolerance in Daltons for the modified cosine
    pub msms_mz_tol: f64,
    pub score_cutoff: ScoreType,
    pub top_n: usize,
    pub max_links: usize,
}

impl Default for MolecularNetworkParams {
    fn default() -> Self {
        Self {
            msms_mz_tol: 0.01,
            score_cutoff: 0.7,
            top_n: 10,
            max_links: 10,
        }
    }
}

impl MolecularNetworkParams {
    pub fn new(msms_mz_tol: f64, score_cutoff: ScoreType, top_n: usize, max_links: usize) -> Self {
        Self {
            msms_mz_tol,
            score_cutoff,
            top_n,
            max_links,
        }
    }

    pub fn similarity(&self) -> ModifiedCosine {
        ModifiedCosine::new(self.msms_mz_tol)
    }

    /// Links are always mutual and unconnected spectra stay in the network
    pub fn network_params(&self) -> NetworkParams {
        NetworkParams::new(
            self.score_cutoff,
            self.top_n,
            self.max_links,
            LinkMethod::Mutual,
        )
    }
}

#[derive(Debug, Error)]
pub enum MolecularNetworkError {
    #[error("Failed to score spectra: {0}")]
    ScoringError(
        #[source]
        #[from]
        ScoringError,
    ),
    #[error("Failed to build the network: {0}")]
    NetworkError(
        #[source]
        #[from]
        NetworkError,
    ),
    #[error("Failed to write output: {0}")]
    ExportError(
        #[source]
        #[from]
        ExportError,
    ),
}

/// Label each node of `network` with its connected component, relabel the singletons,
/// and attach the precursor m/z of the matching spectrum.
pub fn label_components(network: &SimilarityNetwork, spectra: &[FeatureSpectrum]) -> ComponentTable {
    let assignments = relabel_singletons(partition_components(network));
    ComponentTable::merge_precursor_mz(assignments, spectra)
}

/// Score `spectra` against each other with the modified cosine and build a mutual
/// top-N network from the scores.
pub fn build_molecular_network(
    spectra: &[FeatureSpectrum],
    params: &MolecularNetworkParams,
) -> Result<SimilarityNetwork, MolecularNetworkError> {
    let scores = calculate_scores(spectra, spectra, &params.similarity(), true)?;
    let network = NetworkBuilder::new(params.network_params()).create_network(&scores, spectra)?;
    Ok(network)
}

/// Build a molecular network from `spectra`, write it to `graph_path`, then write
/// the connected component of every feature to `table_path`.
///
/// The graph format is inferred from the extension of `graph_path`. Missing parent
/// directories are created and existing files are overwritten. The graph is written
/// before the table, so a failure while writing the table leaves the graph in place.
#[tracing::instrument(level = "debug", skip_all, fields(spectra = spectra.len()))]
pub fn generate_molecular_network<P: AsRef<Path>, Q: AsRef<Path>>(
    spectra: &[FeatureSpectrum],
    graph_path: P,
    table_path: Q,
    params: &MolecularNetworkParams,
) -> Result<ComponentTable, MolecularNetworkError> {
    let graph_path = graph_path.as_ref();
    let table_path = table_path.as_ref();

    let network = build_molecular_network(spectra, params)?;
    info!(
        "Network has {} nodes and {} edges",
        network.node_count(),
        network.edge_count()
    );

    export_graph(&network, graph_path, GraphFormat::infer_from_path(graph_path))?;

    let table = label_components(&network, spectra);
    debug!(
        "Found {} components and {} singletons",
        table.component_count(),
        table.singleton_count()
    );

    export_table(&table, table_path)?;
    Ok(table)
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::fs;

    use super::*;
    use crate::components::{ComponentId, SINGLETON_COMPONENT};
    use crate::spectrum::read_spectra;

    fn component_of(table: &ComponentTable, feature_id: &str) -> ComponentId {
        table.get(feature_id).unwrap().component_id
    }

    fn unrelated_spectra() -> Vec<FeatureSpectrum> {
        vec![
            FeatureSpectrum::from_pairs("a", Some(400.0), &[(101.0, 100.0)]),
            FeatureSpectrum::from_pairs("b", Some(500.0), &[(233.0, 100.0)]),
            FeatureSpectrum::from_pairs("c", Some(650.0), &[(377.0, 100.0)]),
        ]
    }

    #[test_log::test]
    fn test_generate_network() -> Result<(), Box<dyn std::error::Error>> {
        let spectra = read_spectra("./tests/data/small_network.mgf")?;
        let dir = tempfile::tempdir()?;
        let graph_path = dir.path().join("network/graph.graphml");
        let table_path = dir.path().join("tables/components.tsv");
        let params = MolecularNetworkParams::new(0.02, 0.7, 10, 10);

        let table = generate_molecular_network(&spectra, &graph_path, &table_path, &params)?;
        assert_eq!(table.len(), 6);

        let pair = component_of(&table, "1");
        let triangle = component_of(&table, "4");
        assert!(pair >= 0);
        assert!(triangle >= 0);
        assert_ne!(pair, triangle);
        assert_eq!(component_of(&table, "2"), pair);
        assert_eq!(component_of(&table, "5"), triangle);
        assert_eq!(component_of(&table, "6"), triangle);
        assert_eq!(component_of(&table, "3"), SINGLETON_COMPONENT);

        for row in table.iter() {
            let spectrum = spectra
                .iter()
                .find(|s| s.feature_id == row.feature_id)
                .unwrap();
            assert_eq!(row.precursor_mz, spectrum.precursor_mz);
        }

        let graph = fs::read_to_string(&graph_path)?;
        assert_eq!(graph.matches("<node ").count(), 6);
        assert_eq!(graph.matches("<edge ").count(), 4);

        let written = ComponentTable::read_tsv(fs::File::open(&table_path)?)?;
        assert_eq!(written, table);
        Ok(())
    }

    #[test]
    fn test_no_surviving_edges() -> Result<(), Box<dyn std::error::Error>> {
        let spectra = unrelated_spectra();
        let dir = tempfile::tempdir()?;
        let graph_path = dir.path().join("graph.graphml");
        let table_path = dir.path().join("components.tsv");
        let params = MolecularNetworkParams::new(0.01, 0.95, 5, 2);

        let table = generate_molecular_network(&spectra, &graph_path, &table_path, &params)?;
        assert_eq!(table.len(), 3);
        assert!(table.iter().all(|row| row.component_id == SINGLETON_COMPONENT));

        let graph = fs::read_to_string(&graph_path)?;
        assert_eq!(graph.matches("<node ").count(), 3);
        assert_eq!(graph.matches("<edge ").count(), 0);
        Ok(())
    }

    #[test]
    fn test_rerun_is_identical() -> Result<(), Box<dyn std::error::Error>> {
        let spectra = read_spectra("./tests/data/small_network.mgf")?;
        let dir = tempfile::tempdir()?;
        let graph_path = dir.path().join("graph.json");
        let table_path = dir.path().join("components.tsv");
        let params = MolecularNetworkParams::default();

        let first = generate_molecular_network(&spectra, &graph_path, &table_path, &params)?;
        let first_text = fs::read_to_string(&table_path)?;
        let second = generate_molecular_network(&spectra, &graph_path, &table_path, &params)?;
        let second_text = fs::read_to_string(&table_path)?;
        assert_eq!(first, second);
        assert_eq!(first_text, second_text);

        let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&graph_path)?)?;
        assert_eq!(doc["elements"]["nodes"].as_array().unwrap().len(), 6);
        Ok(())
    }

    #[test]
    fn test_partition_matches_network() -> Result<(), MolecularNetworkError> {
        let spectra = unrelated_spectra();
        let mut network = build_molecular_network(&spectra, &MolecularNetworkParams::default())?;
        let a = network.index_of("a").unwrap();
        let b = network.index_of("b").unwrap();
        network.add_edge(a, b, crate::scorer::SimilarityScore::new(0.9, 1));

        let table = label_components(&network, &spectra);
        let ids: HashSet<ComponentId> = table
            .iter()
            .filter(|r| !r.is_singleton())
            .map(|r| r.component_id)
            .collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(component_of(&table, "a"), component_of(&table, "b"));
        assert_eq!(component_of(&table, "c"), SINGLETON_COMPONENT);
        Ok(())
    }

    #[test]
    fn test_top_n_below_max_links() {
        let spectra = unrelated_spectra();
        let dir = tempfile::tempdir().unwrap();
        let graph_path = dir.path().join("graph.graphml");
        let params = MolecularNetworkParams::new(0.01, 0.7, 1, 3);
        let err = generate_molecular_network(
            &spectra,
            &graph_path,
            dir.path().join("components.tsv"),
            &params,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MolecularNetworkError::NetworkError(NetworkError::TopNBelowMaxLinks {
                top_n: 1,
                max_links: 3
            })
        ));
        assert!(!graph_path.exists());
    }
}
