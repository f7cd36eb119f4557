//! Sparse similarity networks built by thresholding a [`ScoreMatrix`]
use std::collections::HashMap;

use identity_hash::BuildIdentityHasher;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::scorer::{ScoreType, SimilarityScore};
use crate::scores::ScoreMatrix;
use crate::spectrum::FeatureSpectrum;

pub type NodeIndex = usize;
pub type EdgeIndex = usize;

/// Maps a neighboring node to the edge connecting it
pub type NeighborMap = HashMap<NodeIndex, EdgeIndex, BuildIdentityHasher<NodeIndex>>;

/// How to decide whether a candidate link between two spectra becomes an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkMethod {
    /// Link A and B if B is among A's top candidates, or vice-versa
    #[default]
    Single,
    /// Link A and B only if each is among the other's top candidates
    Mutual,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkParams {
    /// The minimum score a link must have to be kept
    pub score_cutoff: ScoreType,
    /// The number of highest scoring neighbors of each spectrum to consider linking to
    pub top_n: usize,
    /// The maximum number of links each spectrum may add
    pub max_links: usize,
    pub link_method: LinkMethod,
    /// Whether to retain nodes that have no edges
    pub keep_unconnected_nodes: bool,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            score_cutoff: 0.7,
            top_n: 10,
            max_links: 10,
            link_method: LinkMethod::Single,
            keep_unconnected_nodes: true,
        }
    }
}

impl NetworkParams {
    pub fn new(
        score_cutoff: ScoreType,
        top_n: usize,
        max_links: usize,
        link_method: LinkMethod,
    ) -> Self {
        Self {
            score_cutoff,
            top_n,
            max_links,
            link_method,
            keep_unconnected_nodes: true,
        }
    }
}

/// An error that might occur while building a [`SimilarityNetwork`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    #[error("top_n ({top_n}) must be greater than or equal to max_links ({max_links})")]
    TopNBelowMaxLinks { top_n: usize, max_links: usize },
    #[error("A score matrix of shape {0:?} cannot describe {1} spectra")]
    ShapeMismatch((usize, usize), usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkNode {
    pub feature_id: String,
    pub precursor_mz: Option<f64>,
}

/// An undirected, weighted link between two nodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkEdge {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub score: ScoreType,
    pub matches: usize,
}

impl NetworkEdge {
    pub fn other(&self, node: NodeIndex) -> NodeIndex {
        if self.source == node {
            self.target
        } else {
            self.source
        }
    }
}

/// An undirected graph of spectra keyed by feature ID, whose edges carry the
/// similarity between their endpoints.
///
/// Nodes are kept in insertion order, and adding an existing feature ID or an
/// existing edge updates it in place.
#[derive(Debug, Clone, Default)]
pub struct SimilarityNetwork {
    nodes: Vec<NetworkNode>,
    node_index: HashMap<String, NodeIndex>,
    edges: Vec<NetworkEdge>,
    adjacency: Vec<NeighborMap>,
}

impl SimilarityNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            node_index: HashMap::with_capacity(capacity),
            edges: Vec::new(),
            adjacency: Vec::with_capacity(capacity),
        }
    }

    pub fn add_node(&mut self, feature_id: &str, precursor_mz: Option<f64>) -> NodeIndex {
        if let Some(idx) = self.node_index.get(feature_id) {
            return *idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(NetworkNode {
            feature_id: feature_id.to_string(),
            precursor_mz,
        });
        self.node_index.insert(feature_id.to_string(), idx);
        self.adjacency.push(NeighborMap::default());
        idx
    }

    /// Connect two nodes, returning the edge index, or `None` for a self-loop.
    ///
    /// # Panics
    /// If either node index is out of bounds
    pub fn add_edge(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        score: SimilarityScore,
    ) -> Option<EdgeIndex> {
        if source == target {
            return None;
        }
        if let Some(edge_idx) = self.adjacency[source].get(&target).copied() {
            let edge = &mut self.edges[edge_idx];
            edge.score = score.score;
            edge.matches = score.matches;
            return Some(edge_idx);
        }
        let edge_idx = self.edges.len();
        self.edges.push(NetworkEdge {
            source,
            target,
            score: score.score,
            matches: score.matches,
        });
        self.adjacency[source].insert(target, edge_idx);
        self.adjacency[target].insert(source, edge_idx);
        Some(edge_idx)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NetworkNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[NetworkEdge] {
        &self.edges
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&NetworkNode> {
        self.nodes.get(idx)
    }

    pub fn index_of(&self, feature_id: &str) -> Option<NodeIndex> {
        self.node_index.get(feature_id).copied()
    }

    pub fn contains_node(&self, feature_id: &str) -> bool {
        self.node_index.contains_key(feature_id)
    }

    pub fn find_edge(&self, a: &str, b: &str) -> Option<&NetworkEdge> {
        let a = self.index_of(a)?;
        let b = self.index_of(b)?;
        self.adjacency[a].get(&b).map(|i| &self.edges[*i])
    }

    pub fn neighbors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.adjacency[idx].keys().copied()
    }

    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.adjacency[idx].len()
    }

    /// Remove all nodes without edges, re-indexing the remaining nodes and edges
    pub fn remove_isolated_nodes(&mut self) {
        let mut network = Self::with_capacity(self.nodes.len());
        let mut remapped: Vec<Option<NodeIndex>> = vec![None; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            if self.adjacency[i].is_empty() {
                continue;
            }
            remapped[i] = Some(network.add_node(&node.feature_id, node.precursor_mz));
        }
        for edge in self.edges.iter() {
            if let (Some(source), Some(target)) = (remapped[edge.source], remapped[edge.target]) {
                network.add_edge(source, target, SimilarityScore::new(edge.score, edge.matches));
            }
        }
        debug!(
            "Removed {} isolated nodes",
            self.node_count() - network.node_count()
        );
        *self = network;
    }
}

/// Builds a [`SimilarityNetwork`] from pairwise scores by keeping, for each spectrum,
/// only its best scoring links.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkBuilder {
    pub params: NetworkParams,
}

impl NetworkBuilder {
    pub fn new(params: NetworkParams) -> Self {
        Self { params }
    }

    /// For each row of `scores`, the `top_n` highest scoring columns other than itself,
    /// best first, ties broken by column.
    fn select_edge_candidates(&self, scores: &ScoreMatrix) -> Vec<Vec<(usize, SimilarityScore)>> {
        scores
            .rows()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .copied()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .sorted_by(|(ja, a), (jb, b)| b.score.total_cmp(&a.score).then(ja.cmp(jb)))
                    .take(self.params.top_n)
                    .collect()
            })
            .collect()
    }

    /// Build the network over `spectra` from their symmetric `scores`.
    ///
    /// Spectra sharing a feature ID are merged into the same node.
    pub fn create_network(
        &self,
        scores: &ScoreMatrix,
        spectra: &[FeatureSpectrum],
    ) -> Result<SimilarityNetwork, NetworkError> {
        let params = &self.params;
        if params.top_n < params.max_links {
            return Err(NetworkError::TopNBelowMaxLinks {
                top_n: params.top_n,
                max_links: params.max_links,
            });
        }
        let shape = scores.shape();
        if shape != (spectra.len(), spectra.len()) {
            return Err(NetworkError::ShapeMismatch(shape, spectra.len()));
        }

        let mut network = SimilarityNetwork::with_capacity(spectra.len());
        let node_of: Vec<NodeIndex> = spectra
            .iter()
            .map(|s| network.add_node(&s.feature_id, s.precursor_mz))
            .collect();
        if network.node_count() != spectra.len() {
            warn!(
                "{} spectra share a feature ID with another spectrum",
                spectra.len() - network.node_count()
            );
        }

        let candidates = self.select_edge_candidates(scores);
        for (i, row_candidates) in candidates.iter().enumerate() {
            let links = row_candidates
                .iter()
                .filter(|(_, score)| score.score >= params.score_cutoff)
                .take(params.max_links);
            for (j, score) in links {
                let keep = match params.link_method {
                    LinkMethod::Single => true,
                    LinkMethod::Mutual => candidates[*j].iter().any(|(k, _)| *k == i),
                };
                if keep {
                    network.add_edge(node_of[i], node_of[*j], *score);
                }
            }
        }

        if !params.keep_unconnected_nodes {
            network.remove_isolated_nodes();
        }
        debug!(
            "Built network with {} nodes and {} edges",
            network.node_count(),
            network.edge_count()
        );
        Ok(network)
    }
}
