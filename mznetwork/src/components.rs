//! Connected component labeling of a [`SimilarityNetwork`]
use std::collections::{HashMap, VecDeque};

use tracing::trace;

use crate::network::{NodeIndex, SimilarityNetwork};

pub type ComponentId = i64;

/// The component ID given to every node whose component has only one member
pub const SINGLETON_COMPONENT: ComponentId = -1;

/// The component a single feature was assigned to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentAssignment {
    pub feature_id: String,
    pub component_id: ComponentId,
}

impl ComponentAssignment {
    pub fn new(feature_id: String, component_id: ComponentId) -> Self {
        Self {
            feature_id,
            component_id,
        }
    }
}

/// Visits the connected components of a network one at a time, starting each
/// new component from the earliest node that has not been visited yet.
struct BreadthFirstTraversal<'a> {
    graph: &'a SimilarityNetwork,
    visited: Vec<bool>,
    /// The next node index to check for a new component
    cursor: usize,
}

impl<'a> BreadthFirstTraversal<'a> {
    fn new(graph: &'a SimilarityNetwork) -> Self {
        Self {
            graph,
            visited: vec![false; graph.node_count()],
            cursor: 0,
        }
    }

    fn visit(&mut self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut component = Vec::new();
        let mut queue = VecDeque::from(vec![node]);
        self.visited[node] = true;
        while let Some(node) = queue.pop_front() {
            component.push(node);
            for neighbor in self.graph.neighbors(node) {
                if !self.visited[neighbor] {
                    self.visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
        component.sort_unstable();
        component
    }
}

impl<'a> Iterator for BreadthFirstTraversal<'a> {
    type Item = Vec<NodeIndex>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.visited.len() {
            let node = self.cursor;
            self.cursor += 1;
            if !self.visited[node] {
                return Some(self.visit(node));
            }
        }
        None
    }
}

/// The connected components of `graph`, each sorted by node index.
///
/// Components are ordered by their lowest node index.
pub fn connected_components(graph: &SimilarityNetwork) -> Vec<Vec<NodeIndex>> {
    BreadthFirstTraversal::new(graph).collect()
}

/// Assign every node of `graph` the enumeration index of its connected component.
///
/// Assignments are grouped by component. Only which nodes share an ID is
/// meaningful, the ID values themselves are not.
pub fn partition_components(graph: &SimilarityNetwork) -> Vec<ComponentAssignment> {
    let mut assignments = Vec::with_capacity(graph.node_count());
    for (component_id, members) in connected_components(graph).into_iter().enumerate() {
        trace!("Component {component_id} has {} members", members.len());
        assignments.extend(members.into_iter().filter_map(|idx| {
            graph.node(idx).map(|node| {
                ComponentAssignment::new(node.feature_id.clone(), component_id as ComponentId)
            })
        }));
    }
    assignments
}

/// Replace the component ID of every component with only one member by
/// [`SINGLETON_COMPONENT`], leaving the others unchanged.
pub fn relabel_singletons(mut assignments: Vec<ComponentAssignment>) -> Vec<ComponentAssignment> {
    let mut sizes: HashMap<ComponentId, usize> = HashMap::new();
    for assignment in assignments.iter() {
        *sizes.entry(assignment.component_id).or_default() += 1;
    }
    for assignment in assignments.iter_mut() {
        if sizes[&assignment.component_id] <= 1 {
            assignment.component_id = SINGLETON_COMPONENT;
        }
    }
    assignments
}
