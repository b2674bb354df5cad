//! Inheritance graph.
//!
//! Uses `petgraph::DiGraph` with one node per class and an edge from each
//! class to its direct superclass.

use classforge_core::QualifiedName;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

/// Directed subclass → superclass graph.
#[derive(Debug, Default)]
pub struct InheritanceGraph {
    graph: DiGraph<QualifiedName, ()>,
    nodes: FxHashMap<QualifiedName, NodeIndex>,
}

impl InheritanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, name: &QualifiedName) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.clone());
        self.nodes.insert(name.clone(), idx);
        idx
    }

    /// Record that `class` directly extends `superclass`.
    pub fn add_edge(&mut self, class: &QualifiedName, superclass: &QualifiedName) {
        let from = self.node(class);
        let to = self.node(superclass);
        self.graph.update_edge(from, to, ());
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.nodes.contains_key(name)
    }

    /// Every set of classes that inherits from itself, members sorted by name.
    pub fn cycles(&self) -> Vec<Vec<QualifiedName>> {
        let mut cycles: Vec<Vec<QualifiedName>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.graph.contains_edge(component[0], component[0])
            })
            .map(|component| {
                let mut names: Vec<QualifiedName> =
                    component.into_iter().map(|idx| self.graph[idx].clone()).collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Whether `name` sits on an inheritance cycle.
    pub fn is_cyclic(&self, name: &QualifiedName) -> bool {
        self.cycles().iter().any(|cycle| cycle.contains(name))
    }
}
