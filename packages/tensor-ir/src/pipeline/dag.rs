//! Pass dependency DAG
//!
//! An edge `A -> B` means A must run before B (B lists A in `required`).
//! Independent passes are ordered by ascending opt-level, then input order.

use crate::features::transform::{Pass, PassError, PassResult};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

pub struct PassDAG {
    /// Node weights are indices into the input pass slice
    graph: DiGraph<usize, ()>,

    name_to_node: FxHashMap<String, NodeIndex>,

    names: Vec<String>,

    /// Cached topological execution order, as input indices
    execution_order: Vec<usize>,
}

impl PassDAG {
    /// Build the DAG and resolve the execution order
    ///
    /// # Errors
    /// - `DuplicatePass` when two passes share a name
    /// - `Dependency` when a `required` name is not in `passes`
    /// - `Cycle` when the requirements are circular
    pub fn build(passes: &[Pass]) -> PassResult<Self> {
        let mut graph = DiGraph::with_capacity(passes.len(), passes.len());
        let mut name_to_node = FxHashMap::default();

        for (index, pass) in passes.iter().enumerate() {
            let node = graph.add_node(index);
            if name_to_node.insert(pass.name().to_string(), node).is_some() {
                return Err(PassError::DuplicatePass(pass.name().to_string()));
            }
        }

        for pass in passes {
            let to = name_to_node[pass.name()];
            for required in pass.required() {
                let from = *name_to_node
                    .get(required)
                    .ok_or_else(|| PassError::dependency(pass.name(), required.as_str()))?;
                graph.update_edge(from, to, ());
            }
        }

        let names: Vec<String> = passes.iter().map(|p| p.name().to_string()).collect();
        if let Some(members) = Self::find_cycle(&graph, &names) {
            return Err(PassError::Cycle { members });
        }

        let levels: Vec<u8> = passes.iter().map(Pass::opt_level).collect();
        let execution_order = Self::priority_order(&graph, &levels);

        tracing::debug!(
            passes = passes.len(),
            dependencies = graph.edge_count(),
            "built pass DAG"
        );

        Ok(Self {
            graph,
            name_to_node,
            names,
            execution_order,
        })
    }

    /// First circular component by input position, members in input order
    fn find_cycle(graph: &DiGraph<usize, ()>, names: &[String]) -> Option<Vec<String>> {
        tarjan_scc(graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || graph.contains_edge(component[0], component[0])
            })
            .map(|component| {
                let mut indices: Vec<usize> = component.iter().map(|&n| graph[n]).collect();
                indices.sort_unstable();
                indices
            })
            .min_by_key(|indices| indices[0])
            .map(|indices| indices.into_iter().map(|i| names[i].clone()).collect())
    }

    /// Kahn's algorithm, always releasing the ready pass with the lowest
    /// `(opt_level, input index)`
    fn priority_order(graph: &DiGraph<usize, ()>, levels: &[u8]) -> Vec<usize> {
        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<(u8, usize)>> = graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .map(|n| Reverse((levels[graph[n]], graph[n])))
            .collect();

        let mut order = Vec::with_capacity(levels.len());
        while let Some(Reverse((_, index))) = ready.pop() {
            order.push(index);
            for next in graph.neighbors_directed(NodeIndex::new(index), Direction::Outgoing) {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    ready.push(Reverse((levels[graph[next]], graph[next])));
                }
            }
        }
        order
    }

    /// Input indices in execution order
    pub fn execution_order(&self) -> &[usize] {
        &self.execution_order
    }

    /// Pass names in execution order
    pub fn ordered_names(&self) -> Vec<&str> {
        self.execution_order
            .iter()
            .map(|&i| self.names[i].as_str())
            .collect()
    }

    /// Direct requirements of a pass
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Passes that directly require `name`
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(&node) = self.name_to_node.get(name) else {
            return Vec::new();
        };
        let mut indices: Vec<usize> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n])
            .collect();
        indices.sort_unstable();
        indices.into_iter().map(|i| self.names[i].as_str()).collect()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }
}
