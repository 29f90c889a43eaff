use std::collections::VecDeque;

use petgraph::graph::NodeIndex;

use crate::graph::TaxGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathLength {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub hops: usize,
}

/// Hop counts between every ordered pair of mutually reachable nodes,
/// including each node to itself. Unreachable pairs are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathLengths {
    entries: Vec<PathLength>,
}

impl PathLengths {
    /// Entries grouped by source in insertion order, targets in BFS order.
    pub fn entries(&self) -> &[PathLength] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn length(&self, source: NodeIndex, target: NodeIndex) -> Option<usize> {
        // Entries of one source are contiguous; find its block first.
        let start = self.entries.partition_point(|e| e.source < source);
        self.entries[start..]
            .iter()
            .take_while(|e| e.source == source)
            .find(|e| e.target == target)
            .map(|e| e.hops)
    }
}

/// Unweighted all-pairs shortest path lengths, one BFS per node.
pub fn all_pairs_shortest_paths(graph: &TaxGraph) -> PathLengths {
    let g = graph.inner();
    let n = g.node_count();
    let mut entries = Vec::new();

    for source in g.node_indices() {
        let mut hops: Vec<Option<usize>> = vec![None; n];
        hops[source.index()] = Some(0);
        let mut queue = VecDeque::from([source]);
        while let Some(node) = queue.pop_front() {
            let depth = hops[node.index()].unwrap_or_default();
            entries.push(PathLength {
                source,
                target: node,
                hops: depth,
            });
            let mut neighbors: Vec<NodeIndex> = g.neighbors(node).collect();
            neighbors.sort_unstable();
            for neighbor in neighbors {
                if hops[neighbor.index()].is_none() {
                    hops[neighbor.index()] = Some(depth + 1);
                    queue.push_back(neighbor);
                }
            }
        }
    }

    PathLengths { entries }
}
