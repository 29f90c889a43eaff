//! Louvain community detection (Blondel et al. 2008).
//!
//! Each level moves single nodes to the neighboring community with the best
//! modularity gain until no move helps, then collapses communities into nodes
//! and repeats. Nodes are visited in index order and a move only happens on a
//! strictly better gain, with the lowest community id winning among equals,
//! so the same graph always yields the same partition.

use std::collections::BTreeMap;

use petgraph::visit::EdgeRef;
use tracing::debug;

use super::AnalysisKind;
use crate::error::AnalysisSkipped;
use crate::graph::TaxGraph;

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Community id per node, indexed by `NodeIndex::index()`. Ids are dense
    /// and numbered in order of each community's first node.
    pub membership: Vec<usize>,
    pub modularity: f64,
}

impl Partition {
    pub fn community_count(&self) -> usize {
        self.membership.iter().max().map_or(0, |max| max + 1)
    }
}

/// Weighted graph used inside the Louvain levels.
struct Level {
    /// Symmetric weights between distinct nodes.
    links: Vec<BTreeMap<usize, f64>>,
    /// Internal weight collapsed into each node.
    loops: Vec<f64>,
}

impl Level {
    fn from_graph(graph: &TaxGraph) -> Self {
        let g = graph.inner();
        let n = g.node_count();
        let mut level = Level {
            links: vec![BTreeMap::new(); n],
            loops: vec![0.0; n],
        };
        for edge in g.edge_references() {
            let (a, b) = (edge.source().index(), edge.target().index());
            level.connect(a, b, *edge.weight());
        }
        level
    }

    fn len(&self) -> usize {
        self.links.len()
    }

    fn connect(&mut self, a: usize, b: usize, weight: f64) {
        if a == b {
            self.loops[a] += weight;
        } else {
            *self.links[a].entry(b).or_insert(0.0) += weight;
            *self.links[b].entry(a).or_insert(0.0) += weight;
        }
    }

    fn degree(&self, node: usize) -> f64 {
        self.links[node].values().sum::<f64>() + 2.0 * self.loops[node]
    }

    /// Local moving phase. Returns dense community ids and whether any node moved.
    fn one_pass(&self) -> (Vec<usize>, bool) {
        let n = self.len();
        let degrees: Vec<f64> = (0..n).map(|i| self.degree(i)).collect();
        let total: f64 = degrees.iter().sum();
        let mut community: Vec<usize> = (0..n).collect();
        let mut tot = degrees.clone();
        let mut moved_any = false;

        loop {
            let mut moved = false;
            for node in 0..n {
                let current = community[node];
                let k = degrees[node];

                let mut towards: BTreeMap<usize, f64> = BTreeMap::new();
                for (&neighbor, &weight) in &self.links[node] {
                    *towards.entry(community[neighbor]).or_insert(0.0) += weight;
                }

                tot[current] -= k;
                let gain = |c: usize, w: f64| w - tot[c] * k / total;
                let mut best = current;
                let mut best_gain = gain(current, towards.get(&current).copied().unwrap_or(0.0));
                for (&candidate, &weight) in &towards {
                    let candidate_gain = gain(candidate, weight);
                    if candidate_gain > best_gain + MIN_GAIN {
                        best = candidate;
                        best_gain = candidate_gain;
                    }
                }
                tot[best] += k;

                if best != current {
                    community[node] = best;
                    moved = true;
                    moved_any = true;
                }
            }
            if !moved {
                break;
            }
        }

        (renumber(&community), moved_any)
    }

    fn aggregate(&self, community: &[usize]) -> Level {
        let size = community.iter().max().map_or(0, |max| max + 1);
        let mut next = Level {
            links: vec![BTreeMap::new(); size],
            loops: vec![0.0; size],
        };
        for node in 0..self.len() {
            next.loops[community[node]] += self.loops[node];
            for (&neighbor, &weight) in &self.links[node] {
                // Each undirected link is stored twice; take it once.
                if node < neighbor {
                    next.connect(community[node], community[neighbor], weight);
                }
            }
        }
        next
    }
}

/// Relabels ids to 0.. in order of first appearance.
fn renumber(community: &[usize]) -> Vec<usize> {
    let mut mapping = BTreeMap::new();
    community
        .iter()
        .map(|&c| {
            let next = mapping.len();
            *mapping.entry(c).or_insert(next)
        })
        .collect()
}

/// Newman modularity of `membership` on the weighted graph.
pub fn modularity(graph: &TaxGraph, membership: &[usize]) -> f64 {
    let g = graph.inner();
    let m: f64 = g.edge_weights().sum();
    if m <= 0.0 {
        return 0.0;
    }
    let size = membership.iter().max().map_or(0, |max| max + 1);
    let mut internal = vec![0.0; size];
    let mut degree = vec![0.0; size];
    for edge in g.edge_references() {
        let (a, b) = (membership[edge.source().index()], membership[edge.target().index()]);
        let w = *edge.weight();
        degree[a] += w;
        degree[b] += w;
        if a == b {
            internal[a] += w;
        }
    }
    internal
        .iter()
        .zip(&degree)
        .map(|(l, d)| l / m - (d / (2.0 * m)).powi(2))
        .sum()
}

/// Modularity-maximizing partition over edge weights.
pub fn louvain(graph: &TaxGraph) -> Result<Partition, AnalysisSkipped> {
    let g = graph.inner();
    if g.edge_count() == 0 {
        return Err(AnalysisSkipped::new(
            AnalysisKind::Communities,
            "graph has no edges",
        ));
    }
    if g.edge_weights().any(|w| *w < 0.0) {
        return Err(AnalysisSkipped::new(
            AnalysisKind::Communities,
            "negative edge weights",
        ));
    }
    if g.edge_weights().sum::<f64>() <= 0.0 {
        return Err(AnalysisSkipped::new(
            AnalysisKind::Communities,
            "total edge weight is zero",
        ));
    }

    let mut membership: Vec<usize> = (0..g.node_count()).collect();
    let mut level = Level::from_graph(graph);
    let mut levels = 0;
    loop {
        let (community, moved) = level.one_pass();
        if !moved {
            break;
        }
        levels += 1;
        for c in membership.iter_mut() {
            *c = community[*c];
        }
        level = level.aggregate(&community);
    }

    let membership = renumber(&membership);
    debug!("Louvain settled after {levels} level(s)");
    Ok(Partition {
        modularity: modularity(graph, &membership),
        membership,
    })
}
