//! Graph analyses over a built [`TaxGraph`].
//!
//! Every analysis is a pure function of the graph: it never mutates it and the
//! analyses can run in any order.
//!
//! | Analysis | Question Answered | Complexity |
//! |----------|-------------------|------------|
//! | Degree | How many states/years does a node touch? | O(V) |
//! | Betweenness | Which nodes sit on cheapest paths? | O(V³) |
//! | Components | Which nodes can reach each other? | O(V + E) |
//! | Shortest paths | How many hops apart are two nodes? | O(V(V + E)) |
//! | Communities | Which nodes cluster together? | O(E) per pass |
//!
//! Betweenness treats an edge weight as a *distance*: a large tax amount makes
//! an edge expensive to traverse, so the scores describe path cost, not flow
//! capacity.

mod centrality;
mod community;
mod components;
mod paths;

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisSkipped;
use crate::graph::TaxGraph;

pub use centrality::{betweenness_centrality, degree_centrality};
pub use community::{louvain, modularity, Partition};
pub use components::connected_components;
pub use paths::{all_pairs_shortest_paths, PathLength, PathLengths};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisKind {
    Degree,
    Betweenness,
    Components,
    ShortestPaths,
    Communities,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 5] = [
        AnalysisKind::Degree,
        AnalysisKind::Betweenness,
        AnalysisKind::Components,
        AnalysisKind::ShortestPaths,
        AnalysisKind::Communities,
    ];

    /// File name stem of the reports for this analysis.
    pub fn stem(&self) -> &'static str {
        match self {
            AnalysisKind::Degree => "centrality",
            AnalysisKind::Betweenness => "betweenness",
            AnalysisKind::Components => "connected_components",
            AnalysisKind::ShortestPaths => "shortest_paths",
            AnalysisKind::Communities => "communities",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AnalysisKind::Degree => "Grau de Centralidade",
            AnalysisKind::Betweenness => "Centralidade de Intermediação",
            AnalysisKind::Components => "Componentes Conexas",
            AnalysisKind::ShortestPaths => "Caminhos Mais Curtos",
            AnalysisKind::Communities => "Comunidades Detectadas",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisKind::Degree => "degree",
            AnalysisKind::Betweenness => "betweenness",
            AnalysisKind::Components => "components",
            AnalysisKind::ShortestPaths => "shortest-paths",
            AnalysisKind::Communities => "communities",
        };
        f.write_str(name)
    }
}

/// Output of one analysis on one graph.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    /// Score per node, indexed by `NodeIndex::index()`.
    CentralityScores(Vec<f64>),
    ComponentList(Vec<Vec<NodeIndex>>),
    PathLengths(PathLengths),
    Partition(Partition),
}

/// Runs `kind` on `graph`.
pub fn run(kind: AnalysisKind, graph: &TaxGraph) -> Result<AnalysisResult, AnalysisSkipped> {
    if graph.node_count() == 0 {
        return Err(AnalysisSkipped::new(kind, "graph has no nodes"));
    }
    match kind {
        AnalysisKind::Degree => Ok(AnalysisResult::CentralityScores(degree_centrality(graph))),
        AnalysisKind::Betweenness => {
            betweenness_centrality(graph).map(AnalysisResult::CentralityScores)
        }
        AnalysisKind::Components => Ok(AnalysisResult::ComponentList(connected_components(graph))),
        AnalysisKind::ShortestPaths => {
            Ok(AnalysisResult::PathLengths(all_pairs_shortest_paths(graph)))
        }
        AnalysisKind::Communities => louvain(graph).map(AnalysisResult::Partition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::scenario_graph;
    use crate::graph::Scope;

    #[test]
    fn test_run_every_kind_on_scenario() {
        let graph = scenario_graph();
        for kind in AnalysisKind::ALL {
            let result = run(kind, &graph).unwrap();
            match (kind, result) {
                (
                    AnalysisKind::Degree | AnalysisKind::Betweenness,
                    AnalysisResult::CentralityScores(s),
                ) => assert_eq!(s.len(), 4),
                (AnalysisKind::Components, AnalysisResult::ComponentList(c)) => {
                    assert_eq!(c.len(), 1)
                }
                (AnalysisKind::ShortestPaths, AnalysisResult::PathLengths(p)) => {
                    assert_eq!(p.len(), 16)
                }
                (AnalysisKind::Communities, AnalysisResult::Partition(p)) => {
                    assert_eq!(p.membership.len(), 4)
                }
                (kind, other) => panic!("unexpected result for {kind}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_graph_is_skipped() {
        let graph = TaxGraph::new(Scope::Year(1999));
        for kind in AnalysisKind::ALL {
            let skipped = run(kind, &graph).unwrap_err();
            assert_eq!(skipped.kind, kind);
            assert_eq!(skipped.reason, "graph has no nodes");
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(AnalysisKind::ShortestPaths.to_string(), "shortest-paths");
        assert_eq!(
            serde_json::to_string(&AnalysisKind::ShortestPaths).unwrap(),
            "\"shortest-paths\""
        );
        assert_eq!(AnalysisKind::Degree.stem(), "centrality");
    }
}
