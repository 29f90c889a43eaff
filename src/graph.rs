//! Bipartite state/partner graph built from tax records.
//!
//! States form one node class; years (or tax categories, in the
//! state-category mode) form the other. Edges always join the two classes and
//! carry the aggregated amount for that pair.

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use tracing::debug;

use crate::config::{GraphConfig, GraphMode};
use crate::error::GraphConstructionError;
use crate::records::TaxRecord;

/// Which records a graph covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    All,
    Year(i32),
}

impl Scope {
    pub fn contains(&self, record: &TaxRecord) -> bool {
        match self {
            Scope::All => true,
            Scope::Year(year) => record.year == *year,
        }
    }

    /// Human-readable suffix for report titles.
    pub fn title(&self) -> String {
        match self {
            Scope::All => "em Todos os Anos".to_string(),
            Scope::Year(year) => format!("no Ano {year}"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => write!(f, "all"),
            Scope::Year(year) => write!(f, "{year}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateNode {
    pub code: String,
    /// Sum of the weights of every edge touching this state.
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearNode {
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryNode {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Node {
    State(StateNode),
    Year(YearNode),
    Category(CategoryNode),
}

/// The two sides of the bipartition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeClass {
    State,
    Partner,
}

/// Identity of a node: no two nodes of a graph share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    State(String),
    Year(i32),
    Category(String),
}

impl Node {
    pub fn state(code: impl Into<String>) -> Self {
        Node::State(StateNode {
            code: code.into(),
            total: 0.0,
        })
    }

    pub fn year(year: i32) -> Self {
        Node::Year(YearNode { year })
    }

    pub fn category(name: impl Into<String>) -> Self {
        Node::Category(CategoryNode { name: name.into() })
    }

    pub fn class(&self) -> NodeClass {
        match self {
            Node::State(_) => NodeClass::State,
            Node::Year(_) | Node::Category(_) => NodeClass::Partner,
        }
    }

    pub fn key(&self) -> NodeKey {
        match self {
            Node::State(state) => NodeKey::State(state.code.clone()),
            Node::Year(year) => NodeKey::Year(year.year),
            Node::Category(category) => NodeKey::Category(category.name.clone()),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::State(state) => write!(f, "{}", state.code),
            Node::Year(year) => write!(f, "{}", year.year),
            Node::Category(category) => write!(f, "{}", category.name),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub records_used: usize,
    pub records_out_of_scope: usize,
}

/// An undirected bipartite graph for one scope. Node indices follow
/// insertion order, which is the order nodes first appear in the input.
#[derive(Debug, Clone)]
pub struct TaxGraph {
    scope: Scope,
    graph: UnGraph<Node, f64>,
    index: HashMap<NodeKey, NodeIndex>,
    stats: BuildStats,
}

impl TaxGraph {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            graph: UnGraph::new_undirected(),
            index: HashMap::new(),
            stats: BuildStats::default(),
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    pub fn inner(&self) -> &UnGraph<Node, f64> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn density(&self) -> f64 {
        let n = self.node_count() as f64;
        if n < 2.0 {
            0.0
        } else {
            2.0 * self.edge_count() as f64 / (n * (n - 1.0))
        }
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.graph[idx]
    }

    pub fn find(&self, key: &NodeKey) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }

    pub fn label(&self, idx: NodeIndex) -> String {
        self.graph[idx].to_string()
    }

    pub fn weight_between(&self, a: &NodeKey, b: &NodeKey) -> Option<f64> {
        let edge = self.graph.find_edge(self.find(a)?, self.find(b)?)?;
        self.graph.edge_weight(edge).copied()
    }

    /// Returns the existing node with the same key, or inserts `node`.
    pub fn ensure_node(&mut self, node: Node) -> NodeIndex {
        let key = node.key();
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(node);
        self.index.insert(key, idx);
        idx
    }

    /// Adds `weight` to the edge between `a` and `b`, creating it if needed.
    pub fn add_weight(
        &mut self,
        a: NodeIndex,
        b: NodeIndex,
        weight: f64,
        record: &TaxRecord,
    ) -> Result<(), GraphConstructionError> {
        if self.graph[a].class() == self.graph[b].class() {
            return Err(GraphConstructionError::SameClassEdge {
                scope: self.scope,
                left: self.label(a),
                right: self.label(b),
                record: record.to_string(),
            });
        }

        let total = match self.graph.find_edge(a, b) {
            Some(edge) => {
                let current = &mut self.graph[edge];
                *current += weight;
                *current
            }
            None => {
                self.graph.add_edge(a, b, weight);
                weight
            }
        };
        if !total.is_finite() {
            return Err(GraphConstructionError::NonFiniteWeight {
                scope: self.scope,
                weight: total,
                record: record.to_string(),
            });
        }

        for idx in [a, b] {
            if let Node::State(state) = &mut self.graph[idx] {
                state.total += weight;
            }
        }
        Ok(())
    }

    /// Neighbors with the weight of the connecting edge.
    pub fn weighted_neighbors(
        &self,
        idx: NodeIndex,
    ) -> impl Iterator<Item = (NodeIndex, f64)> + '_ {
        self.graph.edges(idx).map(move |edge| {
            let other = if edge.source() == idx {
                edge.target()
            } else {
                edge.source()
            };
            (other, *edge.weight())
        })
    }
}

/// Builds the graph for `scope` from `records`.
///
/// Repeated (state, partner) pairs are summed into a single edge. Each
/// record's contribution goes through the configured negative-amount policy
/// before it is added.
pub fn build_graph(
    records: &[TaxRecord],
    scope: Scope,
    config: &GraphConfig,
) -> Result<TaxGraph, GraphConstructionError> {
    let mut graph = TaxGraph::new(scope);

    for record in records {
        if !scope.contains(record) {
            graph.stats.records_out_of_scope += 1;
            continue;
        }
        graph.stats.records_used += 1;

        let state = graph.ensure_node(Node::state(record.state.as_str()));
        match config.mode {
            GraphMode::StateYear => {
                let year = graph.ensure_node(Node::year(record.year));
                let contributing: Vec<f64> = record
                    .amounts
                    .iter()
                    .filter(|(category, _)| config.weight.includes(category))
                    .map(|(_, amount)| *amount)
                    .collect();
                if contributing.is_empty() {
                    debug!("{scope}: record {record} has no amount for the weight source");
                }
                let weight = config.negative.apply(contributing.iter().sum());
                graph.add_weight(state, year, weight, record)?;
            }
            GraphMode::StateCategory => {
                for (category, amount) in &record.amounts {
                    if !config.weight.includes(category) {
                        continue;
                    }
                    let partner = graph.ensure_node(Node::category(category.as_str()));
                    graph.add_weight(state, partner, config.negative.apply(*amount), record)?;
                }
            }
        }
    }

    debug!(
        "{scope}: built graph with {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

/// Years in order of first appearance.
pub fn distinct_years(records: &[TaxRecord]) -> Vec<i32> {
    let mut years = Vec::new();
    for record in records {
        if !years.contains(&record.year) {
            years.push(record.year);
        }
    }
    years
}
