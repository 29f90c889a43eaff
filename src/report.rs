use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use fdg_sim::{
    force::fruchterman_reingold, ForceGraph, ForceGraphHelper, Simulation, SimulationParameters,
};
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::Serialize;
use tracing::info;

use crate::analytics::{AnalysisKind, AnalysisResult};
use crate::config::OutputConfig;
use crate::error::ReportError;
use crate::graph::{Node, NodeClass, TaxGraph};

const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];
const STATE_COLOR: &str = "skyblue";
const PARTNER_COLOR: &str = "orange";
const BASE_WIDTH: f64 = 0.4;
const CENTRALITY_WIDTH: f64 = 1.6;
/// Layout units per DOT inch.
const LAYOUT_SCALE: f32 = 50.0;

/// Files written for one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmittedReport {
    pub text: PathBuf,
    pub diagram: Option<PathBuf>,
}

/// Writes text reports and DOT diagrams into one output directory.
#[derive(Debug, Clone)]
pub struct ReportEmitter {
    dir: PathBuf,
    diagrams: bool,
    layout_iterations: usize,
}

impl ReportEmitter {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            diagrams: config.diagrams,
            layout_iterations: config.layout_iterations,
        }
    }

    pub fn emit(
        &self,
        kind: AnalysisKind,
        result: &AnalysisResult,
        graph: &TaxGraph,
    ) -> Result<EmittedReport, ReportError> {
        let scope = graph.scope();
        let text = self.dir.join(format!("{}_{scope}.txt", kind.stem()));
        write_file(&text, &render_text(kind, result, graph))?;

        let diagram = if self.diagrams {
            let path = self.dir.join(format!("{}_graph_{scope}.dot", kind.stem()));
            let positions = layout(graph, self.layout_iterations);
            write_file(&path, &render_dot(graph, &node_style(result, graph), &positions))?;
            Some(path)
        } else {
            None
        };

        info!("{kind} for {scope} saved to {}", text.display());
        Ok(EmittedReport { text, diagram })
    }

    /// Diagram of the whole graph colored by node class.
    pub fn emit_overview(&self, graph: &TaxGraph) -> Result<Option<PathBuf>, ReportError> {
        if !self.diagrams {
            return Ok(None);
        }
        let path = self
            .dir
            .join(format!("bipartite_graph_{}.dot", graph.scope()));
        let styles = graph
            .inner()
            .node_indices()
            .map(|idx| NodeStyle {
                color: class_color(graph, idx),
                width: BASE_WIDTH * 2.0,
            })
            .collect::<Vec<_>>();
        let positions = layout(graph, self.layout_iterations);
        write_file(&path, &render_dot(graph, &styles, &positions))?;
        Ok(Some(path))
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    let io_err = |source: std::io::Error| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, contents).map_err(io_err)
}

/// Plain-text listing of `result`, one entry per line after a title line.
pub fn render_text(kind: AnalysisKind, result: &AnalysisResult, graph: &TaxGraph) -> String {
    let mut out = String::new();
    let scope = graph.scope().title();
    match result {
        AnalysisResult::CentralityScores(scores) => {
            let _ = writeln!(out, "{} {scope}:", kind.title());
            let mut order: Vec<usize> = (0..scores.len()).collect();
            order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
            for idx in order {
                let _ = writeln!(out, "{}: {:.4}", graph.label(NodeIndex::new(idx)), scores[idx]);
            }
        }
        AnalysisResult::ComponentList(components) => {
            let _ = writeln!(out, "{} {scope}:", kind.title());
            for (i, component) in components.iter().enumerate() {
                let members: Vec<String> = component.iter().map(|&n| graph.label(n)).collect();
                let _ = writeln!(out, "Componente {}: {{{}}}", i + 1, members.join(", "));
            }
        }
        AnalysisResult::PathLengths(paths) => {
            let _ = writeln!(out, "{} {scope}:", kind.title());
            for entry in paths.entries() {
                let _ = writeln!(
                    out,
                    "{} -> {}: {}",
                    graph.label(entry.source),
                    graph.label(entry.target),
                    entry.hops
                );
            }
        }
        AnalysisResult::Partition(partition) => {
            let _ = writeln!(
                out,
                "{} {scope} por comunidade (modularidade {:.4}):",
                kind.title(),
                partition.modularity
            );
            let mut order: Vec<usize> = (0..partition.membership.len()).collect();
            order.sort_by_key(|&idx| partition.membership[idx]);
            for idx in order {
                let _ = writeln!(
                    out,
                    "{}: Comunidade {}",
                    graph.label(NodeIndex::new(idx)),
                    partition.membership[idx]
                );
            }
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
struct NodeStyle {
    color: &'static str,
    width: f64,
}

fn class_color(graph: &TaxGraph, idx: NodeIndex) -> &'static str {
    match graph.node(idx).class() {
        NodeClass::State => STATE_COLOR,
        NodeClass::Partner => PARTNER_COLOR,
    }
}

/// Node size follows centrality; color follows community or component id.
fn node_style(result: &AnalysisResult, graph: &TaxGraph) -> Vec<NodeStyle> {
    let g = graph.inner();
    match result {
        AnalysisResult::CentralityScores(scores) => g
            .node_indices()
            .map(|idx| NodeStyle {
                color: class_color(graph, idx),
                width: BASE_WIDTH + scores[idx.index()] * CENTRALITY_WIDTH,
            })
            .collect(),
        AnalysisResult::ComponentList(components) => {
            let mut styles = vec![
                NodeStyle {
                    color: PALETTE[0],
                    width: BASE_WIDTH * 2.0,
                };
                g.node_count()
            ];
            for (id, component) in components.iter().enumerate() {
                for node in component {
                    styles[node.index()].color = PALETTE[id % PALETTE.len()];
                }
            }
            styles
        }
        AnalysisResult::Partition(partition) => partition
            .membership
            .iter()
            .map(|&id| NodeStyle {
                color: PALETTE[id % PALETTE.len()],
                width: BASE_WIDTH * 2.0,
            })
            .collect(),
        AnalysisResult::PathLengths(_) => g
            .node_indices()
            .map(|idx| NodeStyle {
                color: class_color(graph, idx),
                width: BASE_WIDTH * 2.0,
            })
            .collect(),
    }
}

fn render_dot(graph: &TaxGraph, styles: &[NodeStyle], positions: &[(f32, f32)]) -> String {
    let node_attrs = |_, (idx, node): (NodeIndex, &Node)| {
        let style = &styles[idx.index()];
        let mut attrs = format!(
            "label = \"{}\" style = filled fillcolor = \"{}\" width = {:.2}",
            node.to_string().replace('"', "\\\""),
            style.color,
            style.width
        );
        if let Some((x, y)) = positions.get(idx.index()) {
            let _ = write!(
                attrs,
                " pos = \"{:.2},{:.2}!\"",
                x / LAYOUT_SCALE,
                y / LAYOUT_SCALE
            );
        }
        attrs
    };
    let dot = Dot::with_attr_getters(
        graph.inner(),
        &[Config::NodeNoLabel, Config::EdgeNoLabel],
        &|_, edge| format!("label = \"{:.2}\"", edge.weight()),
        &node_attrs,
    );
    format!("{:?}", dot)
}

/// Force-directed positions, indexed by `NodeIndex::index()`.
pub fn layout(graph: &TaxGraph, iterations: usize) -> Vec<(f32, f32)> {
    let g = graph.inner();
    if g.node_count() == 0 {
        return Vec::new();
    }

    let mut force_graph: ForceGraph<usize, ()> = ForceGraph::default();
    let ids: Vec<_> = g
        .node_indices()
        .map(|idx| force_graph.add_force_node(graph.label(idx), idx.index()))
        .collect();
    for edge in g.edge_references() {
        force_graph.add_edge(ids[edge.source().index()], ids[edge.target().index()], ());
    }

    let mut params = SimulationParameters::default();
    params.set_force(fruchterman_reingold(45.0, 0.95));
    let mut simulation = Simulation::from_graph(force_graph, params);
    for _ in 0..iterations {
        simulation.update(0.02);
    }

    let settled = simulation.get_graph();
    let mut positions = vec![(0.0, 0.0); g.node_count()];
    for idx in settled.node_indices() {
        let node = &settled[idx];
        positions[node.data] = (node.location.x, node.location.y);
    }
    positions
}
