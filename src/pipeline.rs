use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::analytics::{self, AnalysisKind};
use crate::config::{Config, RunConfig, ScopeSelection};
use crate::graph::{build_graph, distinct_years, Scope};
use crate::records::{read_records, LoadedRecords, TaxRecord};
use crate::report::ReportEmitter;

pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Ok {
        text: PathBuf,
        diagram: Option<PathBuf>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub analysis: AnalysisKind,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeSummary {
    pub scope: Scope,
    /// Set when the graph could not be built; no analyses ran.
    pub error: Option<String>,
    pub nodes: usize,
    pub edges: usize,
    pub density: f64,
    pub records_used: usize,
    pub records_out_of_scope: usize,
    pub overview: Option<PathBuf>,
    pub analyses: Vec<AnalysisOutcome>,
}

impl ScopeSummary {
    fn failed(scope: Scope, reason: String) -> Self {
        Self {
            scope,
            error: Some(reason),
            nodes: 0,
            edges: 0,
            density: 0.0,
            records_used: 0,
            records_out_of_scope: 0,
            overview: None,
            analyses: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub records_loaded: usize,
    pub records_rejected: Vec<String>,
    pub scopes: Vec<ScopeSummary>,
}

impl RunSummary {
    pub fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.scopes
            .iter()
            .flat_map(|s| &s.analyses)
            .filter(|a| predicate(&a.outcome))
            .count()
    }

    pub fn failed_scopes(&self) -> usize {
        self.scopes.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Loads the configured input, runs every scope and writes `summary.json`.
pub fn run(config: &Config) -> Result<RunSummary> {
    let loaded = read_records(&config.input)?;
    let summary = run_records(loaded, config);
    let path = write_summary(&summary, &config.output.dir)?;
    info!("Run summary saved to {}", path.display());
    Ok(summary)
}

pub fn run_records(loaded: LoadedRecords, config: &Config) -> RunSummary {
    let emitter = ReportEmitter::new(&config.output);
    let scopes = select_scopes(&loaded.records, &config.run);
    info!("Analyzing {} scope(s)", scopes.len());

    let records = &loaded.records;
    let scopes: Vec<ScopeSummary> = if config.run.parallel {
        scopes
            .par_iter()
            .map(|&scope| run_scope(records, scope, config, &emitter))
            .collect()
    } else {
        scopes
            .iter()
            .map(|&scope| run_scope(records, scope, config, &emitter))
            .collect()
    };

    RunSummary {
        records_loaded: loaded.records.len(),
        records_rejected: loaded.rejected.iter().map(|e| e.to_string()).collect(),
        scopes,
    }
}

pub fn select_scopes(records: &[TaxRecord], run: &RunConfig) -> Vec<Scope> {
    let mut scopes = Vec::new();
    if matches!(run.scopes, ScopeSelection::All | ScopeSelection::Both) {
        scopes.push(Scope::All);
    }
    if matches!(run.scopes, ScopeSelection::PerYear | ScopeSelection::Both) {
        let years = if run.years.is_empty() {
            distinct_years(records)
        } else {
            run.years.clone()
        };
        scopes.extend(years.into_iter().map(Scope::Year));
    }
    scopes
}

/// Builds the graph for `scope` and runs every configured analysis on it.
/// Failures stay inside the returned summary.
pub fn run_scope(
    records: &[TaxRecord],
    scope: Scope,
    config: &Config,
    emitter: &ReportEmitter,
) -> ScopeSummary {
    let graph = match build_graph(records, scope, &config.graph) {
        Ok(graph) => graph,
        Err(err) => {
            error!("Cannot build graph: {err}");
            return ScopeSummary::failed(scope, err.to_string());
        }
    };
    info!(
        "{scope}: {} nodes, {} edges, density {:.4}",
        graph.node_count(),
        graph.edge_count(),
        graph.density()
    );

    let overview = match emitter.emit_overview(&graph) {
        Ok(path) => path,
        Err(err) => {
            error!("{err}");
            None
        }
    };

    let analyses = config
        .run
        .analyses
        .iter()
        .map(|&kind| {
            let outcome = match analytics::run(kind, &graph) {
                Ok(result) => match emitter.emit(kind, &result, &graph) {
                    Ok(report) => Outcome::Ok {
                        text: report.text,
                        diagram: report.diagram,
                    },
                    Err(err) => {
                        error!("{scope}: {err}");
                        Outcome::Failed {
                            reason: err.to_string(),
                        }
                    }
                },
                Err(skipped) => {
                    warn!("{scope}: {skipped}");
                    Outcome::Skipped {
                        reason: skipped.reason,
                    }
                }
            };
            AnalysisOutcome {
                analysis: kind,
                outcome,
            }
        })
        .collect();

    ScopeSummary {
        scope,
        error: None,
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        density: graph.density(),
        records_used: graph.stats().records_used,
        records_out_of_scope: graph.stats().records_out_of_scope,
        overview,
        analyses,
    }
}

pub fn write_summary(summary: &RunSummary, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(SUMMARY_FILE);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
