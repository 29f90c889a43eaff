//! Bipartite graph analytics over Brazilian state tax-revenue records.
//!
//! Records (state, year, per-category amounts) become a graph joining states
//! to years or tax categories; the graph is analyzed for centrality,
//! components, shortest paths and communities, and every result is written as
//! a text report plus a Graphviz diagram.

pub mod analytics;
pub mod config;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod records;
pub mod report;
