use petgraph::graph::NodeIndex;

use super::AnalysisKind;
use crate::error::AnalysisSkipped;
use crate::graph::TaxGraph;

/// Degree divided by `n - 1`. A lone node scores 0.
pub fn degree_centrality(graph: &TaxGraph) -> Vec<f64> {
    let g = graph.inner();
    let n = g.node_count();
    if n < 2 {
        return vec![0.0; n];
    }
    let scale = 1.0 / (n - 1) as f64;
    g.node_indices()
        .map(|node| g.edges(node).count() as f64 * scale)
        .collect()
}

/// Weighted betweenness (Brandes 2001) with edge weights as distances.
///
/// Scores are normalized over ordered pairs, `1 / ((n - 1)(n - 2))`, so a hub
/// that lies on every path scores 1.
pub fn betweenness_centrality(graph: &TaxGraph) -> Result<Vec<f64>, AnalysisSkipped> {
    let g = graph.inner();
    if g.edge_weights().any(|w| *w < 0.0) {
        return Err(AnalysisSkipped::new(
            AnalysisKind::Betweenness,
            "negative edge weights cannot be used as distances",
        ));
    }

    let n = g.node_count();
    let mut betweenness = vec![0.0; n];

    for s in 0..n {
        let mut stack = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut dist = vec![f64::INFINITY; n];
        let mut done = vec![false; n];
        sigma[s] = 1.0;
        dist[s] = 0.0;

        // Dijkstra with a linear scan; ties resolve to the lowest index.
        while let Some(v) = (0..n)
            .filter(|&v| !done[v] && dist[v].is_finite())
            .min_by(|&a, &b| dist[a].total_cmp(&dist[b]))
        {
            done[v] = true;
            stack.push(v);
            for (w, weight) in graph.weighted_neighbors(NodeIndex::new(v)) {
                let w = w.index();
                if done[w] {
                    continue;
                }
                let alt = dist[v] + weight;
                if alt < dist[w] {
                    dist[w] = alt;
                    sigma[w] = sigma[v];
                    preds[w].clear();
                    preds[w].push(v);
                } else if alt == dist[w] {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0; n];
        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                betweenness[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for score in &mut betweenness {
            *score *= scale;
        }
    }
    Ok(betweenness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GraphConfig, NegativePolicy};
    use crate::graph::tests::{record, scenario_graph};
    use crate::graph::{build_graph, Node, NodeKey, Scope};
    use crate::records::TaxRecord;

    fn score(graph: &TaxGraph, scores: &[f64], key: NodeKey) -> f64 {
        scores[graph.find(&key).unwrap().index()]
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_degree_centrality_scenario() {
        let graph = scenario_graph();
        let scores = degree_centrality(&graph);
        assert!(close(score(&graph, &scores, NodeKey::Year(2020)), 2.0 / 3.0));
        assert!(close(score(&graph, &scores, NodeKey::State("SP".into())), 2.0 / 3.0));
        assert!(close(score(&graph, &scores, NodeKey::State("RJ".into())), 1.0 / 3.0));
        assert!(close(score(&graph, &scores, NodeKey::Year(2021)), 1.0 / 3.0));
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_degree_centrality_single_node() {
        let mut graph = TaxGraph::new(Scope::All);
        graph.ensure_node(Node::state("SP"));
        assert_eq!(degree_centrality(&graph), vec![0.0]);
    }

    #[test]
    fn test_degree_centrality_bounds() {
        let mut records = Vec::new();
        for (i, code) in ["AC", "BA", "CE", "DF", "ES"].iter().enumerate() {
            for year in 2010..2010 + i as i32 {
                records.push(record(code, year, 1.0));
            }
        }
        let graph = build_graph(&records, Scope::All, &GraphConfig::default()).unwrap();
        assert!(degree_centrality(&graph)
            .iter()
            .all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_betweenness_scenario() {
        // SP and 2020 each bridge two ordered pairs in both directions.
        let graph = scenario_graph();
        let scores = betweenness_centrality(&graph).unwrap();
        assert!(close(score(&graph, &scores, NodeKey::State("SP".into())), 4.0 / 6.0));
        assert!(close(score(&graph, &scores, NodeKey::Year(2020)), 4.0 / 6.0));
        assert!(close(score(&graph, &scores, NodeKey::State("RJ".into())), 0.0));
        assert!(close(score(&graph, &scores, NodeKey::Year(2021)), 0.0));
    }

    #[test]
    fn test_betweenness_uses_weights_as_distance() {
        // Cycle A-2020-B-2021-A where the direct A-2021 edge is expensive.
        let records = vec![
            record("A", 2020, 1.0),
            record("A", 2021, 10.0),
            record("B", 2020, 1.0),
            record("B", 2021, 1.0),
        ];
        let graph = build_graph(&records, Scope::All, &GraphConfig::default()).unwrap();
        let scores = betweenness_centrality(&graph).unwrap();
        assert!(close(score(&graph, &scores, NodeKey::Year(2020)), 4.0 / 6.0));
        assert!(close(score(&graph, &scores, NodeKey::State("B".into())), 4.0 / 6.0));
        assert!(close(score(&graph, &scores, NodeKey::State("A".into())), 0.0));
        assert!(close(score(&graph, &scores, NodeKey::Year(2021)), 0.0));
    }

    #[test]
    fn test_betweenness_splits_equal_paths() {
        // Unit-weight 4-cycle: every opposite pair has two equal paths.
        let records = vec![
            record("A", 2020, 1.0),
            record("A", 2021, 1.0),
            record("B", 2020, 1.0),
            record("B", 2021, 1.0),
        ];
        let graph = build_graph(&records, Scope::All, &GraphConfig::default()).unwrap();
        let scores = betweenness_centrality(&graph).unwrap();
        for s in scores {
            assert!(close(s, 1.0 / 6.0));
        }
    }

    #[test]
    fn test_betweenness_rejects_negative_weights() {
        let config = GraphConfig {
            negative: NegativePolicy::Keep,
            ..GraphConfig::default()
        };
        let records = vec![TaxRecord::new("SP", 2020).with_amount(crate::graph::tests::TAX, -1.0)];
        let graph = build_graph(&records, Scope::All, &config).unwrap();
        let skipped = betweenness_centrality(&graph).unwrap_err();
        assert_eq!(skipped.kind, AnalysisKind::Betweenness);
    }
}
