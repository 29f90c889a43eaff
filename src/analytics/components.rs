use std::collections::VecDeque;

use petgraph::graph::NodeIndex;

use crate::graph::TaxGraph;

/// Labels connected components with a breadth-first search.
///
/// Components come out in order of their first node by insertion order, and
/// members in the order the search reaches them, lower indices first.
pub fn connected_components(graph: &TaxGraph) -> Vec<Vec<NodeIndex>> {
    let g = graph.inner();
    let mut visited = vec![false; g.node_count()];
    let mut components = Vec::new();

    for start in g.node_indices() {
        if visited[start.index()] {
            continue;
        }
        visited[start.index()] = true;
        let mut queue = VecDeque::from([start]);
        let mut members = Vec::new();
        while let Some(node) = queue.pop_front() {
            members.push(node);
            let mut neighbors: Vec<NodeIndex> = g.neighbors(node).collect();
            neighbors.sort_unstable();
            for neighbor in neighbors {
                if !visited[neighbor.index()] {
                    visited[neighbor.index()] = true;
                    queue.push_back(neighbor);
                }
            }
        }
        components.push(members);
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::graph::tests::{record, scenario_graph};
    use crate::graph::{build_graph, Node, Scope};

    #[test]
    fn test_scenario_single_component() {
        let graph = scenario_graph();
        let components = connected_components(&graph);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), 4);
        assert_eq!(components[0][0], NodeIndex::new(0));
    }

    #[test]
    fn test_components_partition_node_set() {
        let records = vec![
            record("SP", 2020, 1.0),
            record("RJ", 2021, 1.0),
            record("MG", 2020, 1.0),
            record("BA", 2022, 1.0),
            record("BA", 2021, 1.0),
        ];
        let mut graph = build_graph(&records, Scope::All, &GraphConfig::default()).unwrap();
        graph.ensure_node(Node::state("AC"));
        let components = connected_components(&graph);

        let labels: Vec<Vec<String>> = components
            .iter()
            .map(|c| c.iter().map(|&n| graph.label(n)).collect())
            .collect();
        assert_eq!(
            labels,
            vec![
                vec!["SP", "2020", "MG"],
                vec!["RJ", "2021", "BA", "2022"],
                vec!["AC"],
            ]
        );

        let mut seen: Vec<usize> = components.iter().flatten().map(|n| n.index()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..graph.node_count()).collect::<Vec<_>>());
    }
}
