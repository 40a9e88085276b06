//! Force-directed layout of allele lineage graphs.

use std::f64::consts::PI;

use allelic_core::Feature;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::MetaConfig;
use crate::lineage::{LineageGraph, allele_lineage};

const JITTER: f64 = 1e-9;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NetworkNode {
    pub name: String,
    pub position: [f64; 2],
    pub sample_count: usize,
    pub proteoform: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NetworkEdge {
    pub source: usize,
    pub target: usize,
    pub source_name: String,
    pub target_name: String,
    pub weight: usize,
}

/// Laid out lineage graph of one feature.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AlleleNetwork {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
}

///
/// Reconstruct the lineage of `feature` and lay it out.
///
pub fn allele_network(feature: &Feature, config: &MetaConfig) -> AlleleNetwork {
    let lineage = allele_lineage(feature);
    layout_lineage(&lineage, config)
}

///
/// Place the nodes of a lineage graph with a spring embedder. An edge pulls its
/// endpoints together in proportion to `weight * target sample count`, so edges
/// into frequent alleles are drawn long and edges into rare alleles short.
///
pub fn layout_lineage(lineage: &LineageGraph, config: &MetaConfig) -> AlleleNetwork {
    let graph = &lineage.graph;

    let springs: Vec<(usize, usize, f64)> = graph
        .edge_indices()
        .filter_map(|edge| {
            let (source, target) = graph.edge_endpoints(edge)?;
            let weight = graph[edge].weight;
            let mut strength = (weight * graph[target].sample_count) as f64;
            if strength <= 0.0 {
                strength = config.min_attraction;
            }
            Some((source.index(), target.index(), 1.0 / strength))
        })
        .collect();

    let positions = fruchterman_reingold(
        graph.node_count(),
        &springs,
        config.layout_iterations,
        config.seed,
    );

    let nodes = graph
        .node_indices()
        .map(|node| NetworkNode {
            name: graph[node].name.clone(),
            position: positions[node.index()],
            sample_count: graph[node].sample_count,
            proteoform: graph[node].proteoform.clone(),
        })
        .collect();

    let edges = graph
        .edge_indices()
        .filter_map(|edge| {
            let (source, target) = graph.edge_endpoints(edge)?;
            Some(NetworkEdge {
                source: source.index(),
                target: target.index(),
                source_name: graph[source].name.clone(),
                target_name: graph[target].name.clone(),
                weight: graph[edge].weight,
            })
        })
        .collect();

    AlleleNetwork { nodes, edges }
}

///
/// Fruchterman-Reingold spring embedder in 2D.
///
/// Nodes start on the unit circle. Every iteration applies a repulsion of
/// `delta / |delta|^2` between all node pairs and an attraction of
/// `delta * |delta| * w` along every `(source, target, w)` spring, then moves each
/// node by at most the current temperature. The temperature starts at
/// `sqrt(n) / 10` and cools linearly to zero.
///
pub fn fruchterman_reingold(
    n: usize,
    springs: &[(usize, usize, f64)],
    iterations: usize,
    seed: u64,
) -> Vec<[f64; 2]> {
    let mut positions: Vec<[f64; 2]> = (0..n)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            [angle.cos(), angle.sin()]
        })
        .collect();
    if n < 2 || iterations == 0 {
        return positions;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut temperature = (n as f64).sqrt() / 10.0;
    let cooling = temperature / iterations as f64;
    let mut displacement = vec![[0.0f64; 2]; n];

    for _ in 0..iterations {
        displacement.iter_mut().for_each(|d| *d = [0.0, 0.0]);

        for v in 0..n {
            for u in (v + 1)..n {
                let mut dx = positions[v][0] - positions[u][0];
                let mut dy = positions[v][1] - positions[u][1];
                let mut dlen = dx * dx + dy * dy;
                while dlen == 0.0 {
                    dx = rng.random_range(-JITTER..JITTER);
                    dy = rng.random_range(-JITTER..JITTER);
                    dlen = dx * dx + dy * dy;
                }
                displacement[v][0] += dx / dlen;
                displacement[v][1] += dy / dlen;
                displacement[u][0] -= dx / dlen;
                displacement[u][1] -= dy / dlen;
            }
        }

        for &(v, u, w) in springs {
            let dx = positions[v][0] - positions[u][0];
            let dy = positions[v][1] - positions[u][1];
            let dlen = (dx * dx + dy * dy).sqrt() * w;
            displacement[v][0] -= dx * dlen;
            displacement[v][1] -= dy * dlen;
            displacement[u][0] += dx * dlen;
            displacement[u][1] += dy * dlen;
        }

        for (position, [dx, dy]) in positions.iter_mut().zip(displacement.iter()) {
            let length = (dx * dx + dy * dy).sqrt();
            if length == 0.0 {
                continue;
            }
            let scale = if length > temperature {
                temperature / length
            } else {
                1.0
            };
            position[0] += dx * scale;
            position[1] += dy * scale;
        }

        temperature -= cooling;
    }

    debug!("Laid out {} nodes and {} springs", n, springs.len());
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::NO_PROTEOFORM;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    fn feature_from(alleles: serde_json::Value) -> Feature {
        let mut feature: Feature = serde_json::from_value(json!({ "alleles": alleles })).unwrap();
        for (name, allele) in feature.alleles.iter_mut() {
            allele.name = name.clone();
        }
        feature
    }

    fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
        ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
    }

    #[rstest]
    fn test_network_attributes() {
        let feature = feature_from(json!({
            "reference": { "occurrence": ["s1"] },
            "X": { "variants": "1:A,2:C", "occurrence": ["s2", "s3"], "info": { "proteoform": "PX" } },
            "Y": { "variants": "1:A,2:C,3:G,4:T" }
        }));
        let network = allele_network(&feature, &MetaConfig::default());

        let names: Vec<&str> = network.nodes.iter().map(|node| node.name.as_str()).collect();
        assert_eq!(names, vec!["reference", "Y", "X"]);
        assert_eq!(network.nodes[0].sample_count, 1);
        assert_eq!(network.nodes[1].sample_count, 0);
        assert_eq!(network.nodes[1].proteoform, NO_PROTEOFORM);
        assert_eq!(network.nodes[2].sample_count, 2);
        assert_eq!(network.nodes[2].proteoform, "PX");

        assert_eq!(
            network.edges,
            vec![
                NetworkEdge {
                    source: 2,
                    target: 1,
                    source_name: "X".to_string(),
                    target_name: "Y".to_string(),
                    weight: 2,
                },
                NetworkEdge {
                    source: 0,
                    target: 2,
                    source_name: "reference".to_string(),
                    target_name: "X".to_string(),
                    weight: 2,
                },
            ]
        );
        for node in &network.nodes {
            assert!(node.position.iter().all(|v| v.is_finite()));
        }
    }

    #[rstest]
    fn test_single_node_stays_on_seed() {
        let positions = fruchterman_reingold(1, &[], 500, 0);
        assert_eq!(positions, vec![[1.0, 0.0]]);
    }

    #[rstest]
    fn test_layout_is_deterministic() {
        let springs = [(0, 1, 1.0), (1, 2, 0.5), (0, 3, 1000.0)];
        let first = fruchterman_reingold(4, &springs, 500, 3);
        let second = fruchterman_reingold(4, &springs, 500, 3);
        assert_eq!(first, second);
    }

    #[rstest]
    fn test_strong_springs_pull_closer() {
        // node 1 is tied to 0 by a strong spring, node 2 by a weak one
        let springs = [(0, 1, 10.0), (0, 2, 0.01)];
        let positions = fruchterman_reingold(3, &springs, 500, 0);
        assert!(distance(positions[0], positions[1]) < distance(positions[0], positions[2]));
    }

    #[rstest]
    fn test_coincident_nodes_are_separated() {
        // a huge spring collapses both nodes onto each other; repulsion must stay finite
        let positions = fruchterman_reingold(2, &[(0, 1, 1e6)], 50, 0);
        assert!(positions.iter().flatten().all(|v| v.is_finite()));
    }

    #[rstest]
    fn test_zero_strength_edges_are_clamped() {
        // neither allele is carried by any sample, so every strength is zero
        let feature = feature_from(json!({
            "X": { "variants": "1:A" },
            "Y": { "variants": "1:A,2:C" }
        }));
        let network = allele_network(&feature, &MetaConfig::default());
        assert_eq!(network.edges.len(), 2);
        for node in &network.nodes {
            assert!(node.position.iter().all(|v| v.is_finite()));
        }
    }
}
