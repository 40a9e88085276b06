//! Allele lineage reconstruction.
//!
//! For every allele of a feature, a greedy search looks for alleles with fewer
//! variants that explain part of its variant set, cheapest edit first. Each
//! accepted explanation becomes a derivation edge; alleles nothing explains are
//! derived directly from the reference.

use std::collections::{BTreeSet, HashMap};

use allelic_core::{Feature, REFERENCE_ALLELE};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

/// Label used when an allele has no proteoform annotation.
pub const NO_PROTEOFORM: &str = "N/A";

#[derive(Debug, Clone, PartialEq)]
pub struct AlleleNode {
    pub name: String,
    /// Number of samples carrying the allele; 0 if it is missing from the allele table.
    pub sample_count: usize,
    pub proteoform: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineageEdge {
    /// Size of the symmetric difference between the two alleles' variant sets.
    pub weight: usize,
}

/// Directed derivation graph of the alleles of one feature.
#[derive(Debug, Clone)]
pub struct LineageGraph {
    pub graph: DiGraph<AlleleNode, LineageEdge>,
    index: HashMap<String, NodeIndex>,
}

impl LineageGraph {
    fn new() -> Self {
        LineageGraph {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    fn add_allele(&mut self, feature: &Feature, name: &str) -> NodeIndex {
        if let Some(node) = self.index.get(name) {
            return *node;
        }
        let entry = feature.allele(name);
        let node = self.graph.add_node(AlleleNode {
            name: name.to_string(),
            sample_count: entry.map_or(0, |allele| allele.sample_count()),
            proteoform: entry
                .and_then(|allele| allele.proteoform())
                .unwrap_or(NO_PROTEOFORM)
                .to_string(),
        });
        self.index.insert(name.to_string(), node);
        node
    }

    pub fn node(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Weight of the edge `source -> target`, if there is one.
    pub fn edge_weight(&self, source: &str, target: &str) -> Option<usize> {
        let edge = self.graph.find_edge(self.node(source)?, self.node(target)?)?;
        self.graph.edge_weight(edge).map(|edge| edge.weight)
    }

    /// Names of the alleles `name` was derived from.
    pub fn parents(&self, name: &str) -> Vec<&str> {
        self.node(name).map_or_else(Vec::new, |node| {
            self.graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|parent| self.graph[parent].name.as_str())
                .collect()
        })
    }
}

struct Candidate<'a> {
    position: usize,
    name: &'a str,
    cost: i64,
    difference: usize,
    shared: Vec<&'a String>,
}

///
/// Reconstruct the lineage graph of `feature`.
///
/// Alleles are processed by descending variant count (ties by name). Candidates for
/// an allele are the other non-reference alleles with strictly fewer variants; the
/// one minimizing `|symmetric difference| - |shared|` (ties by name) is linked and
/// its shared variants are considered explained, until no candidate shares any
/// unexplained variant. An allele without any link is attached to the reference.
///
pub fn allele_lineage(feature: &Feature) -> LineageGraph {
    let mut alleles: Vec<(&str, &BTreeSet<String>)> = feature
        .alleles
        .iter()
        .filter(|(name, _)| name.as_str() != REFERENCE_ALLELE)
        .map(|(name, allele)| (name.as_str(), &allele.variants))
        .collect();
    alleles.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(b.0)));

    let mut lineage = LineageGraph::new();
    let reference = lineage.add_allele(feature, REFERENCE_ALLELE);
    for (name, _) in &alleles {
        lineage.add_allele(feature, name);
    }

    for &(name, variants) in &alleles {
        let target = lineage.add_allele(feature, name);
        let mut remaining: BTreeSet<&String> = variants.iter().collect();
        let mut candidates: Vec<(&str, &BTreeSet<String>)> = alleles
            .iter()
            .filter(|(other, set)| *other != name && set.len() < variants.len())
            .copied()
            .collect();

        let mut linked = false;
        loop {
            let best = candidates
                .iter()
                .enumerate()
                .filter_map(|(position, &(other, set))| {
                    let shared: Vec<&String> =
                        set.iter().filter(|v| remaining.contains(v)).collect();
                    if shared.is_empty() {
                        return None;
                    }
                    let difference = variants.symmetric_difference(set).count();
                    Some(Candidate {
                        position,
                        name: other,
                        cost: difference as i64 - shared.len() as i64,
                        difference,
                        shared,
                    })
                })
                .min_by(|a, b| a.cost.cmp(&b.cost).then(a.name.cmp(b.name)));

            let Some(best) = best else { break };

            let source = lineage.add_allele(feature, best.name);
            lineage.graph.add_edge(
                source,
                target,
                LineageEdge {
                    weight: best.difference,
                },
            );
            for variant in &best.shared {
                remaining.remove(*variant);
            }
            candidates.remove(best.position);
            linked = true;
        }

        if !linked {
            lineage.graph.add_edge(
                reference,
                target,
                LineageEdge {
                    weight: variants.len(),
                },
            );
        }
    }

    lineage
}
