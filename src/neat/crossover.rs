use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use rand::Rng;
use rustc_hash::FxHashSet;

use super::alignment::{align_map, AlignedPair};
use super::error::NeatError;
use super::genome::{Connection, Genome};
use super::innovation::InnovationNumber;
use super::node::{Node, NodeId, NodeKind};

/// Builds a child from two parents aligned by innovation number.
///
/// Matching genes come from either parent with equal odds. Genes only one
/// parent carries are all taken from the fitter parent and none from the
/// other; on a fitness tie each one is kept on a coin flip. A tie can mix
/// genes that close a cycle together, those are dropped.
pub fn cross_over<R: Rng>(rng: &mut R, genome_1: &Genome, fitness_1: f64, genome_2: &Genome, fitness_2: f64) -> Result<Genome, NeatError> {
    if genome_1.n_sensor_nodes != genome_2.n_sensor_nodes || genome_1.n_output_nodes != genome_2.n_output_nodes {
        return Err(NeatError::ArityMismatch);
    }
    if genome_1.is_empty() || genome_2.is_empty() {
        return Err(NeatError::EmptyGenome);
    }

    let mut matching = FxHashSet::default();
    let mut choose_gene = |pair: AlignedPair<InnovationNumber, Connection>| {
        fn clone_gene(gene: (&InnovationNumber, &Connection)) -> Option<(InnovationNumber, Connection)> {
            Some((*gene.0, gene.1.clone()))
        }
        match pair {
            AlignedPair::HasBoth(left, right) => {
                matching.insert(*left.0);
                if rng.gen_bool(0.5) {
                    clone_gene(left)
                } else {
                    clone_gene(right)
                }
            }
            AlignedPair::HasLeft(left) => {
                if fitness_1 > fitness_2 {
                    clone_gene(left)
                } else if fitness_1 < fitness_2 {
                    None
                } else if rng.gen_bool(0.5) {
                    clone_gene(left)
                } else {
                    None
                }
            }
            AlignedPair::HasRight(right) => {
                if fitness_1 > fitness_2 {
                    None
                } else if fitness_1 < fitness_2 {
                    clone_gene(right)
                } else if rng.gen_bool(0.5) {
                    clone_gene(right)
                } else {
                    None
                }
            }
        }
    };
    let chosen = align_map(genome_1.connections(), genome_2.connections(), &mut choose_gene);

    // matching genes first, every parent holds them without a cycle
    let (shared, single): (Vec<_>, Vec<_>) = chosen.into_iter().partition(|(i, _)| matching.contains(i));
    let mut graph = DiGraphMap::<NodeId, ()>::new();
    let mut connections = Vec::with_capacity(shared.len() + single.len());
    for (_, conn) in shared {
        graph.add_edge(conn.src, conn.dst, ());
        connections.push(conn);
    }
    for (_, conn) in single {
        if graph.contains_node(conn.dst) && graph.contains_node(conn.src) && has_path_connecting(&graph, conn.dst, conn.src, None) {
            log::debug!("crossover dropped {} to keep the child acyclic", conn);
            continue;
        }
        graph.add_edge(conn.src, conn.dst, ());
        connections.push(conn);
    }

    if connections.is_empty() {
        return Err(NeatError::NoCommonAncestry);
    }

    let mut node_ids: FxHashSet<NodeId> = connections.iter().flat_map(|c| [c.src, c.dst]).collect();
    for node in genome_1.nodes().values().chain(genome_2.nodes().values()) {
        if node.kind != NodeKind::Hidden {
            node_ids.insert(node.id);
        }
    }

    let mut nodes: Vec<Node> = Vec::with_capacity(node_ids.len());
    for id in node_ids {
        let node = match (genome_1.node(id), genome_2.node(id)) {
            (Some(n1), Some(n2)) => {
                if rng.gen_bool(0.5) {
                    n1
                } else {
                    n2
                }
            }
            (Some(n), None) | (None, Some(n)) => n,
            (None, None) => return Err(NeatError::MissingNode { node: id }),
        };
        let mut node = node.clone();
        node.reset();
        nodes.push(node);
    }

    Genome::create(nodes, connections)
}
