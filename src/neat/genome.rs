use std::collections::VecDeque;
use std::fmt;

use indexmap::IndexMap;
use itertools::Itertools;
use petgraph::algo::{has_path_connecting, DfsSpace};
use petgraph::graphmap::DiGraphMap;
use rand::Rng;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};

use super::alignment::{compare_genomes, FxIndexMap};
use super::error::NeatError;
use super::innovation::{InnovationNumber, SplitAssignment};
use super::node::{Node, NodeId, NodeKind};
use super::settings::Settings;

#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub innovation: InnovationNumber,
    pub src: NodeId,
    pub dst: NodeId,
    pub weight: f64,
    pub enabled: bool,
}

impl Connection {
    pub fn create(innovation: usize, src: usize, dst: usize, weight: f64, enabled: bool) -> Connection {
        Connection {
            innovation: InnovationNumber(innovation),
            src: NodeId(src),
            dst: NodeId(dst),
            weight,
            enabled,
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.enabled { "" } else { " (disabled)" };
        write!(f, "<Connection {}: {} ==({:.2})=> {}{}>", self.innovation, self.src, self.weight, self.dst, state)
    }
}

/// Connections touching a node, split by the side the node is on.
#[derive(Clone, Default, Debug)]
pub struct NodeConnections {
    pub as_src: Vec<InnovationNumber>,
    pub as_dst: Vec<InnovationNumber>,
}

/// Draws from `-range..range`, or 0 for an empty range.
pub(crate) fn sample_symmetric<R: Rng>(rng: &mut R, range: f64) -> f64 {
    if range > 0.0 {
        rng.gen_range(-range..range)
    } else {
        0.0
    }
}

#[derive(Clone, Debug)]
pub struct Genome {
    nodes: FxIndexMap<NodeId, Node>,
    connections: FxIndexMap<InnovationNumber, Connection>,
    node_connections: FxHashMap<NodeId, NodeConnections>,
    activation_order: Vec<NodeId>,
    pub n_sensor_nodes: usize,
    pub n_output_nodes: usize,
}

impl Genome {
    /// Fully connected input -> output genome. Inputs get ids `0..n_sensor_nodes`,
    /// outputs the following `n_output_nodes` ids, and the connection from input
    /// `i` to output `j` carries innovation number `i * n_output_nodes + j`.
    pub fn init<R: Rng>(rng: &mut R, settings: &Settings) -> Genome {
        let n_sensor_nodes = settings.n_sensor_nodes;
        let n_output_nodes = settings.n_output_nodes;

        let mut nodes = IndexMap::with_capacity_and_hasher(n_sensor_nodes + n_output_nodes, FxBuildHasher);
        for i in 0..n_sensor_nodes {
            nodes.insert(NodeId(i), Node::input(NodeId(i)));
        }
        for j in 0..n_output_nodes {
            let id = NodeId(n_sensor_nodes + j);
            nodes.insert(id, Node::output(id, sample_symmetric(rng, settings.bias_range)));
        }

        let mut connections = IndexMap::with_capacity_and_hasher(n_sensor_nodes * n_output_nodes, FxBuildHasher);
        for in_node_ind in 0..n_sensor_nodes {
            for out_node_ind in 0..n_output_nodes {
                let innovation = in_node_ind * n_output_nodes + out_node_ind;
                let weight = sample_symmetric(rng, settings.weight_range);
                let conn = Connection::create(innovation, in_node_ind, n_sensor_nodes + out_node_ind, weight, true);
                connections.insert(conn.innovation, conn);
            }
        }

        let mut genome = Genome {
            nodes,
            connections,
            node_connections: FxHashMap::default(),
            activation_order: Vec::new(),
            n_sensor_nodes,
            n_output_nodes,
        };
        genome.index_connections();
        genome.activation_order = genome.nodes.keys().copied().collect();
        genome
    }

    /// Builds a genome from prepared parts, checking that every connection
    /// points at known nodes and that the graph stays acyclic.
    pub fn create(nodes: Vec<Node>, connections: Vec<Connection>) -> Result<Genome, NeatError> {
        let n_sensor_nodes = nodes.iter().filter(|n| n.kind == NodeKind::Input).count();
        let n_output_nodes = nodes.iter().filter(|n| n.kind == NodeKind::Output).count();

        let mut node_map: FxIndexMap<NodeId, Node> = IndexMap::with_capacity_and_hasher(nodes.len(), FxBuildHasher);
        for node in nodes.into_iter().sorted_by_key(|n| n.id) {
            let id = node.id;
            if node_map.insert(id, node).is_some() {
                return Err(NeatError::DuplicateNode { node: id });
            }
        }

        let connections = connections
            .into_iter()
            .sorted_by_key(|c| c.innovation)
            .map(|c| (c.innovation, c))
            .collect();

        let mut genome = Genome {
            nodes: node_map,
            connections,
            node_connections: FxHashMap::default(),
            activation_order: Vec::new(),
            n_sensor_nodes,
            n_output_nodes,
        };

        for conn in genome.connections.values() {
            genome.check_connection(conn.src, conn.dst)?;
        }
        genome.rebuild()?;
        Ok(genome)
    }

    fn check_connection(&self, src: NodeId, dst: NodeId) -> Result<(), NeatError> {
        let src_node = self.nodes.get(&src).ok_or(NeatError::MissingNode { node: src })?;
        let dst_node = self.nodes.get(&dst).ok_or(NeatError::MissingNode { node: dst })?;
        if src == dst || dst_node.kind == NodeKind::Input || src_node.kind == NodeKind::Output {
            return Err(NeatError::InvalidConnection { src, dst });
        }
        Ok(())
    }

    fn index_connections(&mut self) {
        let mut node_connections: FxHashMap<NodeId, NodeConnections> =
            self.nodes.keys().map(|&id| (id, NodeConnections::default())).collect();
        for conn in self.connections.values() {
            node_connections.entry(conn.src).or_default().as_src.push(conn.innovation);
            node_connections.entry(conn.dst).or_default().as_dst.push(conn.innovation);
        }
        self.node_connections = node_connections;
    }

    /// Recomputes the node -> connection index and the evaluation order
    /// (Kahn's algorithm, starting from the sources in node id order).
    fn rebuild(&mut self) -> Result<(), NeatError> {
        self.index_connections();

        let mut in_degree: FxHashMap<NodeId, usize> = self
            .nodes
            .keys()
            .map(|id| (*id, self.node_connections.get(id).map_or(0, |c| c.as_dst.len())))
            .collect();

        let mut queue: VecDeque<NodeId> = self.nodes.keys().filter(|id| in_degree[*id] == 0).copied().collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = queue.pop_front() {
            order.push(id);
            if let Some(incident) = self.node_connections.get(&id) {
                for innovation in &incident.as_src {
                    let dst = self.connections[innovation].dst;
                    if let Some(degree) = in_degree.get_mut(&dst) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dst);
                        }
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(NeatError::CyclicTopology);
        }
        self.activation_order = order;
        Ok(())
    }

    pub fn nodes(&self) -> &FxIndexMap<NodeId, Node> {
        &self.nodes
    }

    pub fn connections(&self) -> &FxIndexMap<InnovationNumber, Connection> {
        &self.connections
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn connection(&self, innovation: InnovationNumber) -> Option<&Connection> {
        self.connections.get(&innovation)
    }

    pub fn node_connections(&self, id: NodeId) -> Option<&NodeConnections> {
        self.node_connections.get(&id)
    }

    pub fn activation_order(&self) -> &[NodeId] {
        &self.activation_order
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn max_innovation(&self) -> Option<InnovationNumber> {
        self.connections.keys().last().copied()
    }

    pub fn hidden_count(&self) -> usize {
        self.nodes.values().filter(|n| n.kind == NodeKind::Hidden).count()
    }

    pub fn contains_pair(&self, src: NodeId, dst: NodeId) -> bool {
        self.node_connections
            .get(&src)
            .is_some_and(|c| c.as_src.iter().any(|i| self.connections[i].dst == dst))
    }

    pub fn reset(&mut self) {
        for node in self.nodes.values_mut() {
            node.reset();
        }
    }

    /// Runs one forward pass. `sensor_values` feeds the input nodes in id order;
    /// the result holds one value per output node, in id order.
    pub fn activate(&mut self, sensor_values: &[f64]) -> Result<Vec<f64>, NeatError> {
        if sensor_values.len() != self.n_sensor_nodes {
            return Err(NeatError::InputArity {
                expected: self.n_sensor_nodes,
                actual: sensor_values.len(),
            });
        }

        self.reset();
        let inputs = self.nodes.values_mut().filter(|n| n.kind == NodeKind::Input);
        for (node, &value) in inputs.zip(sensor_values) {
            node.set_input(value);
        }

        for id in &self.activation_order {
            let value = match self.nodes.get_mut(id) {
                Some(node) => node.evaluate()?,
                None => return Err(NeatError::MissingNode { node: *id }),
            };
            let Some(incident) = self.node_connections.get(id) else {
                continue;
            };
            for innovation in &incident.as_src {
                let conn = &self.connections[innovation];
                if conn.enabled {
                    if let Some(dst) = self.nodes.get_mut(&conn.dst) {
                        dst.set_input(value * conn.weight);
                    }
                }
            }
        }

        self.nodes
            .values()
            .filter(|n| n.kind == NodeKind::Output)
            .map(|n| n.value().ok_or(NeatError::UnsetInput { node: n.id }))
            .collect()
    }

    /// Node pairs that could be joined by a new connection without duplicating
    /// an existing one or closing a cycle. With `shallow` the search stops at
    /// the first candidate, which is enough to tell whether any exist.
    pub fn available_connections(&self, shallow: bool) -> Vec<(NodeId, NodeId)> {
        let existing: FxHashSet<(NodeId, NodeId)> = self.connections.values().map(|c| (c.src, c.dst)).collect();

        let mut graph = DiGraphMap::<NodeId, ()>::with_capacity(self.nodes.len(), self.connections.len());
        for &id in self.nodes.keys() {
            graph.add_node(id);
        }
        for conn in self.connections.values() {
            graph.add_edge(conn.src, conn.dst, ());
        }
        let mut space = DfsSpace::new(&graph);

        let sources = self.nodes.values().filter(|n| n.kind != NodeKind::Output);
        let mut available = Vec::new();
        for src in sources {
            let destinations = self.nodes.values().filter(|n| n.kind != NodeKind::Input && n.id != src.id);
            for dst in destinations {
                let pair = (src.id, dst.id);
                if existing.contains(&pair) {
                    continue;
                }
                if has_path_connecting(&graph, dst.id, src.id, Some(&mut space)) {
                    continue;
                }
                available.push(pair);
                if shallow {
                    return available;
                }
            }
        }
        available
    }

    pub fn add_connection(&mut self, innovation: InnovationNumber, src: NodeId, dst: NodeId, weight: f64) -> Result<(), NeatError> {
        self.check_connection(src, dst)?;
        if self.connections.contains_key(&innovation) || self.contains_pair(src, dst) {
            return Err(NeatError::InvalidConnection { src, dst });
        }

        let conn = Connection { innovation, src, dst, weight, enabled: true };
        self.connections.insert(innovation, conn);
        self.connections.sort_keys();
        if let Err(e) = self.rebuild() {
            self.connections.shift_remove(&innovation);
            self.rebuild()?;
            return Err(e);
        }
        Ok(())
    }

    /// Disables `split` and routes it through a new hidden node: the incoming
    /// half gets weight 1, the outgoing half the old weight.
    pub fn split_connection(&mut self, split: InnovationNumber, assignment: SplitAssignment, bias: f64) -> Result<(), NeatError> {
        let (src, dst, weight) = match self.connections.get(&split) {
            Some(conn) if conn.enabled => (conn.src, conn.dst, conn.weight),
            _ => return Err(NeatError::UnknownConnection(split)),
        };
        if self.nodes.contains_key(&assignment.node) {
            return Err(NeatError::DuplicateNode { node: assignment.node });
        }
        if self.connections.contains_key(&assignment.incoming) || self.connections.contains_key(&assignment.outgoing) {
            return Err(NeatError::InvalidConnection { src, dst });
        }

        if let Some(conn) = self.connections.get_mut(&split) {
            conn.enabled = false;
        }
        self.nodes.insert(assignment.node, Node::hidden(assignment.node, bias));
        self.nodes.sort_keys();

        let incoming = Connection { innovation: assignment.incoming, src, dst: assignment.node, weight: 1.0, enabled: true };
        let outgoing = Connection { innovation: assignment.outgoing, src: assignment.node, dst, weight, enabled: true };
        self.connections.insert(incoming.innovation, incoming);
        self.connections.insert(outgoing.innovation, outgoing);
        self.connections.sort_keys();

        self.rebuild()
    }

    pub fn set_weight(&mut self, innovation: InnovationNumber, weight: f64) -> Result<(), NeatError> {
        let conn = self.connections.get_mut(&innovation).ok_or(NeatError::UnknownConnection(innovation))?;
        conn.weight = weight;
        Ok(())
    }

    pub fn set_bias(&mut self, id: NodeId, bias: f64) -> Result<(), NeatError> {
        let node = self.nodes.get_mut(&id).ok_or(NeatError::MissingNode { node: id })?;
        node.bias = bias;
        Ok(())
    }

    /// Weighted sum of excess genes, disjoint genes (both relative to the
    /// highest innovation number) and the mean weight difference of matching
    /// genes. Without matching genes the weight term takes its largest value
    /// for freshly drawn weights.
    pub fn distance(&self, other: &Genome, settings: &Settings) -> Result<f64, NeatError> {
        let alignment = compare_genomes(self, other)?;

        // innovations are numbered from 0, the aligned span is 0..=max
        let n = (alignment.max_innovation.0 + 1) as f64;
        let excess_term = settings.excess_coefficient * alignment.excess.len() as f64 / n;
        let disjoint_term = settings.disjoint_coefficient * alignment.disjoint.len() as f64 / n;

        let mean_weight_diff = if alignment.matching.is_empty() {
            2.0 * settings.weight_range
        } else {
            let total: f64 = alignment
                .matching
                .iter()
                .map(|i| (self.connections[i].weight - other.connections[i].weight).abs())
                .sum();
            total / alignment.matching.len() as f64
        };
        let weight_term = settings.weight_coefficient * mean_weight_diff;

        Ok(excess_term + disjoint_term + weight_term)
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Genome")?;
        writeln!(f, "Input  Nodes: {}", self.n_sensor_nodes)?;
        writeln!(f, "Hidden Nodes: {}", self.hidden_count())?;
        writeln!(f, "Output Nodes: {}", self.n_output_nodes)?;
        writeln!(f, "--- Connections ---")?;
        for conn in self.connections.values() {
            writeln!(f, "{}", conn)?;
        }
        write!(f, "-------------------")
    }
}
