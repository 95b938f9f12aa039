use std::fmt;

use rustc_hash::FxHashMap;

use super::node::NodeId;

#[derive(PartialEq, PartialOrd, Ord, Clone, Copy, Eq, Hash, Debug, Default)]
pub struct InnovationNumber(pub usize);

impl InnovationNumber {
    fn inc(self) -> InnovationNumber {
        InnovationNumber(self.0 + 1)
    }
}

impl fmt::Display for InnovationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "##{}", self.0)
    }
}

/// Identity of a structural mutation, independent of the genome it happened in.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
pub enum InnovationKey {
    Connection { src: NodeId, dst: NodeId },
    Split(InnovationNumber),
}

/// Numbers assigned to a node split the first time it was seen.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct SplitAssignment {
    pub node: NodeId,
    pub incoming: InnovationNumber,
    pub outgoing: InnovationNumber,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum InnovationRecord {
    Connection(InnovationNumber),
    Split(SplitAssignment),
}

/// Append-only history of every structural mutation in a run, together with
/// the counters that mint new innovation numbers and node ids.
#[derive(Clone, Debug)]
pub struct EvolutionContext {
    next_innovation_number: InnovationNumber,
    next_node_id: NodeId,
    history: FxHashMap<InnovationKey, InnovationRecord>,
}

impl EvolutionContext {
    /// Registers the fully connected base topology, so every initial genome
    /// shares innovation numbers with every other.
    pub fn init(n_sensor_nodes: usize, n_output_nodes: usize) -> EvolutionContext {
        let mut context = EvolutionContext {
            next_innovation_number: InnovationNumber(0),
            next_node_id: NodeId(n_sensor_nodes + n_output_nodes),
            history: FxHashMap::default(),
        };

        for i in 0..n_sensor_nodes {
            for j in 0..n_output_nodes {
                context.resolve_connection(NodeId(i), NodeId(j + n_sensor_nodes));
            }
        }

        context
    }

    pub fn lookup(&self, key: &InnovationKey) -> Option<&InnovationRecord> {
        self.history.get(key)
    }

    pub fn connection_innovation(&self, src: NodeId, dst: NodeId) -> Option<InnovationNumber> {
        match self.history.get(&InnovationKey::Connection { src, dst }) {
            Some(InnovationRecord::Connection(innovation)) => Some(*innovation),
            _ => None,
        }
    }

    pub fn split_assignment(&self, split: InnovationNumber) -> Option<SplitAssignment> {
        match self.history.get(&InnovationKey::Split(split)) {
            Some(InnovationRecord::Split(assignment)) => Some(*assignment),
            _ => None,
        }
    }

    pub fn resolve_connection(&mut self, src: NodeId, dst: NodeId) -> InnovationNumber {
        if let Some(innovation) = self.connection_innovation(src, dst) {
            return innovation;
        }

        let innovation = self.mint_innovation();
        log::trace!("minted {} for connection {} -> {}", innovation, src, dst);
        self.history.insert(InnovationKey::Connection { src, dst }, InnovationRecord::Connection(innovation));
        innovation
    }

    /// The two halves of a split are also recorded as plain connections, so a
    /// later add-connection between the same nodes lines up with them.
    pub fn resolve_split(&mut self, split: InnovationNumber, src: NodeId, dst: NodeId) -> SplitAssignment {
        if let Some(assignment) = self.split_assignment(split) {
            return assignment;
        }

        let node = self.next_node_id;
        self.next_node_id = self.next_node_id.inc();
        let assignment = SplitAssignment {
            node,
            incoming: self.mint_innovation(),
            outgoing: self.mint_innovation(),
        };
        log::trace!("minted node {} ({}, {}) for split of {}", node, assignment.incoming, assignment.outgoing, split);
        self.history.insert(InnovationKey::Split(split), InnovationRecord::Split(assignment));
        self.history
            .entry(InnovationKey::Connection { src, dst: node })
            .or_insert(InnovationRecord::Connection(assignment.incoming));
        self.history
            .entry(InnovationKey::Connection { src: node, dst })
            .or_insert(InnovationRecord::Connection(assignment.outgoing));
        assignment
    }

    fn mint_innovation(&mut self) -> InnovationNumber {
        let innovation = self.next_innovation_number;
        self.next_innovation_number = self.next_innovation_number.inc();
        innovation
    }

    pub fn next_innovation_number(&self) -> InnovationNumber {
        self.next_innovation_number
    }

    pub fn next_node_id(&self) -> NodeId {
        self.next_node_id
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
