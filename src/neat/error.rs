use thiserror::Error;

use super::innovation::InnovationNumber;
use super::node::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationKind {
    Weight,
    Bias,
    Connection,
    Node,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MutationKind::Weight => "weight",
            MutationKind::Bias => "bias",
            MutationKind::Connection => "connection",
            MutationKind::Node => "node",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NeatError {
    #[error("input node {node} was evaluated before a value was supplied")]
    UnsetInput { node: NodeId },

    #[error("genome has no connections, genetic distance is undefined")]
    EmptyGenome,

    #[error("no candidate available for a {0} mutation")]
    NoAvailableMutation(MutationKind),

    #[error("crossover produced a child without connections")]
    NoCommonAncestry,

    #[error("expected {expected} input values, got {actual}")]
    InputArity { expected: usize, actual: usize },

    #[error("connection references missing node {node}")]
    MissingNode { node: NodeId },

    #[error("invalid connection {src} -> {dst}")]
    InvalidConnection { src: NodeId, dst: NodeId },

    #[error("node {node} already exists in this genome")]
    DuplicateNode { node: NodeId },

    #[error("genomes have different input/output arity")]
    ArityMismatch,

    #[error("connections form a cycle, no evaluation order exists")]
    CyclicTopology,

    #[error("connection {0} does not exist in this genome")]
    UnknownConnection(InnovationNumber),

    #[error("structural mutation applied before it was resolved against the innovation ledger")]
    UnresolvedInnovation,

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("population has no species to breed from")]
    EmptyPopulation,

    #[error("no organism at index {index}")]
    UnknownOrganism { index: usize },
}
