use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::error::{MutationKind, NeatError};
use super::genome::{sample_symmetric, Genome};
use super::innovation::{EvolutionContext, InnovationKey, InnovationNumber, SplitAssignment};
use super::node::{NodeId, NodeKind};
use super::settings::Settings;

/// A proposed change to one genome. Structural proposals carry `None` in
/// their innovation slot until `resolve` looks them up in (or adds them to)
/// the innovation ledger.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    Weight {
        innovation: InnovationNumber,
        src: NodeId,
        dst: NodeId,
        old: f64,
        new: f64,
    },
    Bias {
        node: NodeId,
        kind: NodeKind,
        old: f64,
        new: f64,
    },
    Connection {
        src: NodeId,
        dst: NodeId,
        weight: f64,
        innovation: Option<InnovationNumber>,
    },
    Node {
        split: InnovationNumber,
        src: NodeId,
        dst: NodeId,
        bias: f64,
        assignment: Option<SplitAssignment>,
    },
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Weight { .. } => MutationKind::Weight,
            Mutation::Bias { .. } => MutationKind::Bias,
            Mutation::Connection { .. } => MutationKind::Connection,
            Mutation::Node { .. } => MutationKind::Node,
        }
    }

    /// Ledger key of a structural mutation; weight and bias changes have none.
    pub fn key(&self) -> Option<InnovationKey> {
        match self {
            Mutation::Connection { src, dst, .. } => Some(InnovationKey::Connection { src: *src, dst: *dst }),
            Mutation::Node { split, .. } => Some(InnovationKey::Split(*split)),
            Mutation::Weight { .. } | Mutation::Bias { .. } => None,
        }
    }

    pub fn is_innovation(&self) -> bool {
        self.key().is_some()
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            Mutation::Connection { innovation, .. } => innovation.is_some(),
            Mutation::Node { assignment, .. } => assignment.is_some(),
            Mutation::Weight { .. } | Mutation::Bias { .. } => true,
        }
    }

    /// Reuses the ledger's numbers for a structural change seen before, or
    /// mints and records new ones.
    pub fn resolve(&mut self, context: &mut EvolutionContext) {
        match self {
            Mutation::Connection { src, dst, innovation, .. } => {
                *innovation = Some(context.resolve_connection(*src, *dst));
            }
            Mutation::Node { split, src, dst, assignment, .. } => {
                *assignment = Some(context.resolve_split(*split, *src, *dst));
            }
            Mutation::Weight { .. } | Mutation::Bias { .. } => {}
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Weight { innovation, src, dst, old, new } => {
                write!(f, "<Connection {}: {} -({:.2} => {:.2})-> {}>", innovation, src, old, new, dst)
            }
            Mutation::Bias { node, kind, old, new } => {
                write!(f, "<{:?} {} bias: {:.3} => {:.3}>", kind, node, old, new)
            }
            Mutation::Connection { src, dst, weight, innovation } => match innovation {
                Some(innovation) => write!(f, "<Connection {}: {} ==({:.2})=> {}>", innovation, src, weight, dst),
                None => write!(f, "<Connection ##?: {} ==({:.2})=> {}>", src, weight, dst),
            },
            Mutation::Node { split, src, dst, assignment, .. } => match assignment {
                Some(a) => write!(f, "<Split: {} | Src: {} | Node: {} | Dst: {}>", split, src, a.node, dst),
                None => write!(f, "<Split: {} | Src: {} | Node: #? | Dst: {}>", split, src, dst),
            },
        }
    }
}

/// Either a fresh draw from `-range..range` or a gaussian nudge of `value`.
fn perturb<R: Rng>(rng: &mut R, value: f64, scale: f64, reassign_rate: f64, range: f64) -> Result<f64, NeatError> {
    if rng.gen::<f64>() < reassign_rate {
        return Ok(sample_symmetric(rng, range));
    }
    let normal = Normal::new(0.0, scale).map_err(|e| NeatError::InvalidSettings(e.to_string()))?;
    Ok(value + normal.sample(rng))
}

pub fn propose_weight<R: Rng>(rng: &mut R, genome: &Genome, settings: &Settings) -> Result<Mutation, NeatError> {
    let conns: Vec<_> = genome.connections().values().collect();
    let conn = conns.choose(rng).ok_or(NeatError::NoAvailableMutation(MutationKind::Weight))?;
    let new = perturb(rng, conn.weight, settings.mutate_weight_scale, settings.mutate_weight_reassign_rate, settings.weight_range)?;
    Ok(Mutation::Weight {
        innovation: conn.innovation,
        src: conn.src,
        dst: conn.dst,
        old: conn.weight,
        new,
    })
}

/// Input nodes carry no bias and are never picked.
pub fn propose_bias<R: Rng>(rng: &mut R, genome: &Genome, settings: &Settings) -> Result<Mutation, NeatError> {
    let nodes: Vec<_> = genome.nodes().values().filter(|n| !n.is_input()).collect();
    let node = nodes.choose(rng).ok_or(NeatError::NoAvailableMutation(MutationKind::Bias))?;
    let new = perturb(rng, node.bias, settings.mutate_bias_scale, settings.mutate_bias_reassign_rate, settings.bias_range)?;
    Ok(Mutation::Bias {
        node: node.id,
        kind: node.kind,
        old: node.bias,
        new,
    })
}

pub fn propose_connection<R: Rng>(rng: &mut R, genome: &Genome, settings: &Settings) -> Result<Mutation, NeatError> {
    let available = genome.available_connections(false);
    let &(src, dst) = available.choose(rng).ok_or(NeatError::NoAvailableMutation(MutationKind::Connection))?;
    Ok(Mutation::Connection {
        src,
        dst,
        weight: sample_symmetric(rng, settings.weight_range),
        innovation: None,
    })
}

/// Enabled connections whose split, if already in the ledger, would not
/// reintroduce a node the genome already has.
pub fn splittable_connections(genome: &Genome, context: &EvolutionContext) -> Vec<InnovationNumber> {
    genome
        .connections()
        .values()
        .filter(|c| c.enabled)
        .filter(|c| match context.split_assignment(c.innovation) {
            Some(a) => genome.node(a.node).is_none(),
            None => true,
        })
        .map(|c| c.innovation)
        .collect()
}

pub fn propose_node<R: Rng>(rng: &mut R, genome: &Genome, context: &EvolutionContext, settings: &Settings) -> Result<Mutation, NeatError> {
    let candidates = splittable_connections(genome, context);
    let split = *candidates.choose(rng).ok_or(NeatError::NoAvailableMutation(MutationKind::Node))?;
    let conn = genome.connection(split).ok_or(NeatError::UnknownConnection(split))?;
    Ok(Mutation::Node {
        split,
        src: conn.src,
        dst: conn.dst,
        bias: sample_symmetric(rng, settings.bias_range),
        assignment: None,
    })
}

impl Genome {
    /// Applies a resolved mutation. Structural mutations must have gone
    /// through `Mutation::resolve` first.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<(), NeatError> {
        match mutation {
            Mutation::Weight { innovation, new, .. } => self.set_weight(*innovation, *new),
            Mutation::Bias { node, new, .. } => self.set_bias(*node, *new),
            Mutation::Connection { src, dst, weight, innovation } => {
                let innovation = innovation.ok_or(NeatError::UnresolvedInnovation)?;
                self.add_connection(innovation, *src, *dst, *weight)
            }
            Mutation::Node { split, bias, assignment, .. } => {
                let assignment = assignment.ok_or(NeatError::UnresolvedInnovation)?;
                self.split_connection(*split, assignment, *bias)
            }
        }
    }
}

/// Rolls each mutation kind against its rate and applies the winners in
/// order (weight, bias, connection, node). Every structural proposal is
/// resolved against the current ledger right before it is applied, so it
/// sees innovations minted earlier in the same generation.
pub fn mutate<R: Rng>(rng: &mut R, genome: &mut Genome, context: &mut EvolutionContext, settings: &Settings) -> Result<Vec<Mutation>, NeatError> {
    let mut applied = Vec::new();

    if rng.gen::<f64>() < settings.mutate_weight_rate && !genome.is_empty() {
        let mutation = propose_weight(rng, genome, settings)?;
        genome.apply(&mutation)?;
        applied.push(mutation);
    }

    if rng.gen::<f64>() < settings.mutate_bias_rate && genome.nodes().values().any(|n| !n.is_input()) {
        let mutation = propose_bias(rng, genome, settings)?;
        genome.apply(&mutation)?;
        applied.push(mutation);
    }

    if rng.gen::<f64>() < settings.mutate_add_connection_rate && !genome.available_connections(true).is_empty() {
        let mut mutation = propose_connection(rng, genome, settings)?;
        mutation.resolve(context);
        genome.apply(&mutation)?;
        applied.push(mutation);
    }

    if rng.gen::<f64>() < settings.mutate_add_node_rate && !splittable_connections(genome, context).is_empty() {
        let mut mutation = propose_node(rng, genome, context, settings)?;
        mutation.resolve(context);
        genome.apply(&mutation)?;
        applied.push(mutation);
    }

    for mutation in &applied {
        log::trace!("applied {}", mutation);
    }
    Ok(applied)
}
