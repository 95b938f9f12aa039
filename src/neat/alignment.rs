use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use super::error::NeatError;
use super::genome::{Connection, Genome};
use super::innovation::InnovationNumber;

pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

pub enum AlignedPair<'a, K, V> {
    HasBoth((&'a K, &'a V), (&'a K, &'a V)),
    HasLeft((&'a K, &'a V)),
    HasRight((&'a K, &'a V)),
}

/// Walks two maps whose keys are sorted ascending, pairing up equal keys.
pub fn align_iter<'a, K, V, M>(m1: &'a FxIndexMap<K, V>, m2: &'a FxIndexMap<K, V>, map: &mut M)
where
    K: Ord,
    M: FnMut(AlignedPair<'a, K, V>),
{
    let mut left = m1.iter().peekable();
    let mut right = m2.iter().peekable();

    loop {
        let pair = match (left.peek().copied(), right.peek().copied()) {
            (Some(x1), Some(x2)) => {
                if x1.0 == x2.0 {
                    left.next();
                    right.next();
                    AlignedPair::HasBoth(x1, x2)
                } else if x1.0 < x2.0 {
                    left.next();
                    AlignedPair::HasLeft(x1)
                } else {
                    right.next();
                    AlignedPair::HasRight(x2)
                }
            }
            //finished with right, still busy with left
            (Some(x1), None) => {
                left.next();
                AlignedPair::HasLeft(x1)
            }
            //finished with left, still busy with right
            (None, Some(x2)) => {
                right.next();
                AlignedPair::HasRight(x2)
            }
            (None, None) => break,
        };
        map(pair);
    }
}

/// Like `align_iter`, keeping every entry the closure returns.
pub fn align_map<'a, K, V, M>(m1: &'a FxIndexMap<K, V>, m2: &'a FxIndexMap<K, V>, map: &mut M) -> Vec<(K, V)>
where
    K: Ord,
    M: FnMut(AlignedPair<'a, K, V>) -> Option<(K, V)>,
{
    let mut res = Vec::with_capacity(std::cmp::max(m1.len(), m2.len()));
    align_iter(m1, m2, &mut |pair| {
        if let Some(entry) = map(pair) {
            res.push(entry);
        }
    });
    res
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Side {
    Left,
    Right,
}

/// Classification of two genomes' connection genes by innovation number.
#[derive(Clone, Debug, Default)]
pub struct GeneAlignment {
    pub matching: Vec<InnovationNumber>,
    pub disjoint: Vec<(InnovationNumber, Side)>,
    pub excess: Vec<(InnovationNumber, Side)>,
    /// Lower of the two genomes' highest innovation numbers.
    pub cutoff: InnovationNumber,
    /// Higher of the two genomes' highest innovation numbers.
    pub max_innovation: InnovationNumber,
}

/// A gene carried by only one genome is disjoint when its number lies below
/// `cutoff` and excess otherwise.
pub fn compare_genomes(left: &Genome, right: &Genome) -> Result<GeneAlignment, NeatError> {
    let (max_left, max_right) = match (left.max_innovation(), right.max_innovation()) {
        (Some(l), Some(r)) => (l, r),
        _ => return Err(NeatError::EmptyGenome),
    };

    let cutoff = std::cmp::min(max_left, max_right);
    let mut alignment = GeneAlignment {
        cutoff,
        max_innovation: std::cmp::max(max_left, max_right),
        ..GeneAlignment::default()
    };

    let mut classify = |pair: AlignedPair<InnovationNumber, Connection>| {
        let (innovation, side) = match pair {
            AlignedPair::HasBoth((innovation, _), _) => {
                alignment.matching.push(*innovation);
                return;
            }
            AlignedPair::HasLeft((innovation, _)) => (*innovation, Side::Left),
            AlignedPair::HasRight((innovation, _)) => (*innovation, Side::Right),
        };
        if innovation < cutoff {
            alignment.disjoint.push((innovation, side));
        } else {
            alignment.excess.push((innovation, side));
        }
    };
    align_iter(left.connections(), right.connections(), &mut classify);

    Ok(alignment)
}
