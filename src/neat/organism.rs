use std::ops::{Index, IndexMut};

use rand::Rng;

use super::error::NeatError;
use super::genome::Genome;
use super::settings::Settings;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct OrganismIndex(pub usize);

/// A genome together with the fitness the environment credited it with.
#[derive(Clone, Debug)]
pub struct Organism {
    pub genome: Genome,
    pub fitness: f64,
}

impl Organism {
    pub fn create_from_genome(genome: Genome) -> Organism {
        Organism { genome, fitness: 0.0 }
    }

    pub fn init<R: Rng>(rng: &mut R, settings: &Settings) -> Organism {
        Organism::create_from_genome(Genome::init(rng, settings))
    }

    pub fn activate(&mut self, sensor_values: &[f64]) -> Result<Vec<f64>, NeatError> {
        self.genome.activate(sensor_values)
    }

    pub fn add_fitness(&mut self, delta: f64) {
        self.fitness += delta;
    }

    pub fn clear_values(&mut self) {
        self.genome.reset();
    }
}

#[derive(Clone, Debug, Default)]
pub struct Organisms(Vec<Organism>);

impl Organisms {
    pub fn new(data: Vec<Organism>) -> Organisms {
        Organisms(data)
    }

    pub fn push(&mut self, organism: Organism) {
        self.0.push(organism);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: OrganismIndex) -> Option<&Organism> {
        self.0.get(index.0)
    }

    pub fn get_mut(&mut self, index: OrganismIndex) -> Option<&mut Organism> {
        self.0.get_mut(index.0)
    }

    pub fn iter(&self) -> std::slice::Iter<Organism> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<Organism> {
        self.0.iter_mut()
    }

    pub fn indices(&self) -> impl Iterator<Item = OrganismIndex> {
        (0..self.0.len()).map(OrganismIndex)
    }
}

impl Index<OrganismIndex> for Organisms {
    type Output = Organism;
    fn index(&self, index: OrganismIndex) -> &Self::Output {
        &self.0[index.0]
    }
}

impl IndexMut<OrganismIndex> for Organisms {
    fn index_mut(&mut self, index: OrganismIndex) -> &mut Self::Output {
        &mut self.0[index.0]
    }
}
