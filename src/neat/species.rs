use rand::seq::SliceRandom;
use rand::Rng;

use super::genome::Genome;
use super::organism::{OrganismIndex, Organisms};
use super::settings::Settings;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SpeciesId(pub usize);

#[derive(Clone, Debug)]
pub struct Species {
    pub id: SpeciesId,
    /// Kept as its own copy so the species outlives the organism it came from.
    pub representative: Genome,
    pub members: Vec<OrganismIndex>,
    pub champion: Option<OrganismIndex>,
    pub avg_fitness: f64,
}

/// All species of a population, persisted across generations.
#[derive(Clone, Debug, Default)]
pub struct SpeciesSet {
    pub species: Vec<Species>,
    next_species_id: usize,
}

impl SpeciesSet {
    pub fn new() -> SpeciesSet {
        SpeciesSet::default()
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<Species> {
        self.species.iter()
    }

    pub fn species_of(&self, organism_index: OrganismIndex) -> Option<SpeciesId> {
        self.species.iter().find(|s| s.members.contains(&organism_index)).map(|s| s.id)
    }

    /// Puts a genome into the first species whose representative is within
    /// the distance threshold, or founds a new species around it. A genome
    /// without connections has no defined distance and always founds its own.
    fn assign_species(&mut self, settings: &Settings, organism_index: OrganismIndex, genome: &Genome) {
        let species_index = self.species.iter().position(|species| {
            genome
                .distance(&species.representative, settings)
                .is_ok_and(|d| d < settings.species_distance_threshold)
        });

        match species_index {
            Some(index) => {
                self.species[index].members.push(organism_index);
            }
            None => {
                let id = SpeciesId(self.next_species_id);
                self.next_species_id += 1;
                log::debug!("founding species {} around organism {}", id.0, organism_index.0);
                self.species.push(Species {
                    id,
                    representative: genome.clone(),
                    members: vec![organism_index],
                    champion: None,
                    avg_fitness: 0.0,
                });
            }
        }
    }

    /// Reclassifies every organism against the existing representatives,
    /// visiting organisms in an order drawn from `rng`. Species left without
    /// members are dropped.
    pub fn speciate<R: Rng>(&mut self, rng: &mut R, organisms: &Organisms, settings: &Settings) {
        for s in self.species.iter_mut() {
            s.members.clear();
            s.champion = None;
        }

        let mut order: Vec<OrganismIndex> = organisms.indices().collect();
        order.shuffle(rng);
        for organism_index in order {
            self.assign_species(settings, organism_index, &organisms[organism_index].genome);
        }

        let before = self.species.len();
        self.species.retain(|s| !s.members.is_empty());
        if self.species.len() < before {
            log::debug!("{} species went extinct", before - self.species.len());
        }

        for s in self.species.iter_mut() {
            s.members.sort();
        }
        self.set_champions(organisms);
    }

    pub fn set_champions(&mut self, organisms: &Organisms) {
        for s in self.species.iter_mut() {
            let total_species_fitness: f64 = s.members.iter().map(|&i| organisms[i].fitness).sum();
            s.champion = s
                .members
                .iter()
                .copied()
                .max_by(|&a, &b| organisms[a].fitness.total_cmp(&organisms[b].fitness));
            s.avg_fitness = if s.members.is_empty() {
                0.0
            } else {
                total_species_fitness / s.members.len() as f64
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neat::genome::Connection;
    use crate::neat::node::{Node, NodeId};
    use crate::neat::organism::Organism;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn genome_with_weight(weight: f64) -> Genome {
        Genome::create(
            vec![Node::input(NodeId(0)), Node::output(NodeId(1), 0.0)],
            vec![Connection::create(0, 0, 1, weight, true)],
        )
        .unwrap()
    }

    fn organisms(weights: &[f64]) -> Organisms {
        Organisms::new(weights.iter().map(|&w| Organism::create_from_genome(genome_with_weight(w))).collect())
    }

    #[test]
    fn test_speciate_groups_by_distance() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let mut settings = Settings::standard(1, 1);
        settings.weight_coefficient = 1.0;
        settings.species_distance_threshold = 0.5;

        let population = organisms(&[0.0, 0.1, 0.2, 3.0, 3.1]);
        let mut species = SpeciesSet::new();
        species.speciate(&mut rng, &population, &settings);

        assert_eq!(species.len(), 2);
        let low = species.species_of(OrganismIndex(0)).unwrap();
        assert_eq!(species.species_of(OrganismIndex(1)), Some(low));
        assert_eq!(species.species_of(OrganismIndex(2)), Some(low));
        let high = species.species_of(OrganismIndex(3)).unwrap();
        assert_ne!(low, high);
        assert_eq!(species.species_of(OrganismIndex(4)), Some(high));
    }

    #[test]
    fn test_representative_outlives_members() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let mut settings = Settings::standard(1, 1);
        settings.weight_coefficient = 1.0;
        settings.species_distance_threshold = 0.5;

        let mut species = SpeciesSet::new();
        species.speciate(&mut rng, &organisms(&[0.0]), &settings);
        let id = species.species[0].id;

        // the founder is gone, a close relative still joins its species
        species.speciate(&mut rng, &organisms(&[0.3, 5.0]), &settings);
        assert_eq!(species.species_of(OrganismIndex(0)), Some(id));
        assert_eq!(species.species[0].representative.connection(crate::neat::innovation::InnovationNumber(0)).unwrap().weight, 0.0);

        // once no member is left the species disappears
        species.speciate(&mut rng, &organisms(&[5.1]), &settings);
        assert_eq!(species.len(), 1);
        assert_ne!(species.species[0].id, id);
    }

    #[test]
    fn test_champions() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let settings = Settings::standard(1, 1);
        let mut population = organisms(&[0.0, 0.05, 0.1]);
        population[OrganismIndex(0)].fitness = 1.0;
        population[OrganismIndex(1)].fitness = 4.0;
        population[OrganismIndex(2)].fitness = 1.0;

        let mut species = SpeciesSet::new();
        species.speciate(&mut rng, &population, &settings);
        assert_eq!(species.len(), 1);
        assert_eq!(species.species[0].champion, Some(OrganismIndex(1)));
        assert_eq!(species.species[0].avg_fitness, 2.0);
    }
}
