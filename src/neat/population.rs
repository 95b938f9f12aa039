use itertools::Itertools;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rustc_hash::FxHashMap;

use super::crossover::cross_over;
use super::error::NeatError;
use super::innovation::EvolutionContext;
use super::mutation::mutate;
use super::organism::{Organism, OrganismIndex, Organisms};
use super::settings::Settings;
use super::species::SpeciesSet;

/// The environment a population is scored against.
pub trait Arena {
    /// Sensor vectors an organism is activated with, one pass each.
    fn generate_inputs(&self) -> Vec<Vec<f64>>;
    /// Fitness for the outputs produced by the inputs above, in the same order.
    fn evaluate_organism(&self, outputs: &[Vec<f64>]) -> f64;
}

pub struct Population {
    pub organisms: Organisms,
    pub species: SpeciesSet,
    pub context: EvolutionContext,
    pub generation: usize,
}

/// Survivors of one species after culling, with their shared fitness.
struct BreedingPool {
    survivors: Vec<OrganismIndex>,
    shared_fitness: Vec<f64>,
    total_fitness: f64,
}

/// Number of members removed from a species of `size` when culling `fraction`
/// of it. At least one member always survives.
pub fn cull_count(size: usize, fraction: f64) -> usize {
    let n = (size as f64 * fraction).round().max(0.0) as usize;
    n.min(size.saturating_sub(1))
}

/// Index drawn with probability proportional to `weights`, uniformly when the
/// weights cannot form a distribution (all zero, negative or NaN).
fn weighted_choice<R: Rng>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    match WeightedIndex::new(weights) {
        Ok(dist) => Some(dist.sample(rng)),
        Err(_) => Some(rng.gen_range(0..weights.len())),
    }
}

impl Population {
    pub fn init<R: Rng>(rng: &mut R, settings: &Settings) -> Result<Population, NeatError> {
        settings.validate()?;

        log::info!("initializing population of {}", settings.n_organisms);
        let organisms = (0..settings.n_organisms).map(|_| Organism::init(rng, settings)).collect();

        let mut res = Population {
            organisms: Organisms::new(organisms),
            species: SpeciesSet::new(),
            context: EvolutionContext::init(settings.n_sensor_nodes, settings.n_output_nodes),
            generation: 0,
        };
        res.species.speciate(rng, &res.organisms, settings);
        log::info!("population initialized with {} species", res.species.len());
        Ok(res)
    }

    /// Scores every organism against `arena`, replacing its previous fitness.
    pub fn evaluate<A: Arena>(&mut self, arena: &A) -> Result<(), NeatError> {
        for org in self.organisms.iter_mut() {
            let outputs = arena.generate_inputs().iter().map(|input| org.activate(input)).collect::<Result<Vec<_>, _>>()?;
            org.fitness = arena.evaluate_organism(&outputs);
        }
        self.species.set_champions(&self.organisms);
        Ok(())
    }

    pub fn add_fitness(&mut self, organism_index: OrganismIndex, delta: f64) -> Result<(), NeatError> {
        let org = self
            .organisms
            .get_mut(organism_index)
            .ok_or(NeatError::UnknownOrganism { index: organism_index.0 })?;
        org.add_fitness(delta);
        Ok(())
    }

    pub fn champion(&self) -> Option<(OrganismIndex, &Organism)> {
        self.organisms
            .indices()
            .map(|i| (i, &self.organisms[i]))
            .max_by(|a, b| a.1.fitness.total_cmp(&b.1.fitness))
    }

    pub fn fitness_map(&self) -> FxHashMap<OrganismIndex, f64> {
        self.organisms.indices().map(|i| (i, self.organisms[i].fitness)).collect()
    }

    fn breeding_pools(&self, fitness: &FxHashMap<OrganismIndex, f64>, settings: &Settings) -> Vec<BreedingPool> {
        let fitness_of = |i: &OrganismIndex| fitness.get(i).copied().unwrap_or(0.0);

        self.species
            .iter()
            .map(|s| {
                let size = s.members.len();
                let mut ranked = s.members.clone();
                ranked.sort_by(|a, b| fitness_of(b).total_cmp(&fitness_of(a)).then(a.cmp(b)));

                let n_culled = cull_count(size, settings.cull_fraction);
                ranked.truncate(size - n_culled);
                log::debug!("species {} culled {} of {}", s.id.0, n_culled, size);

                let shared_fitness = ranked.iter().map(|i| fitness_of(i).max(0.0) / size as f64).collect_vec();
                let total_fitness: f64 = shared_fitness.iter().sum();
                BreedingPool {
                    survivors: ranked,
                    shared_fitness,
                    total_fitness,
                }
            })
            .collect()
    }

    fn draw_parent<R: Rng>(rng: &mut R, pool: &BreedingPool, exclude: Option<OrganismIndex>) -> Option<OrganismIndex> {
        let (candidates, weights): (Vec<_>, Vec<_>) = pool
            .survivors
            .iter()
            .copied()
            .zip(pool.shared_fitness.iter().copied())
            .filter(|(i, _)| Some(*i) != exclude)
            .unzip();
        if candidates.is_empty() {
            // a lone survivor mates with itself
            return exclude;
        }
        weighted_choice(rng, &weights).map(|choice| candidates[choice])
    }

    /// Champions of the species large enough to be carried over unchanged.
    fn elites(&self, pools: &[BreedingPool], settings: &Settings) -> Vec<OrganismIndex> {
        self.species
            .iter()
            .zip(pools)
            .filter(|(s, _)| s.members.len() > settings.elitism_species_size_threshold)
            .filter_map(|(_, pool)| pool.survivors.first().copied())
            .collect()
    }

    /// Draws the two parents for one offspring slot: parent A's species by
    /// total shared fitness, then parent A within it. Parent B comes from an
    /// independently drawn species with `interspecies_mate_rate`, otherwise
    /// from parent A's species.
    fn draw_parents<R: Rng>(rng: &mut R, pools: &[BreedingPool], species_weights: &[f64], settings: &Settings) -> Result<(OrganismIndex, OrganismIndex), NeatError> {
        let species_a = weighted_choice(rng, species_weights).ok_or(NeatError::EmptyPopulation)?;
        let parent_a = Self::draw_parent(rng, &pools[species_a], None).ok_or(NeatError::EmptyPopulation)?;

        let species_b = if rng.gen::<f64>() < settings.interspecies_mate_rate {
            weighted_choice(rng, species_weights).ok_or(NeatError::EmptyPopulation)?
        } else {
            species_a
        };
        let parent_b = Self::draw_parent(rng, &pools[species_b], Some(parent_a)).ok_or(NeatError::EmptyPopulation)?;
        Ok((parent_a, parent_b))
    }

    /// Breeds the next set of organisms from the current species using the
    /// supplied fitness values. Organisms absent from `fitness` count as zero.
    pub fn reproduce<R: Rng>(&mut self, rng: &mut R, fitness: &FxHashMap<OrganismIndex, f64>, settings: &Settings) -> Result<Organisms, NeatError> {
        if self.species.is_empty() {
            return Err(NeatError::EmptyPopulation);
        }

        let pools = self.breeding_pools(fitness, settings);
        let species_weights = pools.iter().map(|p| p.total_fitness).collect_vec();
        let mut offspring = Organisms::default();

        for elite in self.elites(&pools, settings).into_iter().take(settings.n_organisms) {
            offspring.push(Organism::create_from_genome(self.organisms[elite].genome.clone()));
        }
        let n_elites = offspring.len();

        while offspring.len() < settings.n_organisms {
            let (parent_a, parent_b) = Self::draw_parents(rng, &pools, &species_weights, settings)?;

            let (org_a, org_b) = (&self.organisms[parent_a], &self.organisms[parent_b]);
            let fitness_a = fitness.get(&parent_a).copied().unwrap_or(0.0);
            let fitness_b = fitness.get(&parent_b).copied().unwrap_or(0.0);

            let mut child = if rng.gen::<f64>() < settings.crossover_rate {
                match cross_over(rng, &org_a.genome, fitness_a, &org_b.genome, fitness_b) {
                    Ok(genome) => genome,
                    Err(e) => {
                        log::debug!("crossover of {} and {} failed ({}), cloning the fitter parent", parent_a.0, parent_b.0, e);
                        if fitness_b > fitness_a {
                            org_b.genome.clone()
                        } else {
                            org_a.genome.clone()
                        }
                    }
                }
            } else {
                org_a.genome.clone()
            };
            child.reset();

            mutate(rng, &mut child, &mut self.context, settings)?;
            offspring.push(Organism::create_from_genome(child));
        }

        log::debug!("bred {} offspring and kept {} elites", offspring.len() - n_elites, n_elites);
        Ok(offspring)
    }

    /// Replaces the population with offspring bred from the current fitness
    /// values and reclassifies them into species.
    pub fn next_generation<R: Rng>(&mut self, rng: &mut R, settings: &Settings) -> Result<(), NeatError> {
        let fitness = self.fitness_map();
        let best = fitness.values().copied().fold(f64::NEG_INFINITY, f64::max);

        self.organisms = self.reproduce(rng, &fitness, settings)?;
        self.generation += 1;
        self.species.speciate(rng, &self.organisms, settings);

        log::info!(
            "gen: {}; species: {}; best fitness: {:.4}; innovations: {}",
            self.generation,
            self.species.len(),
            best,
            self.context.next_innovation_number().0
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neat::genome::{Connection, Genome};
    use crate::neat::node::{Node, NodeId};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn small_settings() -> Settings {
        let mut settings = Settings::standard(2, 1);
        settings.n_organisms = 20;
        settings
    }

    fn genome_with_weight(weight: f64) -> Genome {
        Genome::create(
            vec![Node::input(NodeId(0)), Node::input(NodeId(1)), Node::output(NodeId(2), 0.0)],
            vec![Connection::create(0, 0, 2, weight, true), Connection::create(1, 1, 2, 0.0, true)],
        )
        .unwrap()
    }

    fn population_from(weights: &[f64], settings: &Settings) -> Population {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(99);
        let organisms = Organisms::new(weights.iter().map(|&w| Organism::create_from_genome(genome_with_weight(w))).collect());
        let mut species = SpeciesSet::new();
        species.speciate(&mut rng, &organisms, settings);
        Population {
            organisms,
            species,
            context: EvolutionContext::init(2, 1),
            generation: 0,
        }
    }

    struct Constant;

    impl Arena for Constant {
        fn generate_inputs(&self) -> Vec<Vec<f64>> {
            vec![vec![1.0, 0.0], vec![0.0, 1.0]]
        }

        fn evaluate_organism(&self, outputs: &[Vec<f64>]) -> f64 {
            outputs.iter().map(|o| o[0]).sum()
        }
    }

    #[test]
    fn test_init() {
        let settings = small_settings();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let population = Population::init(&mut rng, &settings).unwrap();
        assert_eq!(population.organisms.len(), settings.n_organisms);
        assert!(!population.species.is_empty());
        assert_eq!(population.context.next_innovation_number().0, 2);
    }

    #[test]
    fn test_init_rejects_invalid_settings() {
        let mut settings = small_settings();
        settings.n_organisms = 0;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        assert!(matches!(Population::init(&mut rng, &settings), Err(NeatError::InvalidSettings(_))));
    }

    #[test]
    fn test_cull_count() {
        assert_eq!(cull_count(3, 0.33), 1);
        assert_eq!(cull_count(1, 0.33), 0);
        assert_eq!(cull_count(10, 0.33), 3);
        assert_eq!(cull_count(4, 1.0), 3);
        assert_eq!(cull_count(0, 0.5), 0);
    }

    #[test]
    fn test_culling_per_species() {
        let mut settings = small_settings();
        settings.weight_coefficient = 1.0;
        settings.species_distance_threshold = 0.5;
        settings.cull_fraction = 0.33;
        let population = population_from(&[0.0, 0.1, 0.2, 5.0], &settings);
        assert_eq!(population.species.len(), 2);

        let fitness: FxHashMap<_, _> = [1.0, 3.0, 2.0, 7.0].iter().enumerate().map(|(i, &f)| (OrganismIndex(i), f)).collect();
        let pools = population.breeding_pools(&fitness, &settings);

        let mut sizes = pools.iter().map(|p| p.survivors.len()).collect_vec();
        sizes.sort();
        assert_eq!(sizes, vec![1, 2]);

        let big = pools.iter().find(|p| p.survivors.len() == 2).unwrap();
        assert_eq!(big.survivors, vec![OrganismIndex(1), OrganismIndex(2)]);
        // shared by the size before culling
        assert_eq!(big.shared_fitness, vec![1.0, 2.0 / 3.0]);
        let small = pools.iter().find(|p| p.survivors.len() == 1).unwrap();
        assert_eq!(small.total_fitness, 7.0);
    }

    #[test]
    fn test_draw_parent_excludes_first_parent() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let pool = BreedingPool {
            survivors: vec![OrganismIndex(0), OrganismIndex(1)],
            shared_fitness: vec![10.0, 0.0],
            total_fitness: 10.0,
        };
        for _ in 0..20 {
            assert_eq!(Population::draw_parent(&mut rng, &pool, Some(OrganismIndex(0))), Some(OrganismIndex(1)));
            assert_eq!(Population::draw_parent(&mut rng, &pool, None), Some(OrganismIndex(0)));
        }

        let single = BreedingPool {
            survivors: vec![OrganismIndex(4)],
            shared_fitness: vec![1.0],
            total_fitness: 1.0,
        };
        assert_eq!(Population::draw_parent(&mut rng, &single, Some(OrganismIndex(4))), Some(OrganismIndex(4)));
    }

    #[test]
    fn test_elitism_keeps_champion() {
        let mut settings = small_settings();
        settings.n_organisms = 6;
        settings.elitism_species_size_threshold = 5;
        let mut population = population_from(&[0.0, 0.01, 0.02, 0.03, 0.04, 0.05], &settings);
        assert_eq!(population.species.len(), 1);

        let fitness: FxHashMap<_, _> = (0..6).map(|i| (OrganismIndex(i), if i == 3 { 9.0 } else { 1.0 })).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let offspring = population.reproduce(&mut rng, &fitness, &settings).unwrap();

        assert_eq!(offspring.len(), 6);
        let elite = &offspring[OrganismIndex(0)].genome;
        assert_eq!(elite.connection(crate::neat::innovation::InnovationNumber(0)).unwrap().weight, 0.03);
    }

    #[test]
    fn test_elitism_needs_more_members_than_threshold() {
        let mut settings = small_settings();
        settings.elitism_species_size_threshold = 5;
        let fitness: FxHashMap<_, _> = (0..6).map(|i| (OrganismIndex(i), i as f64)).collect();

        let at_threshold = population_from(&[0.0, 0.01, 0.02, 0.03, 0.04], &settings);
        let pools = at_threshold.breeding_pools(&fitness, &settings);
        assert!(at_threshold.elites(&pools, &settings).is_empty());

        let above = population_from(&[0.0, 0.01, 0.02, 0.03, 0.04, 0.05], &settings);
        let pools = above.breeding_pools(&fitness, &settings);
        assert_eq!(above.elites(&pools, &settings), vec![OrganismIndex(5)]);
    }

    fn two_species(settings: &mut Settings) -> Population {
        settings.weight_coefficient = 1.0;
        settings.species_distance_threshold = 0.5;
        settings.cull_fraction = 0.0;
        let population = population_from(&[0.0, 0.1, 5.0, 5.1], settings);
        assert_eq!(population.species.len(), 2);
        population
    }

    #[test]
    fn test_interspecies_mating() {
        let mut settings = small_settings();
        let population = two_species(&mut settings);
        let fitness: FxHashMap<_, _> = (0..4).map(|i| (OrganismIndex(i), 1.0)).collect();
        let pools = population.breeding_pools(&fitness, &settings);
        let species_weights = pools.iter().map(|p| p.total_fitness).collect_vec();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);

        let mut crossed = 0;
        settings.interspecies_mate_rate = 1.0;
        for _ in 0..200 {
            let (a, b) = Population::draw_parents(&mut rng, &pools, &species_weights, &settings).unwrap();
            assert_ne!(a, b);
            if population.species.species_of(a) != population.species.species_of(b) {
                crossed += 1;
            }
        }
        assert!(crossed > 50);

        settings.interspecies_mate_rate = 0.0;
        for _ in 0..200 {
            let (a, b) = Population::draw_parents(&mut rng, &pools, &species_weights, &settings).unwrap();
            assert_eq!(population.species.species_of(a), population.species.species_of(b));
        }
    }

    #[test]
    fn test_clone_only_reproduction() {
        let mut settings = small_settings();
        settings.crossover_rate = 0.0;
        settings.mutate_weight_rate = 0.0;
        settings.mutate_bias_rate = 0.0;
        settings.mutate_add_connection_rate = 0.0;
        settings.mutate_add_node_rate = 0.0;
        settings.elitism_species_size_threshold = settings.n_organisms;
        settings.cull_fraction = 0.33;
        let mut population = population_from(&[0.0, 0.1, 0.2, 0.3], &settings);
        assert_eq!(population.species.len(), 1);

        let fitness: FxHashMap<_, _> = (0..4).map(|i| (OrganismIndex(i), (i + 1) as f64)).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(8);
        let offspring = population.reproduce(&mut rng, &fitness, &settings).unwrap();

        assert_eq!(offspring.len(), settings.n_organisms);
        for child in offspring.iter() {
            // organism 0 was culled, every child copies one of the survivors
            let weight = child.genome.connection(crate::neat::innovation::InnovationNumber(0)).unwrap().weight;
            assert!([0.1, 0.2, 0.3].contains(&weight), "unexpected weight {}", weight);
            assert_eq!(child.genome.len(), 2);
            assert_eq!(child.genome.hidden_count(), 0);
        }
    }

    #[test]
    fn test_add_fitness_unknown_organism() {
        let settings = small_settings();
        let mut population = population_from(&[0.0, 0.1], &settings);
        population.add_fitness(OrganismIndex(1), 2.5).unwrap();
        assert_eq!(population.organisms[OrganismIndex(1)].fitness, 2.5);
        assert_eq!(population.add_fitness(OrganismIndex(2), 1.0), Err(NeatError::UnknownOrganism { index: 2 }));
    }

    #[test]
    fn test_zero_fitness_still_breeds() {
        let settings = small_settings();
        let mut population = population_from(&[0.0, 0.5, 1.0], &settings);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let offspring = population.reproduce(&mut rng, &FxHashMap::default(), &settings).unwrap();
        assert_eq!(offspring.len(), settings.n_organisms);
    }

    #[test]
    fn test_generations() {
        let settings = small_settings();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let mut population = Population::init(&mut rng, &settings).unwrap();
        for _ in 0..10 {
            population.evaluate(&Constant).unwrap();
            population.add_fitness(OrganismIndex(0), 0.5).unwrap();
            assert!(population.champion().is_some());
            population.next_generation(&mut rng, &settings).unwrap();
        }
        assert_eq!(population.generation, 10);
        assert_eq!(population.organisms.len(), settings.n_organisms);
        let members: usize = population.species.iter().map(|s| s.members.len()).sum();
        assert_eq!(members, settings.n_organisms);
        for org in population.organisms.iter() {
            assert_eq!(org.genome.n_sensor_nodes, 2);
            assert_eq!(org.genome.n_output_nodes, 1);
        }
    }

    #[test]
    fn test_empty_population() {
        let settings = small_settings();
        let mut population = population_from(&[], &settings);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(6);
        assert_eq!(population.reproduce(&mut rng, &FxHashMap::default(), &settings).unwrap_err(), NeatError::EmptyPopulation);
    }
}
