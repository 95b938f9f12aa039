use super::error::NeatError;

#[derive(Clone, Debug)]
pub struct Settings {
    pub n_organisms: usize,
    pub n_sensor_nodes: usize,
    pub n_output_nodes: usize,

    /// New weights are drawn from `-weight_range..weight_range`.
    pub weight_range: f64,
    /// New biases are drawn from `-bias_range..bias_range`.
    pub bias_range: f64,

    pub excess_coefficient: f64,
    pub disjoint_coefficient: f64,
    pub weight_coefficient: f64,
    pub species_distance_threshold: f64,

    pub mutate_weight_rate: f64,
    pub mutate_weight_scale: f64,
    pub mutate_weight_reassign_rate: f64,
    pub mutate_bias_rate: f64,
    pub mutate_bias_scale: f64,
    pub mutate_bias_reassign_rate: f64,
    pub mutate_add_connection_rate: f64,
    pub mutate_add_node_rate: f64,

    /// Fraction of each species removed, lowest fitness first, before breeding.
    pub cull_fraction: f64,
    /// Species with more members than this keep their champion unchanged.
    pub elitism_species_size_threshold: usize,
    pub interspecies_mate_rate: f64,
    pub crossover_rate: f64,
}

impl Settings {
    pub fn standard(n_sensor_nodes: usize, n_output_nodes: usize) -> Settings {
        Settings {
            n_organisms: 100,
            n_sensor_nodes,
            n_output_nodes,
            weight_range: 2.0,
            bias_range: 2.0,
            excess_coefficient: 1.0,
            disjoint_coefficient: 1.0,
            weight_coefficient: 0.4,
            species_distance_threshold: 1.5,
            mutate_weight_rate: 0.8,
            mutate_weight_scale: 0.3,
            mutate_weight_reassign_rate: 0.1,
            mutate_bias_rate: 0.3,
            mutate_bias_scale: 0.3,
            mutate_bias_reassign_rate: 0.1,
            mutate_add_connection_rate: 0.1,
            mutate_add_node_rate: 0.05,
            cull_fraction: 0.33,
            elitism_species_size_threshold: 5,
            interspecies_mate_rate: 0.01,
            crossover_rate: 0.75,
        }
    }

    pub fn validate(&self) -> Result<(), NeatError> {
        if self.n_organisms == 0 {
            return Err(NeatError::InvalidSettings("population size must be at least 1".to_string()));
        }
        if self.n_sensor_nodes == 0 || self.n_output_nodes == 0 {
            return Err(NeatError::InvalidSettings("genomes need at least one input and one output".to_string()));
        }

        let positive = [
            ("weight_range", self.weight_range),
            ("bias_range", self.bias_range),
            ("species_distance_threshold", self.species_distance_threshold),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(NeatError::InvalidSettings(format!("{} must be positive, got {}", name, value)));
            }
        }

        let non_negative = [
            ("excess_coefficient", self.excess_coefficient),
            ("disjoint_coefficient", self.disjoint_coefficient),
            ("weight_coefficient", self.weight_coefficient),
            ("mutate_weight_scale", self.mutate_weight_scale),
            ("mutate_bias_scale", self.mutate_bias_scale),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(NeatError::InvalidSettings(format!("{} must not be negative, got {}", name, value)));
            }
        }

        let probabilities = [
            ("mutate_weight_rate", self.mutate_weight_rate),
            ("mutate_weight_reassign_rate", self.mutate_weight_reassign_rate),
            ("mutate_bias_rate", self.mutate_bias_rate),
            ("mutate_bias_reassign_rate", self.mutate_bias_reassign_rate),
            ("mutate_add_connection_rate", self.mutate_add_connection_rate),
            ("mutate_add_node_rate", self.mutate_add_node_rate),
            ("cull_fraction", self.cull_fraction),
            ("interspecies_mate_rate", self.interspecies_mate_rate),
            ("crossover_rate", self.crossover_rate),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(NeatError::InvalidSettings(format!("{} must be within [0, 1], got {}", name, value)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_is_valid() {
        assert!(Settings::standard(3, 1).validate().is_ok());
    }

    #[test]
    fn test_zero_population_rejected() {
        let mut settings = Settings::standard(3, 1);
        settings.n_organisms = 0;
        assert!(matches!(settings.validate(), Err(NeatError::InvalidSettings(_))));
    }

    #[test]
    fn test_bad_rate_rejected() {
        let mut settings = Settings::standard(3, 1);
        settings.crossover_rate = 1.5;
        assert!(settings.validate().is_err());

        let mut settings = Settings::standard(3, 1);
        settings.weight_range = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::standard(0, 1);
        settings.n_organisms = 10;
        assert!(settings.validate().is_err());
    }
}
