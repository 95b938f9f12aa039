pub mod alignment;
pub mod crossover;
pub mod error;
pub mod genome;
pub mod innovation;
pub mod mutation;
pub mod node;
pub mod organism;
pub mod population;
pub mod settings;
pub mod species;
