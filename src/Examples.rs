/// runnable demonstrations, selected by number from `main`
pub mod evolution_examples;
pub mod example_networks;
