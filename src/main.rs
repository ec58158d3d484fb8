use NucEvolve::Examples::evolution_examples::evolution_examples;
use NucEvolve::Utils::logger::init_logger;
use log::LevelFilter;

pub fn main() {
    let _ = init_logger(LevelFilter::Info, None);
    let task: usize = 1;
    evolution_examples(task);
}
