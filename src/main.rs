use std::error::Error;
use std::time::Instant;

use race_sim::{
    DiscreteEventSimulation, Race, RaceConfig, RaceDriver, RaceSummary, Simulation, StopSignal,
};

const SEED: u64 = 42;

fn run<D: RaceDriver>(name: &str, config: &RaceConfig) -> Result<RaceSummary, Box<dyn Error>> {
    let start = Instant::now();
    let mut driver = D::new(Race::new(config.clone(), SEED)?);
    let status = driver.run(&mut (), &StopSignal::new());
    eprintln!(
        "{}: {:?} after {:.1}s simulated ({:?} wall)",
        name,
        status,
        driver.race().time(),
        start.elapsed()
    );
    Ok(RaceSummary::of(driver.race()))
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = RaceConfig::default();
    let fixed = run::<Simulation>("fixed-step", &config)?;
    let discrete = run::<DiscreteEventSimulation>("discrete-event", &config)?;
    if fixed.total_collisions() != discrete.total_collisions() {
        eprintln!(
            "drivers disagree: {} vs {} collisions",
            fixed.total_collisions(),
            discrete.total_collisions()
        );
    }
    println!("{}", serde_json::to_string_pretty(&fixed)?);
    Ok(())
}
