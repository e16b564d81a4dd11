//! Seeded random instance generator.

use mvrppd_core::{Instance, Request, Stop, Vehicle};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Shape of the generated instances. Coordinates are uniform over a
/// `size x size` square; the depots of all vehicles sit at its center so
/// every route starts and ends in the same place.
#[derive(Clone, Copy, Debug)]
pub struct GeneratorConfig {
    pub vehicles: usize,
    pub requests: usize,
    pub size: f64,
    pub seed: u64,
}

/// Generates a valid instance; the same configuration always yields the
/// same instance.
pub fn generate(config: &GeneratorConfig) -> Instance {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
    let size = config.size;
    let depot = Stop {
        x: size / 2.0,
        y: size / 2.0,
        t_visit: 0.0,
    };

    let vehicles: Vec<Vehicle> = (0..config.vehicles)
        .map(|_| Vehicle {
            t_start: rng.gen_range(0.0..size / 10.0),
            // Generous enough to reach a handful of requests, tight enough
            // to make vehicle assignment matter.
            t_limit: rng.gen_range(2.0 * size..6.0 * size),
            speed: rng.gen_range(0.5..2.0),
            capacity: rng.gen_range(1.0..10.0),
            source: depot,
            target: depot,
        })
        .collect();

    let requests: Vec<Request> = (0..config.requests)
        .map(|_| {
            let stop = |rng: &mut Xoshiro256PlusPlus| Stop {
                x: rng.gen_range(0.0..size),
                y: rng.gen_range(0.0..size),
                t_visit: rng.gen_range(0.0..1.0),
            };

            Request {
                profit: rng.gen_range(1.0..10.0),
                t_create: rng.gen_range(0.0..size / 2.0),
                demand: rng.gen_range(0.5..4.0),
                source: stop(&mut rng),
                target: stop(&mut rng),
            }
        })
        .collect();

    Instance::from_parts(&vehicles, &requests)
}
