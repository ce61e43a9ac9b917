use rand::{SeedableRng, rngs::StdRng};

/// Every random source in the harness is built here. A seed gives a reproducible stream, `None`
/// draws fresh entropy from the OS.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
