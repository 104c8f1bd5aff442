//! Registry ID generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the numeric suffix in generated IDs.
pub trait IdSource: Send {
    fn next_u64(&mut self) -> u64;
}

/// OS-seeded generator, seeded once per registry.
#[derive(Debug)]
pub struct RandomIds {
    rng: StdRng,
}

impl RandomIds {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for RandomIds {
    fn next_u64(&mut self) -> u64 {
        self.rng.gen()
    }
}

impl<F> IdSource for F
where
    F: FnMut() -> u64 + Send,
{
    fn next_u64(&mut self) -> u64 {
        self()
    }
}

/// `{base}.{kind}.{n}` for the first `n` whose ID is not `taken`.
///
/// Resamples on collision without bound.
pub fn unique_id(
    source: &mut dyn IdSource,
    base: &str,
    kind: &str,
    taken: impl Fn(&str) -> bool,
) -> String {
    loop {
        let id = format!("{}.{}.{}", base, kind, source.next_u64());
        if !taken(&id) {
            return id;
        }
        tracing::debug!(id = %id, "generated id already in use, resampling");
    }
}
