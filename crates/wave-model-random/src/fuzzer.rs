use rand::{rngs::OsRng, Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

/// Seeded source of randomness for the mutation generator.
///
/// Uses the xoshiro256** PRNG so a run can be replayed from its seed.
///
/// # Examples
///
/// ```
/// use wave_model_random::Fuzzer;
///
/// let mut fuzzer = Fuzzer::from_seed_u64(7);
/// let n = fuzzer.random_int(1, 10);
/// assert!((1..10).contains(&n));
/// ```
pub struct Fuzzer {
    /// The seed used to initialize the PRNG.
    pub seed: [u8; 32],
    rng: Xoshiro256StarStar,
}

impl Fuzzer {
    /// Create a new fuzzer with an optional seed.
    ///
    /// If no seed is provided, a random seed will be generated using `OsRng`.
    pub fn new(seed: Option<[u8; 32]>) -> Self {
        let seed = seed.unwrap_or_else(|| {
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            bytes
        });
        Self {
            seed,
            rng: Xoshiro256StarStar::from_seed(seed),
        }
    }

    /// Expands a short numeric seed into a full 32-byte seed.
    pub fn from_seed_u64(seed: u64) -> Self {
        let mut bytes = [0u8; 32];
        Xoshiro256StarStar::seed_from_u64(seed).fill_bytes(&mut bytes);
        Self::new(Some(bytes))
    }

    /// Random integer in `[min, limit)`. Returns `min` for an empty range.
    pub fn random_int(&mut self, min: usize, limit: usize) -> usize {
        if limit <= min {
            return min;
        }
        self.rng.gen_range(min..limit)
    }

    /// Fair coin flip.
    pub fn random_bool(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }

    /// Pick a random element from a slice; `None` if it is empty.
    pub fn pick<'a, T>(&mut self, elements: &'a [T]) -> Option<&'a T> {
        if elements.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..elements.len());
        Some(&elements[idx])
    }
}
