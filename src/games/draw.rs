use crate::errors::{DrawError, DrawExhausted};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Smallest callable number
pub const DOMAIN_MIN: u8 = 1;
/// Largest callable number
pub const DOMAIN_MAX: u8 = 90;
/// Count of callable numbers
pub const DOMAIN_SIZE: usize = DOMAIN_MAX as usize;

/// Secret seed behind a round's draw order.
///
/// The commitment (sha256 of the seed) is published when the round opens and
/// the seed itself only once the round is finished, so players can replay the
/// calls with [`verify_draw_sequence`].
#[derive(Clone)]
pub struct DrawSeed {
    bytes: [u8; 32],
}

impl DrawSeed {
    /// Fresh seed from the OS RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn from_hex(seed_hex: &str) -> Result<Self, DrawError> {
        let decoded = hex::decode(seed_hex)
            .map_err(|e| DrawError::InvalidSeed(format!("Invalid seed hex: {}", e)))?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| DrawError::InvalidSeed("Seed must be 32 bytes".to_string()))?;
        Ok(Self { bytes })
    }

    /// Hex sha256 of the seed
    pub fn commitment(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.bytes);
        hex::encode(hasher.finalize())
    }

    pub fn reveal(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl std::fmt::Debug for DrawSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never leak the seed through logs
        f.debug_struct("DrawSeed")
            .field("commitment", &self.commitment())
            .finish()
    }
}

/// Numbers not yet drawn in the active round
#[derive(Debug, Clone)]
pub struct DrawState {
    remaining: Vec<u8>,
}

impl DrawState {
    /// Full domain 1..=90
    pub fn new() -> Self {
        Self {
            remaining: (DOMAIN_MIN..=DOMAIN_MAX).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn contains(&self, number: u8) -> bool {
        self.remaining.contains(&number)
    }

    #[cfg(test)]
    pub(crate) fn retain(&mut self, keep: impl FnMut(&u8) -> bool) {
        self.remaining.retain(keep);
    }
}

impl Default for DrawState {
    fn default() -> Self {
        Self::new()
    }
}

/// Draws without replacement.
///
/// Uniqueness comes from removing the chosen number from the `DrawState`,
/// not from filtering what has already been called.
pub struct RandomDraw {
    rng: ChaCha20Rng,
}

impl std::fmt::Debug for RandomDraw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomDraw").finish_non_exhaustive()
    }
}

impl RandomDraw {
    pub fn from_seed(seed: &DrawSeed) -> Self {
        Self {
            rng: ChaCha20Rng::from_seed(seed.bytes),
        }
    }

    /// Remove and return one number uniformly at random
    pub fn next(&mut self, remaining: &mut DrawState) -> Result<u8, DrawExhausted> {
        if remaining.is_empty() {
            return Err(DrawExhausted);
        }
        let index = self.rng.gen_range(0..remaining.remaining.len());
        Ok(remaining.remaining.swap_remove(index))
    }
}

/// Check that `called` is what the committed seed produces.
///
/// Returns `Ok(false)` when the seed does not match the commitment or the
/// replayed calls diverge; `called` may be any prefix of a full draw.
pub fn verify_draw_sequence(
    seed_hex: &str,
    commitment: &str,
    called: &[u8],
) -> Result<bool, DrawError> {
    let seed = DrawSeed::from_hex(seed_hex)?;
    if seed.commitment() != commitment {
        return Ok(false);
    }
    if called.len() > DOMAIN_SIZE {
        return Ok(false);
    }

    let mut draw = RandomDraw::from_seed(&seed);
    let mut state = DrawState::new();
    for expected in called {
        if draw.next(&mut state)? != *expected {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_full_draw_is_a_permutation_of_the_domain() {
        let mut draw = RandomDraw::from_seed(&DrawSeed::generate());
        let mut state = DrawState::new();
        let mut seen = HashSet::new();

        for _ in 0..DOMAIN_SIZE {
            let number = draw.next(&mut state).expect("domain not yet exhausted");
            assert!((DOMAIN_MIN..=DOMAIN_MAX).contains(&number));
            assert!(seen.insert(number), "number {} drawn twice", number);
        }

        assert!(state.is_empty());
        assert_eq!(draw.next(&mut state), Err(DrawExhausted));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let seed = DrawSeed::from_bytes([7u8; 32]);
        let mut a = RandomDraw::from_seed(&seed);
        let mut b = RandomDraw::from_seed(&seed);
        let (mut sa, mut sb) = (DrawState::new(), DrawState::new());

        for _ in 0..20 {
            assert_eq!(a.next(&mut sa), b.next(&mut sb));
        }
    }

    #[test]
    fn test_verify_draw_sequence() {
        let seed = DrawSeed::generate();
        let mut draw = RandomDraw::from_seed(&seed);
        let mut state = DrawState::new();
        let called: Vec<u8> = (0..15).map(|_| draw.next(&mut state).unwrap()).collect();

        assert!(verify_draw_sequence(&seed.reveal(), &seed.commitment(), &called).unwrap());

        let mut tampered = called.clone();
        tampered.swap(0, 1);
        assert!(!verify_draw_sequence(&seed.reveal(), &seed.commitment(), &tampered).unwrap());

        let other = DrawSeed::generate();
        assert!(!verify_draw_sequence(&other.reveal(), &seed.commitment(), &called).unwrap());
    }

    #[test]
    fn test_invalid_seed_hex() {
        assert!(matches!(
            DrawSeed::from_hex("zz"),
            Err(DrawError::InvalidSeed(_))
        ));
        assert!(matches!(
            DrawSeed::from_hex("abcd"),
            Err(DrawError::InvalidSeed(_))
        ));
    }

    #[test]
    fn test_debug_does_not_leak_seed() {
        let seed = DrawSeed::from_bytes([0xab; 32]);
        let debug = format!("{:?}", seed);
        assert!(!debug.contains(&seed.reveal()));
        assert!(debug.contains(&seed.commitment()));
    }
}
