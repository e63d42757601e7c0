use alloy::primitives::{keccak256, B256, U256};
use rand::Rng;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid seed '{seed}': must be a base-10 or 0x-prefixed base-16 number that fits in 32 bytes")]
pub struct SeedParseError {
    seed: String,
}

/// Master seed for sub-account derivation, held as 32 big-endian bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Seed {
    seed: [u8; 32],
}

/// Copies `seed` into `target` and right-pads with `0x01` to 32 bytes.
fn fill_bytes(seed: &[u8], target: &mut [u8; 32]) {
    if seed.len() < 32 {
        target[0..seed.len()].copy_from_slice(seed);
        target[seed.len()..32].fill(0x01);
    } else {
        target.copy_from_slice(&seed[0..32]);
    }
}

impl Seed {
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let mut seed = [0u8; 32];
        rng.fill(&mut seed);
        Self { seed }
    }

    /// Interprets `seed` as a byte array.
    /// - If `seed` is less than 32 bytes, it is right-padded with 0x01.
    /// - If `seed` is more than 32 bytes, only the first 32 bytes are used.
    pub fn from_bytes(seed_bytes: &[u8]) -> Self {
        let mut seed = [0u8; 32];
        fill_bytes(seed_bytes, &mut seed);
        Self { seed }
    }

    pub fn from_u256(seed: U256) -> Self {
        Self {
            seed: seed.to_be_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.seed
    }

    pub fn as_u256(&self) -> U256 {
        U256::from_be_bytes::<32>(self.seed)
    }

    /// Private key material for the sub-account at `index`.
    /// The same `(seed, index)` pair always yields the same bytes.
    pub fn key_material(&self, index: u64) -> B256 {
        let n = self.as_u256().wrapping_add(U256::from(index));
        keccak256(n.to_be_bytes::<32>())
    }
}

impl FromStr for Seed {
    type Err = SeedParseError;

    /// Interprets seed as a number in base 10 or 16.
    fn from_str(seed: &str) -> Result<Self, Self::Err> {
        let (radix, digits) = match seed.strip_prefix("0x") {
            Some(hex) => (16u64, hex),
            None => (10u64, seed),
        };
        U256::from_str_radix(digits, radix)
            .map(Self::from_u256)
            .map_err(|_| SeedParseError {
                seed: seed.to_owned(),
            })
    }
}

impl Default for Seed {
    fn default() -> Self {
        Self::random()
    }
}
