use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// 256-bit stream seed for one case. Depends only on the base seed and the
/// global case index, never on host state.
pub fn case_seed(base_seed: u64, case_index: usize) -> [u8; 32] {
    Sha256::new()
        .chain_update(base_seed.to_le_bytes())
        .chain_update((case_index as u64).to_le_bytes())
        .finalize()
        .into()
}

pub fn case_rng(base_seed: u64, case_index: usize) -> ChaCha8Rng {
    ChaCha8Rng::from_seed(case_seed(base_seed, case_index))
}
