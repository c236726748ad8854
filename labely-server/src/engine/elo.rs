//! Placeholder ELO policy
//!
//! Gold-standard items move ELO by a pseudo-random amount in
//! `[-MAX_ELO_DELTA, MAX_ELO_DELTA]`, seeded from `(session_id, item_id)` so
//! that replaying a submission always yields the same delta. Items without a
//! gradable answer never move ELO.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const MAX_ELO_DELTA: i64 = 10;

pub fn elo_delta(session_id: Uuid, item_id: u64, graded: bool) -> i64 {
    if !graded {
        return 0;
    }

    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update(item_id.to_le_bytes());
    let digest = hasher.finalize();

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);

    StdRng::from_seed(seed).gen_range(-MAX_ELO_DELTA..=MAX_ELO_DELTA)
}
