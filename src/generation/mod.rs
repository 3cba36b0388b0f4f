//! Level generation: BFS room expansion, the level graph, and the Bevy plugin.
//!
//! ```text
//! GenerateLevelRequest ─> LevelGenerator::generate_level
//!                              │
//!                     drive_level_generation (one step per Update)
//!                              │
//!                         LevelGeneratedEvent { snapshot }
//! ```

mod generator;
pub mod graph;
pub mod plugin;

pub use generator::{GenerationOutcome, GenerationState, LevelGenerator};
pub use graph::{LevelGraph, LevelSnapshot, RoomSnapshot};
pub use plugin::{GenerateLevelRequest, LevelGeneratedEvent, LevelGenerationPlugin};

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// Base seed of a generator. Every run draws from its own derived stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSeed {
    pub seed: u64,
}

impl LevelSeed {
    /// Deterministic per-run seed from the base seed and run index
    pub fn run_seed(&self, run_index: u64) -> u64 {
        let mut hasher = Sha3_256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(run_index.to_le_bytes());
        let result = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&result[0..8]);
        u64::from_le_bytes(bytes)
    }
}
