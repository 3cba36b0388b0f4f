//! Tower Level Generator
//!
//! Breadth-first procedural level generation from pooled square rooms:
//! - Room type rules (difficulty bands of weighted room-type tables)
//! - Door resolution protocol (Door / Wall / Doorway from occupancy probes)
//! - Step-driven BFS generator with a petgraph level graph
//! - Scene collaborator traits plus an in-memory pooled scene
//! - Bevy plugin, RON settings with hot reload, Monte-Carlo balance runs

pub mod balance;
pub mod config;
pub mod constants;
pub mod door;
pub mod error;
pub mod generation;
pub mod hotreload;
pub mod logging;
pub mod room;
pub mod rules;
pub mod scene;

pub use config::{GeneratorConfig, LevelGenerationSettings};
pub use error::{GenerationError, GenerationResult};
pub use generation::{
    GenerateLevelRequest, GenerationOutcome, GenerationState, LevelGeneratedEvent,
    LevelGenerationPlugin, LevelGenerator, LevelGraph, LevelSeed, LevelSnapshot,
};
pub use room::{DoorState, Room, RoomHandle, RoomId, RoomLayout};
pub use rules::{RoomType, RoomTypeRules, WeightedTable};
pub use scene::{InstancePool, LayerMask, OccupancyQuery, Occupant, SceneWorld};
