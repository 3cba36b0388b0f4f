//! Centralized constants for the level generator.
//!
//! Tag names, layer bits and geometric thresholds shared by the generator,
//! the door resolution protocol and the in-memory scene.

// =====================================================
// Occupancy tags
// =====================================================

/// Tag carried by door geometry. Seeing it at a door point yields a Doorway.
pub const DOOR_TAG: &str = "Door";

/// Tag carried by wall geometry. Seeing it at a door point yields a Wall.
pub const WALL_TAG: &str = "Wall";

/// Tag carried by doorway geometry (ignored by the resolution protocol)
pub const DOORWAY_TAG: &str = "Doorway";

/// Tag carried by room footprints
pub const ROOM_TAG: &str = "Room";

// =====================================================
// Layers
// =====================================================

/// Layer bit for room footprints (room-side probes)
pub const ROOM_LAYER_BIT: u32 = 1 << 0;

/// Layer bit for door/wall geometry (door-side probes)
pub const DOOR_LAYER_BIT: u32 = 1 << 1;

// =====================================================
// Generation
// =====================================================

/// Minimum alignment between a child slot's inward direction and the
/// parent→child direction for that slot to count as the connector (~26°)
pub const CONNECTOR_ALIGNMENT: f32 = 0.9;

/// Default probe radius for occupancy checks
pub const DEFAULT_CHECKER_RADIUS: f32 = 0.5;

/// Default difficulty level (maximum expanded depth)
pub const DEFAULT_DIFFICULTY_LEVEL: u32 = 3;

/// Default edge length of a square room
pub const DEFAULT_ROOM_SIZE: f32 = 10.0;

/// Number of door slots on a standard room
pub const SLOTS_PER_ROOM: usize = 4;
