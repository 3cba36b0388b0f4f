//! Scene collaborators used by the generator.
//!
//! The generator never owns geometry. It talks to the scene through two
//! traits:
//! - `InstancePool`: acquire/release/place pooled room instances and mirror
//!   door states onto them
//! - `OccupancyQuery`: "what is within `radius` of this point on these layers?"
//!
//! `SceneWorld` is an in-memory implementation of both, used by the demo
//! binary, the balance simulation and the tests.

mod world;

pub use world::SceneWorld;

use bevy::math::Vec3;
use bevy::prelude::Transform;
use serde::{Deserialize, Serialize};

use crate::constants::{DOOR_LAYER_BIT, ROOM_LAYER_BIT};
use crate::room::{DoorState, RoomHandle, RoomLayout};

/// Bit set of scene layers an occupancy probe looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const ROOMS: LayerMask = LayerMask(ROOM_LAYER_BIT);
    pub const DOORS: LayerMask = LayerMask(DOOR_LAYER_BIT);
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    pub fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn union(self, other: LayerMask) -> LayerMask {
        LayerMask(self.0 | other.0)
    }
}

/// Something found by an occupancy probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    pub tag: String,
    pub handle: RoomHandle,
}

impl Occupant {
    pub fn new(tag: &str, handle: RoomHandle) -> Self {
        Self {
            tag: tag.to_string(),
            handle,
        }
    }
}

/// Pooled room instances
pub trait InstancePool {
    /// Whether `acquire` can produce an instance (a prefab is configured)
    fn can_acquire(&self) -> bool;

    /// Reuse a pooled instance or instantiate the prefab
    fn acquire(&mut self) -> Option<RoomHandle>;

    /// Return an instance to the inactive pool
    fn release(&mut self, handle: RoomHandle);

    fn place(&mut self, handle: RoomHandle, pose: Transform);

    fn pose(&self, handle: RoomHandle) -> Option<Transform>;

    /// The room facet of an instance. `None` if the instance has none.
    fn room_layout(&self, handle: RoomHandle) -> Option<RoomLayout>;

    /// Show the geometry for `state` on one opening of an instance
    fn assign_door_state(&mut self, handle: RoomHandle, slot: usize, state: DoorState);

    /// Restore an instance's openings to their unresolved look
    fn reset_instance(&mut self, handle: RoomHandle);

    /// False once an instance is destroyed outside the generator
    fn is_alive(&self, handle: RoomHandle) -> bool;
}

/// Spatial overlap queries
pub trait OccupancyQuery {
    /// Occupants within `radius` of `point` on the `filter` layers, in a
    /// stable order
    fn query_overlap(&self, point: Vec3, radius: f32, filter: LayerMask) -> Vec<Occupant>;
}
