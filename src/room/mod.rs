//! Rooms and door slots.
//!
//! A `RoomLayout` is the per-instance description of a room's openings (what a
//! scene exposes for a pooled room instance). A `Room` is that layout placed in
//! the world for one generation run: world-space slots, a type, a depth and the
//! ordered list of slots still waiting for resolution.

use bevy::math::{Quat, Vec3};
use bevy::prelude::Transform;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::rules::RoomType;

/// Handle to a pooled scene instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomHandle(pub u32);

/// Index of a room inside one run's level graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub usize);

/// Resolution state of a door slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DoorState {
    #[default]
    Unresolved,
    Door,
    Wall,
    Doorway,
}

impl DoorState {
    pub fn is_resolved(self) -> bool {
        self != DoorState::Unresolved
    }

    /// Door or Doorway: the slot lets you through
    pub fn is_open(self) -> bool {
        matches!(self, DoorState::Door | DoorState::Doorway)
    }
}

/// Local-space description of one opening
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotTemplate {
    /// Door-side check point (on the wall)
    pub door_offset: Vec3,
    /// Room-side check point (centre of a neighbour through this opening)
    pub room_offset: Vec3,
    /// Outward direction
    pub facing: Vec3,
}

/// Ordered openings of a room instance
#[derive(Debug, Clone, PartialEq)]
pub struct RoomLayout {
    pub slots: Vec<SlotTemplate>,
    /// Half edge length of the room footprint
    pub half_extent: f32,
}

impl RoomLayout {
    /// Square room with one opening per side: north (+Z), east (+X),
    /// south (-Z), west (-X)
    pub fn square(size: f32) -> Self {
        let half = size * 0.5;
        let slots = [Vec3::Z, Vec3::X, Vec3::NEG_Z, Vec3::NEG_X]
            .into_iter()
            .map(|facing| SlotTemplate {
                door_offset: facing * half,
                room_offset: facing * size,
                facing,
            })
            .collect();
        Self {
            slots,
            half_extent: half,
        }
    }
}

/// One opening of a placed room
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoorSlot {
    pub index: usize,
    pub door_point: Vec3,
    pub room_point: Vec3,
    pub facing: Vec3,
    pub state: DoorState,
}

impl DoorSlot {
    fn from_template(index: usize, template: &SlotTemplate, pose: &Transform) -> Self {
        Self {
            index,
            door_point: pose.transform_point(template.door_offset),
            room_point: pose.transform_point(template.room_offset),
            facing: (pose.rotation * template.facing).normalize_or_zero(),
            state: DoorState::Unresolved,
        }
    }

    /// Direction pointing into the room, flattened onto the ground plane
    pub fn inward_flat(&self) -> Vec3 {
        flatten(-self.facing)
    }
}

/// Drop the vertical component and normalize
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z).normalize_or_zero()
}

/// A node of the level graph
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub handle: RoomHandle,
    pub pose: Transform,
    pub depth: u32,
    pub room_type: RoomType,
    pub slots: Vec<DoorSlot>,
    pending: Vec<usize>,
    /// Slot of this room that leads back to its parent
    pub connector: Option<usize>,
    pub expanded: bool,
}

impl Room {
    pub fn new(
        id: RoomId,
        handle: RoomHandle,
        pose: Transform,
        depth: u32,
        room_type: RoomType,
        layout: &RoomLayout,
    ) -> Self {
        let slots: Vec<DoorSlot> = layout
            .slots
            .iter()
            .enumerate()
            .map(|(i, t)| DoorSlot::from_template(i, t, &pose))
            .collect();
        let pending = (0..slots.len()).collect();
        Self {
            id,
            handle,
            pose,
            depth,
            room_type,
            slots,
            pending,
            connector: None,
            expanded: false,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.pose.translation
    }

    pub fn rotation(&self) -> Quat {
        self.pose.rotation
    }

    /// Slots still awaiting resolution, in order
    pub fn pending(&self) -> &[usize] {
        &self.pending
    }

    pub fn is_pending(&self, slot: usize) -> bool {
        self.pending.contains(&slot)
    }

    /// Copy of the pending list for iteration while resolving
    pub fn pending_snapshot(&self) -> Vec<usize> {
        self.pending.clone()
    }

    pub fn slot(&self, index: usize) -> Option<&DoorSlot> {
        self.slots.get(index)
    }

    /// Finalize a slot. Returns false if it was not pending (already final).
    pub fn resolve_slot(&mut self, index: usize, state: DoorState) -> bool {
        let Some(pos) = self.pending.iter().position(|&i| i == index) else {
            return false;
        };
        self.pending.remove(pos);
        self.slots[index].state = state;
        true
    }

    /// First slot whose inward direction lines up with `direction` (the
    /// parent→child direction) within `threshold`
    pub fn find_connector(&self, direction: Vec3, threshold: f32) -> Option<usize> {
        let direction = flatten(direction);
        if direction == Vec3::ZERO {
            return None;
        }
        self.pending
            .iter()
            .copied()
            .find(|&i| self.slots[i].inward_flat().dot(direction) >= threshold)
    }

    /// Demote `count` random pending slots to walls; returns the demoted slots
    pub fn demote_random<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Vec<usize> {
        let mut demoted = Vec::with_capacity(count);
        for _ in 0..count {
            if self.pending.is_empty() {
                break;
            }
            let pick = rng.gen_range(0..self.pending.len());
            let index = self.pending.remove(pick);
            self.slots[index].state = DoorState::Wall;
            demoted.push(index);
        }
        demoted
    }

    /// Every remaining pending slot becomes a wall
    pub fn seal_pending(&mut self) -> Vec<usize> {
        let sealed: Vec<usize> = self.pending.drain(..).collect();
        for &index in &sealed {
            self.slots[index].state = DoorState::Wall;
        }
        sealed
    }

    pub fn count_state(&self, state: DoorState) -> usize {
        self.slots.iter().filter(|s| s.state == state).count()
    }

    /// Slots that are, or are still planned to be, openings
    pub fn planned_openings(&self) -> usize {
        self.slots.len() - self.count_state(DoorState::Wall)
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.pending.is_empty() && self.slots.iter().all(|s| s.state.is_resolved())
    }
}
