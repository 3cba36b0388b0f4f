use bevy::math::Vec3;
use bevy::prelude::{Resource, Transform};

use super::{InstancePool, LayerMask, OccupancyQuery, Occupant};
use crate::constants::{DOORWAY_TAG, DOOR_TAG, ROOM_TAG, WALL_TAG};
use crate::room::{DoorState, RoomHandle, RoomLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceState {
    Active,
    Pooled,
    Destroyed,
}

#[derive(Debug, Clone)]
struct Instance {
    pose: Transform,
    layout: Option<RoomLayout>,
    door_states: Vec<DoorState>,
    state: InstanceState,
}

impl Instance {
    fn new(layout: Option<RoomLayout>) -> Self {
        let slots = layout.as_ref().map_or(0, |l| l.slots.len());
        Self {
            pose: Transform::IDENTITY,
            layout,
            door_states: vec![DoorState::Unresolved; slots],
            state: InstanceState::Active,
        }
    }

    fn clear_doors(&mut self) {
        self.door_states.fill(DoorState::Unresolved);
    }
}

/// In-memory pooled scene.
///
/// Room footprints are axis-aligned cubes of the layout's half extent around
/// the instance position. Every resolved opening leaves a marker at its door
/// point tagged Door, Wall or Doorway.
#[derive(Resource, Debug, Clone, Default)]
pub struct SceneWorld {
    prefab: Option<RoomLayout>,
    instances: Vec<Instance>,
    inactive: Vec<RoomHandle>,
}

impl SceneWorld {
    /// Scene that instantiates `prefab` on demand
    pub fn new(prefab: RoomLayout) -> Self {
        Self {
            prefab: Some(prefab),
            ..Default::default()
        }
    }

    /// Scene with no prefab: only pre-placed rooms exist
    pub fn without_prefab() -> Self {
        Self::default()
    }

    /// Add a pre-existing room (starting room, obstacle)
    pub fn spawn_fixed(&mut self, pose: Transform, layout: RoomLayout) -> RoomHandle {
        let mut instance = Instance::new(Some(layout));
        instance.pose = pose;
        self.push(instance)
    }

    /// Destroy an instance outside of any pool bookkeeping
    pub fn destroy(&mut self, handle: RoomHandle) {
        if let Some(instance) = self.instances.get_mut(handle.0 as usize) {
            instance.state = InstanceState::Destroyed;
        }
        self.inactive.retain(|h| *h != handle);
    }

    pub fn door_state(&self, handle: RoomHandle, slot: usize) -> Option<DoorState> {
        self.instances
            .get(handle.0 as usize)
            .and_then(|i| i.door_states.get(slot).copied())
    }

    /// Instances currently placed in the level
    pub fn active_count(&self) -> usize {
        self.count(InstanceState::Active)
    }

    /// Instances parked in the inactive pool
    pub fn pooled_count(&self) -> usize {
        self.inactive.len()
    }

    /// Every instance ever created, whatever its state
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn count(&self, state: InstanceState) -> usize {
        self.instances.iter().filter(|i| i.state == state).count()
    }

    fn push(&mut self, instance: Instance) -> RoomHandle {
        let handle = RoomHandle(self.instances.len() as u32);
        self.instances.push(instance);
        handle
    }

    fn active(&self, handle: RoomHandle) -> Option<&Instance> {
        self.instances
            .get(handle.0 as usize)
            .filter(|i| i.state == InstanceState::Active)
    }

    fn active_mut(&mut self, handle: RoomHandle) -> Option<&mut Instance> {
        self.instances
            .get_mut(handle.0 as usize)
            .filter(|i| i.state == InstanceState::Active)
    }
}

impl InstancePool for SceneWorld {
    fn can_acquire(&self) -> bool {
        self.prefab.is_some() || !self.inactive.is_empty()
    }

    fn acquire(&mut self) -> Option<RoomHandle> {
        if let Some(handle) = self.inactive.pop() {
            if let Some(instance) = self.instances.get_mut(handle.0 as usize) {
                instance.state = InstanceState::Active;
                instance.clear_doors();
                return Some(handle);
            }
        }
        let prefab = self.prefab.clone()?;
        Some(self.push(Instance::new(Some(prefab))))
    }

    fn release(&mut self, handle: RoomHandle) {
        let Some(instance) = self.active_mut(handle) else {
            return;
        };
        instance.state = InstanceState::Pooled;
        instance.pose = Transform::IDENTITY;
        instance.clear_doors();
        self.inactive.push(handle);
    }

    fn place(&mut self, handle: RoomHandle, pose: Transform) {
        if let Some(instance) = self.active_mut(handle) {
            instance.pose = pose;
        }
    }

    fn pose(&self, handle: RoomHandle) -> Option<Transform> {
        self.active(handle).map(|i| i.pose)
    }

    fn room_layout(&self, handle: RoomHandle) -> Option<RoomLayout> {
        self.active(handle).and_then(|i| i.layout.clone())
    }

    fn assign_door_state(&mut self, handle: RoomHandle, slot: usize, state: DoorState) {
        if let Some(door) = self
            .active_mut(handle)
            .and_then(|i| i.door_states.get_mut(slot))
        {
            *door = state;
        }
    }

    fn reset_instance(&mut self, handle: RoomHandle) {
        if let Some(instance) = self.active_mut(handle) {
            instance.clear_doors();
        }
    }

    fn is_alive(&self, handle: RoomHandle) -> bool {
        self.active(handle).is_some()
    }
}

impl OccupancyQuery for SceneWorld {
    fn query_overlap(&self, point: Vec3, radius: f32, filter: LayerMask) -> Vec<Occupant> {
        let mut found = Vec::new();
        for (index, instance) in self.instances.iter().enumerate() {
            if instance.state != InstanceState::Active {
                continue;
            }
            let Some(layout) = &instance.layout else {
                continue;
            };
            let handle = RoomHandle(index as u32);

            if filter.intersects(LayerMask::ROOMS)
                && sphere_hits_cube(point, radius, instance.pose.translation, layout.half_extent)
            {
                found.push(Occupant::new(ROOM_TAG, handle));
            }

            if filter.intersects(LayerMask::DOORS) {
                for (slot, state) in layout.slots.iter().zip(&instance.door_states) {
                    let tag = match state {
                        DoorState::Unresolved => continue,
                        DoorState::Door => DOOR_TAG,
                        DoorState::Wall => WALL_TAG,
                        DoorState::Doorway => DOORWAY_TAG,
                    };
                    let marker = instance.pose.transform_point(slot.door_offset);
                    if marker.distance(point) <= radius {
                        found.push(Occupant::new(tag, handle));
                    }
                }
            }
        }
        found
    }
}

fn sphere_hits_cube(point: Vec3, radius: f32, center: Vec3, half_extent: f32) -> bool {
    let closest = point.clamp(center - Vec3::splat(half_extent), center + Vec3::splat(half_extent));
    closest.distance(point) <= radius
}
