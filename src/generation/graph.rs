//! Level graph: every room of a run plus parent→child links.

use std::collections::BTreeMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::room::{DoorState, Room, RoomHandle, RoomId};
use crate::rules::RoomType;

/// Rooms of one run. Node `i` of `links` is room `RoomId(i)`; edge weights
/// are the parent slot the child was spawned through.
#[derive(Debug, Clone, Default)]
pub struct LevelGraph {
    rooms: Vec<Room>,
    links: DiGraph<RoomId, usize>,
}

impl LevelGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next inserted room will get
    pub fn next_id(&self) -> RoomId {
        RoomId(self.rooms.len())
    }

    /// Insert a room, optionally linked from `(parent, parent_slot)`
    pub fn insert(&mut self, room: Room, parent: Option<(RoomId, usize)>) -> RoomId {
        let id = self.next_id();
        debug_assert_eq!(room.id, id, "room id must match insertion order");
        let node = self.links.add_node(id);
        if let Some((parent, slot)) = parent {
            self.links.add_edge(NodeIndex::new(parent.0), node, slot);
        }
        self.rooms.push(room);
        id
    }

    pub fn clear(&mut self) {
        self.rooms.clear();
        self.links.clear();
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id.0)
    }

    pub fn room_mut(&mut self, id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id.0)
    }

    pub fn handles(&self) -> impl Iterator<Item = RoomHandle> + '_ {
        self.rooms.iter().map(|r| r.handle)
    }

    pub fn parent(&self, id: RoomId) -> Option<RoomId> {
        if id.0 >= self.rooms.len() {
            return None;
        }
        self.links
            .neighbors_directed(NodeIndex::new(id.0), Direction::Incoming)
            .next()
            .map(|n| RoomId(n.index()))
    }

    /// Children in spawn order
    pub fn children(&self, id: RoomId) -> Vec<RoomId> {
        if id.0 >= self.rooms.len() {
            return Vec::new();
        }
        let mut children: Vec<RoomId> = self
            .links
            .neighbors_directed(NodeIndex::new(id.0), Direction::Outgoing)
            .map(|n| RoomId(n.index()))
            .collect();
        children.sort();
        children
    }

    /// Parent slot a child was spawned through
    pub fn spawn_slot(&self, child: RoomId) -> Option<usize> {
        if child.0 >= self.rooms.len() {
            return None;
        }
        self.links
            .edges_directed(NodeIndex::new(child.0), Direction::Incoming)
            .next()
            .map(|e| *e.weight())
    }

    /// Breadth-first walk from the starting room
    pub fn bfs_order(&self) -> Vec<RoomId> {
        if self.rooms.is_empty() {
            return Vec::new();
        }
        let mut bfs = Bfs::new(&self.links, NodeIndex::new(0));
        let mut order = Vec::with_capacity(self.rooms.len());
        while let Some(node) = bfs.next(&self.links) {
            order.push(RoomId(node.index()));
        }
        order
    }

    pub fn max_depth(&self) -> u32 {
        self.rooms.iter().map(|r| r.depth).max().unwrap_or(0)
    }

    pub fn type_histogram(&self) -> BTreeMap<RoomType, usize> {
        let mut histogram = BTreeMap::new();
        for room in &self.rooms {
            *histogram.entry(room.room_type).or_insert(0) += 1;
        }
        histogram
    }

    /// Stable hash of types, depths, positions and door states
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Sha3_256::new();
        for room in &self.rooms {
            hasher.update((room.id.0 as u64).to_le_bytes());
            hasher.update(room.depth.to_le_bytes());
            hasher.update([room.room_type.ordinal() as u8]);
            for component in room.position().to_array() {
                hasher.update(component.to_bits().to_le_bytes());
            }
            for slot in &room.slots {
                hasher.update([door_state_byte(slot.state)]);
            }
        }
        let result = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&result[0..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn snapshot(&self) -> LevelSnapshot {
        LevelSnapshot {
            room_count: self.rooms.len(),
            max_depth: self.max_depth(),
            fingerprint: self.fingerprint(),
            rooms: self
                .rooms
                .iter()
                .map(|room| RoomSnapshot {
                    id: room.id.0,
                    handle: room.handle.0,
                    parent: self.parent(room.id).map(|p| p.0),
                    depth: room.depth,
                    room_type: room.room_type,
                    position: room.position().to_array(),
                    doors: room.slots.iter().map(|s| s.state).collect(),
                })
                .collect(),
        }
    }
}

fn door_state_byte(state: DoorState) -> u8 {
    match state {
        DoorState::Unresolved => 0,
        DoorState::Door => 1,
        DoorState::Wall => 2,
        DoorState::Doorway => 3,
    }
}

/// Serializable view of one room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: usize,
    pub handle: u32,
    pub parent: Option<usize>,
    pub depth: u32,
    pub room_type: RoomType,
    pub position: [f32; 3],
    pub doors: Vec<DoorState>,
}

/// Serializable view of a generated level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub room_count: usize,
    pub max_depth: u32,
    pub fingerprint: u64,
    pub rooms: Vec<RoomSnapshot>,
}

impl LevelSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::RoomLayout;
    use bevy::prelude::Transform;

    fn room(id: usize, depth: u32, x: f32, room_type: RoomType) -> Room {
        Room::new(
            RoomId(id),
            RoomHandle(id as u32),
            Transform::from_xyz(x, 0.0, 0.0),
            depth,
            room_type,
            &RoomLayout::square(10.0),
        )
    }

    fn small_graph() -> LevelGraph {
        let mut graph = LevelGraph::new();
        let root = graph.insert(room(0, 0, 0.0, RoomType::FourDoor), None);
        let a = graph.insert(room(1, 1, 10.0, RoomType::TwoDoor), Some((root, 1)));
        graph.insert(room(2, 1, -10.0, RoomType::OneDoor), Some((root, 3)));
        graph.insert(room(3, 2, 20.0, RoomType::OneDoor), Some((a, 1)));
        graph
    }

    #[test]
    fn test_links() {
        let graph = small_graph();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.parent(RoomId(0)), None);
        assert_eq!(graph.parent(RoomId(3)), Some(RoomId(1)));
        assert_eq!(graph.children(RoomId(0)), vec![RoomId(1), RoomId(2)]);
        assert_eq!(graph.spawn_slot(RoomId(2)), Some(3));
        assert!(graph.children(RoomId(99)).is_empty());
        assert_eq!(graph.parent(RoomId(99)), None);
    }

    #[test]
    fn test_bfs_order_visits_all() {
        let graph = small_graph();
        let order = graph.bfs_order();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], RoomId(0));
        assert_eq!(order[3], RoomId(3));
    }

    #[test]
    fn test_histogram_and_depth() {
        let graph = small_graph();
        let histogram = graph.type_histogram();
        assert_eq!(histogram[&RoomType::OneDoor], 2);
        assert_eq!(histogram[&RoomType::FourDoor], 1);
        assert_eq!(graph.max_depth(), 2);
    }

    #[test]
    fn test_fingerprint_tracks_door_states() {
        let mut graph = small_graph();
        let before = graph.fingerprint();
        assert_eq!(before, small_graph().fingerprint());

        graph
            .room_mut(RoomId(1))
            .unwrap()
            .resolve_slot(0, DoorState::Wall);
        assert_ne!(before, graph.fingerprint());
    }

    #[test]
    fn test_snapshot_json() {
        let graph = small_graph();
        let snapshot = graph.snapshot();
        assert_eq!(snapshot.room_count, 4);
        assert_eq!(snapshot.rooms[3].parent, Some(1));

        let json = snapshot.to_json();
        assert!(json.contains("\"room_count\":4"));
        let restored = LevelSnapshot::from_json(&json).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_clear() {
        let mut graph = small_graph();
        graph.clear();
        assert!(graph.is_empty());
        assert!(graph.bfs_order().is_empty());
        assert_eq!(graph.next_id(), RoomId(0));
    }
}
