//! Breadth-first level generator.
//!
//! The generator is an explicit state machine driven by `step()`. Every call
//! does one unit of work and returns whether the run is still going:
//!
//! ```text
//! Idle ── generate_level ──> Dequeue ──> ExpandingDoors ──> Settling ──> Dequeue ...
//!                              │   (one slot per step)         │
//!                              └── destroyed/empty ──> Idle     └── frontier empty ──> Idle
//! ```
//!
//! Stepping once per frame lets the scene settle freshly placed geometry
//! before the next occupancy probe.

use std::collections::VecDeque;

use bevy::prelude::{Resource, Transform};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug, error, info, info_span, trace, warn, Span};

use super::graph::LevelGraph;
use super::LevelSeed;
use crate::config::LevelGenerationSettings;
use crate::door;
use crate::error::{GenerationError, GenerationResult};
use crate::room::{DoorSlot, DoorState, Room, RoomHandle, RoomId};
use crate::rules::{select_weighted, BandResolver, RoomType};
use crate::scene::{InstancePool, OccupancyQuery};

/// Where the step machine is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Dequeue,
    ExpandingDoors {
        room: RoomId,
        snapshot: Vec<usize>,
        cursor: usize,
    },
    Settling,
}

/// How the last run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Frontier emptied
    Completed,
    /// A destroyed or missing room came off the frontier
    Aborted,
    Cancelled,
    Failed(String),
}

#[derive(Resource)]
pub struct LevelGenerator {
    settings: LevelGenerationSettings,
    deferred_settings: Option<LevelGenerationSettings>,
    starting_room: Option<RoomHandle>,
    seed: LevelSeed,
    run_index: u64,
    rng: Xoshiro256PlusPlus,
    resolver: BandResolver,
    state: GenerationState,
    frontier: VecDeque<RoomId>,
    graph: LevelGraph,
    current_depth: u32,
    current_ratio: f32,
    active_parent: Option<RoomId>,
    last_outcome: Option<GenerationOutcome>,
    steps: u64,
    span: Span,
}

impl LevelGenerator {
    pub fn new(settings: LevelGenerationSettings) -> Self {
        let seed = LevelSeed {
            seed: settings.generator.seed.unwrap_or_else(rand::random),
        };
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed.run_seed(0)),
            settings,
            deferred_settings: None,
            starting_room: None,
            seed,
            run_index: 0,
            resolver: BandResolver::new(),
            state: GenerationState::Idle,
            frontier: VecDeque::new(),
            graph: LevelGraph::new(),
            current_depth: 0,
            current_ratio: 0.0,
            active_parent: None,
            last_outcome: None,
            steps: 0,
            span: Span::none(),
        }
    }

    pub fn with_starting_room(mut self, handle: RoomHandle) -> Self {
        self.starting_room = Some(handle);
        self
    }

    pub fn set_starting_room(&mut self, handle: Option<RoomHandle>) {
        self.starting_room = handle;
    }

    pub fn starting_room(&self) -> Option<RoomHandle> {
        self.starting_room
    }

    pub fn settings(&self) -> &LevelGenerationSettings {
        &self.settings
    }

    /// Swap settings now when idle, otherwise at the next `generate_level`
    pub fn replace_settings(&mut self, settings: LevelGenerationSettings) {
        if self.is_generating() {
            debug!("Generation running, deferring new settings to next run");
            self.deferred_settings = Some(settings);
        } else {
            self.apply_settings(settings);
        }
    }

    fn apply_settings(&mut self, settings: LevelGenerationSettings) {
        if let Some(seed) = settings.generator.seed {
            if seed != self.seed.seed {
                self.seed = LevelSeed { seed };
                self.run_index = 0;
            }
        }
        self.settings = settings;
    }

    pub fn seed(&self) -> LevelSeed {
        self.seed
    }

    /// Number of runs started so far
    pub fn run_index(&self) -> u64 {
        self.run_index
    }

    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    pub fn is_generating(&self) -> bool {
        self.state != GenerationState::Idle
    }

    pub fn last_outcome(&self) -> Option<&GenerationOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn graph(&self) -> &LevelGraph {
        &self.graph
    }

    pub fn frontier(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.frontier.iter().copied()
    }

    pub fn current_depth(&self) -> u32 {
        self.current_depth
    }

    pub fn current_ratio(&self) -> f32 {
        self.current_ratio
    }

    pub fn active_parent(&self) -> Option<RoomId> {
        self.active_parent
    }

    /// Steps taken in the current (or last) run
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Reset the session and seed it with the starting room.
    ///
    /// Fails with `GenerationError::Configuration` before touching anything
    /// if there is neither a starting room nor a prefab to create one.
    pub fn generate_level<W>(&mut self, world: &mut W) -> GenerationResult<()>
    where
        W: InstancePool + OccupancyQuery,
    {
        if let Some(settings) = self.deferred_settings.take() {
            self.apply_settings(settings);
        }
        self.settings.generator.validate()?;

        let (start, start_pose, start_layout) = match self.starting_room {
            Some(handle) => {
                let pose = world.pose(handle).ok_or_else(|| {
                    GenerationError::Configuration(format!(
                        "starting room {handle:?} no longer exists"
                    ))
                })?;
                let layout = world.room_layout(handle).ok_or_else(|| {
                    GenerationError::Configuration(format!(
                        "starting room {handle:?} has no room layout"
                    ))
                })?;
                (handle, pose, layout)
            }
            None if world.can_acquire() => {
                let handle = world.acquire().ok_or_else(|| {
                    GenerationError::Configuration("room prefab failed to instantiate".into())
                })?;
                let Some(layout) = world.room_layout(handle) else {
                    world.release(handle);
                    return Err(GenerationError::Configuration(
                        "room prefab has no room layout".into(),
                    ));
                };
                world.place(handle, Transform::IDENTITY);
                self.starting_room = Some(handle);
                (handle, Transform::IDENTITY, layout)
            }
            None => {
                return Err(GenerationError::Configuration(
                    "starting room has no reference and no room prefab is configured".into(),
                ))
            }
        };

        self.reset_session(world, start);

        self.run_index += 1;
        self.rng = Xoshiro256PlusPlus::seed_from_u64(self.seed.run_seed(self.run_index));
        self.span = info_span!("level_generation", run = self.run_index, seed = self.seed.seed);

        let root_id = self.graph.next_id();
        let root = Room::new(
            root_id,
            start,
            start_pose,
            0,
            self.settings.generator.starting_room_type,
            &start_layout,
        );
        self.graph.insert(root, None);
        self.frontier.push_back(root_id);
        self.state = GenerationState::Dequeue;

        let _entered = self.span.clone().entered();
        info!(
            difficulty = self.settings.generator.difficulty_level,
            "Level generation started"
        );
        Ok(())
    }

    /// Return every room of the previous run to the pool (the starting room
    /// is only reset) and clear the session
    fn reset_session<W: InstancePool>(&mut self, world: &mut W, start: RoomHandle) {
        let previous: Vec<RoomHandle> = self.graph.handles().collect();
        for handle in previous {
            world.reset_instance(handle);
            if handle != start {
                world.release(handle);
            }
        }
        world.reset_instance(start);

        self.graph.clear();
        self.frontier.clear();
        self.resolver.invalidate();
        self.current_depth = 0;
        self.current_ratio = 0.0;
        self.active_parent = None;
        self.last_outcome = None;
        self.steps = 0;
    }

    /// Stop at the current suspension point. Placed rooms stay placed.
    pub fn cancel(&mut self) {
        if self.is_generating() {
            let _entered = self.span.clone().entered();
            info!(rooms = self.graph.len(), "Level generation cancelled");
            self.state = GenerationState::Idle;
            self.last_outcome = Some(GenerationOutcome::Cancelled);
        }
    }

    /// Advance one unit of work. `Ok(true)` while the run continues.
    pub fn step<W>(&mut self, world: &mut W) -> GenerationResult<bool>
    where
        W: InstancePool + OccupancyQuery,
    {
        let _entered = self.span.clone().entered();
        let state = std::mem::replace(&mut self.state, GenerationState::Idle);
        let next = match state {
            GenerationState::Idle => return Ok(false),
            GenerationState::Dequeue => self.dequeue(world),
            GenerationState::ExpandingDoors {
                room,
                snapshot,
                cursor,
            } => match self.expand_slot(world, room, snapshot, cursor) {
                Ok(next) => next,
                Err(e) => {
                    error!("Level generation failed: {}", e);
                    self.last_outcome = Some(GenerationOutcome::Failed(e.to_string()));
                    self.steps += 1;
                    return Err(e);
                }
            },
            GenerationState::Settling => self.settle(),
        };
        self.steps += 1;
        self.state = next;
        Ok(self.is_generating())
    }

    /// Step until the run stops
    pub fn run_to_completion<W>(&mut self, world: &mut W) -> GenerationResult<GenerationOutcome>
    where
        W: InstancePool + OccupancyQuery,
    {
        while self.step(world)? {}
        Ok(self
            .last_outcome
            .clone()
            .unwrap_or(GenerationOutcome::Completed))
    }

    /// `generate_level` followed by `run_to_completion`
    pub fn generate_blocking<W>(&mut self, world: &mut W) -> GenerationResult<GenerationOutcome>
    where
        W: InstancePool + OccupancyQuery,
    {
        self.generate_level(world)?;
        self.run_to_completion(world)
    }

    fn dequeue<W: InstancePool>(&mut self, world: &W) -> GenerationState {
        let Some(id) = self.frontier.pop_front() else {
            return self.abort("frontier yielded no room");
        };
        let Some(room) = self.graph.room(id) else {
            return self.abort("frontier entry has no room");
        };
        if !world.is_alive(room.handle) {
            return self.abort("frontier room was destroyed");
        }

        let difficulty = self.settings.generator.difficulty_level;
        self.current_depth = room.depth;
        self.current_ratio = room.depth as f32 / difficulty as f32;

        if self.current_depth > difficulty {
            trace!(room = id.0, depth = self.current_depth, "Past difficulty depth, not expanding");
            return GenerationState::Settling;
        }

        let snapshot = room.pending_snapshot();
        self.active_parent = Some(id);
        if let Some(room) = self.graph.room_mut(id) {
            room.expanded = true;
        }

        if snapshot.is_empty() {
            GenerationState::Settling
        } else {
            GenerationState::ExpandingDoors {
                room: id,
                snapshot,
                cursor: 0,
            }
        }
    }

    fn expand_slot<W>(
        &mut self,
        world: &mut W,
        room_id: RoomId,
        snapshot: Vec<usize>,
        cursor: usize,
    ) -> GenerationResult<GenerationState>
    where
        W: InstancePool + OccupancyQuery,
    {
        let Some(&slot_index) = snapshot.get(cursor) else {
            return Ok(GenerationState::Settling);
        };

        let slot = self
            .graph
            .room(room_id)
            .filter(|room| room.is_pending(slot_index))
            .map(|room| room.slots[slot_index]);

        if let Some(slot) = slot {
            let config = &self.settings.generator;
            let occupied = !world
                .query_overlap(slot.room_point, config.checker_radius, config.room_check_layer)
                .is_empty();

            let state = self.resolve_door_area(world, room_id, slot_index);
            if occupied {
                trace!(room = room_id.0, slot = slot_index, ?state, "Direction already occupied");
            } else {
                self.spawn_child(world, room_id, slot)?;
            }
        }

        let next_cursor = cursor + 1;
        if next_cursor < snapshot.len() {
            Ok(GenerationState::ExpandingDoors {
                room: room_id,
                snapshot,
                cursor: next_cursor,
            })
        } else {
            Ok(GenerationState::Settling)
        }
    }

    /// Probe a slot's door point, finalize the slot and mirror it to the scene
    fn resolve_door_area<W>(&mut self, world: &mut W, room_id: RoomId, slot_index: usize) -> DoorState
    where
        W: InstancePool + OccupancyQuery,
    {
        let Some(room) = self.graph.room(room_id) else {
            return DoorState::Unresolved;
        };
        let handle = room.handle;
        let point = room.slots[slot_index].door_point;

        let config = &self.settings.generator;
        let occupants = world.query_overlap(point, config.checker_radius, config.door_check_layer);
        let state = door::resolve(&occupants);

        if let Some(room) = self.graph.room_mut(room_id) {
            if room.resolve_slot(slot_index, state) {
                world.assign_door_state(handle, slot_index, state);
            }
        }
        state
    }

    fn spawn_child<W>(&mut self, world: &mut W, parent_id: RoomId, slot: DoorSlot) -> GenerationResult<()>
    where
        W: InstancePool + OccupancyQuery,
    {
        let table = self
            .resolver
            .resolve_table(&self.settings.rules, self.current_ratio);
        let room_type = select_weighted(table, &mut self.rng)?;

        let Some(parent_pose) = self.graph.room(parent_id).map(|r| r.pose) else {
            return Ok(());
        };

        let Some(handle) = world.acquire() else {
            warn!(parent = parent_id.0, "No room instance available, skipping spawn");
            return Ok(());
        };

        let pose = Transform {
            translation: slot.room_point,
            rotation: parent_pose.rotation,
            scale: parent_pose.scale,
        };
        world.place(handle, pose);

        let Some(layout) = world.room_layout(handle) else {
            warn!(?handle, "New room instance has no room layout, abandoning spawn");
            world.release(handle);
            return Ok(());
        };

        let id = self.graph.next_id();
        let mut child = Room::new(id, handle, pose, self.current_depth + 1, room_type, &layout);
        child.connector = child.find_connector(
            pose.translation - parent_pose.translation,
            self.settings.generator.connector_alignment,
        );
        let connector = child.connector;
        self.graph.insert(child, Some((parent_id, slot.index)));

        if let Some(connector) = connector {
            self.resolve_door_area(world, id, connector);
        } else {
            debug!(room = id.0, "No slot faces the parent room");
        }

        let demoted = match self.graph.room_mut(id) {
            Some(room) => match room_type {
                RoomType::OneDoor => room.seal_pending(),
                RoomType::FourDoor => Vec::new(),
                RoomType::TwoDoor | RoomType::ThreeDoor => {
                    room.demote_random(room_type.walls_on_spawn(), &mut self.rng)
                }
            },
            None => Vec::new(),
        };
        for index in demoted {
            world.assign_door_state(handle, index, DoorState::Wall);
        }

        if !room_type.is_terminal() {
            self.frontier.push_back(id);
        }

        debug!(
            room = id.0,
            parent = parent_id.0,
            depth = self.current_depth + 1,
            room_type = room_type.label(),
            "Spawned room"
        );
        Ok(())
    }

    fn settle(&mut self) -> GenerationState {
        if self.frontier.is_empty() {
            info!(
                rooms = self.graph.len(),
                max_depth = self.graph.max_depth(),
                steps = self.steps + 1,
                "Level generation finished"
            );
            self.active_parent = None;
            self.last_outcome = Some(GenerationOutcome::Completed);
            GenerationState::Idle
        } else {
            GenerationState::Dequeue
        }
    }

    fn abort(&mut self, reason: &str) -> GenerationState {
        debug!(reason, rooms = self.graph.len(), "Level generation stopped");
        self.active_parent = None;
        self.last_outcome = Some(GenerationOutcome::Aborted);
        GenerationState::Idle
    }
}
