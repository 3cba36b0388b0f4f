//! Bevy integration: request a level with an event, the generator steps once
//! per `Update`, completion is announced with another event.

use std::marker::PhantomData;

use bevy::prelude::*;

use super::generator::{GenerationOutcome, LevelGenerator};
use super::graph::LevelSnapshot;
use crate::config::LevelGenerationSettings;
use crate::room::RoomHandle;
use crate::scene::{InstancePool, OccupancyQuery};

/// Event: start (or restart) a level generation run
#[derive(Event, Debug, Clone, Default)]
pub struct GenerateLevelRequest {
    /// Overrides the generator's starting room when set
    pub starting_room: Option<RoomHandle>,
}

/// Event: a run stopped
#[derive(Event, Debug, Clone)]
pub struct LevelGeneratedEvent {
    pub outcome: GenerationOutcome,
    pub snapshot: LevelSnapshot,
}

/// Drives a `LevelGenerator` against the scene resource `W`.
///
/// ```ignore
/// App::new()
///     .insert_resource(SceneWorld::new(RoomLayout::square(10.0)))
///     .add_plugins(LevelGenerationPlugin::<SceneWorld>::new(settings))
///     .run();
/// ```
pub struct LevelGenerationPlugin<W> {
    settings: LevelGenerationSettings,
    _world: PhantomData<fn() -> W>,
}

impl<W> LevelGenerationPlugin<W> {
    pub fn new(settings: LevelGenerationSettings) -> Self {
        Self {
            settings,
            _world: PhantomData,
        }
    }
}

impl<W> Default for LevelGenerationPlugin<W> {
    fn default() -> Self {
        Self::new(LevelGenerationSettings::default())
    }
}

impl<W> Plugin for LevelGenerationPlugin<W>
where
    W: InstancePool + OccupancyQuery + Resource + FromWorld,
{
    fn build(&self, app: &mut App) {
        app.init_resource::<W>();
        if !app.world().contains_resource::<LevelGenerator>() {
            app.insert_resource(LevelGenerator::new(self.settings.clone()));
        }

        app.add_event::<GenerateLevelRequest>()
            .add_event::<LevelGeneratedEvent>()
            .add_systems(
                Update,
                (handle_generate_requests::<W>, drive_level_generation::<W>).chain(),
            );
    }
}

/// System: start a run for every request (the last one wins)
pub fn handle_generate_requests<W>(
    mut requests: EventReader<GenerateLevelRequest>,
    mut generator: ResMut<LevelGenerator>,
    mut world: ResMut<W>,
    mut finished: EventWriter<LevelGeneratedEvent>,
) where
    W: InstancePool + OccupancyQuery + Resource,
{
    for request in requests.read() {
        if let Some(handle) = request.starting_room {
            generator.set_starting_room(Some(handle));
        }
        if let Err(e) = generator.generate_level(&mut *world) {
            error!("Level generation request rejected: {}", e);
            finished.send(LevelGeneratedEvent {
                outcome: GenerationOutcome::Failed(e.to_string()),
                snapshot: generator.graph().snapshot(),
            });
        }
    }
}

/// System: advance the active run by one step
pub fn drive_level_generation<W>(
    mut generator: ResMut<LevelGenerator>,
    mut world: ResMut<W>,
    mut finished: EventWriter<LevelGeneratedEvent>,
) where
    W: InstancePool + OccupancyQuery + Resource,
{
    if !generator.is_generating() {
        return;
    }

    let outcome = match generator.step(&mut *world) {
        Ok(true) => return,
        Ok(false) => generator
            .last_outcome()
            .cloned()
            .unwrap_or(GenerationOutcome::Completed),
        Err(e) => GenerationOutcome::Failed(e.to_string()),
    };

    finished.send(LevelGeneratedEvent {
        outcome,
        snapshot: generator.graph().snapshot(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::room::RoomLayout;
    use crate::rules::{RoomType, RoomTypeRules, WeightedTable};
    use crate::scene::SceneWorld;

    #[derive(Resource, Default)]
    struct Finished(Vec<LevelGeneratedEvent>);

    fn collect_finished(mut events: EventReader<LevelGeneratedEvent>, mut finished: ResMut<Finished>) {
        finished.0.extend(events.read().cloned());
    }

    fn app(world: SceneWorld) -> App {
        let settings = LevelGenerationSettings::new(
            GeneratorConfig::default().with_seed(5).with_difficulty(3),
            RoomTypeRules::uniform(WeightedTable::single(RoomType::OneDoor)),
        );
        let mut app = App::new();
        app.insert_resource(world)
            .init_resource::<Finished>()
            .add_plugins(LevelGenerationPlugin::<SceneWorld>::new(settings))
            .add_systems(Update, collect_finished.after(drive_level_generation::<SceneWorld>));
        app
    }

    #[test]
    fn test_request_runs_to_completion() {
        let mut app = app(SceneWorld::new(RoomLayout::square(10.0)));
        app.update();
        assert!(!app.world().resource::<LevelGenerator>().is_generating());

        app.world_mut().send_event(GenerateLevelRequest::default());
        for _ in 0..20 {
            app.update();
        }

        let generator = app.world().resource::<LevelGenerator>();
        assert!(!generator.is_generating());
        assert_eq!(generator.last_outcome(), Some(&GenerationOutcome::Completed));
        assert_eq!(generator.graph().len(), 5);

        let finished = &app.world().resource::<Finished>().0;
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].outcome, GenerationOutcome::Completed);
        assert_eq!(finished[0].snapshot.room_count, 5);
    }

    #[test]
    fn test_one_step_per_update() {
        let mut app = app(SceneWorld::new(RoomLayout::square(10.0)));
        app.world_mut().send_event(GenerateLevelRequest::default());
        app.update();
        // Request handled and the starting room dequeued in the same frame
        assert_eq!(app.world().resource::<LevelGenerator>().graph().len(), 1);
        app.update();
        assert_eq!(app.world().resource::<LevelGenerator>().graph().len(), 2);
    }

    #[test]
    fn test_rejected_request_reports_failure() {
        let mut app = app(SceneWorld::without_prefab());
        app.world_mut().send_event(GenerateLevelRequest::default());
        app.update();

        let finished = &app.world().resource::<Finished>().0;
        assert_eq!(finished.len(), 1);
        assert!(matches!(finished[0].outcome, GenerationOutcome::Failed(_)));
        assert_eq!(finished[0].snapshot.room_count, 0);
    }

    #[test]
    fn test_request_with_starting_room() {
        let mut world = SceneWorld::without_prefab();
        let start = world.spawn_fixed(Transform::from_xyz(50.0, 0.0, 0.0), RoomLayout::square(10.0));
        let mut app = app(world);
        app.world_mut().send_event(GenerateLevelRequest {
            starting_room: Some(start),
        });
        for _ in 0..10 {
            app.update();
        }

        let generator = app.world().resource::<LevelGenerator>();
        assert_eq!(generator.starting_room(), Some(start));
        // No prefab: every spawn is skipped, the start is still expanded
        assert_eq!(generator.graph().len(), 1);
        assert_eq!(generator.last_outcome(), Some(&GenerationOutcome::Completed));
    }
}
