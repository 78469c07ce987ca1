//! Tile merge grid logic: a selection-and-merge state machine exposed to
//! bevy games as a plugin with command and event queues.

use bevy::prelude::*;
use queues::{IsQueue, Queue};

pub mod geometry;
mod grid;

pub use grid::{GridError, GridEvent, Tile, TileGrid, TileId};

/// Grid bounds and step pacing. Insert before [`MergeGridPlugin`] to
/// override the defaults.
///
/// Pacing is purely presentational: it spaces out the observable steps so
/// animations can settle, and zero runs the whole sequence one step per
/// frame without changing order or final state.
#[derive(Resource, Clone)]
pub struct MergeGridConfig {
    pub min_tiles: u32,
    pub max_tiles: u32,
    /// Seconds between tile appearances while initializing.
    pub spawn_step_secs: f32,
    /// Seconds the scatter animation gets before removal starts.
    pub merge_settle_secs: f32,
    /// Seconds the compaction animation gets after removal.
    pub compact_secs: f32,
    /// Seconds between appended replacement tiles.
    pub replenish_step_secs: f32,
}

impl Default for MergeGridConfig {
    fn default() -> Self {
        Self {
            min_tiles: 10,
            max_tiles: 10,
            spawn_step_secs: 0.5,
            merge_settle_secs: 1.0,
            compact_secs: 0.5,
            replenish_step_secs: 0.5,
        }
    }
}

/// Intents a game pushes at the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridCommand {
    /// Reset the grid and spawn a fresh batch of tiles. Cancels whatever
    /// operation is still running.
    Initialize { min_tiles: u32, max_tiles: u32 },
    /// Collapse the current selection into its anchor. Rejected while the
    /// grid is busy.
    Merge,
}

/// FIFO of [`GridCommand`]s waiting to be applied to the grid.
#[derive(Resource)]
pub struct GridCommands(Queue<GridCommand>);

impl Default for GridCommands {
    fn default() -> Self {
        Self(Queue::new())
    }
}

impl GridCommands {
    pub fn push(&mut self, command: GridCommand) -> Result<(), &str> {
        self.0.add(command).map(|_| ())
    }

    pub(crate) fn pop(&mut self) -> Result<GridCommand, &str> {
        self.0.remove()
    }
}

/// FIFO of [`GridEvent`]s for the game to pop at its own animation pace.
#[derive(Resource)]
pub struct GridEvents(Queue<GridEvent>);

impl Default for GridEvents {
    fn default() -> Self {
        Self(Queue::new())
    }
}

impl GridEvents {
    pub fn pop(&mut self) -> Result<GridEvent, &str> {
        self.0.remove()
    }

    pub(crate) fn push(&mut self, event: GridEvent) -> Result<(), &str> {
        self.0.add(event).map(|_| ())
    }
}

/// Timer spacing out the steps of the active grid operation.
#[derive(Resource, Default)]
pub struct GridPacing {
    timer: Option<Timer>,
}

pub struct MergeGridPlugin;

impl Plugin for MergeGridPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MergeGridConfig>()
            .init_resource::<TileGrid>()
            .init_resource::<GridCommands>()
            .init_resource::<GridEvents>()
            .init_resource::<GridPacing>()
            .add_systems(Startup, queue_initial_spawn)
            .add_systems(Update, (process_commands, advance_grid).chain());
    }
}

/// The grid fills itself on startup, so a game shows tiles without pushing
/// a single command.
fn queue_initial_spawn(config: Res<MergeGridConfig>, mut commands: ResMut<GridCommands>) {
    if let Err(err) = commands.push(GridCommand::Initialize {
        min_tiles: config.min_tiles,
        max_tiles: config.max_tiles,
    }) {
        error!("{err}");
    }
}

fn process_commands(
    mut grid: ResMut<TileGrid>,
    mut commands: ResMut<GridCommands>,
    mut pacing: ResMut<GridPacing>,
) {
    while let Ok(command) = commands.pop() {
        let result = match command {
            GridCommand::Initialize {
                min_tiles,
                max_tiles,
            } => grid.begin_initialize(min_tiles, max_tiles),
            GridCommand::Merge => grid.begin_merge(),
        };
        match result {
            // A fresh sequence takes its first step on the next advance.
            Ok(()) => pacing.timer = None,
            Err(err) => warn!("grid command {command:?} rejected: {err}"),
        }
    }
}

fn advance_grid(
    time: Res<Time>,
    config: Res<MergeGridConfig>,
    mut grid: ResMut<TileGrid>,
    mut events: ResMut<GridEvents>,
    mut pacing: ResMut<GridPacing>,
) {
    if !grid.is_busy() {
        pacing.timer = None;
        return;
    }
    if let Some(timer) = &mut pacing.timer {
        if !timer.tick(time.delta()).finished() {
            return;
        }
    }
    if let Some(event) = grid.advance() {
        if let Err(err) = events.push(event) {
            error!("{err}");
        }
        pacing.timer = Some(Timer::from_seconds(
            step_delay(&config, event),
            TimerMode::Once,
        ));
    } else {
        pacing.timer = None;
    }
}

/// Pause before the step that follows `event`. Removals run as a burst; the
/// game already paces them through its own animation gating.
const fn step_delay(config: &MergeGridConfig, event: GridEvent) -> f32 {
    match event {
        GridEvent::TileAppeared(_) => config.spawn_step_secs,
        GridEvent::MergeStarted => config.merge_settle_secs,
        GridEvent::MergeAnimationEnded => config.compact_secs,
        GridEvent::TileAdded(_) => config.replenish_step_secs,
        GridEvent::TileRemoved(_) | GridEvent::SelectionCleared => 0.0,
    }
}
