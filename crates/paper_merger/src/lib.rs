use bevy::prelude::*;
use bevy::window::{PresentMode, WindowMode, WindowResolution};
use merge_grid::{
    GridEvent, GridEvents, MergeGridConfig, MergeGridPlugin, TileGrid, TileId, geometry,
};

mod input;
mod ui;

// typical smartphone screen ratio (9:16)
const WINDOW_WIDTH: f32 = 360.0;
const WINDOW_HEIGHT: f32 = 640.0;

const GRID_COLUMNS: usize = 4;
const TILE_SIZE: f32 = 72.0;
const TILE_SPACING: f32 = 80.0;
/// Center of slot 0; rows fill left to right and grow downwards.
const GRID_ORIGIN: Vec2 = Vec2::new(-TILE_SPACING * 1.5, 240.0);
/// Fresh tiles drop in from just above the window.
const SPAWN_DROP_HEIGHT: f32 = WINDOW_HEIGHT / 2.0 + TILE_SIZE;

const TILE_COLOR: Color = Color::srgb(0.92, 0.91, 0.85);
const ANCHOR_COLOR: Color = Color::srgb(1.0, 0.8, 0.3);
const SELECTED_COLOR: Color = Color::srgb(0.5, 0.75, 1.0);

// Multiplying by TILE_SPACING as well as delta seconds keeps a one-slot move
// at roughly a fifth of a second
const MOVE_SPEED: f32 = TILE_SPACING * 5.0;

#[derive(Component)]
struct TileVisual {
    id: TileId,
}

#[derive(Component)]
struct MoveTo(Vec2);

pub fn run() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: env!("CARGO_PKG_NAME").to_string(),
                present_mode: PresentMode::Fifo,
                resolution: WindowResolution::new(WINDOW_WIDTH, WINDOW_HEIGHT),
                mode: WindowMode::Windowed,
                ..default()
            }),
            ..default()
        }))
        .add_plugins(bevy_framepace::FramepacePlugin)
        .insert_resource(ClearColor(Color::BLACK))
        .insert_resource(MergeGridConfig {
            min_tiles: 10,
            max_tiles: 14,
            ..default()
        })
        .add_plugins(MergeGridPlugin)
        .add_plugins(input::InputPlugin)
        .add_plugins(ui::UiPlugin)
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            (report_positions, consume_events, move_to, update_selection_tint).chain(),
        )
        .run();
}

fn setup(mut commands: Commands) {
    commands.spawn(Camera2d);
}

/// Writes each tile's current translation back into the grid, so the offset
/// resolver always works from the latest layout.
fn report_positions(mut grid: ResMut<TileGrid>, visuals: Query<(&TileVisual, &Transform)>) {
    for (visual, transform) in &visuals {
        grid.set_screen_position(visual.id, transform.translation.truncate())
            .ok();
    }
}

/// Pops one grid event per frame, but only once all tiles have finished
/// moving, so every beat of a sequence gets its animation time.
fn consume_events(
    mut commands: Commands,
    mut events: ResMut<GridEvents>,
    grid: Res<TileGrid>,
    visuals: Query<(Entity, &TileVisual, &Transform)>,
    animations: Query<(), With<MoveTo>>,
) {
    if animations.iter().count() != 0 {
        return;
    }
    let Ok(event) = events.pop() else {
        return;
    };

    match event {
        GridEvent::TileAppeared(id) | GridEvent::TileAdded(id) => {
            let Some(index) = grid.tiles().iter().position(|tile| tile.id == id) else {
                warn!("tile {id} appeared but is no longer in the grid");
                return;
            };
            spawn_tile(&mut commands, id, slot(index));
        }
        GridEvent::MergeStarted => {
            let Some(anchor) = grid.merge_anchor().and_then(|id| grid.tile(id)) else {
                return;
            };
            // Scatter: every other selected tile flies onto the anchor.
            for (entity, visual, transform) in &visuals {
                if visual.id == anchor.id || !grid.is_selected(visual.id) {
                    continue;
                }
                let Some(moving) = grid.tile(visual.id) else {
                    continue;
                };
                let offset = geometry::compute_offset(anchor, moving);
                commands
                    .entity(entity)
                    .insert(MoveTo(transform.translation.truncate() + offset));
            }
        }
        GridEvent::TileRemoved(id) => {
            if let Some((entity, _, _)) = visuals.iter().find(|(_, visual, _)| visual.id == id) {
                commands.entity(entity).despawn_recursive();
            }
        }
        GridEvent::MergeAnimationEnded => {
            // Compact: survivors re-flow row-major into the freed slots.
            for (entity, visual, _) in &visuals {
                if let Some(index) = grid.tiles().iter().position(|tile| tile.id == visual.id) {
                    commands.entity(entity).insert(MoveTo(slot(index)));
                }
            }
        }
        GridEvent::SelectionCleared => {}
    }
}

fn slot(index: usize) -> Vec2 {
    geometry::slot_position(index, GRID_COLUMNS, TILE_SPACING, GRID_ORIGIN)
}

fn spawn_tile(commands: &mut Commands, id: TileId, target: Vec2) {
    commands
        .spawn((
            Sprite::from_color(TILE_COLOR, Vec2::splat(TILE_SIZE)),
            Transform::from_xyz(target.x, SPAWN_DROP_HEIGHT, 0.0),
            TileVisual { id },
            MoveTo(target),
        ))
        .with_child((
            Text2d::new(id.to_string()),
            TextFont {
                font_size: 32.0,
                ..default()
            },
            TextColor(Color::BLACK),
            Transform::from_xyz(0.0, 0.0, 10.0),
        ));
}

fn move_to(
    mut commands: Commands,
    time: Res<Time>,
    mut moves: Query<(Entity, &mut Transform, &MoveTo)>,
) {
    for (entity, mut transform, MoveTo(target)) in &mut moves {
        if transform.translation.truncate() == *target {
            commands.entity(entity).remove::<MoveTo>();
        } else {
            let mut movement = *target - transform.translation.truncate();
            movement = (movement.normalize() * time.delta_secs() * MOVE_SPEED)
                .clamp_length_max(movement.length());
            transform.translation += movement.extend(0.0);
        }
    }
}

fn update_selection_tint(grid: Res<TileGrid>, mut visuals: Query<(&TileVisual, &mut Sprite)>) {
    for (visual, mut sprite) in &mut visuals {
        sprite.color = if grid.anchor() == Some(visual.id) {
            ANCHOR_COLOR
        } else if grid.is_selected(visual.id) {
            SELECTED_COLOR
        } else {
            TILE_COLOR
        };
    }
}
