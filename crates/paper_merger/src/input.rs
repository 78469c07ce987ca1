use bevy::prelude::*;
use merge_grid::TileGrid;

use crate::{TILE_SIZE, TileVisual};

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, handle_tile_taps);
    }
}

/// World position of a fresh press, mouse or touch.
fn just_pressed_world_position(
    button_input: &Res<ButtonInput<MouseButton>>,
    touch_input: &Res<Touches>,
    windows: &Query<&Window>,
    camera: &Query<(&Camera, &GlobalTransform)>,
) -> Option<Vec2> {
    let screen_position = if button_input.just_pressed(MouseButton::Left) {
        windows.single().cursor_position()?
    } else if touch_input.any_just_pressed() {
        touch_input.iter_just_pressed().next()?.position()
    } else {
        return None;
    };

    let (camera, camera_transform) = camera.single();
    camera
        .viewport_to_world(camera_transform, screen_position)
        .map(|ray| ray.origin.truncate())
        .ok()
}

/// Tapping a tile toggles its selection. Selection stays live even while a
/// sequence is running; the grid validates the tile either way.
fn handle_tile_taps(
    windows: Query<&Window>,
    buttons: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    camera: Query<(&Camera, &GlobalTransform)>,
    visuals: Query<(&TileVisual, &GlobalTransform)>,
    mut grid: ResMut<TileGrid>,
) {
    let Some(world_position) =
        just_pressed_world_position(&buttons, &touch_input, &windows, &camera)
    else {
        return;
    };

    let tapped = visuals
        .iter()
        .find(|(_, transform)| {
            world_position.distance(transform.translation().truncate()) < TILE_SIZE / 2.0
        })
        .map(|(visual, _)| visual.id);
    let Some(id) = tapped else {
        return;
    };

    let result = if grid.is_selected(id) {
        grid.deselect(id)
    } else {
        grid.select(id)
    };
    if let Err(err) = result {
        warn!("tile tap ignored: {err}");
    }
}
