use bevy::prelude::*;

use crate::grid::Tile;

/// Displacement `moving` must travel to land on `anchor`'s last reported
/// screen position, component-wise on both axes. Falls back to `Vec2::ZERO`
/// while either tile has not been laid out yet, so an early call animates
/// nothing instead of failing.
pub fn compute_offset(anchor: &Tile, moving: &Tile) -> Vec2 {
    match (anchor.screen_position, moving.screen_position) {
        (Some(anchor_position), Some(moving_position)) => anchor_position - moving_position,
        _ => Vec2::ZERO,
    }
}

/// Center of the row-major grid slot at `index`, for a grid `columns` wide
/// with `spacing` between slot centers. `origin` is the center of slot 0;
/// rows grow downwards.
pub fn slot_position(index: usize, columns: usize, spacing: f32, origin: Vec2) -> Vec2 {
    let column = index % columns.max(1);
    let row = index / columns.max(1);
    Vec2::new(
        (column as f32).mul_add(spacing, origin.x),
        (-(row as f32)).mul_add(spacing, origin.y),
    )
}
