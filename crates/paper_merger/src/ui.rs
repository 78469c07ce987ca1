use bevy::prelude::*;
use merge_grid::{GridCommand, GridCommands, GridEvents, MergeGridConfig};

use crate::TileVisual;

const BUTTON_COLOR: Color = Color::srgb(0.2, 0.2, 0.25);
const BUTTON_HOVER_COLOR: Color = Color::srgb(0.3, 0.3, 0.35);
const BUTTON_PRESS_COLOR: Color = Color::srgb(0.15, 0.4, 0.25);

#[derive(Component, Clone, Copy, PartialEq, Eq)]
enum GridButton {
    Merge,
    Reset,
}

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup)
            .add_systems(Update, handle_buttons);
    }
}

fn setup(mut commands: Commands) {
    commands
        .spawn(Node {
            width: Val::Percent(100.),
            height: Val::Percent(100.),
            flex_direction: FlexDirection::Row,
            align_items: AlignItems::FlexEnd,
            justify_content: JustifyContent::Center,
            column_gap: Val::Px(24.),
            padding: UiRect::all(Val::Px(24.)),
            ..default()
        })
        .with_children(|parent| {
            spawn_button(parent, GridButton::Merge, "MERGE");
            spawn_button(parent, GridButton::Reset, "RESET");
        });
}

fn spawn_button(parent: &mut ChildBuilder, button: GridButton, label: &str) {
    parent
        .spawn((
            Button,
            button,
            Node {
                width: Val::Px(120.),
                height: Val::Px(48.),
                align_items: AlignItems::Center,
                justify_content: JustifyContent::Center,
                ..default()
            },
            BackgroundColor(BUTTON_COLOR),
        ))
        .with_child((
            Text::new(label),
            TextFont {
                font_size: 24.0,
                ..default()
            },
            TextColor(Color::WHITE),
        ));
}

fn handle_buttons(
    mut commands: Commands,
    mut interactions: Query<
        (&Interaction, &GridButton, &mut BackgroundColor),
        (Changed<Interaction>, With<Button>),
    >,
    mut grid_commands: ResMut<GridCommands>,
    mut events: ResMut<GridEvents>,
    config: Res<MergeGridConfig>,
    visuals: Query<Entity, With<TileVisual>>,
) {
    for (interaction, button, mut color) in &mut interactions {
        match *interaction {
            Interaction::Pressed => {
                *color = BackgroundColor(BUTTON_PRESS_COLOR);
                match button {
                    GridButton::Merge => {
                        if let Err(err) = grid_commands.push(GridCommand::Merge) {
                            error!("{err}");
                        }
                    }
                    GridButton::Reset => {
                        // Beats queued for the previous grid mean nothing to
                        // the fresh one.
                        while events.pop().is_ok() {}
                        for entity in &visuals {
                            commands.entity(entity).despawn_recursive();
                        }
                        if let Err(err) = grid_commands.push(GridCommand::Initialize {
                            min_tiles: config.min_tiles,
                            max_tiles: config.max_tiles,
                        }) {
                            error!("{err}");
                        }
                    }
                }
            }
            Interaction::Hovered => *color = BackgroundColor(BUTTON_HOVER_COLOR),
            Interaction::None => *color = BackgroundColor(BUTTON_COLOR),
        }
    }
}
