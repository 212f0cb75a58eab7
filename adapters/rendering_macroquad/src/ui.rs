//! Immediate-mode UI helpers for the Macroquad rendering backend.
//!
//! This module hosts all uses of `macroquad::ui` so the rest of the adapter can
//! remain agnostic of Macroquad's UI types. The context menu is the only
//! widget window; its geometry is exposed so pointer routing can keep presses
//! on the menu away from the surface.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use glam::Vec2;
use gridboard_core::{EntityId, MenuAction};
use macroquad::{
    color::{Color, WHITE},
    math::{RectOffset, Vec2 as MacroquadVec2},
    ui::{Id, Ui},
};

/// Size of the context menu window in screen pixels.
pub(crate) const MENU_SIZE: Vec2 = Vec2::new(150.0, 132.0);

/// Snapshot of the context menu's layout for the current frame.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ContextMenuUiContext {
    /// Widget identifier, unique per entity and anchor.
    pub(crate) id: Id,
    /// Top-left corner of the menu in screen coordinates.
    pub(crate) origin: Vec2,
}

impl ContextMenuUiContext {
    /// Builds the context for a menu opened over `entity` at `origin`.
    #[must_use]
    pub(crate) fn new(entity: EntityId, origin: Vec2) -> Self {
        Self {
            id: menu_window_id(entity, origin),
            origin,
        }
    }
}

/// Reports whether `point` lies on the menu window anchored at `origin`.
#[must_use]
pub(crate) fn menu_contains(origin: Vec2, point: Vec2) -> bool {
    point.x >= origin.x
        && point.x <= origin.x + MENU_SIZE.x
        && point.y >= origin.y
        && point.y <= origin.y + MENU_SIZE.y
}

fn menu_window_id(entity: EntityId, origin: Vec2) -> Id {
    let mut hasher = DefaultHasher::new();
    "context_menu".hash(&mut hasher);
    entity.hash(&mut hasher);
    origin.x.to_bits().hash(&mut hasher);
    origin.y.to_bits().hash(&mut hasher);
    hasher.finish()
}

/// Renders the context menu and returns the action chosen this frame.
pub(crate) fn draw_context_menu_ui(
    ui: &mut Ui,
    context: ContextMenuUiContext,
) -> Option<MenuAction> {
    let background = Color::from_rgba(40, 40, 40, 240);
    let mut skin = ui.default_skin();
    skin.margin = 0.0;

    let window_style = ui
        .style_builder()
        .color(background)
        .color_hovered(background)
        .color_clicked(background)
        .color_inactive(background)
        .margin(RectOffset::new(8.0, 8.0, 8.0, 8.0))
        .build();
    skin.window_style = window_style;

    let button_style = ui
        .style_builder()
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .color(Color::from_rgba(70, 70, 70, 255))
        .color_hovered(Color::from_rgba(96, 96, 96, 255))
        .color_clicked(Color::from_rgba(56, 56, 56, 255))
        .margin(RectOffset::new(8.0, 8.0, 6.0, 6.0))
        .build();
    skin.button_style = button_style;

    ui.push_skin(&skin);

    let mut chosen = None;
    let _ = ui.window(
        context.id,
        MacroquadVec2::new(context.origin.x, context.origin.y),
        MacroquadVec2::new(MENU_SIZE.x, MENU_SIZE.y),
        |ui| {
            for action in MenuAction::ALL {
                if ui.button(None, action.label()) {
                    chosen = Some(action);
                }
            }
        },
    );

    ui.pop_skin();

    chosen
}
