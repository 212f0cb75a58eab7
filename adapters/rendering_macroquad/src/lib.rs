#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Macroquad-backed rendering adapter for Gridboard.
//!
//! Macroquad's optional audio stack depends on native ALSA development
//! libraries, which are unavailable in the containerised CI environment.
//! To keep `cargo test` usable everywhere we depend on macroquad without its
//! default `audio` feature.
//!
//! The window is split into the palette strip in the top margin and the
//! placement surface below it. Pointer activity is translated into surface
//! coordinates before it reaches the scene callback, so nothing outside this
//! crate ever sees screen pixels.

mod sprites;
mod ui;

use self::sprites::{DrawParams, TextureCache};
use self::ui::{draw_context_menu_ui, menu_contains, ContextMenuUiContext};
use anyhow::{Context, Result};
use glam::Vec2;
use gridboard_core::{InputEvent, MenuAction, PixelPoint, PointerButton, Surface, SurfaceMargins};
use gridboard_rendering::{
    Color, Frame, FrameInput, HighlightPresentation, PaletteDrop, PaletteEntry, Presentation,
    RenderingBackend, Scene, SpritePresentation,
};
use macroquad::input::{
    is_key_pressed, is_mouse_button_pressed, is_mouse_button_released, mouse_position, KeyCode,
    MouseButton,
};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Latches context menu clicks so they reach the scene on the next frame.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Default)]
pub struct MenuInputState {
    action_latched: Option<MenuAction>,
}

impl MenuInputState {
    /// Returns the latched menu action and clears it so it fires only once.
    pub fn take_action(&mut self) -> Option<MenuAction> {
        self.action_latched.take()
    }

    /// Records that a menu button was clicked this frame.
    pub fn register_action(&mut self, action: MenuAction) {
        self.action_latched = Some(action);
    }
}

/// Snapshot of edge-triggered keyboard shortcuts observed during a single frame.
#[derive(Clone, Copy, Debug, Default)]
struct KeyboardShortcuts {
    /// `Q` quits the editor.
    quit_requested: bool,
    /// `Escape` closes the context menu.
    dismiss_menu: bool,
}

impl KeyboardShortcuts {
    fn poll() -> Self {
        Self {
            quit_requested: is_key_pressed(KeyCode::Q),
            dismiss_menu: is_key_pressed(KeyCode::Escape),
        }
    }
}

/// Pointer state sampled once per frame, in screen pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct PointerObservations {
    position: Vec2,
    moved: bool,
    primary_pressed: bool,
    primary_released: bool,
    secondary_pressed: bool,
}

impl PointerObservations {
    fn poll(previous: &mut Option<Vec2>) -> Self {
        let (x, y) = mouse_position();
        let position = Vec2::new(x, y);
        let moved = previous.map_or(false, |last| last != position);
        *previous = Some(position);

        Self {
            position,
            moved,
            primary_pressed: is_mouse_button_pressed(MouseButton::Left),
            primary_released: is_mouse_button_released(MouseButton::Left),
            secondary_pressed: is_mouse_button_pressed(MouseButton::Right),
        }
    }
}

/// Adapter-local pointer routing that outlives a single frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct PointerRouting {
    /// Palette slot whose icon follows the pointer.
    palette_drag: Option<usize>,
}

/// Rendering backend implemented on top of macroquad.
#[derive(Debug, Default)]
pub struct MacroquadBackend {
    swap_interval: Option<i32>,
}

impl MacroquadBackend {
    /// Returns a backend that requests the platform's default swap interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to request a specific swap interval from the platform.
    #[must_use]
    pub fn with_swap_interval(mut self, swap_interval: Option<i32>) -> Self {
        self.swap_interval = swap_interval;
        self
    }

    /// Configures the backend to either synchronise presentation with the display refresh rate
    /// or render as fast as possible.
    #[must_use]
    pub fn with_vsync(self, enabled: bool) -> Self {
        let swap_interval = if enabled { Some(1) } else { Some(0) };
        self.with_swap_interval(swap_interval)
    }
}

impl RenderingBackend for MacroquadBackend {
    fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) + 'static,
    {
        let Self { swap_interval } = self;

        let Presentation {
            window_title,
            window_size,
            margins,
            clear_color,
            line_color,
            scene,
        } = presentation;

        let mut config = macroquad::window::Conf {
            window_title,
            window_width: i32::try_from(window_size.0).context("window width is too large")?,
            window_height: i32::try_from(window_size.1).context("window height is too large")?,
            window_resizable: true,
            ..macroquad::window::Conf::default()
        };
        if let Some(swap_interval) = swap_interval {
            config.platform.swap_interval = Some(swap_interval);
        }

        macroquad::Window::from_config(config, async move {
            let mut scene = scene;
            let mut textures = TextureCache::default();
            let mut routing = PointerRouting::default();
            let mut menu_input = MenuInputState::default();
            let mut last_pointer = None;
            let palette_layout = PaletteLayout::for_margins(margins);
            let background = to_macroquad_color(clear_color);
            let started = Instant::now();

            loop {
                let keyboard = KeyboardShortcuts::poll();
                if keyboard.quit_requested {
                    info!("quit requested");
                    break;
                }

                macroquad::window::clear_background(background);

                let metrics = SurfaceMetrics::from_screen(
                    macroquad::window::screen_width(),
                    macroquad::window::screen_height(),
                    margins,
                );
                let dt_seconds = macroquad::time::get_frame_time();
                let frame_dt = Duration::from_secs_f32(dt_seconds.max(0.0));
                let observations = PointerObservations::poll(&mut last_pointer);
                let frame_input = gather_frame_input_from_observations(
                    &scene,
                    &metrics,
                    &palette_layout,
                    &mut routing,
                    observations,
                    menu_input.take_action(),
                    keyboard,
                    started.elapsed(),
                );

                update_scene(frame_dt, frame_input, &mut scene);

                for upload in scene.uploads.drain(..) {
                    let handle = upload.handle;
                    if let Err(error) = textures.upload(upload) {
                        warn!(?handle, error = %error, "failed to upload visual");
                    }
                }

                draw_surface(&scene.frame, &metrics, line_color);
                draw_sprites(&scene.frame, &metrics, &textures);
                draw_highlight(scene.highlight, &metrics);
                draw_palette(&scene.palette, &palette_layout, &textures, routing);
                draw_palette_ghost(
                    &scene.palette,
                    &palette_layout,
                    &textures,
                    routing,
                    observations.position,
                );

                if let Some(menu) = scene.menu {
                    let mut menu_ui = macroquad::ui::root_ui();
                    let context =
                        ContextMenuUiContext::new(menu.entity, metrics.to_screen(menu.anchor));
                    if let Some(action) = draw_context_menu_ui(&mut menu_ui, context) {
                        menu_input.register_action(action);
                    }
                }

                macroquad::window::next_frame().await;
            }
        });

        Ok(())
    }
}

/// Placement of the surface within the current window.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SurfaceMetrics {
    origin: Vec2,
    surface: Surface,
}

impl SurfaceMetrics {
    fn from_screen(screen_width: f32, screen_height: f32, margins: SurfaceMargins) -> Self {
        let surface = Surface::from_viewport(
            screen_width.max(0.0) as u32,
            screen_height.max(0.0) as u32,
            margins,
        );

        Self {
            origin: Vec2::new(margins.horizontal as f32, margins.top as f32),
            surface,
        }
    }

    fn to_surface(&self, screen: Vec2) -> PixelPoint {
        let local = screen - self.origin;
        PixelPoint::new(local.x.floor() as i32, local.y.floor() as i32)
    }

    fn to_screen(&self, point: Vec2) -> Vec2 {
        self.origin + point
    }
}

/// Slots of the palette strip drawn in the top margin.
#[derive(Clone, Copy, Debug, PartialEq)]
struct PaletteLayout {
    origin: Vec2,
    slot: f32,
    gap: f32,
}

impl PaletteLayout {
    const MAX_SLOT: f32 = 64.0;
    const MIN_SLOT: f32 = 16.0;
    const GAP: f32 = 12.0;

    fn for_margins(margins: SurfaceMargins) -> Self {
        let top = margins.top as f32;
        let slot = (top * 0.5).clamp(Self::MIN_SLOT, Self::MAX_SLOT);

        Self {
            origin: Vec2::new(margins.horizontal as f32, ((top - slot) * 0.5).max(0.0)),
            slot,
            gap: Self::GAP,
        }
    }

    fn slot_origin(&self, index: usize) -> Vec2 {
        self.origin + Vec2::new(index as f32 * (self.slot + self.gap), 0.0)
    }

    fn slot_at(&self, count: usize, point: Vec2) -> Option<usize> {
        (0..count).find(|&index| {
            let origin = self.slot_origin(index);
            point.x >= origin.x
                && point.x <= origin.x + self.slot
                && point.y >= origin.y
                && point.y <= origin.y + self.slot
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn gather_frame_input_from_observations(
    scene: &Scene,
    metrics: &SurfaceMetrics,
    palette: &PaletteLayout,
    routing: &mut PointerRouting,
    observations: PointerObservations,
    menu_action: Option<MenuAction>,
    keyboard: KeyboardShortcuts,
    now: Duration,
) -> FrameInput {
    let point = metrics.to_surface(observations.position);
    let mut input = FrameInput {
        now,
        surface: metrics.surface,
        menu_action,
        dismiss_menu: keyboard.dismiss_menu,
        ..FrameInput::default()
    };

    let over_menu = scene.menu.map_or(false, |menu| {
        menu_contains(metrics.to_screen(menu.anchor), observations.position)
    });

    if observations.primary_pressed && !over_menu {
        match palette.slot_at(scene.palette.len(), observations.position) {
            Some(index) => {
                routing.palette_drag = Some(index);
                input.dismiss_menu = true;
            }
            None => input
                .events
                .push(InputEvent::press(PointerButton::Primary, point, now)),
        }
    }

    if observations.secondary_pressed && !over_menu {
        input
            .events
            .push(InputEvent::press(PointerButton::Secondary, point, now));
    }

    if observations.moved && routing.palette_drag.is_none() {
        input.events.push(InputEvent::moved(point, now));
    }

    if observations.primary_released {
        match routing.palette_drag.take() {
            Some(index) => input.palette_drop = Some(PaletteDrop { index, point }),
            None => input
                .events
                .push(InputEvent::release(PointerButton::Primary, point, now)),
        }
    }

    input
}

fn draw_surface(frame: &Frame, metrics: &SurfaceMetrics, line_color: Color) {
    macroquad::shapes::draw_rectangle(
        metrics.origin.x,
        metrics.origin.y,
        frame.width,
        frame.height,
        macroquad::color::WHITE,
    );

    let color = to_macroquad_color(line_color);
    for line in &frame.grid_lines {
        let from = metrics.to_screen(line.from);
        let to = metrics.to_screen(line.to);
        macroquad::shapes::draw_line(from.x, from.y, to.x, to.y, 1.0, color);
    }
}

fn draw_sprites(frame: &Frame, metrics: &SurfaceMetrics, textures: &TextureCache) {
    for sprite in &frame.sprites {
        if let Some(params) = sprite_draw_parameters(sprite, metrics) {
            textures.draw(sprite.visual, params);
        }
    }
}

fn sprite_draw_parameters(
    sprite: &SpritePresentation,
    metrics: &SurfaceMetrics,
) -> Option<DrawParams> {
    if sprite.size <= f32::EPSILON || !sprite.rotation_radians.is_finite() {
        return None;
    }

    let center = metrics.to_screen(sprite.center);
    let size = Vec2::splat(sprite.size);
    Some(DrawParams::new(center - size * 0.5, size).with_rotation(sprite.rotation_radians))
}

fn draw_highlight(highlight: Option<HighlightPresentation>, metrics: &SurfaceMetrics) {
    let Some(highlight) = highlight else {
        return;
    };

    let origin = metrics.to_screen(highlight.origin);
    let color = to_macroquad_color(Color::from_rgb_u8(30, 144, 255));
    macroquad::shapes::draw_rectangle_lines(
        origin.x - 2.0,
        origin.y - 2.0,
        highlight.size + 4.0,
        highlight.size + 4.0,
        2.0,
        color,
    );
}

fn draw_palette(
    palette: &[PaletteEntry],
    layout: &PaletteLayout,
    textures: &TextureCache,
    routing: PointerRouting,
) {
    let frame_color = Color::from_rgb_u8(120, 120, 120);
    for (index, entry) in palette.iter().enumerate() {
        let origin = layout.slot_origin(index);
        let color = if routing.palette_drag == Some(index) {
            frame_color.lighten(0.5)
        } else {
            frame_color
        };
        macroquad::shapes::draw_rectangle_lines(
            origin.x,
            origin.y,
            layout.slot,
            layout.slot,
            1.0,
            to_macroquad_color(color),
        );

        if let Some(visual) = entry.visual.filter(|visual| textures.contains(*visual)) {
            textures.draw(visual, DrawParams::new(origin, Vec2::splat(layout.slot)));
        }
    }
}

fn draw_palette_ghost(
    palette: &[PaletteEntry],
    layout: &PaletteLayout,
    textures: &TextureCache,
    routing: PointerRouting,
    cursor: Vec2,
) {
    let Some(visual) = routing
        .palette_drag
        .and_then(|index| palette.get(index))
        .and_then(|entry| entry.visual)
    else {
        return;
    };

    let size = Vec2::splat(layout.slot);
    textures.draw(
        visual,
        DrawParams::new(cursor - size * 0.5, size).with_tint(Color::new(1.0, 1.0, 1.0, 0.6)),
    );
}

fn to_macroquad_color(color: gridboard_rendering::Color) -> macroquad::color::Color {
    macroquad::color::Color::new(color.red, color.green, color.blue, color.alpha)
}
