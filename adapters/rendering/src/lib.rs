#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for Gridboard adapters.

pub mod visuals;

use std::{f32::consts::PI, sync::Arc, time::Duration};

use anyhow::Result as AnyResult;
use glam::Vec2;
use gridboard_core::{
    EntityId, EntityView, IconSource, InputEvent, Lattice, MenuAction, PixelPoint, Surface,
    SurfaceMargins, VisualHandle,
};

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Returns a new color lightened towards white by the provided amount.
    #[must_use]
    pub fn lighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);

        Self {
            red: lighten_channel(self.red, amount),
            green: lighten_channel(self.green, amount),
            blue: lighten_channel(self.blue, amount),
            alpha: self.alpha,
        }
    }
}

fn lighten_channel(channel: f32, amount: f32) -> f32 {
    channel + (1.0 - channel) * amount
}

/// Straight lattice line expressed in surface pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLine {
    /// Start of the line.
    pub from: Vec2,
    /// End of the line.
    pub to: Vec2,
}

/// Entity visual positioned on the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpritePresentation {
    /// Entity the sprite belongs to.
    pub entity: EntityId,
    /// Decoded image drawn for the entity.
    pub visual: VisualHandle,
    /// Center of the footprint in surface pixels; also the rotation pivot.
    pub center: Vec2,
    /// Side length of the drawn square.
    pub size: f32,
    /// Clockwise rotation about the center, in radians within `0..2π`.
    pub rotation_radians: f32,
}

/// Output of a single render pass over the placement store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    /// Width of the cleared drawable area.
    pub width: f32,
    /// Height of the cleared drawable area.
    pub height: f32,
    /// Lattice lines in drawing order.
    pub grid_lines: Vec<GridLine>,
    /// Entity sprites in store order; later sprites draw on top.
    pub sprites: Vec<SpritePresentation>,
}

/// Renders the surface, lattice lines and every ready entity.
///
/// Entities whose visual is not ready yet are skipped for this pass.
#[must_use]
pub fn render<F>(surface: Surface, lattice: &Lattice, entities: &EntityView, ready: F) -> Frame
where
    F: Fn(VisualHandle) -> bool,
{
    let width = surface.width() as f32;
    let height = surface.height() as f32;
    let step = lattice.cell_size() as usize;

    let mut grid_lines = Vec::new();
    if step > 0 {
        for x in (0..=surface.width()).step_by(step) {
            let x = x as f32;
            grid_lines.push(GridLine {
                from: Vec2::new(x, 0.0),
                to: Vec2::new(x, height),
            });
        }
        for y in (0..=surface.height()).step_by(step) {
            let y = y as f32;
            grid_lines.push(GridLine {
                from: Vec2::new(0.0, y),
                to: Vec2::new(width, y),
            });
        }
    }

    let size = lattice.footprint() as f32;
    let sprites = entities
        .iter()
        .filter(|snapshot| ready(snapshot.visual))
        .map(|snapshot| SpritePresentation {
            entity: snapshot.id,
            visual: snapshot.visual,
            center: footprint_center(snapshot.position, size),
            size,
            rotation_radians: snapshot.rotation.normalized() as f32 * PI / 180.0,
        })
        .collect();

    Frame {
        width,
        height,
        grid_lines,
        sprites,
    }
}

fn footprint_center(position: PixelPoint, size: f32) -> Vec2 {
    Vec2::new(position.x() as f32, position.y() as f32) + Vec2::splat(size * 0.5)
}

/// Icon offered by the palette strip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteEntry {
    /// Source the icon is loaded from.
    pub source: IconSource,
    /// Thumbnail visual once decoded.
    pub visual: Option<VisualHandle>,
}

impl PaletteEntry {
    /// Creates a palette entry whose thumbnail is still loading.
    #[must_use]
    pub fn new(source: IconSource) -> Self {
        Self {
            source,
            visual: None,
        }
    }
}

/// Context menu opened over an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MenuPresentation {
    /// Entity the actions apply to.
    pub entity: EntityId,
    /// Top-left corner of the menu in surface pixels.
    pub anchor: Vec2,
}

impl MenuPresentation {
    /// Actions listed by the menu, top to bottom.
    pub const ACTIONS: [MenuAction; 3] = MenuAction::ALL;
}

/// Outline drawn around the entity that is being dragged.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HighlightPresentation {
    /// Top-left corner in surface pixels.
    pub origin: Vec2,
    /// Side length of the outlined square.
    pub size: f32,
}

/// Decoded pixels that the backend must turn into a texture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisualUpload {
    /// Handle the texture will be registered under.
    pub handle: VisualHandle,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed RGBA8 pixels.
    pub rgba: Arc<[u8]>,
}

/// Scene description combining the rendered frame with editor overlays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    /// Latest render of the placement store.
    pub frame: Frame,
    /// Icons offered by the palette strip, in display order.
    pub palette: Vec<PaletteEntry>,
    /// Context menu, when open.
    pub menu: Option<MenuPresentation>,
    /// Outline around the dragged entity, if any.
    pub highlight: Option<HighlightPresentation>,
    /// Pixel data awaiting upload; backends drain this every frame.
    pub uploads: Vec<VisualUpload>,
}

/// Icon dropped from the palette strip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaletteDrop {
    /// Index into [`Scene::palette`].
    pub index: usize,
    /// Drop location in surface pixels, possibly outside the surface.
    pub point: PixelPoint,
}

/// Input snapshot gathered by adapters before updating the scene.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FrameInput {
    /// Monotonic time since the backend started.
    pub now: Duration,
    /// Surface derived from the current viewport.
    pub surface: Surface,
    /// Pointer activity over the surface, in order, with surface coordinates.
    pub events: Vec<InputEvent>,
    /// Palette icon released during this frame.
    pub palette_drop: Option<PaletteDrop>,
    /// Context menu item chosen during this frame.
    pub menu_action: Option<MenuAction>,
    /// Whether the adapter requested the context menu to close.
    pub dismiss_menu: bool,
}

/// Presentation descriptor consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title used by the created window.
    pub window_title: String,
    /// Initial window size in pixels.
    pub window_size: (u32, u32),
    /// Gaps between the window edges and the surface.
    pub margins: SurfaceMargins,
    /// Solid color used to clear each frame.
    pub clear_color: Color,
    /// Color used for lattice lines.
    pub line_color: Color,
    /// Scene content that should be displayed.
    pub scene: Scene,
}

impl Presentation {
    /// Constructs a new presentation descriptor with default sizing and colors.
    #[must_use]
    pub fn new<T>(window_title: T, scene: Scene) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
            window_size: (1280, 900),
            margins: SurfaceMargins::default(),
            clear_color: Color::from_rgb_u8(245, 245, 245),
            line_color: Color::from_rgb_u8(204, 204, 204),
            scene,
        }
    }

    /// Overrides the initial window size.
    #[must_use]
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }

    /// Overrides the margins around the surface.
    #[must_use]
    pub fn with_margins(mut self, margins: SurfaceMargins) -> Self {
        self.margins = margins;
        self
    }
}

/// Rendering backend capable of presenting Gridboard scenes.
pub trait RenderingBackend {
    /// Runs the rendering backend until it is requested to exit.
    ///
    /// The provided `update_scene` closure receives the frame delta and the
    /// input captured by the adapter, and mutates the scene before it is drawn.
    fn run<F>(self, presentation: Presentation, update_scene: F) -> AnyResult<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) + 'static;
}
