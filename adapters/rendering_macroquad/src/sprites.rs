use std::collections::HashMap;

use anyhow::{Context, Result};
use glam::Vec2;
use gridboard_core::VisualHandle;
use gridboard_rendering::{Color, VisualUpload};
use macroquad::{
    math::Vec2 as MacroquadVec2,
    texture::{self, DrawTextureParams, Texture2D},
};

use crate::to_macroquad_color;

/// Parameters describing how a sprite should be drawn on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct DrawParams {
    /// Position in screen-space pixels where the sprite's top-left corner is placed.
    pub(crate) position: Vec2,
    /// Desired size in screen-space pixels.
    pub(crate) size: Vec2,
    /// Rotation applied around the computed pivot, in radians.
    pub(crate) rotation_radians: f32,
    /// Pivot expressed in normalised sprite coordinates (0.0..=1.0).
    pub(crate) pivot: Vec2,
    /// Tint applied to the sprite.
    pub(crate) tint: Color,
}

impl DrawParams {
    /// Creates draw parameters anchored at the provided position and size.
    #[must_use]
    pub(crate) fn new(position: Vec2, size: Vec2) -> Self {
        Self {
            position,
            size,
            rotation_radians: 0.0,
            pivot: Vec2::splat(0.5),
            tint: Color::new(1.0, 1.0, 1.0, 1.0),
        }
    }

    /// Overrides the rotation applied when drawing the sprite.
    #[must_use]
    pub(crate) fn with_rotation(mut self, rotation_radians: f32) -> Self {
        self.rotation_radians = rotation_radians;
        self
    }

    /// Overrides the tint colour used when drawing the sprite.
    #[must_use]
    pub(crate) fn with_tint(mut self, tint: Color) -> Self {
        self.tint = tint;
        self
    }

    /// Screen-space point the sprite rotates about.
    #[must_use]
    pub(crate) fn pivot_point(&self) -> Vec2 {
        self.position + self.pivot * self.size
    }
}

/// Textures uploaded for decoded visuals, keyed by handle.
#[derive(Debug, Default)]
pub(crate) struct TextureCache {
    textures: HashMap<VisualHandle, Texture2D>,
}

impl TextureCache {
    /// Creates a GPU texture from decoded pixels.
    pub(crate) fn upload(&mut self, upload: VisualUpload) -> Result<()> {
        let width = u16::try_from(upload.width)
            .with_context(|| format!("visual {:?} is too wide", upload.handle))?;
        let height = u16::try_from(upload.height)
            .with_context(|| format!("visual {:?} is too tall", upload.handle))?;
        let texture = Texture2D::from_rgba8(width, height, &upload.rgba);
        self.insert(upload.handle, texture);
        Ok(())
    }

    fn insert(&mut self, handle: VisualHandle, texture: Texture2D) {
        let _ = self.textures.insert(handle, texture);
    }

    /// Returns whether a texture exists for the handle.
    #[must_use]
    pub(crate) fn contains(&self, handle: VisualHandle) -> bool {
        self.textures.contains_key(&handle)
    }

    /// Draws the texture registered for `handle`; missing textures are skipped.
    pub(crate) fn draw(&self, handle: VisualHandle, params: DrawParams) {
        let Some(texture) = self.textures.get(&handle).copied() else {
            return;
        };

        let pivot = params.pivot_point();
        let draw_params = DrawTextureParams {
            dest_size: Some(MacroquadVec2::new(params.size.x, params.size.y)),
            rotation: params.rotation_radians,
            pivot: Some(MacroquadVec2::new(pivot.x, pivot.y)),
            ..DrawTextureParams::default()
        };

        texture::draw_texture_ex(
            texture,
            params.position.x,
            params.position.y,
            to_macroquad_color(params.tint),
            draw_params,
        );
    }
}
