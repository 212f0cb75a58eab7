//! Pixel-space geometry for the placement surface.
//!
//! Every function in this module is pure. Coordinates are integer pixels
//! relative to the surface's top-left corner; callers are responsible for
//! translating screen coordinates before invoking the mapper.

use std::ops::Sub;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Side length of a single lattice cell measured in pixels.
pub const DEFAULT_CELL_SIZE: u32 = 52;

/// Side length of the square footprint rendered for every entity.
pub const DEFAULT_FOOTPRINT: u32 = 50;

/// Pixel coordinate on the placement surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    x: i32,
    y: i32,
}

impl PixelPoint {
    /// Creates a new pixel coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal component measured from the surface's left edge.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical component measured from the surface's top edge.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }
}

impl Sub for PixelPoint {
    type Output = PixelOffset;

    fn sub(self, origin: PixelPoint) -> PixelOffset {
        PixelOffset::new(
            self.x.saturating_sub(origin.x),
            self.y.saturating_sub(origin.y),
        )
    }
}

impl Sub<PixelOffset> for PixelPoint {
    type Output = PixelPoint;

    fn sub(self, offset: PixelOffset) -> PixelPoint {
        PixelPoint::new(
            self.x.saturating_sub(offset.dx),
            self.y.saturating_sub(offset.dy),
        )
    }
}

/// Displacement between two pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelOffset {
    dx: i32,
    dy: i32,
}

impl PixelOffset {
    /// Creates a new displacement.
    #[must_use]
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    /// Horizontal displacement.
    #[must_use]
    pub const fn dx(&self) -> i32 {
        self.dx
    }

    /// Vertical displacement.
    #[must_use]
    pub const fn dy(&self) -> i32 {
        self.dy
    }
}

/// Integer cell indices used when serializing entity positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridIndex {
    column: i32,
    row: i32,
}

impl GridIndex {
    /// Creates a new grid index.
    #[must_use]
    pub const fn new(column: i32, row: i32) -> Self {
        Self { column, row }
    }

    /// Zero-based column of the cell.
    #[must_use]
    pub const fn column(&self) -> i32 {
        self.column
    }

    /// Zero-based row of the cell.
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }
}

/// Snap lattice that positions entity footprints centered within cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Lattice {
    cell_size: u32,
    footprint: u32,
}

impl Default for Lattice {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            footprint: DEFAULT_FOOTPRINT,
        }
    }
}

impl Lattice {
    /// Creates a lattice with the provided cell and footprint sizes.
    ///
    /// The footprint must be at least two pixels wide and may not exceed the
    /// cell, otherwise snapped positions would not round-trip through
    /// [`Lattice::grid_index`].
    pub fn new(cell_size: u32, footprint: u32) -> Result<Self, GeometryError> {
        if cell_size == 0 || i32::try_from(cell_size).is_err() {
            return Err(GeometryError::InvalidCellSize { cell_size });
        }

        if footprint < 2 || footprint > cell_size {
            return Err(GeometryError::InvalidFootprint {
                footprint,
                cell_size,
            });
        }

        Ok(Self {
            cell_size,
            footprint,
        })
    }

    /// Side length of a lattice cell in pixels.
    #[must_use]
    pub const fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Side length of an entity footprint in pixels.
    #[must_use]
    pub const fn footprint(&self) -> u32 {
        self.footprint
    }

    /// Distance between a cell's top-left corner and the footprint it hosts.
    #[must_use]
    pub const fn inset(&self) -> i32 {
        (self.cell_size / 2) as i32 - (self.footprint / 2) as i32
    }

    /// Maps a raw pixel coordinate onto the lattice-aligned top-left corner of
    /// the footprint occupying the cell under the coordinate.
    #[must_use]
    pub fn snap(&self, point: PixelPoint) -> PixelPoint {
        PixelPoint::new(self.snap_axis(point.x()), self.snap_axis(point.y()))
    }

    /// Converts a snapped position into the cell indices used for persistence.
    ///
    /// Halves round towards positive infinity.
    #[must_use]
    pub fn grid_index(&self, position: PixelPoint) -> GridIndex {
        GridIndex::new(self.round_axis(position.x()), self.round_axis(position.y()))
    }

    /// Reconstructs the snapped pixel position that maps to the provided index.
    #[must_use]
    pub fn position_of(&self, index: GridIndex) -> PixelPoint {
        let cell = self.cell();
        PixelPoint::new(
            index.column().saturating_mul(cell).saturating_add(self.inset()),
            index.row().saturating_mul(cell).saturating_add(self.inset()),
        )
    }

    /// Reports whether `point` falls within the footprint anchored at `position`.
    ///
    /// Edges are inclusive on all four sides.
    #[must_use]
    pub fn hit_test(&self, point: PixelPoint, position: PixelPoint) -> bool {
        let extent = self.footprint as i64;
        let (px, py) = (i64::from(point.x()), i64::from(point.y()));
        let (ex, ey) = (i64::from(position.x()), i64::from(position.y()));

        px >= ex && px <= ex + extent && py >= ey && py <= ey + extent
    }

    /// Returns `true` when `position` already lies on the snap lattice.
    #[must_use]
    pub fn is_aligned(&self, position: PixelPoint) -> bool {
        self.snap(position) == position
    }

    /// Center of the footprint anchored at `position`.
    #[must_use]
    pub fn center_of(&self, position: PixelPoint) -> PixelPoint {
        let half = (self.footprint / 2) as i32;
        PixelPoint::new(
            position.x().saturating_add(half),
            position.y().saturating_add(half),
        )
    }

    fn cell(&self) -> i32 {
        i32::try_from(self.cell_size).unwrap_or(i32::MAX)
    }

    fn snap_axis(&self, value: i32) -> i32 {
        let cell = self.cell();
        value
            .div_euclid(cell)
            .saturating_mul(cell)
            .saturating_add(self.inset())
    }

    fn round_axis(&self, value: i32) -> i32 {
        let cell = i64::from(self.cell());
        let rounded = (2 * i64::from(value) + cell).div_euclid(2 * cell);
        i32::try_from(rounded).unwrap_or(if rounded < 0 { i32::MIN } else { i32::MAX })
    }
}

/// Fixed gaps between the viewport edges and the drawable surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceMargins {
    /// Gap applied to both the left and the right edge.
    pub horizontal: u32,
    /// Gap reserved above the surface, where the palette lives.
    pub top: u32,
    /// Gap reserved below the surface.
    pub bottom: u32,
}

impl Default for SurfaceMargins {
    fn default() -> Self {
        Self {
            horizontal: 50,
            top: 150,
            bottom: 50,
        }
    }
}

/// Drawable area that hosts placed entities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Surface {
    width: u32,
    height: u32,
}

impl Surface {
    /// Creates a surface with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Derives the surface from the viewport size minus the fixed margins.
    #[must_use]
    pub const fn from_viewport(width: u32, height: u32, margins: SurfaceMargins) -> Self {
        Self {
            width: width.saturating_sub(margins.horizontal.saturating_mul(2)),
            height: height
                .saturating_sub(margins.top)
                .saturating_sub(margins.bottom),
        }
    }

    /// Width of the surface in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the surface in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Reports whether a pointer coordinate lies on the surface.
    ///
    /// The far edges count as inside; anything negative or beyond
    /// `(width, height)` is outside.
    #[must_use]
    pub fn contains(&self, point: PixelPoint) -> bool {
        point.x() >= 0
            && point.y() >= 0
            && i64::from(point.x()) <= i64::from(self.width)
            && i64::from(point.y()) <= i64::from(self.height)
    }

    /// Reports whether an entity center lies within `[0, width) x [0, height)`.
    #[must_use]
    pub fn holds_center(&self, center: PixelPoint) -> bool {
        center.x() >= 0
            && center.y() >= 0
            && i64::from(center.x()) < i64::from(self.width)
            && i64::from(center.y()) < i64::from(self.height)
    }
}

/// Errors raised when constructing an invalid lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The cell size must be positive and representable as a signed pixel.
    #[error("cell size must be positive (received {cell_size})")]
    InvalidCellSize {
        /// Cell size that failed validation.
        cell_size: u32,
    },
    /// The footprint must span at least two pixels and fit inside a cell.
    #[error("footprint {footprint} must lie within 2..={cell_size}")]
    InvalidFootprint {
        /// Footprint that failed validation.
        footprint: u32,
        /// Cell size the footprint was checked against.
        cell_size: u32,
    },
}
