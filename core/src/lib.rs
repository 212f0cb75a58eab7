#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Gridboard editor.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative placement store, and pure systems. Adapters translate raw
//! pointer activity into [`InputEvent`] values, the interaction system turns
//! those into [`Command`] values, the world executes commands via its `apply`
//! entry point and then broadcasts [`Event`] values that drive rendering and
//! persistence. Systems observe the store exclusively through the immutable
//! [`EntityView`].

mod geometry;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use geometry::{
    GeometryError, GridIndex, Lattice, PixelOffset, PixelPoint, Surface, SurfaceMargins,
    DEFAULT_CELL_SIZE, DEFAULT_FOOTPRINT,
};

/// Delay used to tell a single click apart from a double click.
pub const DEFAULT_DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(250);

/// Commands that express all permissible placement store mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Recomputes the drawable surface after the viewport changed size.
    ResizeSurface {
        /// New drawable width in pixels.
        width: u32,
        /// New drawable height in pixels.
        height: u32,
    },
    /// Inserts a new entity whose visual finished loading.
    PlaceEntity {
        /// Name derived from the source asset.
        identity: String,
        /// Decoded visual backing the entity.
        visual: VisualHandle,
        /// Lattice-aligned top-left corner of the entity.
        position: PixelPoint,
    },
    /// Moves an entity while it is being dragged.
    MoveEntity {
        /// Entity being dragged.
        entity: EntityId,
        /// Lattice-aligned destination.
        position: PixelPoint,
    },
    /// Finalises a drag at the entity's current position.
    CommitEntity {
        /// Entity whose drag ended on the surface.
        entity: EntityId,
    },
    /// Rotates an entity in place by whole quarter turns.
    RotateEntity {
        /// Entity to rotate.
        entity: EntityId,
        /// Signed number of 90 degree steps; positive values turn clockwise.
        quarter_turns: i32,
    },
    /// Deletes an entity from the store.
    RemoveEntity {
        /// Entity to delete.
        entity: EntityId,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Confirms that the drawable surface changed dimensions.
    SurfaceResized {
        /// Surface after the resize.
        surface: Surface,
    },
    /// Confirms that a new entity joined the store.
    EntityPlaced {
        /// Handle allocated to the entity.
        entity: EntityId,
        /// Name derived from the source asset.
        identity: String,
        /// Position the entity occupies.
        position: PixelPoint,
    },
    /// Reports an intermediate drag position.
    EntityMoved {
        /// Entity that moved.
        entity: EntityId,
        /// Position after the move.
        position: PixelPoint,
    },
    /// Confirms that a drag ended with the entity kept on the surface.
    EntityCommitted {
        /// Entity whose drag was committed.
        entity: EntityId,
        /// Final position of the entity.
        position: PixelPoint,
    },
    /// Confirms that an entity's rotation changed.
    EntityRotated {
        /// Entity that rotated.
        entity: EntityId,
        /// Cumulative rotation after the change.
        rotation: Rotation,
    },
    /// Confirms that an entity left the store.
    EntityRemoved {
        /// Entity that was removed.
        entity: EntityId,
        /// Name of the removed entity.
        identity: String,
    },
    /// Reports that a placement request was rejected.
    PlacementRejected {
        /// Name of the entity that failed to join the store.
        identity: String,
        /// Requested position.
        position: PixelPoint,
        /// Specific reason the placement failed.
        reason: PlacementError,
    },
    /// Reports that a mutation targeting an existing entity was rejected.
    MutationRejected {
        /// Entity targeted by the rejected command.
        entity: EntityId,
        /// Specific reason the mutation failed.
        reason: MutationError,
    },
}

impl Event {
    /// Returns `true` when the event reflects a change to the placed entities.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::EntityPlaced { .. }
                | Self::EntityMoved { .. }
                | Self::EntityCommitted { .. }
                | Self::EntityRotated { .. }
                | Self::EntityRemoved { .. }
        )
    }
}

/// Reasons a placement request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementError {
    /// The entity's center would lie outside the surface.
    OutOfBounds,
    /// The requested position is not lattice-aligned.
    Misaligned,
}

/// Reasons a mutation of an existing entity may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationError {
    /// No entity with the provided handle exists.
    MissingEntity,
    /// The requested position is not lattice-aligned.
    Misaligned,
}

/// Handle allocated to an entity by the placement store.
///
/// Handles are never persisted; they only let the interaction layer refer to
/// the same entity across consecutive input events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity handle with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Opaque handle to a decoded image resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisualHandle(u32);

impl VisualHandle {
    /// Creates a new visual handle with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Cumulative rotation of an entity measured in degrees.
///
/// The value is unbounded; only its remainder modulo 360 is visually
/// meaningful.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rotation(i32);

impl Rotation {
    /// Rotation of a freshly placed entity.
    pub const ZERO: Self = Self(0);

    /// Creates a rotation from a raw degree count.
    #[must_use]
    pub const fn from_degrees(degrees: i32) -> Self {
        Self(degrees)
    }

    /// Cumulative degrees, possibly negative or above 360.
    #[must_use]
    pub const fn degrees(&self) -> i32 {
        self.0
    }

    /// Returns the rotation advanced by the provided number of quarter turns.
    #[must_use]
    pub const fn quarter_turned(self, quarter_turns: i32) -> Self {
        Self(self.0.saturating_add(quarter_turns.saturating_mul(90)))
    }

    /// Visible rotation in the range `0..360`.
    #[must_use]
    pub const fn normalized(&self) -> i32 {
        self.0.rem_euclid(360)
    }
}

/// Icon offered by the palette.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IconSource {
    reference: String,
    identity: String,
}

impl IconSource {
    /// Creates a palette source and derives its identity from the file stem.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        let identity = identity_from_reference(&reference);
        Self {
            reference,
            identity,
        }
    }

    /// Resolvable reference to the image resource, usually a file path.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Name persisted for every entity created from this source.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

fn identity_from_reference(reference: &str) -> String {
    let file = reference.rsplit(['/', '\\']).next().unwrap_or(reference);
    match file.rfind('.') {
        Some(dot) if dot > 0 => file[..dot].to_owned(),
        _ => file.to_owned(),
    }
}

/// Pointer buttons understood by the interaction system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerButton {
    /// Left mouse button or primary touch contact.
    Primary,
    /// Right mouse button, used to open the context menu.
    Secondary,
}

/// Kind of pointer activity captured by an adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// A button went down.
    Press,
    /// The pointer moved.
    Move,
    /// A button went up.
    Release,
}

/// Framework-independent pointer event expressed in surface coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputEvent {
    /// What happened.
    pub kind: InputKind,
    /// Button involved; ignored for moves.
    pub button: PointerButton,
    /// Pointer location relative to the surface's top-left corner.
    pub position: PixelPoint,
    /// Monotonic timestamp of the event.
    pub at: Duration,
}

impl InputEvent {
    /// Creates a press event.
    #[must_use]
    pub const fn press(button: PointerButton, position: PixelPoint, at: Duration) -> Self {
        Self {
            kind: InputKind::Press,
            button,
            position,
            at,
        }
    }

    /// Creates a pointer move event.
    #[must_use]
    pub const fn moved(position: PixelPoint, at: Duration) -> Self {
        Self {
            kind: InputKind::Move,
            button: PointerButton::Primary,
            position,
            at,
        }
    }

    /// Creates a release event.
    #[must_use]
    pub const fn release(button: PointerButton, position: PixelPoint, at: Duration) -> Self {
        Self {
            kind: InputKind::Release,
            button,
            position,
            at,
        }
    }
}

/// Semantic actions exposed by the context menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MenuAction {
    /// Rotate the selected entity 90 degrees counter-clockwise.
    RotateLeft,
    /// Rotate the selected entity 90 degrees clockwise.
    RotateRight,
    /// Delete the selected entity.
    Remove,
}

impl MenuAction {
    /// Every action in the order the menu lists them.
    pub const ALL: [Self; 3] = [Self::RotateLeft, Self::RotateRight, Self::Remove];

    /// Label shown for the action.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RotateLeft => "Rotate left",
            Self::RotateRight => "Rotate right",
            Self::Remove => "Remove",
        }
    }
}

/// Immutable representation of a single placed entity used for queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitySnapshot {
    /// Handle allocated to the entity by the store.
    pub id: EntityId,
    /// Name derived from the source asset.
    pub identity: String,
    /// Lattice-aligned top-left corner.
    pub position: PixelPoint,
    /// Cumulative rotation.
    pub rotation: Rotation,
    /// Decoded visual backing the entity.
    pub visual: VisualHandle,
}

/// Read-only snapshot of every placed entity in store order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityView {
    snapshots: Vec<EntitySnapshot>,
}

impl EntityView {
    /// Creates a view from snapshots already in store order.
    #[must_use]
    pub fn from_snapshots(snapshots: Vec<EntitySnapshot>) -> Self {
        Self { snapshots }
    }

    /// Iterator over the snapshots in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.snapshots.iter()
    }

    /// Number of entities captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view captured no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Looks up an entity by handle.
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&EntitySnapshot> {
        self.snapshots.iter().find(|snapshot| snapshot.id == entity)
    }

    /// Returns the first entity in store order whose footprint contains `point`.
    ///
    /// Earlier insertions win when footprints overlap.
    #[must_use]
    pub fn entity_at(&self, point: PixelPoint, lattice: &Lattice) -> Option<&EntitySnapshot> {
        self.snapshots
            .iter()
            .find(|snapshot| lattice.hit_test(point, snapshot.position))
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EntitySnapshot> {
        self.snapshots
    }
}
