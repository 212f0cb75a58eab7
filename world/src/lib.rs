#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative placement store for Gridboard.
//!
//! The world owns every placed entity exclusively. Mutations only happen
//! through [`apply`], which runs to completion before returning, so callers
//! can render and persist immediately afterwards and always observe a fully
//! applied state. The store has no listeners; sequencing the follow-up work is
//! the caller's job.

use gridboard_core::{
    Command, EntityId, Event, Lattice, MutationError, PixelPoint, PlacementError, Rotation,
    Surface, VisualHandle,
};
use tracing::debug;

/// Entity placed on the surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedEntity {
    id: EntityId,
    identity: String,
    position: PixelPoint,
    rotation: Rotation,
    visual: VisualHandle,
}

impl PlacedEntity {
    /// Handle allocated by the store.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Name derived from the source asset.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Lattice-aligned top-left corner.
    #[must_use]
    pub const fn position(&self) -> PixelPoint {
        self.position
    }

    /// Cumulative rotation.
    #[must_use]
    pub const fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Decoded visual backing the entity.
    #[must_use]
    pub const fn visual(&self) -> VisualHandle {
        self.visual
    }
}

/// Represents the authoritative placement state.
#[derive(Debug)]
pub struct World {
    surface: Surface,
    lattice: Lattice,
    entities: Vec<PlacedEntity>,
    next_entity_id: u32,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty world using the default lattice and a zero-sized surface.
    ///
    /// Adapters size the surface with [`Command::ResizeSurface`] once the
    /// viewport is known.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lattice(Lattice::default())
    }

    /// Creates an empty world using the provided lattice.
    #[must_use]
    pub fn with_lattice(lattice: Lattice) -> Self {
        Self {
            surface: Surface::default(),
            lattice,
            entities: Vec::new(),
            next_entity_id: 0,
        }
    }

    fn allocate_entity_id(&mut self) -> EntityId {
        let id = EntityId::new(self.next_entity_id);
        self.next_entity_id = self.next_entity_id.wrapping_add(1);
        id
    }

    fn entity_index(&self, entity: EntityId) -> Option<usize> {
        self.entities.iter().position(|placed| placed.id == entity)
    }

    fn reject(&self, entity: EntityId, reason: MutationError, out_events: &mut Vec<Event>) {
        debug!(entity = entity.get(), ?reason, "mutation rejected");
        out_events.push(Event::MutationRejected { entity, reason });
    }
}

/// Applies the provided command to the world, mutating state synchronously.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ResizeSurface { width, height } => {
            world.surface = Surface::new(width, height);
            out_events.push(Event::SurfaceResized {
                surface: world.surface,
            });
        }
        Command::PlaceEntity {
            identity,
            visual,
            position,
        } => {
            let rejection = if !world.lattice.is_aligned(position) {
                Some(PlacementError::Misaligned)
            } else if !world
                .surface
                .holds_center(world.lattice.center_of(position))
            {
                Some(PlacementError::OutOfBounds)
            } else {
                None
            };

            if let Some(reason) = rejection {
                debug!(%identity, ?position, ?reason, "placement rejected");
                out_events.push(Event::PlacementRejected {
                    identity,
                    position,
                    reason,
                });
                return;
            }

            let id = world.allocate_entity_id();
            world.entities.push(PlacedEntity {
                id,
                identity: identity.clone(),
                position,
                rotation: Rotation::ZERO,
                visual,
            });
            out_events.push(Event::EntityPlaced {
                entity: id,
                identity,
                position,
            });
        }
        Command::MoveEntity { entity, position } => {
            let Some(index) = world.entity_index(entity) else {
                world.reject(entity, MutationError::MissingEntity, out_events);
                return;
            };
            if !world.lattice.is_aligned(position) {
                world.reject(entity, MutationError::Misaligned, out_events);
                return;
            }

            world.entities[index].position = position;
            out_events.push(Event::EntityMoved { entity, position });
        }
        Command::CommitEntity { entity } => {
            let Some(index) = world.entity_index(entity) else {
                world.reject(entity, MutationError::MissingEntity, out_events);
                return;
            };

            let position = world.entities[index].position;
            if world
                .surface
                .holds_center(world.lattice.center_of(position))
            {
                out_events.push(Event::EntityCommitted { entity, position });
            } else {
                let removed = world.entities.remove(index);
                debug!(
                    entity = entity.get(),
                    identity = %removed.identity,
                    "committed entity left the surface"
                );
                out_events.push(Event::EntityRemoved {
                    entity,
                    identity: removed.identity,
                });
            }
        }
        Command::RotateEntity {
            entity,
            quarter_turns,
        } => {
            let Some(index) = world.entity_index(entity) else {
                world.reject(entity, MutationError::MissingEntity, out_events);
                return;
            };

            let placed = &mut world.entities[index];
            placed.rotation = placed.rotation.quarter_turned(quarter_turns);
            out_events.push(Event::EntityRotated {
                entity,
                rotation: placed.rotation,
            });
        }
        Command::RemoveEntity { entity } => {
            let Some(index) = world.entity_index(entity) else {
                world.reject(entity, MutationError::MissingEntity, out_events);
                return;
            };

            let removed = world.entities.remove(index);
            out_events.push(Event::EntityRemoved {
                entity,
                identity: removed.identity,
            });
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use gridboard_core::{EntitySnapshot, EntityView, Lattice, Surface};

    use super::{PlacedEntity, World};

    /// Current drawable surface.
    #[must_use]
    pub fn surface(world: &World) -> Surface {
        world.surface
    }

    /// Lattice every entity position snaps to.
    #[must_use]
    pub fn lattice(world: &World) -> Lattice {
        world.lattice
    }

    /// Placed entities in insertion order.
    #[must_use]
    pub fn entities(world: &World) -> &[PlacedEntity] {
        &world.entities
    }

    /// Number of entities currently in the store.
    #[must_use]
    pub fn entity_count(world: &World) -> usize {
        world.entities.len()
    }

    /// Captures a read-only view of the placed entities in insertion order.
    #[must_use]
    pub fn entity_view(world: &World) -> EntityView {
        EntityView::from_snapshots(
            world
                .entities
                .iter()
                .map(|placed| EntitySnapshot {
                    id: placed.id,
                    identity: placed.identity.clone(),
                    position: placed.position,
                    rotation: placed.rotation,
                    visual: placed.visual,
                })
                .collect(),
        )
    }
}
