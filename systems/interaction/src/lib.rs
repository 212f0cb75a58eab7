#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure interaction system that turns pointer input into placement commands.
//!
//! All interaction state lives in a single [`InteractionState`] value. The
//! system never touches the store directly: it reads an [`EntityView`] and
//! answers with [`Command`] batches that the caller applies to the world.
//! Time is supplied by the caller, either through the timestamp carried by
//! every [`InputEvent`] or explicitly via [`Interaction::advance`], so the
//! single-click versus double-click decision is deterministic.

use std::time::Duration;

use gridboard_core::{
    Command, EntityId, EntityView, IconSource, InputEvent, InputKind, Lattice, MenuAction,
    PixelOffset, PixelPoint, PointerButton, Surface, DEFAULT_DOUBLE_CLICK_WINDOW,
};
use tracing::trace;

/// Pointer interaction phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionState {
    /// Nothing is in progress.
    Idle,
    /// A primary press was registered and the double-click window is open.
    PendingClick {
        /// Location of the first press.
        press: PixelPoint,
        /// Entity under the first press, if any.
        target: Option<EntityId>,
        /// Instant at which the press turns into a drag.
        deadline: Duration,
        /// Whether the button was already released inside the window.
        released: bool,
    },
    /// An entity follows the pointer.
    Dragging {
        /// Entity being dragged.
        entity: EntityId,
        /// Offset between the grab point and the entity's top-left corner.
        anchor: PixelOffset,
    },
    /// The context menu is open for an entity.
    MenuOpen {
        /// Entity the menu actions apply to.
        entity: EntityId,
        /// Surface coordinate where the menu was requested.
        anchor: PixelPoint,
    },
}

/// Palette drop that landed on the surface and waits for its visual to load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacementRequest {
    /// Name persisted for the future entity.
    pub identity: String,
    /// Resolvable reference to the icon image.
    pub reference: String,
    /// Lattice-aligned position the entity will occupy.
    pub position: PixelPoint,
}

/// Interaction system translating input events into commands.
#[derive(Clone, Debug)]
pub struct Interaction {
    state: InteractionState,
    lattice: Lattice,
    double_click_window: Duration,
}

impl Default for Interaction {
    fn default() -> Self {
        Self::new(Lattice::default())
    }
}

impl Interaction {
    /// Creates an idle interaction system snapping to the provided lattice.
    #[must_use]
    pub const fn new(lattice: Lattice) -> Self {
        Self {
            state: InteractionState::Idle,
            lattice,
            double_click_window: DEFAULT_DOUBLE_CLICK_WINDOW,
        }
    }

    /// Overrides the interval used to detect double clicks.
    #[must_use]
    pub const fn with_double_click_window(mut self, window: Duration) -> Self {
        self.double_click_window = window;
        self
    }

    /// Current interaction phase.
    #[must_use]
    pub const fn state(&self) -> InteractionState {
        self.state
    }

    /// Entity and anchor of the open context menu, if any.
    #[must_use]
    pub const fn open_menu(&self) -> Option<(EntityId, PixelPoint)> {
        match self.state {
            InteractionState::MenuOpen { entity, anchor } => Some((entity, anchor)),
            _ => None,
        }
    }

    /// Entity currently being dragged, if any.
    #[must_use]
    pub const fn dragged_entity(&self) -> Option<EntityId> {
        match self.state {
            InteractionState::Dragging { entity, .. } => Some(entity),
            _ => None,
        }
    }

    /// Fires the double-click timer when its deadline has passed.
    ///
    /// A pending press over an entity that is still held becomes a drag
    /// anchored where the entity was grabbed. Presses over empty space, or
    /// presses already released, fall back to idle without any mutation.
    pub fn advance(&mut self, now: Duration, entities: &EntityView) {
        let InteractionState::PendingClick {
            press,
            target,
            deadline,
            released,
        } = self.state
        else {
            return;
        };

        if now < deadline {
            return;
        }

        self.state = match (target, released) {
            (Some(entity), false) => match entities.get(entity) {
                Some(snapshot) => {
                    trace!(entity = entity.get(), "drag started");
                    InteractionState::Dragging {
                        entity,
                        anchor: press - snapshot.position,
                    }
                }
                None => InteractionState::Idle,
            },
            _ => InteractionState::Idle,
        };
    }

    /// Consumes a pointer event and emits the resulting commands.
    ///
    /// Pending timers are resolved against the event timestamp first, so a
    /// press arriving after the window closed starts a new click instead of
    /// completing a double click.
    pub fn handle(
        &mut self,
        input: InputEvent,
        surface: Surface,
        entities: &EntityView,
        out: &mut Vec<Command>,
    ) {
        self.advance(input.at, entities);

        match input.kind {
            InputKind::Press => self.handle_press(input, surface, entities, out),
            InputKind::Move => self.handle_move(input, out),
            InputKind::Release => self.handle_release(input, surface, out),
        }
    }

    /// Applies a context menu action to the selected entity and closes the menu.
    ///
    /// Does nothing when no menu is open.
    pub fn menu_action(&mut self, action: MenuAction, out: &mut Vec<Command>) {
        let InteractionState::MenuOpen { entity, .. } = self.state else {
            return;
        };

        out.push(match action {
            MenuAction::RotateLeft => Command::RotateEntity {
                entity,
                quarter_turns: -1,
            },
            MenuAction::RotateRight => Command::RotateEntity {
                entity,
                quarter_turns: 1,
            },
            MenuAction::Remove => Command::RemoveEntity { entity },
        });
        self.state = InteractionState::Idle;
    }

    /// Closes the context menu without mutating anything.
    pub fn dismiss_menu(&mut self) {
        if matches!(self.state, InteractionState::MenuOpen { .. }) {
            self.state = InteractionState::Idle;
        }
    }

    /// Resolves a palette drop into a placement request.
    ///
    /// Drops outside the surface are ignored.
    #[must_use]
    pub fn palette_drop(
        &self,
        surface: Surface,
        source: &IconSource,
        point: PixelPoint,
    ) -> Option<PlacementRequest> {
        if !surface.contains(point) {
            return None;
        }

        Some(PlacementRequest {
            identity: source.identity().to_owned(),
            reference: source.reference().to_owned(),
            position: self.lattice.snap(point),
        })
    }

    fn handle_press(
        &mut self,
        input: InputEvent,
        surface: Surface,
        entities: &EntityView,
        out: &mut Vec<Command>,
    ) {
        self.dismiss_menu();

        if !surface.contains(input.position) {
            return;
        }

        let hit = entities
            .entity_at(input.position, &self.lattice)
            .map(|snapshot| snapshot.id);

        match (self.state, input.button) {
            (InteractionState::Idle, PointerButton::Primary) => {
                self.state = InteractionState::PendingClick {
                    press: input.position,
                    target: hit,
                    deadline: input.at.saturating_add(self.double_click_window),
                    released: false,
                };
            }
            (InteractionState::Idle, PointerButton::Secondary) => {
                if let Some(entity) = hit {
                    self.state = InteractionState::MenuOpen {
                        entity,
                        anchor: input.position,
                    };
                }
            }
            (InteractionState::PendingClick { .. }, PointerButton::Primary) => {
                if let Some(entity) = hit {
                    trace!(entity = entity.get(), "double click");
                    out.push(Command::RotateEntity {
                        entity,
                        quarter_turns: 1,
                    });
                }
                self.state = InteractionState::Idle;
            }
            (InteractionState::PendingClick { .. }, PointerButton::Secondary)
            | (InteractionState::Dragging { .. }, _)
            | (InteractionState::MenuOpen { .. }, _) => {}
        }
    }

    fn handle_move(&mut self, input: InputEvent, out: &mut Vec<Command>) {
        if let InteractionState::Dragging { entity, anchor } = self.state {
            out.push(Command::MoveEntity {
                entity,
                position: self.lattice.snap(input.position - anchor),
            });
        }
    }

    fn handle_release(&mut self, input: InputEvent, surface: Surface, out: &mut Vec<Command>) {
        if input.button != PointerButton::Primary {
            return;
        }

        match &mut self.state {
            InteractionState::Dragging { entity, .. } => {
                let entity = *entity;
                if surface.contains(input.position) {
                    out.push(Command::CommitEntity { entity });
                } else {
                    trace!(entity = entity.get(), "released outside the surface");
                    out.push(Command::RemoveEntity { entity });
                }
                self.state = InteractionState::Idle;
            }
            InteractionState::PendingClick { released, .. } => {
                *released = true;
            }
            InteractionState::Idle | InteractionState::MenuOpen { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridboard_core::{EntitySnapshot, Rotation, VisualHandle};

    fn view_with_entity_at(position: PixelPoint) -> EntityView {
        EntityView::from_snapshots(vec![EntitySnapshot {
            id: EntityId::new(4),
            identity: "pump".to_owned(),
            position,
            rotation: Rotation::ZERO,
            visual: VisualHandle::new(0),
        }])
    }

    #[test]
    fn advance_before_deadline_keeps_pending_click() {
        let entities = view_with_entity_at(PixelPoint::new(1, 1));
        let mut interaction = Interaction::default();
        let mut commands = Vec::new();

        interaction.handle(
            InputEvent::press(
                PointerButton::Primary,
                PixelPoint::new(10, 12),
                Duration::from_millis(1_000),
            ),
            Surface::new(800, 600),
            &entities,
            &mut commands,
        );
        interaction.advance(Duration::from_millis(1_249), &entities);

        assert!(matches!(
            interaction.state(),
            InteractionState::PendingClick { .. }
        ));
        assert!(commands.is_empty());
    }

    #[test]
    fn advance_at_deadline_records_grab_offset() {
        let entities = view_with_entity_at(PixelPoint::new(1, 1));
        let mut interaction = Interaction::default();
        let mut commands = Vec::new();

        interaction.handle(
            InputEvent::press(
                PointerButton::Primary,
                PixelPoint::new(10, 12),
                Duration::ZERO,
            ),
            Surface::new(800, 600),
            &entities,
            &mut commands,
        );
        interaction.advance(DEFAULT_DOUBLE_CLICK_WINDOW, &entities);

        assert_eq!(
            interaction.state(),
            InteractionState::Dragging {
                entity: EntityId::new(4),
                anchor: PixelOffset::new(9, 11),
            }
        );
    }

    #[test]
    fn custom_double_click_window_is_respected() {
        let entities = view_with_entity_at(PixelPoint::new(1, 1));
        let mut interaction =
            Interaction::default().with_double_click_window(Duration::from_millis(500));
        let mut commands = Vec::new();

        interaction.handle(
            InputEvent::press(PointerButton::Primary, PixelPoint::new(5, 5), Duration::ZERO),
            Surface::new(800, 600),
            &entities,
            &mut commands,
        );
        interaction.handle(
            InputEvent::press(
                PointerButton::Primary,
                PixelPoint::new(5, 5),
                Duration::from_millis(400),
            ),
            Surface::new(800, 600),
            &entities,
            &mut commands,
        );

        assert_eq!(
            commands,
            vec![Command::RotateEntity {
                entity: EntityId::new(4),
                quarter_turns: 1,
            }]
        );
    }

    #[test]
    fn palette_drop_snaps_inside_and_ignores_outside() {
        let interaction = Interaction::default();
        let source = IconSource::new("icons/pump.png");
        let surface = Surface::new(800, 600);

        assert_eq!(
            interaction.palette_drop(surface, &source, PixelPoint::new(40, 40)),
            Some(PlacementRequest {
                identity: "pump".to_owned(),
                reference: "icons/pump.png".to_owned(),
                position: PixelPoint::new(1, 1),
            })
        );
        assert!(interaction
            .palette_drop(surface, &source, PixelPoint::new(-3, 40))
            .is_none());
        assert!(interaction
            .palette_drop(surface, &source, PixelPoint::new(40, 601))
            .is_none());
    }
}
