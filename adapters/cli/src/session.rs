//! Editing session driven by the rendering backend once per frame.
//!
//! The session owns the placement store and is its only writer. Every frame
//! it resolves finished icon loads, feeds pointer activity through the
//! interaction system, executes the resulting commands, mirrors persisted
//! mutations to the snapshot sink and finally re-renders the scene from the
//! store.

use std::{collections::HashMap, mem, time::Duration};

use glam::Vec2;
use gridboard_core::{Command, Event, IconSource, Lattice, PixelPoint, Surface};
use gridboard_rendering::{
    render,
    visuals::{LoadOutcome, LoadTicket, VisualLoader},
    FrameInput, HighlightPresentation, MenuPresentation, PaletteDrop, PaletteEntry, Scene,
};
use gridboard_system_interaction::{Interaction, PlacementRequest};
use gridboard_system_persistence::{mirror, SnapshotSink};
use gridboard_world::{self as world, query, World};
use tracing::{debug, info, warn};

/// State carried between frames of an editing session.
pub(crate) struct Session<S> {
    world: World,
    interaction: Interaction,
    loader: VisualLoader,
    sink: S,
    palette: Vec<IconSource>,
    thumbnails: HashMap<LoadTicket, usize>,
    placements: HashMap<LoadTicket, PlacementRequest>,
}

impl<S> Session<S>
where
    S: SnapshotSink,
{
    /// Creates an empty session.
    pub(crate) fn new(
        lattice: Lattice,
        double_click_window: Duration,
        loader: VisualLoader,
        sink: S,
    ) -> Self {
        Self {
            world: World::with_lattice(lattice),
            interaction: Interaction::new(lattice).with_double_click_window(double_click_window),
            loader,
            sink,
            palette: Vec::new(),
            thumbnails: HashMap::new(),
            placements: HashMap::new(),
        }
    }

    /// Offers `sources` in the palette strip and starts loading their thumbnails.
    pub(crate) fn open_palette(&mut self, sources: Vec<IconSource>, scene: &mut Scene) {
        scene.palette = sources.iter().cloned().map(PaletteEntry::new).collect();
        for (index, source) in sources.iter().enumerate() {
            let ticket = self.loader.request(source.reference());
            let _ = self.thumbnails.insert(ticket, index);
        }
        info!(icons = sources.len(), "palette opened");
        self.palette = sources;
    }

    /// Processes one frame of input and refreshes `scene`.
    pub(crate) fn update(&mut self, input: FrameInput, scene: &mut Scene) {
        if input.surface != query::surface(&self.world) {
            self.execute(vec![Command::ResizeSurface {
                width: input.surface.width(),
                height: input.surface.height(),
            }]);
        }

        self.resolve_loads(scene);

        let mut commands = Vec::new();
        if let Some(action) = input.menu_action {
            self.interaction.menu_action(action, &mut commands);
            self.execute(mem::take(&mut commands));
        }
        if input.dismiss_menu {
            self.interaction.dismiss_menu();
        }

        for event in input.events {
            let entities = query::entity_view(&self.world);
            self.interaction.handle(event, input.surface, &entities, &mut commands);
            self.execute(mem::take(&mut commands));
        }
        self.interaction.advance(input.now, &query::entity_view(&self.world));

        if let Some(drop) = input.palette_drop {
            self.request_placement(input.surface, drop);
        }

        self.present(scene);
    }

    fn resolve_loads(&mut self, scene: &mut Scene) {
        for outcome in self.loader.poll() {
            match outcome {
                LoadOutcome::Ready { ticket, handle } => {
                    if let Some(index) = self.thumbnails.remove(&ticket) {
                        if let Some(entry) = scene.palette.get_mut(index) {
                            entry.visual = Some(handle);
                        }
                    } else if let Some(request) = self.placements.remove(&ticket) {
                        self.execute(vec![Command::PlaceEntity {
                            identity: request.identity,
                            visual: handle,
                            position: request.position,
                        }]);
                    }
                }
                LoadOutcome::Failed { ticket, error } => {
                    if let Some(index) = self.thumbnails.remove(&ticket) {
                        warn!(index, %error, "palette thumbnail unavailable");
                    } else if let Some(request) = self.placements.remove(&ticket) {
                        warn!(
                            identity = %request.identity,
                            %error,
                            "placement dropped because its icon failed to load"
                        );
                    }
                }
            }
        }
    }

    fn request_placement(&mut self, surface: Surface, drop: PaletteDrop) {
        let Some(source) = self.palette.get(drop.index) else {
            warn!(index = drop.index, "palette drop names an unknown icon");
            return;
        };

        match self.interaction.palette_drop(surface, source, drop.point) {
            Some(request) => {
                let ticket = self.loader.request(&request.reference);
                debug!(identity = %request.identity, ticket = ticket.get(), "placement requested");
                let _ = self.placements.insert(ticket, request);
            }
            None => debug!(identity = source.identity(), "palette drop outside the surface"),
        }
    }

    fn execute(&mut self, commands: Vec<Command>) {
        if commands.is_empty() {
            return;
        }

        let mut events: Vec<Event> = Vec::new();
        for command in commands {
            world::apply(&mut self.world, command, &mut events);
        }

        let _ = mirror(
            &self.sink,
            &events,
            &query::entity_view(&self.world),
            &query::lattice(&self.world),
        );
    }

    fn present(&mut self, scene: &mut Scene) {
        let lattice = query::lattice(&self.world);
        let entities = query::entity_view(&self.world);
        let loader = &self.loader;

        scene.frame = render(query::surface(&self.world), &lattice, &entities, |handle| {
            loader.is_ready(handle)
        });
        scene.menu = self
            .interaction
            .open_menu()
            .map(|(entity, anchor)| MenuPresentation {
                entity,
                anchor: to_vec2(anchor),
            });
        scene.highlight = self
            .interaction
            .dragged_entity()
            .and_then(|entity| entities.get(entity))
            .map(|snapshot| HighlightPresentation {
                origin: to_vec2(snapshot.position),
                size: lattice.footprint() as f32,
            });
        scene.uploads.extend(self.loader.drain_uploads());
    }
}

fn to_vec2(point: PixelPoint) -> Vec2 {
    Vec2::new(point.x() as f32, point.y() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridboard_core::{InputEvent, MenuAction, PointerButton};
    use gridboard_rendering::visuals::{DecodedVisual, LoadError};
    use gridboard_system_persistence::{HttpSink, Snapshot};
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, rc::Rc, sync::Arc, thread, time::Instant};

    /// Records every snapshot, optionally handing it on to a real sink.
    #[derive(Clone, Default)]
    struct RecordingSink {
        pushed: Rc<RefCell<Vec<Snapshot>>>,
        forward: Option<Rc<dyn SnapshotSink>>,
    }

    impl SnapshotSink for RecordingSink {
        fn push(&self, snapshot: Snapshot) {
            self.pushed.borrow_mut().push(snapshot.clone());
            if let Some(forward) = &self.forward {
                forward.push(snapshot);
            }
        }
    }

    fn test_loader() -> VisualLoader {
        VisualLoader::new(Arc::new(|reference: &str| {
            if reference.contains("broken") {
                return Err(LoadError::Decode {
                    reference: reference.to_owned(),
                    message: "corrupt".to_owned(),
                });
            }
            Ok(DecodedVisual {
                width: 1,
                height: 1,
                rgba: Arc::from(vec![0, 0, 0, 255]),
            })
        }))
    }

    struct Harness {
        session: Session<RecordingSink>,
        scene: Scene,
        pushes: RecordingSink,
        surface: Surface,
        now: Duration,
    }

    impl Harness {
        fn new(icons: &[&str]) -> Self {
            Self::with_sink(icons, RecordingSink::default())
        }

        fn with_sink(icons: &[&str], pushes: RecordingSink) -> Self {
            let mut session = Session::new(
                Lattice::default(),
                Duration::from_millis(250),
                test_loader(),
                pushes.clone(),
            );
            let mut scene = Scene::default();
            session.open_palette(
                icons.iter().map(|icon| IconSource::new(*icon)).collect(),
                &mut scene,
            );
            let mut harness = Self {
                session,
                scene,
                pushes,
                surface: Surface::new(800, 600),
                now: Duration::ZERO,
            };
            harness.settle();
            harness
        }

        fn frame(&mut self, input: FrameInput) {
            self.session.update(input, &mut self.scene);
        }

        fn input(&self) -> FrameInput {
            FrameInput {
                now: self.now,
                surface: self.surface,
                ..FrameInput::default()
            }
        }

        fn events(&mut self, events: Vec<InputEvent>) {
            let input = FrameInput {
                events,
                ..self.input()
            };
            self.frame(input);
        }

        fn wait(&mut self, duration: Duration) {
            self.now += duration;
            let input = self.input();
            self.frame(input);
        }

        fn settle(&mut self) {
            let deadline = Instant::now() + Duration::from_secs(5);
            loop {
                let input = self.input();
                self.frame(input);
                if self.session.loader.pending() == 0 || Instant::now() > deadline {
                    break;
                }
                thread::sleep(Duration::from_millis(2));
            }
        }

        fn drop_icon(&mut self, index: usize, x: i32, y: i32) {
            let input = FrameInput {
                palette_drop: Some(PaletteDrop {
                    index,
                    point: PixelPoint::new(x, y),
                }),
                ..self.input()
            };
            self.frame(input);
            self.settle();
        }

        fn push_count(&self) -> usize {
            self.pushes.pushed.borrow().len()
        }

        fn last_push(&self) -> Vec<(String, i32, i32, i32)> {
            self.pushes
                .pushed
                .borrow()
                .last()
                .map(|snapshot| {
                    snapshot
                        .entries()
                        .iter()
                        .map(|entry| {
                            (
                                entry.identity.clone(),
                                entry.grid_x,
                                entry.grid_y,
                                entry.rotation,
                            )
                        })
                        .collect()
                })
                .unwrap_or_default()
        }

        fn at(&self, offset_ms: u64) -> Duration {
            self.now + Duration::from_millis(offset_ms)
        }
    }

    #[test]
    fn palette_thumbnails_resolve() {
        let harness = Harness::new(&["icons/pump.png", "icons/broken.png"]);

        assert!(harness.scene.palette[0].visual.is_some());
        assert!(harness.scene.palette[1].visual.is_none(), "failed thumbnail stays empty");
        assert_eq!(harness.push_count(), 0);
    }

    #[test]
    fn palette_drop_places_a_snapped_entity_and_pushes() {
        let mut harness = Harness::new(&["icons/pump.png"]);

        harness.drop_icon(0, 120, 70);

        assert_eq!(query::entity_count(&harness.session.world), 1);
        assert_eq!(
            query::entity_view(&harness.session.world)
                .iter()
                .map(|snapshot| snapshot.position)
                .collect::<Vec<_>>(),
            vec![PixelPoint::new(105, 53)]
        );
        assert_eq!(harness.last_push(), vec![("pump".to_owned(), 2, 1, 0)]);
        assert_eq!(harness.scene.frame.sprites.len(), 1);
    }

    #[test]
    fn palette_drop_outside_the_surface_is_ignored() {
        let mut harness = Harness::new(&["icons/pump.png"]);

        harness.drop_icon(0, 120, -10);

        assert_eq!(query::entity_count(&harness.session.world), 0);
        assert_eq!(harness.push_count(), 0);
    }

    #[test]
    fn failed_icon_drops_the_placement() {
        let mut harness = Harness::new(&["icons/broken.png"]);

        harness.drop_icon(0, 120, 70);

        assert_eq!(query::entity_count(&harness.session.world), 0);
        assert_eq!(harness.push_count(), 0);
    }

    #[test]
    fn double_click_rotates_and_pushes() {
        let mut harness = Harness::new(&["icons/pump.png"]);
        harness.drop_icon(0, 10, 10);
        let point = PixelPoint::new(20, 20);

        harness.events(vec![
            InputEvent::press(PointerButton::Primary, point, harness.at(0)),
            InputEvent::release(PointerButton::Primary, point, harness.at(40)),
            InputEvent::press(PointerButton::Primary, point, harness.at(120)),
            InputEvent::release(PointerButton::Primary, point, harness.at(160)),
        ]);
        harness.wait(Duration::from_millis(400));

        assert_eq!(harness.push_count(), 2, "placement and rotation");
        assert_eq!(harness.last_push(), vec![("pump".to_owned(), 0, 0, 90)]);
    }

    #[test]
    fn drag_pushes_once_on_commit() {
        let mut harness = Harness::new(&["icons/pump.png"]);
        harness.drop_icon(0, 10, 10);
        let pushes_before = harness.push_count();

        harness.events(vec![InputEvent::press(
            PointerButton::Primary,
            PixelPoint::new(20, 20),
            harness.at(0),
        )]);
        harness.wait(Duration::from_millis(300));
        assert!(harness.scene.highlight.is_some(), "drag is highlighted");

        harness.events(vec![
            InputEvent::moved(PixelPoint::new(80, 30), harness.at(10)),
            InputEvent::moved(PixelPoint::new(140, 30), harness.at(20)),
        ]);
        assert_eq!(harness.push_count(), pushes_before, "moves are not pushed");

        harness.events(vec![InputEvent::release(
            PointerButton::Primary,
            PixelPoint::new(140, 30),
            harness.at(30),
        )]);

        assert_eq!(harness.push_count(), pushes_before + 1);
        assert_eq!(harness.last_push(), vec![("pump".to_owned(), 2, 0, 0)]);
        assert!(harness.scene.highlight.is_none());
    }

    #[test]
    fn releasing_outside_the_surface_deletes() {
        let mut harness = Harness::new(&["icons/pump.png"]);
        harness.drop_icon(0, 10, 10);

        harness.events(vec![InputEvent::press(
            PointerButton::Primary,
            PixelPoint::new(20, 20),
            harness.at(0),
        )]);
        harness.wait(Duration::from_millis(300));
        harness.events(vec![InputEvent::release(
            PointerButton::Primary,
            PixelPoint::new(-40, 20),
            harness.at(10),
        )]);

        assert_eq!(query::entity_count(&harness.session.world), 0);
        assert_eq!(harness.last_push(), Vec::new());
        assert!(harness.scene.frame.sprites.is_empty());
    }

    #[test]
    fn menu_actions_apply_to_the_selected_entity() {
        let mut harness = Harness::new(&["icons/pump.png"]);
        harness.drop_icon(0, 10, 10);

        harness.events(vec![InputEvent::press(
            PointerButton::Secondary,
            PixelPoint::new(20, 20),
            harness.at(0),
        )]);
        assert!(harness.scene.menu.is_some(), "menu opens over the entity");

        let input = FrameInput {
            menu_action: Some(MenuAction::RotateLeft),
            ..harness.input()
        };
        harness.frame(input);

        assert!(harness.scene.menu.is_none());
        assert_eq!(harness.last_push(), vec![("pump".to_owned(), 0, 0, -90)]);
    }

    #[test]
    fn dismissing_the_menu_changes_nothing() {
        let mut harness = Harness::new(&["icons/pump.png"]);
        harness.drop_icon(0, 10, 10);
        let pushes_before = harness.push_count();

        harness.events(vec![InputEvent::press(
            PointerButton::Secondary,
            PixelPoint::new(20, 20),
            harness.at(0),
        )]);
        let input = FrameInput {
            dismiss_menu: true,
            ..harness.input()
        };
        harness.frame(input);

        assert!(harness.scene.menu.is_none());
        assert_eq!(harness.push_count(), pushes_before);
    }

    #[test]
    fn resizing_redraws_without_pushing() {
        let mut harness = Harness::new(&["icons/pump.png"]);
        harness.drop_icon(0, 10, 10);
        let pushes_before = harness.push_count();

        harness.surface = Surface::new(400, 300);
        harness.wait(Duration::from_millis(16));

        assert_eq!(harness.push_count(), pushes_before);
        assert_eq!(harness.scene.frame.width, 400.0);
        assert_eq!(harness.scene.frame.height, 300.0);
        assert_eq!(query::entity_count(&harness.session.world), 1);
    }

    #[test]
    fn unreachable_endpoint_leaves_the_store_intact() {
        let endpoint = HttpSink::with_timeout(
            "http://127.0.0.1:1/api/grid/update",
            Duration::from_millis(200),
        );
        let sink = RecordingSink {
            forward: Some(Rc::new(endpoint)),
            ..RecordingSink::default()
        };
        let mut harness = Harness::with_sink(&["icons/pump.png"], sink);

        let started = Instant::now();
        harness.drop_icon(0, 10, 10);
        harness.events(vec![
            InputEvent::press(PointerButton::Primary, PixelPoint::new(20, 20), harness.at(0)),
            InputEvent::press(PointerButton::Primary, PixelPoint::new(20, 20), harness.at(100)),
        ]);
        thread::sleep(Duration::from_millis(300));
        harness.wait(Duration::from_millis(16));

        assert!(
            started.elapsed() < Duration::from_secs(2),
            "failed pushes must not hold up the session"
        );
        assert_eq!(harness.push_count(), 2, "placement and rotation were pushed");
        assert_eq!(
            query::entity_view(&harness.session.world)
                .iter()
                .map(|snapshot| (snapshot.position, snapshot.rotation.degrees()))
                .collect::<Vec<_>>(),
            vec![(PixelPoint::new(1, 1), 90)]
        );
    }
}
