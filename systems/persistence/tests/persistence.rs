use std::{
    cell::RefCell,
    io::{BufRead, BufReader, Read, Write},
    net::{TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use gridboard_core::{Command, EntityId, Event, PixelPoint, VisualHandle};
use gridboard_system_persistence::{
    mirror, should_push, Acknowledgement, HttpSink, PushError, Snapshot, SnapshotEntry,
    SnapshotSink,
};
use gridboard_world::{self as world, query, World};
use pretty_assertions::assert_eq;

#[derive(Default)]
struct RecordingSink {
    pushed: RefCell<Vec<Snapshot>>,
}

impl SnapshotSink for RecordingSink {
    fn push(&self, snapshot: Snapshot) {
        self.pushed.borrow_mut().push(snapshot);
    }
}

fn populated_world() -> World {
    let mut world = World::new();
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::ResizeSurface {
            width: 800,
            height: 600,
        },
        &mut events,
    );
    for (identity, position) in [
        ("pump", PixelPoint::new(1, 1)),
        ("valve", PixelPoint::new(209, 53)),
    ] {
        world::apply(
            &mut world,
            Command::PlaceEntity {
                identity: identity.to_owned(),
                visual: VisualHandle::new(0),
                position,
            },
            &mut events,
        );
    }
    world::apply(
        &mut world,
        Command::RotateEntity {
            entity: EntityId::new(1),
            quarter_turns: 3,
        },
        &mut events,
    );
    world
}

#[test]
fn snapshot_json_follows_wire_contract() {
    let world = populated_world();

    let snapshot = Snapshot::capture(&query::entity_view(&world), &query::lattice(&world));

    assert_eq!(
        snapshot.to_json().expect("snapshot should encode"),
        r#"[{"identity":"pump","gridX":0,"gridY":0,"rotation":0},{"identity":"valve","gridX":4,"gridY":1,"rotation":270}]"#,
    );
}

#[test]
fn intermediate_moves_are_not_pushed() {
    let entity = EntityId::new(0);

    assert!(!should_push(&[Event::EntityMoved {
        entity,
        position: PixelPoint::new(53, 1),
    }]));
    assert!(should_push(&[
        Event::EntityMoved {
            entity,
            position: PixelPoint::new(53, 1),
        },
        Event::EntityCommitted {
            entity,
            position: PixelPoint::new(53, 1),
        },
    ]));
}

#[test]
fn rejections_and_resizes_are_not_pushed() {
    let world = populated_world();
    let sink = RecordingSink::default();

    let pushed = mirror(
        &sink,
        &[
            Event::MutationRejected {
                entity: EntityId::new(9),
                reason: gridboard_core::MutationError::MissingEntity,
            },
            Event::SurfaceResized {
                surface: query::surface(&world),
            },
        ],
        &query::entity_view(&world),
        &query::lattice(&world),
    );

    assert!(!pushed);
    assert!(sink.pushed.borrow().is_empty());
}

#[test]
fn mirror_pushes_the_post_mutation_state() {
    let mut world = populated_world();
    let sink = RecordingSink::default();
    let mut events = Vec::new();

    world::apply(
        &mut world,
        Command::RemoveEntity {
            entity: EntityId::new(0),
        },
        &mut events,
    );
    let pushed = mirror(
        &sink,
        &events,
        &query::entity_view(&world),
        &query::lattice(&world),
    );

    assert!(pushed, "removal should trigger a push");
    let pushed = sink.pushed.borrow();
    assert_eq!(pushed.len(), 1);
    assert_eq!(
        pushed[0].entries(),
        &[SnapshotEntry {
            identity: "valve".to_owned(),
            grid_x: 4,
            grid_y: 1,
            rotation: 270,
        }],
        "the snapshot must reflect the store after the removal",
    );
}

#[test]
fn acknowledgement_accepts_legacy_keys() {
    let acknowledgement = Acknowledgement::parse(
        r#"{"message":"Grid updated successfully","data":[{"name":"pump","gridX":2,"gridY":3,"angle":-90}]}"#,
    )
    .expect("acknowledgement should parse");

    assert_eq!(acknowledgement.message, "Grid updated successfully");
    assert_eq!(
        acknowledgement.data,
        vec![SnapshotEntry {
            identity: "pump".to_owned(),
            grid_x: 2,
            grid_y: 3,
            rotation: -90,
        }]
    );
}

#[test]
fn acknowledgement_rejects_non_json_bodies() {
    let error = Acknowledgement::parse("<html>oops</html>").expect_err("html is not json");

    assert!(matches!(error, PushError::Acknowledgement(_)));
}

#[test]
fn invalid_endpoint_reports_transport_failure() {
    let sink = HttpSink::new("not a url");

    let error = sink
        .push_blocking(&Snapshot::default())
        .expect_err("invalid URL must fail");

    assert!(
        matches!(error, PushError::Transport(_)),
        "expected transport failure, got {error:?}",
    );
}

struct ReceivedRequest {
    request_line: String,
    content_type: String,
    body: String,
}

fn read_request(stream: TcpStream) -> (ReceivedRequest, TcpStream) {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    let _ = reader.read_line(&mut request_line).expect("request line");
    let mut content_length = 0;
    let mut content_type = String::new();
    loop {
        let mut header = String::new();
        let _ = reader.read_line(&mut header).expect("header line");
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            match name.to_ascii_lowercase().as_str() {
                "content-length" => {
                    content_length = value.trim().parse().expect("numeric length");
                }
                "content-type" => content_type = value.trim().to_owned(),
                _ => {}
            }
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).expect("request body");

    (
        ReceivedRequest {
            request_line,
            content_type,
            body: String::from_utf8(body).expect("utf8 body"),
        },
        reader.into_inner(),
    )
}

fn respond(mut stream: TcpStream, body: &str) {
    write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body,
    )
    .expect("write response");
}

/// Serves every request on its own connection, delaying the first answer.
fn recording_endpoint(first_delay: Duration) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let address = listener.local_addr().expect("listener address");
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&received);
    let _ = thread::spawn(move || {
        for (index, stream) in listener.incoming().enumerate() {
            let Ok(stream) = stream else {
                return;
            };
            if index == 0 {
                thread::sleep(first_delay);
            }
            let (request, stream) = read_request(stream);
            log.lock().expect("request log").push(request.body);
            respond(stream, r#"{"message":"ok","data":[]}"#);
        }
    });
    (format!("http://{address}/api/grid/update"), received)
}

fn wait_for_requests(received: &Arc<Mutex<Vec<String>>>, last: &str) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let bodies = received.lock().expect("request log").clone();
        if bodies.last().map(String::as_str) == Some(last) || Instant::now() > deadline {
            return bodies;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn snapshot_of(identities: &[&str]) -> Snapshot {
    let mut world = World::new();
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::ResizeSurface {
            width: 800,
            height: 600,
        },
        &mut events,
    );
    for identity in identities {
        world::apply(
            &mut world,
            Command::PlaceEntity {
                identity: (*identity).to_owned(),
                visual: VisualHandle::new(0),
                position: PixelPoint::new(1, 1),
            },
            &mut events,
        );
    }
    Snapshot::capture(&query::entity_view(&world), &query::lattice(&world))
}

#[test]
fn http_sink_posts_json_and_parses_acknowledgement() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let address = listener.local_addr().expect("listener address");
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept connection");
        let (request, stream) = read_request(stream);
        respond(
            stream,
            r#"{"message":"ok","data":[{"identity":"pump","gridX":0,"gridY":0,"rotation":0}]}"#,
        );
        request
    });

    let world = populated_world();
    let snapshot = Snapshot::capture(&query::entity_view(&world), &query::lattice(&world));
    let sink = HttpSink::with_timeout(
        format!("http://{address}/api/grid/update"),
        Duration::from_secs(5),
    );

    let acknowledgement = sink
        .push_blocking(&snapshot)
        .expect("local endpoint should acknowledge");
    let request = server.join().expect("server thread");

    assert!(request.request_line.starts_with("POST /api/grid/update "));
    assert_eq!(request.content_type, "application/json");
    assert_eq!(
        request.body,
        snapshot.to_json().expect("snapshot should encode")
    );
    assert_eq!(acknowledgement.message, "ok");
    assert_eq!(acknowledgement.data.len(), 1);
}

#[test]
fn pushes_reach_the_endpoint_in_mutation_order() {
    let (endpoint, received) = recording_endpoint(Duration::from_millis(300));
    let sink = HttpSink::with_timeout(endpoint, Duration::from_secs(5));
    let placed = snapshot_of(&["a"]);
    let removed = snapshot_of(&[]);

    sink.push(placed.clone());
    thread::sleep(Duration::from_millis(20));
    sink.push(removed.clone());

    let bodies = wait_for_requests(&received, "[]");
    assert_eq!(
        bodies,
        vec![
            placed.to_json().expect("snapshot should encode"),
            removed.to_json().expect("snapshot should encode"),
        ],
        "the endpoint must end up with the newest state",
    );
}

#[test]
fn snapshots_queued_behind_a_slow_push_collapse_to_the_newest() {
    let (endpoint, received) = recording_endpoint(Duration::from_millis(300));
    let sink = HttpSink::with_timeout(endpoint, Duration::from_secs(5));
    let first = snapshot_of(&["a"]);
    let second = snapshot_of(&["a", "b"]);
    let third = snapshot_of(&["a", "b", "c"]);
    let third_json = third.to_json().expect("snapshot should encode");

    sink.push(first);
    sink.push(second.clone());
    sink.push(third);

    let bodies = wait_for_requests(&received, &third_json);
    assert_eq!(bodies.last(), Some(&third_json));
    assert!(
        !bodies.contains(&second.to_json().expect("snapshot should encode")),
        "superseded snapshots are never posted, got {bodies:?}",
    );
}

#[test]
fn push_returns_before_the_endpoint_answers() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let address = listener.local_addr().expect("listener address");
    let _server = thread::spawn(move || {
        let held: Vec<TcpStream> = listener.incoming().filter_map(Result::ok).collect();
        held.len()
    });
    let sink = HttpSink::with_timeout(
        format!("http://{address}/api/grid/update"),
        Duration::from_secs(2),
    );

    let started = Instant::now();
    sink.push(snapshot_of(&["a"]));
    sink.push(snapshot_of(&["a", "b"]));

    assert!(
        started.elapsed() < Duration::from_millis(200),
        "push must not wait for the endpoint, took {:?}",
        started.elapsed(),
    );
}

#[test]
fn failed_pushes_do_not_stop_later_ones() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let address = listener.local_addr().expect("listener address");
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&received);
    let _ = thread::spawn(move || {
        for (index, stream) in listener.incoming().enumerate() {
            let Ok(stream) = stream else {
                return;
            };
            let (request, stream) = read_request(stream);
            if index == 0 {
                drop(stream);
                continue;
            }
            log.lock().expect("request log").push(request.body);
            respond(stream, r#"{"message":"ok","data":[]}"#);
        }
    });
    let sink = HttpSink::with_timeout(
        format!("http://{address}/api/grid/update"),
        Duration::from_secs(2),
    );

    sink.push(snapshot_of(&["a"]));
    thread::sleep(Duration::from_millis(100));
    sink.push(snapshot_of(&[]));

    assert_eq!(wait_for_requests(&received, "[]"), vec!["[]".to_owned()]);
}

#[test]
fn unreachable_endpoint_is_swallowed() {
    let sink = HttpSink::with_timeout(
        "http://127.0.0.1:1/api/grid/update",
        Duration::from_millis(200),
    );

    sink.push(snapshot_of(&["a"]));
    thread::sleep(Duration::from_millis(50));
    sink.push(snapshot_of(&[]));

    assert_eq!(sink.endpoint(), "http://127.0.0.1:1/api/grid/update");
}
