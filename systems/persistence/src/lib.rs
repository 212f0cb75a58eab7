#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Persistence bridge mirroring the placement store to an external endpoint.
//!
//! After a batch of commands has been applied, the caller hands the resulting
//! events to [`mirror`]. When the batch contains a persisted mutation, the
//! store is captured into a [`Snapshot`] and pushed through a
//! [`SnapshotSink`]. Pushes are fire-and-forget: sinks log their outcome and
//! never report back to the interaction layer.

use std::{
    sync::mpsc::{self, Receiver, Sender},
    thread,
    time::Duration,
};

use gridboard_core::{EntityView, Event, Lattice};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Timeout applied to each endpoint request.
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Persisted representation of a single placed entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Name derived from the source asset.
    #[serde(alias = "name")]
    pub identity: String,
    /// Lattice column.
    #[serde(rename = "gridX")]
    pub grid_x: i32,
    /// Lattice row.
    #[serde(rename = "gridY")]
    pub grid_y: i32,
    /// Cumulative rotation in degrees, exactly as stored.
    #[serde(alias = "angle", default)]
    pub rotation: i32,
}

/// Ordered capture of every placed entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Captures the entities in store order, converting positions to grid indices.
    #[must_use]
    pub fn capture(entities: &EntityView, lattice: &Lattice) -> Self {
        let entries = entities
            .iter()
            .map(|snapshot| {
                let index = lattice.grid_index(snapshot.position);
                SnapshotEntry {
                    identity: snapshot.identity.clone(),
                    grid_x: index.column(),
                    grid_y: index.row(),
                    rotation: snapshot.rotation.degrees(),
                }
            })
            .collect();
        Self { entries }
    }

    /// Captured entries in store order.
    #[must_use]
    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    /// Number of captured entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the snapshot holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encodes the snapshot into the JSON array sent to the endpoint.
    pub fn to_json(&self) -> Result<String, PushError> {
        serde_json::to_string(self).map_err(PushError::Encode)
    }
}

/// Reports whether a batch of events should be mirrored to the endpoint.
///
/// Intermediate drag moves are not pushed; the commit that ends the drag is.
/// Rejections and surface resizes leave the entities untouched.
#[must_use]
pub fn should_push(events: &[Event]) -> bool {
    events
        .iter()
        .any(|event| event.is_mutation() && !matches!(event, Event::EntityMoved { .. }))
}

/// Captures and pushes a snapshot when `events` contain a persisted mutation.
///
/// Returns whether a push was issued.
pub fn mirror<S>(sink: &S, events: &[Event], entities: &EntityView, lattice: &Lattice) -> bool
where
    S: SnapshotSink + ?Sized,
{
    if !should_push(events) {
        return false;
    }

    let snapshot = Snapshot::capture(entities, lattice);
    debug!(entries = snapshot.len(), "pushing snapshot");
    sink.push(snapshot);
    true
}

/// Destination for store snapshots.
pub trait SnapshotSink {
    /// Hands the snapshot over without waiting for the outcome.
    fn push(&self, snapshot: Snapshot);
}

impl<S> SnapshotSink for Box<S>
where
    S: SnapshotSink + ?Sized,
{
    fn push(&self, snapshot: Snapshot) {
        (**self).push(snapshot);
    }
}

/// Response returned by the endpoint after accepting a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Acknowledgement {
    /// Human readable status reported by the endpoint.
    #[serde(default)]
    pub message: String,
    /// Entries echoed back by the endpoint.
    #[serde(default)]
    pub data: Vec<SnapshotEntry>,
}

impl Acknowledgement {
    /// Parses an endpoint response body.
    pub fn parse(body: &str) -> Result<Self, PushError> {
        serde_json::from_str(body).map_err(PushError::Acknowledgement)
    }
}

/// Errors raised while pushing a snapshot.
#[derive(Debug, Error)]
pub enum PushError {
    /// The snapshot could not be encoded.
    #[error("failed to encode snapshot")]
    Encode(#[source] serde_json::Error),
    /// The endpoint answered with a non-success status.
    #[error("endpoint answered with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },
    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The response body could not be read.
    #[error("failed to read acknowledgement")]
    Read(#[source] std::io::Error),
    /// The response body was not a valid acknowledgement.
    #[error("malformed acknowledgement")]
    Acknowledgement(#[source] serde_json::Error),
}

/// Sink posting snapshots to an HTTP endpoint from a dedicated worker thread.
///
/// Snapshots are posted one at a time, in push order. Snapshots queued behind
/// a slow request collapse to the newest one, since every snapshot describes
/// the whole store. Clones share the same worker.
#[derive(Clone, Debug)]
pub struct HttpSink {
    client: PushClient,
    queue: Sender<Snapshot>,
}

impl HttpSink {
    /// Creates a sink posting to `endpoint` with the default timeout.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, DEFAULT_PUSH_TIMEOUT)
    }

    /// Creates a sink posting to `endpoint` with a custom request timeout.
    ///
    /// Starts the `snapshot-push` worker, which exits once every clone of the
    /// sink has been dropped.
    #[must_use]
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = PushClient {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            endpoint: endpoint.into(),
        };
        let (queue, pending) = mpsc::channel();
        let worker = client.clone();
        let spawned = thread::Builder::new()
            .name("snapshot-push".to_owned())
            .spawn(move || run_push_worker(&worker, &pending));
        if let Err(error) = spawned {
            warn!(%error, "failed to spawn snapshot push worker");
        }

        Self { client, queue }
    }

    /// URL snapshots are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.client.endpoint
    }

    /// Posts the snapshot on the calling thread and waits for the acknowledgement.
    pub fn push_blocking(&self, snapshot: &Snapshot) -> Result<Acknowledgement, PushError> {
        self.client.post(snapshot)
    }
}

impl SnapshotSink for HttpSink {
    fn push(&self, snapshot: Snapshot) {
        if self.queue.send(snapshot).is_err() {
            warn!(
                endpoint = %self.client.endpoint,
                "snapshot push worker is not running, snapshot dropped"
            );
        }
    }
}

#[derive(Clone, Debug)]
struct PushClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl PushClient {
    fn post(&self, snapshot: &Snapshot) -> Result<Acknowledgement, PushError> {
        let body = snapshot.to_json()?;
        let response = match self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => return Err(PushError::Status { status }),
            Err(ureq::Error::Transport(transport)) => {
                return Err(PushError::Transport(transport.to_string()))
            }
        };

        let text = response.into_string().map_err(PushError::Read)?;
        Acknowledgement::parse(&text)
    }
}

fn run_push_worker(client: &PushClient, pending: &Receiver<Snapshot>) {
    while let Ok(mut snapshot) = pending.recv() {
        let mut superseded = 0_usize;
        while let Ok(newer) = pending.try_recv() {
            snapshot = newer;
            superseded += 1;
        }
        if superseded > 0 {
            debug!(superseded, "skipping snapshots replaced by a newer one");
        }

        match client.post(&snapshot) {
            Ok(acknowledgement) => info!(
                entries = snapshot.len(),
                echoed = acknowledgement.data.len(),
                message = %acknowledgement.message,
                "snapshot acknowledged"
            ),
            Err(error) => warn!(
                endpoint = %client.endpoint,
                error = %error,
                "snapshot push failed"
            ),
        }
    }
    debug!("snapshot push worker stopped");
}

/// Sink that only logs snapshots, used when no endpoint is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl SnapshotSink for LogSink {
    fn push(&self, snapshot: Snapshot) {
        match snapshot.to_json() {
            Ok(json) => info!(entries = snapshot.len(), snapshot = %json, "snapshot"),
            Err(error) => warn!(%error, "failed to encode snapshot"),
        }
    }
}
