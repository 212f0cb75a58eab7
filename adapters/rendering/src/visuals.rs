//! Asynchronous icon decoding.
//!
//! Each request decodes on a short-lived worker thread and reports back over a
//! channel that the owner drains once per frame with [`VisualLoader::poll`].
//! Successfully decoded references are cached, so repeated drops of the same
//! icon resolve on the next poll without touching the disk again.

use std::{
    collections::{HashMap, HashSet},
    fmt, fs, io,
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc,
    },
    thread,
};

use gridboard_core::VisualHandle;
use thiserror::Error;
use tracing::{debug, warn};

use crate::VisualUpload;

/// Decoded RGBA8 image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedVisual {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed RGBA8 pixels.
    pub rgba: Arc<[u8]>,
}

/// Errors raised while loading an icon.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The icon could not be read.
    #[error("failed to read icon `{reference}`")]
    Read {
        /// Reference that failed to load.
        reference: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The bytes were not a supported image.
    #[error("failed to decode icon `{reference}`: {message}")]
    Decode {
        /// Reference that failed to decode.
        reference: String,
        /// Decoder diagnostic.
        message: String,
    },
    /// No worker thread could be started.
    #[error("failed to spawn icon decoder thread")]
    Spawn(#[source] std::io::Error),
}

impl LoadError {
    /// Copy handed to every further request waiting on the same reference.
    fn duplicate(&self) -> Self {
        match self {
            Self::Read { reference, source } => Self::Read {
                reference: reference.clone(),
                source: io::Error::new(source.kind(), source.to_string()),
            },
            Self::Decode { reference, message } => Self::Decode {
                reference: reference.clone(),
                message: message.clone(),
            },
            Self::Spawn(source) => Self::Spawn(io::Error::new(source.kind(), source.to_string())),
        }
    }
}

/// Function turning a reference into pixels.
pub type Decoder = Arc<dyn Fn(&str) -> Result<DecodedVisual, LoadError> + Send + Sync>;

/// Receipt returned by [`VisualLoader::request`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(u64);

impl LoadTicket {
    /// Numeric representation of the ticket.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Resolution of a load request.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The visual is decoded and registered under `handle`.
    Ready {
        /// Ticket handed out by the request.
        ticket: LoadTicket,
        /// Handle of the decoded visual.
        handle: VisualHandle,
    },
    /// The visual could not be produced.
    Failed {
        /// Ticket handed out by the request.
        ticket: LoadTicket,
        /// Cause of the failure.
        error: LoadError,
    },
}

/// Loads icons off the frame loop and hands out stable visual handles.
pub struct VisualLoader {
    decoder: Decoder,
    sender: Sender<(String, Result<DecodedVisual, LoadError>)>,
    receiver: Receiver<(String, Result<DecodedVisual, LoadError>)>,
    cache: HashMap<String, VisualHandle>,
    decoded: HashSet<VisualHandle>,
    in_flight: HashMap<String, Vec<LoadTicket>>,
    resolved: Vec<LoadOutcome>,
    uploads: Vec<VisualUpload>,
    next_ticket: u64,
    next_handle: u32,
}

impl fmt::Debug for VisualLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualLoader")
            .field("cached", &self.cache.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl Default for VisualLoader {
    fn default() -> Self {
        Self::new(Arc::new(decode_file))
    }
}

impl VisualLoader {
    /// Creates a loader that decodes references with the provided function.
    #[must_use]
    pub fn new(decoder: Decoder) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            decoder,
            sender,
            receiver,
            cache: HashMap::new(),
            decoded: HashSet::new(),
            in_flight: HashMap::new(),
            resolved: Vec::new(),
            uploads: Vec::new(),
            next_ticket: 0,
            next_handle: 0,
        }
    }

    /// Starts loading `reference`; the outcome is reported by a later [`poll`](Self::poll).
    pub fn request(&mut self, reference: &str) -> LoadTicket {
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket = self.next_ticket.wrapping_add(1);

        if let Some(&handle) = self.cache.get(reference) {
            self.resolved.push(LoadOutcome::Ready { ticket, handle });
            return ticket;
        }

        if let Some(waiting) = self.in_flight.get_mut(reference) {
            waiting.push(ticket);
            return ticket;
        }

        let decoder = Arc::clone(&self.decoder);
        let sender = self.sender.clone();
        let owned = reference.to_owned();
        let spawned = thread::Builder::new()
            .name("icon-decode".to_owned())
            .spawn(move || {
                let result = decoder(&owned);
                let _ = sender.send((owned, result));
            });

        match spawned {
            Ok(_) => {
                debug!(reference, "icon decode started");
                let _ = self.in_flight.insert(reference.to_owned(), vec![ticket]);
            }
            Err(error) => self.resolved.push(LoadOutcome::Failed {
                ticket,
                error: LoadError::Spawn(error),
            }),
        }

        ticket
    }

    /// Collects every load that finished since the previous poll.
    pub fn poll(&mut self) -> Vec<LoadOutcome> {
        while let Ok((reference, result)) = self.receiver.try_recv() {
            let tickets = self.in_flight.remove(&reference).unwrap_or_default();
            match result {
                Ok(decoded) => {
                    let handle = VisualHandle::new(self.next_handle);
                    self.next_handle = self.next_handle.wrapping_add(1);
                    let _ = self.cache.insert(reference, handle);
                    let _ = self.decoded.insert(handle);
                    self.uploads.push(VisualUpload {
                        handle,
                        width: decoded.width,
                        height: decoded.height,
                        rgba: decoded.rgba,
                    });
                    self.resolved.extend(
                        tickets
                            .into_iter()
                            .map(|ticket| LoadOutcome::Ready { ticket, handle }),
                    );
                }
                Err(error) => {
                    warn!(%reference, error = %error, "icon failed to load");
                    let mut tickets = tickets.into_iter();
                    if let Some(first) = tickets.next() {
                        let waiting: Vec<LoadOutcome> = tickets
                            .map(|ticket| LoadOutcome::Failed {
                                ticket,
                                error: error.duplicate(),
                            })
                            .collect();
                        self.resolved.push(LoadOutcome::Failed {
                            ticket: first,
                            error,
                        });
                        self.resolved.extend(waiting);
                    }
                }
            }
        }

        std::mem::take(&mut self.resolved)
    }

    /// Takes the pixel data decoded since the previous call.
    pub fn drain_uploads(&mut self) -> Vec<VisualUpload> {
        std::mem::take(&mut self.uploads)
    }

    /// Reports whether `handle` names pixels this loader has decoded.
    ///
    /// Decoded pixels still have to be uploaded by the backend; a backend
    /// skips any handle whose texture it does not hold yet.
    #[must_use]
    pub fn is_ready(&self, handle: VisualHandle) -> bool {
        self.decoded.contains(&handle)
    }

    /// Number of requests still being decoded.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.in_flight.values().map(Vec::len).sum()
    }
}

/// Reads and decodes an icon file.
pub fn decode_file(reference: &str) -> Result<DecodedVisual, LoadError> {
    let bytes = fs::read(reference).map_err(|source| LoadError::Read {
        reference: reference.to_owned(),
        source,
    })?;
    decode_bytes(reference, &bytes)
}

/// Decodes encoded image bytes into RGBA8 pixels.
pub fn decode_bytes(reference: &str, bytes: &[u8]) -> Result<DecodedVisual, LoadError> {
    let image = image::load_from_memory(bytes).map_err(|err| LoadError::Decode {
        reference: reference.to_owned(),
        message: err.to_string(),
    })?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedVisual {
        width,
        height,
        rgba: rgba.into_raw().into(),
    })
}
