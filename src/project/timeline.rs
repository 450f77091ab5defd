//! Timeline composition source
//!
//! The timeline renders the whole project through one composition element
//! that exposes `asrc` / `vsrc` pads once it has content. Its start and
//! duration change as clips are edited; every change is broadcast.

use crate::graph::{ElementId, GraphResult, MediaGraph};
use parking_lot::RwLock;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

/// start-duration-changed notification payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationChanged {
    pub start: u64,
    pub duration: u64,
}

pub struct Timeline {
    composition: ElementId,
    extent: RwLock<DurationChanged>,
    changed_tx: broadcast::Sender<DurationChanged>,
}

impl Timeline {
    /// Create the composition element in `graph`
    pub fn new(graph: &dyn MediaGraph, name: &str) -> GraphResult<Self> {
        let composition = graph.make_element("nlecomposition", name)?;
        let (changed_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Ok(Self {
            composition,
            extent: RwLock::new(DurationChanged {
                start: 0,
                duration: 0,
            }),
            changed_tx,
        })
    }

    /// Source element producing the `asrc` / `vsrc` pads
    pub fn composition(&self) -> ElementId {
        self.composition
    }

    pub fn start(&self) -> u64 {
        self.extent.read().start
    }

    pub fn duration(&self) -> u64 {
        self.extent.read().duration
    }

    /// Record a new extent and broadcast it
    pub fn set_start_duration(&self, start: u64, duration: u64) {
        let extent = DurationChanged { start, duration };
        *self.extent.write() = extent;
        tracing::debug!("Timeline start/duration changed: {} {}", start, duration);
        let _ = self.changed_tx.send(extent);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DurationChanged> {
        self.changed_tx.subscribe()
    }
}
