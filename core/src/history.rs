//! Fixed-depth ring buffers holding one authoritative sample per tick.

use std::num::NonZeroUsize;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::Tick;

/// Number of past ticks retained by every history ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct HistoryDepth(NonZeroUsize);

impl HistoryDepth {
    /// Depth used when no configuration overrides it.
    pub const DEFAULT: Self = match NonZeroUsize::new(64) {
        Some(depth) => Self(depth),
        None => unreachable!(),
    };

    /// Creates a depth from a raw tick count, rejecting zero.
    #[must_use]
    pub const fn new(ticks: usize) -> Option<Self> {
        match NonZeroUsize::new(ticks) {
            Some(depth) => Some(Self(depth)),
            None => None,
        }
    }

    /// Number of ticks retained.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0.get()
    }

    /// Ring slot that stores the sample for `tick`.
    #[must_use]
    pub fn slot(&self, tick: Tick) -> usize {
        // depth fits in u64 on every supported target
        (tick.get() % self.0.get() as u64) as usize
    }
}

impl Default for HistoryDepth {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<usize> for HistoryDepth {
    type Error = crate::ConfigError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(crate::ConfigError::ZeroHistoryDepth)
    }
}

impl From<HistoryDepth> for usize {
    fn from(depth: HistoryDepth) -> Self {
        depth.get()
    }
}

/// Ring of per-tick samples indexed by `tick mod depth`.
///
/// The backing storage is allocated once on construction; recording and
/// refilling never allocate.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRing<T> {
    depth: HistoryDepth,
    samples: Box<[T]>,
}

/// History of a single movable plane offset.
pub type PlaneHistory = HistoryRing<f32>;

/// History of a single player's position.
pub type PlayerHistory = HistoryRing<Vec3>;

impl<T: Copy> HistoryRing<T> {
    /// Creates a ring whose every slot holds `initial`.
    #[must_use]
    pub fn new(depth: HistoryDepth, initial: T) -> Self {
        Self {
            depth,
            samples: vec![initial; depth.get()].into_boxed_slice(),
        }
    }

    /// Depth of the ring.
    #[must_use]
    pub const fn depth(&self) -> HistoryDepth {
        self.depth
    }

    /// Overwrites the slot belonging to `tick`.
    pub fn record(&mut self, tick: Tick, value: T) {
        let slot = self.depth.slot(tick);
        self.samples[slot] = value;
    }

    /// Reads the sample stored in the slot belonging to `tick`.
    ///
    /// Only meaningful for ticks inside the retained window; older ticks alias
    /// newer samples.
    #[must_use]
    pub fn sample(&self, tick: Tick) -> T {
        self.samples[self.depth.slot(tick)]
    }

    /// Overwrites every slot with `value`.
    pub fn fill(&mut self, value: T) {
        self.samples.fill(value);
    }

    /// Raw slots in index order.
    #[must_use]
    pub fn slots(&self) -> &[T] {
        &self.samples
    }
}
