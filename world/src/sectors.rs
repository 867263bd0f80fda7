//! Sector geometry and per-plane histories.

use glam::Vec2;
use unlagged_core::{HistoryDepth, PlaneHistory, SectorBounds, SectorId, SectorPlanes};

/// Spatial cell owning a movable floor and ceiling.
#[derive(Clone, Debug)]
pub(crate) struct Sector {
    pub(crate) bounds: SectorBounds,
    pub(crate) planes: SectorPlanes,
    pub(crate) floor_history: PlaneHistory,
    pub(crate) ceiling_history: PlaneHistory,
}

impl Sector {
    fn new(bounds: SectorBounds, planes: SectorPlanes, depth: HistoryDepth) -> Self {
        Self {
            bounds,
            planes,
            floor_history: PlaneHistory::new(depth, planes.floor),
            ceiling_history: PlaneHistory::new(depth, planes.ceiling),
        }
    }
}

/// Dense table of sectors indexed by [`SectorId`].
#[derive(Clone, Debug)]
pub(crate) struct SectorTable {
    depth: HistoryDepth,
    sectors: Vec<Sector>,
}

impl SectorTable {
    pub(crate) fn new(depth: HistoryDepth) -> Self {
        Self {
            depth,
            sectors: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, bounds: SectorBounds, planes: SectorPlanes) -> SectorId {
        let id = SectorId::new(u32::try_from(self.sectors.len()).unwrap_or(u32::MAX));
        self.sectors.push(Sector::new(bounds, planes, self.depth));
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.sectors.len()
    }

    pub(crate) fn get(&self, id: SectorId) -> Option<&Sector> {
        self.sectors.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: SectorId) -> Option<&mut Sector> {
        self.sectors.get_mut(id.index())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (SectorId, &Sector)> {
        self.sectors
            .iter()
            .enumerate()
            .map(|(index, sector)| (SectorId::new(index as u32), sector))
    }

    /// First sector, in identifier order, whose footprint contains the point.
    pub(crate) fn locate(&self, point: Vec2) -> Option<SectorId> {
        self.iter()
            .find(|(_, sector)| sector.bounds.contains(point))
            .map(|(id, _)| id)
    }

    /// Floor and ceiling bounds seen by an actor standing at the point.
    ///
    /// Points outside every sector are unbounded.
    pub(crate) fn bounds_at(&self, point: Vec2) -> (f32, f32) {
        self.locate(point)
            .and_then(|id| self.get(id))
            .map_or((f32::NEG_INFINITY, f32::INFINITY), |sector| {
                (sector.planes.floor, sector.planes.ceiling)
            })
    }
}
