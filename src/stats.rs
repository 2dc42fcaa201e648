use serde::Serialize;




/**
 * Diagnostic counters from one dependency pass over a patch grid.
 */
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    /// Ordered (patch, candidate donor) pairs found in the hash raster
    pub potential_pairs: usize,

    /// Ordered pairs which serve at least one receive cell
    pub donor_edges: usize,

    /// Receive cells over all patches
    pub receive_cells: usize,

    /// Receive cells which found no donor at all
    pub orphan_receive_cells: usize,
}




/**
 * Diagnostic counters from one donor-data exchange.
 */
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Receive cells overwritten with donor data
    pub cells_updated: usize,

    /// Receive cells left unchanged for lack of a donor
    pub cells_skipped: usize,
}

impl SyncReport {
    pub fn merge(self, other: Self) -> Self {
        Self {
            cells_updated: self.cells_updated + other.cells_updated,
            cells_skipped: self.cells_skipped + other.cells_skipped,
        }
    }
}
