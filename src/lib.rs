//! Patchgrid is an overlap and interpolation engine for multi-block finite
//! volume solvers. A grid is a collection of structured Cartesian patches,
//! each with its own rigid frame, which may overlap one another in arbitrary
//! orientations. Cells near the faces of a patch receive their values by
//! tri-linear interpolation from the interior of overlapping neighbor
//! patches. Candidate neighbors are found with a hash raster over the grid
//! bounding box, and the interpolation coefficients are computed once and
//! replayed between the stages of a time integration.
//!
//! Immersed boundaries are described by level sets. A `LevelSetObject`
//! extracts the layers of cells on either side of the zero level, with
//! interpolation coefficients at mirror points for ghost-cell boundary
//! conditions.

pub mod config;
pub mod donor_graph;
pub mod error;
pub mod geometry;
pub mod grid_file;
pub mod hash_raster;
pub mod index_space;
pub mod level_set;
pub mod patch;
pub mod patch_grid;
pub mod runge_kutta;
pub mod snapshot;
pub mod stats;
pub mod weighted_set;

pub use config::GridSettings;
pub use error::{Error, Result};
pub use geometry::{Axis, BoundingBox, CoordTransform, Face, Vec3};
pub use level_set::{LevelSetDefinition, LevelSetObject, LevelSetPlane, LevelSetSphere};
pub use patch::CartesianPatch;
pub use patch_grid::PatchGrid;
pub use weighted_set::WeightedSet;
