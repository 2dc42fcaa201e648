use log::{debug, info, warn};
use rayon::prelude::*;
use crate::config::GridSettings;
use crate::donor_graph::DonorGraph;
use crate::error::{Error, Result};
use crate::geometry::BoundingBox;
use crate::hash_raster::HashRaster;
use crate::patch::{CartesianPatch, NeighbourDependency, PatchDataMut};
use crate::stats::{DependencyReport, SyncReport};

/// Hash raster buckets per patch
const RASTER_BUCKETS_PER_PATCH: usize = 10;

/// Candidate neighbor lists longer than this are deduplicated after each bucket
const CANDIDATE_DEDUP_THRESHOLD: usize = 100;




/**
 * A collection of possibly overlapping Cartesian patches, exclusively owned
 * by the grid. The grid applies its settings to every inserted patch,
 * discovers which patches donate data into which, and runs the donor data
 * exchange between stages of a time integration.
 *
 * Inserting a patch, or changing its geometry through `patch_mut`, makes the
 * dependencies stale: `compute_dependencies` must run again before the next
 * exchange, which is otherwise refused.
 */
pub struct PatchGrid {
    settings: GridSettings,
    patches: Vec<CartesianPatch>,
    bbox: Option<BoundingBox>,
    dependencies_ok: bool,
    donor_graph: DonorGraph,
    scratch: Vec<Vec<f64>>,
}




// ============================================================================
impl PatchGrid {


    pub fn new(settings: GridSettings) -> Self {
        Self {
            settings,
            patches: Vec::new(),
            bbox: None,
            dependencies_ok: false,
            donor_graph: DonorGraph::new(),
            scratch: Vec::new(),
        }
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    pub fn num_patches(&self) -> usize {
        self.patches.len()
    }

    pub fn patches(&self) -> &[CartesianPatch] {
        &self.patches
    }

    pub fn patch(&self, index: usize) -> &CartesianPatch {
        &self.patches[index]
    }


    /**
     * Return a patch for modification. Dependencies are marked stale, since
     * the caller may change the patch geometry; use `patch_data_mut` to edit
     * field data only.
     */
    pub fn patch_mut(&mut self, index: usize) -> &mut CartesianPatch {
        self.dependencies_ok = false;
        self.bbox = None;
        &mut self.patches[index]
    }


    /**
     * Return one variable of one field of a patch for modification. This
     * leaves dependencies intact.
     */
    pub fn patch_data_mut(&mut self, index: usize, field: usize, var: usize) -> &mut [f64] {
        self.patches[index].variable_mut(field, var)
    }

    pub fn dependencies_ok(&self) -> bool {
        self.dependencies_ok
    }

    /**
     * Return the donor relationships found by the last dependency pass.
     */
    pub fn donor_graph(&self) -> &DonorGraph {
        &self.donor_graph
    }


    /**
     * Take ownership of a patch, apply the grid settings to it, and return
     * its index in the grid.
     */
    pub fn insert_patch(&mut self, mut patch: CartesianPatch) -> usize {
        let index = self.patches.len();
        patch.set_index(index);
        patch.apply_settings(&self.settings);
        self.patches.push(patch);
        self.dependencies_ok = false;
        self.bbox = None;
        index
    }


    /**
     * Return the inertial bounding box of all patches, or `None` for an
     * empty grid. The box is cached until the next patch insertion.
     */
    pub fn bounding_box(&mut self) -> Option<BoundingBox> {
        if self.bbox.is_none() {
            self.bbox = self
                .patches
                .iter()
                .map(|p| p.bounding_box())
                .reduce(|a, b| a.union(&b));
        }
        self.bbox
    }


    /**
     * Scale every patch, and its placement, about the inertial origin.
     * Dependencies become stale.
     */
    pub fn scale_ref_parental(&mut self, factor: f64) {
        for patch in &mut self.patches {
            patch.scale_ref_parental(factor)
        }
        self.dependencies_ok = false;
        self.bbox = None;
    }


    /**
     * Return the smallest cell spacing over all patches.
     */
    pub fn compute_min_ch_length(&self) -> f64 {
        self.patches
            .iter()
            .map(|p| p.compute_min_ch_length())
            .fold(f64::INFINITY, f64::min)
    }


    /**
     * Rebuild all donor dependencies from scratch. Candidate neighbors are
     * the patches sharing a bucket of a hash raster laid over the grid
     * bounding box; each ordered candidate pair is then checked cell by
     * cell, and kept only if the candidate donates to at least one receive
     * cell.
     */
    pub fn compute_dependencies(&mut self) -> Result<DependencyReport> {
        self.dependencies_ok = false;
        self.donor_graph.clear();

        if let Some(patch) = self.patches.iter().find(|p| !p.metrics_ok()) {
            warn!("patch {} has no metrics", patch.index());
            return Err(Error::NotInitialized("patch metrics; call setup_metrics or setup_aligned"));
        }
        let candidates = match self.bounding_box() {
            Some(bbox) => self.potential_neighbours(bbox)?,
            None => Vec::new(),
        };

        for patch in &mut self.patches {
            patch.extract_receive_cells();
        }

        let patches = &self.patches;
        let found: Vec<Vec<NeighbourDependency>> = patches
            .par_iter()
            .zip(candidates.par_iter())
            .map(|(patch, neighbours)| {
                neighbours
                    .iter()
                    .filter_map(|&n| patch.find_dependency(n, &patches[n]))
                    .collect()
            })
            .collect();

        for (index, dependencies) in found.into_iter().enumerate() {
            for dependency in &dependencies {
                self.donor_graph.insert(dependency.donor(), index);
            }
            self.patches[index].set_dependencies(dependencies);
        }

        let report = DependencyReport {
            potential_pairs: candidates.iter().map(Vec::len).sum(),
            donor_edges: self.donor_graph.num_edges(),
            receive_cells: self.patches.iter().map(|p| p.receive_cells().len()).sum(),
            orphan_receive_cells: self.patches.iter().map(|p| p.orphan_receive_cells()).sum(),
        };

        info!("dependencies: {} patches, {} potential pairs, {} donor edges, {} receive cells",
            self.patches.len(), report.potential_pairs, report.donor_edges, report.receive_cells);

        if report.orphan_receive_cells > 0 {
            warn!("{} receive cells have no donor and keep their values", report.orphan_receive_cells);
        }
        self.dependencies_ok = true;
        Ok(report)
    }


    /**
     * Return, for each patch, the sorted list of other patches whose
     * bounding boxes share a raster bucket with it and overlap its own.
     */
    fn potential_neighbours(&self, bbox: BoundingBox) -> Result<Vec<Vec<usize>>> {
        let boxes: Vec<BoundingBox> = self.patches.iter().map(|p| p.bounding_box()).collect();
        let mut raster = HashRaster::with_resolution(bbox, RASTER_BUCKETS_PER_PATCH * self.patches.len());

        for (n, b) in boxes.iter().enumerate() {
            let lower = raster.xyz_to_ref_node(b.min).ok_or(Error::OutsideHashRaster { patch: n, point: b.min })?;
            let upper = raster.xyz_to_ref_node(b.max).ok_or(Error::OutsideHashRaster { patch: n, point: b.max })?;
            raster.insert_range(lower, upper, n);
        }
        debug!("hash raster {:?} over {} patches", raster.shape(), self.patches.len());

        let mut candidates = vec![Vec::new(); self.patches.len()];

        for bucket in raster.iter() {
            for &a in bucket {
                let list: &mut Vec<usize> = &mut candidates[a];
                list.extend(bucket.iter().copied().filter(|&b| b != a));

                if list.len() > CANDIDATE_DEDUP_THRESHOLD {
                    list.sort_unstable();
                    list.dedup();
                }
            }
        }
        for (a, list) in candidates.iter_mut().enumerate() {
            list.sort_unstable();
            list.dedup();
            list.retain(|&b| boxes[a].overlaps(&boxes[b]));
        }
        Ok(candidates)
    }


    fn check_dependencies(&self) -> Result<()> {
        if self.dependencies_ok {
            Ok(())
        } else {
            Err(Error::StaleDependencies)
        }
    }


    /**
     * Overwrite the receive cells of `field` on every patch with data
     * interpolated from their donors. All donor values are read before any
     * receive cell is written, so the result does not depend on the patch
     * order.
     */
    pub fn access_all_donor_data(&mut self, field: usize) -> Result<SyncReport> {
        self.check_dependencies()?;
        self.scratch.resize_with(self.patches.len(), Vec::new);

        let patches = &self.patches;
        let report = self
            .scratch
            .par_iter_mut()
            .zip(patches.par_iter())
            .map(|(buffer, patch)| patch.gather_donor_data(field, patches, buffer))
            .reduce(SyncReport::default, SyncReport::merge);

        self.patches
            .par_iter_mut()
            .zip(self.scratch.par_iter())
            .for_each(|(patch, buffer)| patch.scatter_received(field, buffer));

        Ok(report)
    }


    /**
     * Overwrite the receive cells of `field` on a single patch.
     */
    pub fn access_donor_data(&mut self, index: usize, field: usize) -> Result<SyncReport> {
        self.check_dependencies()?;
        let mut buffer = Vec::new();
        let report = self.patches[index].gather_donor_data(field, &self.patches, &mut buffer);
        self.patches[index].scatter_received(field, &buffer);
        Ok(report)
    }


    /**
     * Evaluate the boundary-normal derivative of every variable of `field`
     * at the receive cells of a patch. Returns (cell, derivatives) for each
     * receive cell served by at least one donor. Requires the grid to have
     * been configured with `interpolate_grad1n`.
     */
    pub fn receive_grad1n(&self, index: usize, field: usize) -> Result<Vec<(usize, Vec<f64>)>> {
        self.check_dependencies()?;

        let patch = &self.patches[index];
        let nv = patch.num_variables();
        let mut buffer = Vec::new();
        patch.gather_donor_grad1n(field, &self.patches, &mut buffer);

        Ok(patch
            .receive_cells()
            .iter()
            .zip(patch.receive_cell_grad1n_hits())
            .enumerate()
            .filter(|(_, (_, hits))| **hits > 0)
            .map(|(ll_rc, (&l_rc, _))| (l_rc, buffer[ll_rc * nv..(ll_rc + 1) * nv].to_vec()))
            .collect())
    }


    /**
     * Set every cell of a field, on every patch, to the given variables.
     */
    pub fn set_field_to_const(&mut self, field: usize, values: &[f64]) {
        self.patches.par_iter_mut().for_each(|p| p.set_field_to_const(field, values))
    }


    /**
     * Copy one field into another on every patch.
     */
    pub fn copy_field(&mut self, from: usize, to: usize) {
        self.patches.par_iter_mut().for_each(|p| p.copy_field(from, to))
    }


    /**
     * Apply a function to every patch in parallel, e.g. a flux sweep. Only
     * field data can be modified this way, so dependencies stay valid; use
     * `patch_mut` to change a patch's geometry.
     */
    pub fn for_each_patch<F>(&mut self, f: F)
    where
        F: Fn(&mut PatchDataMut) + Send + Sync
    {
        self.patches
            .par_iter_mut()
            .for_each(|patch| f(&mut PatchDataMut::new(patch)))
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::PatchGrid;
    use crate::config::GridSettings;
    use crate::error::Error;
    use crate::geometry::Vec3;
    use crate::patch::CartesianPatch;

    fn block(x0: f64, x1: f64) -> CartesianPatch {
        CartesianPatch::aligned((10, 10, 10), Vec3::new(x0, 0.0, 0.0), Vec3::new(x1, 1.0, 1.0))
    }

    fn two_blocks(settings: GridSettings, x0: f64, x1: f64) -> PatchGrid {
        let mut grid = PatchGrid::new(settings);
        grid.insert_patch(block(0.0, 1.0));
        grid.insert_patch(block(x0, x1));
        grid
    }

    #[test]
    fn sync_is_refused_until_dependencies_are_computed() {
        let mut grid = two_blocks(GridSettings::default(), 0.6, 1.6);
        assert!(matches!(grid.access_all_donor_data(0), Err(Error::StaleDependencies)));
        grid.compute_dependencies().unwrap();
        assert!(grid.access_all_donor_data(0).is_ok());
        grid.insert_patch(block(5.0, 6.0));
        assert!(!grid.dependencies_ok());
        assert!(matches!(grid.access_all_donor_data(0), Err(Error::StaleDependencies)));
    }

    #[test]
    fn field_sweeps_keep_dependencies_and_geometry_edits_drop_them() {
        let mut grid = two_blocks(GridSettings::default(), 0.6, 1.6);
        grid.compute_dependencies().unwrap();

        grid.for_each_patch(|patch| patch.variable_mut(0, 0).iter_mut().for_each(|x| *x = 1.0));
        assert!(grid.dependencies_ok());
        assert!(grid.access_all_donor_data(0).is_ok());

        grid.patch_mut(1).resize(2, 2, 2);
        assert!(!grid.dependencies_ok());
        assert!(matches!(grid.access_all_donor_data(0), Err(Error::StaleDependencies)));
        assert!(matches!(grid.access_donor_data(0, 0), Err(Error::StaleDependencies)));

        grid.compute_dependencies().unwrap();
        assert!(grid.access_all_donor_data(0).is_ok());
    }

    #[test]
    fn scaling_the_grid_scales_every_patch_and_drops_dependencies() {
        let mut grid = two_blocks(GridSettings::default(), 0.6, 1.6);
        let before = grid.compute_dependencies().unwrap();
        grid.scale_ref_parental(2.0);
        assert!(!grid.dependencies_ok());

        let bbox = grid.bounding_box().unwrap();
        assert!((bbox.max - Vec3::new(3.2, 2.0, 2.0)).norm() < 1e-12);
        assert!((grid.patch(1).xyzo_cell(0) - Vec3::new(1.3, 0.1, 0.1)).norm() < 1e-12);
        assert!((grid.compute_min_ch_length() - 0.2).abs() < 1e-12);

        let after = grid.compute_dependencies().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn missing_metrics_are_reported() {
        let mut grid = PatchGrid::new(GridSettings::default());
        grid.insert_patch(CartesianPatch::new());
        assert!(matches!(grid.compute_dependencies(), Err(Error::NotInitialized(_))));
    }

    #[test]
    fn settings_are_applied_on_insertion() {
        let settings = GridSettings { num_fields: 3, num_variables: 2, ..GridSettings::default() };
        let grid = two_blocks(settings, 0.6, 1.6);
        assert_eq!(grid.patch(1).num_fields(), 3);
        assert_eq!(grid.patch(1).num_variables(), 2);
        assert_eq!(grid.patch(1).index(), 1);
    }

    #[test]
    fn bounding_box_covers_all_patches() {
        let mut grid = two_blocks(GridSettings::default(), 0.9, 1.9);
        let bbox = grid.bounding_box().unwrap();
        assert_eq!(bbox.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(bbox.max, Vec3::new(1.9, 1.0, 1.0));
        assert!((grid.compute_min_ch_length() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn disjoint_patches_have_no_dependencies() {
        let mut grid = two_blocks(GridSettings::default(), 3.0, 4.0);
        let report = grid.compute_dependencies().unwrap();
        assert_eq!(report.donor_edges, 0);
        assert_eq!(grid.donor_graph().num_edges(), 0);
        assert!(grid.patches().iter().all(|p| p.neighbours().is_empty()));
        assert_eq!(report.orphan_receive_cells, report.receive_cells);
    }

    #[test]
    fn one_cell_overlap_without_protection_is_found_both_ways() {
        let settings = GridSettings { num_protect_layers: 0, num_overlap_layers: 1, ..GridSettings::default() };
        let mut grid = two_blocks(settings, 0.9, 1.9);
        let report = grid.compute_dependencies().unwrap();
        assert_eq!(report.potential_pairs, 2);
        assert_eq!(report.donor_edges, 2);
        assert_eq!(grid.donor_graph().edges().collect::<Vec<_>>(), vec![(0, 1), (1, 0)]);

        grid.set_field_to_const(0, &[0.0; 5]);
        grid.patch_data_mut(1, 0, 3).iter_mut().for_each(|x| *x = 7.0);
        grid.access_all_donor_data(0).unwrap();

        let a = grid.patch(0);
        for j in 0..10 {
            for k in 0..10 {
                assert!((a.variable(0, 3)[a.cell(9, j, k)] - 7.0).abs() < 1e-12);
            }
        }
        assert_eq!(a.variable(0, 3)[a.cell(8, 5, 5)], 0.0);
    }

    #[test]
    fn protection_layers_hide_a_thin_overlap() {
        let mut grid = two_blocks(GridSettings::default(), 0.9, 1.9);
        let report = grid.compute_dependencies().unwrap();
        assert_eq!(report.potential_pairs, 2);
        assert_eq!(report.donor_edges, 0);
    }

    #[test]
    fn constant_donor_field_is_reproduced_in_the_overlap_band() {
        let mut grid = two_blocks(GridSettings::default(), 0.6, 1.6);
        let report = grid.compute_dependencies().unwrap();
        assert_eq!(report.donor_edges, 2);
        assert!(grid.patches().iter().all(|p| p.neighbours().len() == 1));
        assert!(grid.patches().iter().all(|p| p.receive_cell_data_hits().iter().any(|&h| h > 0)));

        let value = [1.0, -2.0, 3.5, 0.25, 1e3];
        grid.set_field_to_const(0, &[0.0; 5]);
        for v in 0..5 {
            grid.patch_data_mut(1, 0, v).iter_mut().for_each(|x| *x = value[v]);
        }
        let sync = grid.access_all_donor_data(0).unwrap();
        assert!(sync.cells_updated > 0);
        assert!(sync.cells_skipped > 0);

        let a = grid.patch(0);
        for i in 8..10 {
            for j in 2..8 {
                for k in 2..8 {
                    let got = a.get_var(0, a.cell(i, j, k));
                    for v in 0..5 {
                        assert!((got[v] - value[v]).abs() < 1e-9 * value[v].abs().max(1.0));
                    }
                }
            }
        }
        assert_eq!(a.get_var(0, a.cell(0, 0, 0)), vec![0.0; 5]);
        assert_eq!(a.get_var(0, a.cell(8, 0, 5)), vec![0.0; 5]);

        let b = grid.patch(1);
        assert_eq!(b.get_var(0, b.cell(0, 5, 5)), vec![0.0; 5]);
        assert_eq!(b.get_var(0, b.cell(5, 5, 5)), value.to_vec());
    }

    #[test]
    fn receive_cells_with_two_donors_get_the_average() {
        let mut grid = two_blocks(GridSettings { num_variables: 1, ..GridSettings::default() }, 0.6, 1.6);
        grid.insert_patch(block(0.6, 1.6));
        let report = grid.compute_dependencies().unwrap();
        assert_eq!(report.donor_edges, 4);
        assert_eq!(grid.donor_graph().donors_of(0).collect::<Vec<_>>(), vec![1, 2]);

        grid.set_field_to_const(0, &[0.0]);
        grid.patch_data_mut(1, 0, 0).iter_mut().for_each(|x| *x = 2.0);
        grid.patch_data_mut(2, 0, 0).iter_mut().for_each(|x| *x = 4.0);
        grid.access_donor_data(0, 0).unwrap();

        let a = grid.patch(0);
        let hits = a.receive_cell_data_hits();
        assert!(hits.iter().all(|&h| h == 0 || h == 2));

        for i in 8..10 {
            for j in 2..8 {
                for k in 2..8 {
                    assert!((a.variable(0, 0)[a.cell(i, j, k)] - 3.0).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn flat_blocks_exchange_data_in_plane() {
        let mut grid = PatchGrid::new(GridSettings { num_variables: 1, ..GridSettings::default() });

        for x0 in [0.0, 0.6] {
            let mut patch = CartesianPatch::aligned((20, 20, 1), Vec3::new(x0, 0.0, 0.0), Vec3::new(x0 + 1.0, 1.0, 0.05));
            patch.set_num_protect_exception(2, 2, 2, 2, 0, 0);
            patch.set_num_overlap_exception(2, 2, 2, 2, 0, 0);
            grid.insert_patch(patch);
        }
        let report = grid.compute_dependencies().unwrap();
        assert_eq!(report.donor_edges, 2);
        assert_eq!(report.receive_cells, 2 * (400 - 16 * 16));

        grid.set_field_to_const(0, &[0.0]);
        grid.patch_data_mut(1, 0, 0).iter_mut().for_each(|x| *x = 5.0);
        let sync = grid.access_all_donor_data(0).unwrap();
        assert!(sync.cells_updated > 0);

        let a = grid.patch(0);
        assert!((a.variable(0, 0)[a.cell(19, 10, 0)] - 5.0).abs() < 1e-12);
        assert_eq!(a.variable(0, 0)[a.cell(19, 0, 0)], 0.0);
    }

    #[test]
    fn bucket_neighbours_with_disjoint_boxes_are_not_candidates() {
        let mut grid = two_blocks(GridSettings::default(), 1.05, 2.0);
        let report = grid.compute_dependencies().unwrap();
        assert_eq!(report.potential_pairs, 0);
    }

    #[test]
    fn crowded_buckets_yield_each_candidate_once() {
        let mut grid = PatchGrid::new(GridSettings { num_variables: 1, ..GridSettings::default() });

        for _ in 0..12 {
            grid.insert_patch(CartesianPatch::aligned((4, 4, 4), Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)));
        }
        let report = grid.compute_dependencies().unwrap();
        assert_eq!(report.potential_pairs, 12 * 11);
    }

    #[test]
    fn dependencies_are_deterministic() {
        let mut grid = two_blocks(GridSettings::default(), 0.6, 1.6);
        let first = grid.compute_dependencies().unwrap();
        let tables: Vec<_> = grid.patches().iter().map(|p| p.neighbours().to_vec()).collect();
        let second = grid.compute_dependencies().unwrap();
        assert_eq!(first, second);
        for (p, t) in grid.patches().iter().zip(&tables) {
            assert_eq!(p.neighbours(), t.as_slice());
        }
    }

    #[test]
    fn normal_gradients_are_received_along_the_nearest_face() {
        let settings = GridSettings { interpolate_grad1n: true, ..GridSettings::default() };
        let mut grid = two_blocks(settings, 0.6, 1.6);
        grid.compute_dependencies().unwrap();

        let b = grid.patch(1);
        let x: Vec<f64> = (0..b.num_cells()).map(|l| b.xyzo_cell(l).x).collect();
        grid.patch_data_mut(1, 0, 0).copy_from_slice(&x);

        let received = grid.receive_grad1n(0, 0).unwrap();
        assert_eq!(received.len(), 2 * 6 * 6);
        for (_, d_dn) in received {
            assert!((d_dn[0] - 1.0).abs() < 1e-9);
            assert!(d_dn[1].abs() < 1e-12);
        }
    }

    #[test]
    fn rotated_donors_reproduce_linear_fields() {
        let mut grid = PatchGrid::new(GridSettings { num_variables: 1, ..GridSettings::default() });
        grid.insert_patch(block(0.0, 1.0));

        let mut rotated = CartesianPatch::new();
        rotated.resize(10, 10, 10);
        rotated.set_transform(Vec3::new(1.6, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        rotated.setup_metrics(1.0, 1.0, 1.0);
        grid.insert_patch(rotated);

        let bbox = grid.patch(1).bounding_box();
        assert!((bbox.min - Vec3::new(0.6, 0.0, 0.0)).norm() < 1e-12);
        assert!((bbox.max - Vec3::new(1.6, 1.0, 1.0)).norm() < 1e-12);

        grid.compute_dependencies().unwrap();
        let to_donor = grid.patch(0).neighbours()[0].transform();
        assert!((to_donor.transform(Vec3::new(0.95, 0.5, 0.25)) - Vec3::new(0.5, 0.65, 0.25)).norm() < 1e-12);

        let b = grid.patch(1);
        let f: Vec<f64> = (0..b.num_cells()).map(|l| {
            let p = b.xyzo_cell(l);
            2.0 * p.x + p.y - p.z
        }).collect();
        grid.patch_data_mut(1, 0, 0).copy_from_slice(&f);
        grid.access_all_donor_data(0).unwrap();

        let a = grid.patch(0);
        for (&l, &hits) in a.receive_cells().iter().zip(a.receive_cell_data_hits()) {
            if hits > 0 {
                let p = a.xyzo_cell(l);
                assert!((a.variable(0, 0)[l] - (2.0 * p.x + p.y - p.z)).abs() < 1e-9);
            }
        }
        assert!(a.receive_cell_data_hits().iter().any(|&h| h > 0));
    }
}
