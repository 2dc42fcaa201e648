use std::ops::Deref;
use log::debug;
use crate::config::GridSettings;
use crate::geometry::{Axis, BoundingBox, CoordTransform, Face, Vec3};
use crate::index_space::IndexSpace;
use crate::stats::SyncReport;
use crate::weighted_set::WeightedSet;

/// Type code of Cartesian patches in grid description files
pub const CARTESIAN_TYPE_CODE: u32 = 1001;

/// Relative tolerance for point location, as a fraction of the cell size
const EPS: f64 = 1e-5;




/**
 * Interpolation coefficients for the receive cells of one patch, pointing
 * into the cells of one donor patch. Entries are collected in any order
 * while dependencies are computed; `finalize` sorts them by receive cell
 * and packs them into flat arrays for replay.
 */
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DonorTable {
    pending: Vec<(usize, WeightedSet)>,
    receive: Vec<usize>,
    offsets: Vec<usize>,
    donor_cells: Vec<usize>,
    weights: Vec<f64>,
}




// ============================================================================
impl DonorTable {

    fn push(&mut self, receive: usize, weights: WeightedSet) {
        self.pending.push((receive, weights))
    }

    fn receive_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.pending.iter().map(|(ll_rc, _)| *ll_rc).chain(self.receive.iter().copied())
    }

    fn finalize(&mut self) {
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|(ll_rc, _)| *ll_rc);

        self.receive.clear();
        self.offsets.clear();
        self.donor_cells.clear();
        self.weights.clear();
        self.offsets.push(0);

        for (ll_rc, mut ws) in pending {
            ws.unify();
            self.receive.push(ll_rc);
            for &(l, w) in ws.iter() {
                self.donor_cells.push(l);
                self.weights.push(w);
            }
            self.offsets.push(self.donor_cells.len());
        }
    }

    /**
     * Return the number of receive cells served by this table.
     */
    pub fn len(&self) -> usize {
        self.receive.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /**
     * Iterate over (receive cell slot, donor cells, weights) of a
     * finalized table.
     */
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize], &[f64])> {
        self.receive.iter().enumerate().map(move |(n, &ll_rc)| {
            let r = self.offsets[n]..self.offsets[n + 1];
            (ll_rc, &self.donor_cells[r.clone()], &self.weights[r])
        })
    }
}




/**
 * Everything a patch needs in order to pull data from one donor patch.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct NeighbourDependency {
    donor: usize,
    transform: CoordTransform,
    data: DonorTable,
    grad1n: DonorTable,
}




// ============================================================================
impl NeighbourDependency {

    /**
     * Return the index of the donor patch in the owning grid.
     */
    pub fn donor(&self) -> usize {
        self.donor
    }

    /**
     * Return the transform from this patch's local frame into the donor's.
     */
    pub fn transform(&self) -> &CoordTransform {
        &self.transform
    }

    pub fn data(&self) -> &DonorTable {
        &self.data
    }

    pub fn grad1n(&self) -> &DonorTable {
        &self.grad1n
    }
}




/**
 * A structured Cartesian block of cells. The block has its own local frame,
 * with the lower corner of cell (0, 0, 0) at the origin and the axes along
 * the i, j, k directions, and a rigid transform from the inertial frame
 * into the local one. Each of `num_fields` fields stores `num_variables`
 * values per cell; a variable is a contiguous array over the cells in
 * row-major (i, j, k) order.
 *
 * Cells within `num_protect_layers` of a block face never donate data to
 * other patches. Cells within the overlap layers of a face receive data
 * interpolated from neighbor patches, once dependencies have been computed.
 */
#[derive(Clone, Debug)]
pub struct CartesianPatch {
    index: usize,
    comment: String,
    space: IndexSpace,
    num_fields: usize,
    num_variables: usize,
    data: Vec<f64>,
    transform: CoordTransform,
    lengths: [f64; 3],
    delta: [f64; 3],
    inv_delta: [f64; 3],
    cc_min: [f64; 3],
    cc_max: [f64; 3],
    inter_min: [f64; 3],
    inter_max: [f64; 3],
    eps_delta: [f64; 3],
    metrics_ok: bool,
    num_protect: [usize; 6],
    protect_exception: bool,
    num_overlap: [usize; 6],
    overlap_exception: bool,
    interpolate_data: bool,
    interpolate_grad1n: bool,
    receive_cells: Vec<usize>,
    receive_cell_data_hits: Vec<usize>,
    receive_cell_grad1n_hits: Vec<usize>,
    neighbours: Vec<NeighbourDependency>,
}




// ============================================================================
impl Default for CartesianPatch {
    fn default() -> Self {
        Self::new()
    }
}

impl CartesianPatch {


    /**
     * Create an empty 1 x 1 x 1 patch with the default grid settings and no
     * metrics.
     */
    pub fn new() -> Self {
        let settings = GridSettings::default();
        let mut patch = Self {
            index: 0,
            comment: String::new(),
            space: IndexSpace::of_size(1, 1, 1),
            num_fields: settings.num_fields,
            num_variables: settings.num_variables,
            data: Vec::new(),
            transform: CoordTransform::identity(),
            lengths: [0.0; 3],
            delta: [0.0; 3],
            inv_delta: [0.0; 3],
            cc_min: [0.0; 3],
            cc_max: [0.0; 3],
            inter_min: [0.0; 3],
            inter_max: [0.0; 3],
            eps_delta: [0.0; 3],
            metrics_ok: false,
            num_protect: [settings.num_protect_layers; 6],
            protect_exception: false,
            num_overlap: [settings.num_overlap_layers; 6],
            overlap_exception: false,
            interpolate_data: settings.interpolate_data,
            interpolate_grad1n: settings.interpolate_grad1n,
            receive_cells: Vec::new(),
            receive_cell_data_hits: Vec::new(),
            receive_cell_grad1n_hits: Vec::new(),
            neighbours: Vec::new(),
        };
        patch.allocate();
        patch
    }


    /**
     * Convenience constructor for an axis-aligned block of the given cell
     * counts spanning the inertial box between two corners.
     */
    pub fn aligned(size: (usize, usize, usize), corner1: Vec3, corner2: Vec3) -> Self {
        let mut patch = Self::new();
        patch.resize(size.0, size.1, size.2);
        patch.setup_aligned(corner1, corner2);
        patch
    }


    pub fn type_code(&self) -> u32 {
        CARTESIAN_TYPE_CODE
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.comment = comment.trim().to_string()
    }


    /**
     * Apply grid-wide attributes. Explicit per-face protection and overlap
     * exceptions survive; otherwise the uniform layer counts are taken
     * over. Storage is reallocated if the field layout changes.
     */
    pub fn apply_settings(&mut self, settings: &GridSettings) {
        if !self.protect_exception {
            self.set_num_protect_layers(settings.num_protect_layers);
        }
        if !self.overlap_exception {
            self.set_num_overlap_layers(settings.num_overlap_layers);
        }
        self.interpolate_data = settings.interpolate_data;
        self.interpolate_grad1n = settings.interpolate_grad1n;

        if settings.num_fields != self.num_fields || settings.num_variables != self.num_variables {
            self.num_fields = settings.num_fields;
            self.num_variables = settings.num_variables;
            self.allocate();
        }
    }


    /**
     * Set a uniform number of protection layers on all faces, dropping any
     * per-face exception.
     */
    pub fn set_num_protect_layers(&mut self, num_protect_layers: usize) {
        self.protect_exception = false;
        self.num_protect = [num_protect_layers; 6];
        self.compute_deltas();
    }


    /**
     * Set the number of protection layers face by face.
     */
    pub fn set_num_protect_exception(&mut self, xmin: usize, xmax: usize, ymin: usize, ymax: usize, zmin: usize, zmax: usize) {
        self.protect_exception = true;
        self.num_protect = [xmin, xmax, ymin, ymax, zmin, zmax];
        self.compute_deltas();
    }


    pub fn num_protect_layers(&self, face: Face) -> usize {
        self.num_protect[face.index()]
    }

    pub fn set_num_overlap_layers(&mut self, num_overlap_layers: usize) {
        self.overlap_exception = false;
        self.num_overlap = [num_overlap_layers; 6];
    }


    /**
     * Set the number of overlap (receive) layers face by face. Faces that
     * are physical boundaries, or the faces of a flat axis, get 0.
     */
    pub fn set_num_overlap_exception(&mut self, xmin: usize, xmax: usize, ymin: usize, ymax: usize, zmin: usize, zmax: usize) {
        self.overlap_exception = true;
        self.num_overlap = [xmin, xmax, ymin, ymax, zmin, zmax];
    }

    pub fn num_overlap_layers(&self, face: Face) -> usize {
        self.num_overlap[face.index()]
    }


    /**
     * Reallocate storage for `ni x nj x nk` cells. All field data is reset to
     * zero, and any receive cells or neighbor dependencies are discarded.
     */
    pub fn resize(&mut self, ni: usize, nj: usize, nk: usize) {
        assert!(ni > 0 && nj > 0 && nk > 0, "patch must have at least one cell on each axis");
        self.space = IndexSpace::of_size(ni, nj, nk);
        self.allocate();
        self.clear_dependencies();
        self.receive_cells.clear();
        self.compute_deltas();
    }


    /**
     * Fix the physical size of the block. The block stays wherever its
     * transform puts it.
     */
    pub fn setup_metrics(&mut self, ilength: f64, jlength: f64, klength: f64) {
        self.lengths = [ilength, jlength, klength];
        self.metrics_ok = ilength > 0.0 && jlength > 0.0 && klength > 0.0;
        self.compute_deltas();
    }


    /**
     * Place an axis-aligned block between the two inertial corners
     * `corner1` (lower) and `corner2` (upper).
     */
    pub fn setup_aligned(&mut self, corner1: Vec3, corner2: Vec3) {
        let extent = corner2 - corner1;
        self.transform = CoordTransform::from_origin(corner1);
        self.setup_metrics(extent.x, extent.y, extent.z);
    }


    /**
     * Scale the block and its placement about the inertial origin, e.g. to
     * change the unit of length of a whole grid. Cell counts are kept.
     */
    pub fn scale_ref_parental(&mut self, factor: f64) {
        self.transform = self.transform.scaled(factor);
        self.lengths.iter_mut().for_each(|x| *x *= factor);
        self.metrics_ok = self.lengths.iter().all(|&x| x > 0.0);
        self.compute_deltas();
    }


    /**
     * Place a possibly rotated block, with its local origin at `origin` and
     * its i and j axes along `base_i` and `base_j`.
     */
    pub fn set_transform(&mut self, origin: Vec3, base_i: Vec3, base_j: Vec3) {
        self.transform = CoordTransform::from_base_ij(origin, base_i, base_j)
    }


    /**
     * Return the transform from the inertial frame into the local frame.
     */
    pub fn transform(&self) -> &CoordTransform {
        &self.transform
    }

    pub fn metrics_ok(&self) -> bool {
        self.metrics_ok
    }

    fn allocate(&mut self) {
        self.data = vec![0.0; self.num_fields * self.num_variables * self.space.len()];
    }

    fn compute_deltas(&mut self) {
        let (ni, nj, nk) = self.space.dim();
        let n = [ni, nj, nk];

        for a in 0..3 {
            let p_min = self.num_protect[2 * a] as f64;
            let p_max = self.num_protect[2 * a + 1] as f64;
            self.delta[a] = self.lengths[a] / n[a] as f64;
            self.inv_delta[a] = if self.delta[a] > 0.0 { 1.0 / self.delta[a] } else { 0.0 };
            self.cc_min[a] = 0.5 * self.delta[a];
            self.cc_max[a] = self.lengths[a] - 0.5 * self.delta[a];

            // Donors may serve the whole cell range outside the protection
            // layers, not only the cell-center hull of that range.
            self.inter_min[a] = p_min * self.delta[a];
            self.inter_max[a] = self.lengths[a] - p_max * self.delta[a];
            self.eps_delta[a] = self.delta[a] * EPS;
        }
    }


    /**
     * Return the index space of all cells.
     */
    pub fn index_space(&self) -> &IndexSpace {
        &self.space
    }

    /**
     * Return the number of cells on each axis.
     */
    pub fn dim(&self) -> (usize, usize, usize) {
        self.space.dim()
    }

    /**
     * Return the physical cell spacing on each axis.
     */
    pub fn cell_spacing(&self) -> Vec3 {
        Vec3::from(self.delta)
    }

    pub fn lengths(&self) -> Vec3 {
        Vec3::from(self.lengths)
    }

    pub fn num_cells(&self) -> usize {
        self.space.len()
    }

    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    /**
     * Return the linear cell index of (i, j, k).
     */
    pub fn cell(&self, i: usize, j: usize, k: usize) -> usize {
        self.validate_index((i, j, k));
        self.space.row_major_offset((i, j, k))
    }

    /**
     * Return the (i, j, k) triple of a linear cell index.
     */
    pub fn ijk(&self, l: usize) -> (usize, usize, usize) {
        assert!(l < self.num_cells(), "cell {} out of range on patch with {} cells", l, self.num_cells());
        self.space.index_of(l)
    }

    fn validate_index(&self, index: (usize, usize, usize)) {
        if !self.space.contains(index) {
            let (ni, nj, nk) = self.dim();
            panic!("index ({} {} {}) out of range on patch ({} {} {})",
                index.0, index.1, index.2, ni, nj, nk);
        }
    }

    /**
     * Return the cell center in the local frame.
     */
    pub fn xyz_cell(&self, l: usize) -> Vec3 {
        let (i, j, k) = self.ijk(l);
        Vec3::new(
            (i as f64 + 0.5) * self.delta[0],
            (j as f64 + 0.5) * self.delta[1],
            (k as f64 + 0.5) * self.delta[2])
    }

    /**
     * Return the cell center in the inertial frame.
     */
    pub fn xyzo_cell(&self, l: usize) -> Vec3 {
        self.transform.transform_reverse(self.xyz_cell(l))
    }

    /**
     * Return the inertial bounding box of the whole block, covering all
     * eight block corners.
     */
    pub fn bounding_box(&self) -> BoundingBox {
        let [lx, ly, lz] = self.lengths;
        let corners = (0..8).map(|c| {
            Vec3::new(
                if c & 4 != 0 { lx } else { 0.0 },
                if c & 2 != 0 { ly } else { 0.0 },
                if c & 1 != 0 { lz } else { 0.0 })
        });
        BoundingBox::from_points(corners.map(|p| self.transform.transform_reverse(p)))
            .unwrap_or_else(|| BoundingBox::new(Vec3::default(), Vec3::default()))
    }

    /**
     * Return the smallest cell spacing of the patch.
     */
    pub fn compute_min_ch_length(&self) -> f64 {
        self.delta.iter().cloned().fold(f64::INFINITY, f64::min)
    }


    /**
     * Collect the face neighbors (at most six) of a cell into `neighbours`.
     */
    pub fn cell_over_face_neighbours(&self, l: usize, neighbours: &mut Vec<usize>) {
        let (ni, nj, nk) = self.dim();
        let (i, j, k) = self.ijk(l);
        let stride = [nj * nk, nk, 1];
        let index = [i, j, k];
        let n = [ni, nj, nk];
        neighbours.clear();

        for a in 0..3 {
            if index[a] > 0 {
                neighbours.push(l - stride[a])
            }
            if index[a] + 1 < n[a] {
                neighbours.push(l + stride[a])
            }
        }
    }


    // ------------------------------------------------------------------------
    // Field data


    fn variable_offset(&self, field: usize, var: usize) -> usize {
        assert!(field < self.num_fields && var < self.num_variables,
            "field {} variable {} out of range ({} fields, {} variables)",
            field, var, self.num_fields, self.num_variables);
        (field * self.num_variables + var) * self.num_cells()
    }

    /**
     * Return the values of one variable of one field, over all cells.
     */
    pub fn variable(&self, field: usize, var: usize) -> &[f64] {
        let start = self.variable_offset(field, var);
        &self.data[start..start + self.num_cells()]
    }

    pub fn variable_mut(&mut self, field: usize, var: usize) -> &mut [f64] {
        let start = self.variable_offset(field, var);
        let n = self.num_cells();
        &mut self.data[start..start + n]
    }

    /**
     * Return all variables of a field at one cell.
     */
    pub fn get_var(&self, field: usize, l: usize) -> Vec<f64> {
        (0..self.num_variables).map(|v| self.variable(field, v)[l]).collect()
    }

    /**
     * Write all variables of a field at one cell.
     */
    pub fn set_var(&mut self, field: usize, l: usize, values: &[f64]) {
        for (v, &x) in values.iter().enumerate().take(self.num_variables) {
            self.variable_mut(field, v)[l] = x
        }
    }

    /**
     * Set every cell of a field to the given variable vector.
     */
    pub fn set_field_to_const(&mut self, field: usize, values: &[f64]) {
        for (v, &x) in values.iter().enumerate().take(self.num_variables) {
            self.variable_mut(field, v).iter_mut().for_each(|y| *y = x)
        }
    }

    /**
     * Copy all variables of one field into another.
     */
    pub fn copy_field(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let size = self.num_variables * self.num_cells();
        let src = self.variable_offset(from, 0);
        let dst = self.variable_offset(to, 0);
        self.data.copy_within(src..src + size, dst)
    }

    /**
     * Return the raw storage of the patch: fields, then variables, then
     * cells.
     */
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /**
     * Central-difference gradient of one variable at a cell, in the local
     * frame. Differences are one-sided at block faces and zero along flat
     * (single-cell) axes.
     */
    pub fn compute_nabla_var(&self, field: usize, var: usize, l: usize) -> Vec3 {
        let f = self.variable(field, var);
        let index = self.ijk(l);
        let mut grad = [0.0; 3];

        for (a, g) in grad.iter_mut().enumerate() {
            if let Some((lo, hi, span)) = self.difference_cells(index, a) {
                *g = (f[hi] - f[lo]) / (span * self.delta[a]);
            }
        }
        Vec3::from(grad)
    }

    /**
     * Return the pair of cells straddling `index` along axis `a`, and their
     * separation in cells, or `None` for a flat axis.
     */
    fn difference_cells(&self, index: (usize, usize, usize), a: usize) -> Option<(usize, usize, f64)> {
        let (ni, nj, nk) = self.dim();
        let n = [ni, nj, nk][a];
        let c = [index.0, index.1, index.2][a];
        let lo = c.saturating_sub(1);
        let hi = (c + 1).min(n - 1);

        if hi == lo {
            return None;
        }
        let shift = |m: usize| match a {
            0 => (m, index.1, index.2),
            1 => (index.0, m, index.2),
            _ => (index.0, index.1, m),
        };
        Some((
            self.space.row_major_offset(shift(lo)),
            self.space.row_major_offset(shift(hi)),
            (hi - lo) as f64))
    }


    // ------------------------------------------------------------------------
    // Point location and interpolation


    /**
     * Locate the lower-index corner cell of the 2 x 2 x 2 box of cell
     * centers containing the local point `p`. Returns `None` if `p` lies
     * outside the hull of all cell centers, beyond a tolerance proportional
     * to the cell size.
     */
    pub fn xyz_to_ref_cell(&self, p: Vec3) -> Option<(usize, usize, usize)> {
        let x = p.as_array();
        let (ni, nj, nk) = self.dim();
        let n = [ni, nj, nk];
        let mut ijk = [0; 3];

        for a in 0..3 {
            if x[a] < self.cc_min[a] - self.eps_delta[a] || x[a] > self.cc_max[a] + self.eps_delta[a] {
                return None;
            }
        }
        for a in 0..3 {
            let xa = x[a]
                .max(self.cc_min[a] + self.eps_delta[a])
                .min(self.cc_max[a] - self.eps_delta[a]);
            let r = ((xa - self.cc_min[a]) * self.inv_delta[a]).max(EPS);
            ijk[a] = (r as usize).min(n[a].saturating_sub(2));
        }
        Some((ijk[0], ijk[1], ijk[2]))
    }


    /**
     * Like `xyz_to_ref_cell`, but the eligible region is the block shrunk by
     * the protection layers of each face: this is where the patch may act
     * as an interpolation donor.
     */
    pub fn xyz_to_ref_inter_cell(&self, p: Vec3) -> Option<(usize, usize, usize)> {
        let x = p.as_array();
        let (ni, nj, nk) = self.dim();
        let n = [ni, nj, nk];
        let mut ijk = [0; 3];

        for a in 0..3 {
            if x[a] < self.inter_min[a] - self.eps_delta[a] || x[a] > self.inter_max[a] + self.eps_delta[a] {
                return None;
            }
        }
        for a in 0..3 {
            let r = ((x[a] - self.cc_min[a]) * self.inv_delta[a]).max(EPS);
            ijk[a] = (r as usize).min(n[a] - 1);
        }
        Some((ijk[0], ijk[1], ijk[2]))
    }


    /**
     * Tri-linear weights of the eight corners of the box of cell centers
     * whose lower corner is the center of `reference`. Corner `c` is offset
     * by `(c >> 2 & 1, c >> 1 & 1, c & 1)` cells from the reference cell.
     */
    fn interpolation_weights(&self, p: Vec3, reference: (usize, usize, usize)) -> [f64; 8] {
        let x = p.as_array();
        let r = [reference.0, reference.1, reference.2];
        let mut low = [0.0; 3];
        let mut up = [0.0; 3];

        for a in 0..3 {
            low[a] = x[a] - (r[a] as f64 + 0.5) * self.delta[a];
            up[a] = self.delta[a] - low[a];
        }
        let inv_cell_volume = self.inv_delta[0] * self.inv_delta[1] * self.inv_delta[2];
        let mut w = [inv_cell_volume; 8];

        for (c, w) in w.iter_mut().enumerate() {
            *w *= if c & 4 != 0 { low[0] } else { up[0] };
            *w *= if c & 2 != 0 { low[1] } else { up[1] };
            *w *= if c & 1 != 0 { low[2] } else { up[2] };
        }
        w
    }


    /**
     * Return the eight corner cells of the interpolation box. On flat axes
     * (a single cell), the upper corner collapses onto the lower one.
     */
    fn box_corners(&self, reference: (usize, usize, usize)) -> [(usize, usize, usize); 8] {
        let (ni, nj, nk) = self.dim();
        let (i0, j0, k0) = reference;
        let i1 = if i0 + 1 < ni { i0 + 1 } else { i0 };
        let j1 = if j0 + 1 < nj { j0 + 1 } else { j0 };
        let k1 = if k0 + 1 < nk { k0 + 1 } else { k0 };
        let mut corners = [(0, 0, 0); 8];

        for (c, corner) in corners.iter_mut().enumerate() {
            *corner = (
                if c & 4 != 0 { i1 } else { i0 },
                if c & 2 != 0 { j1 } else { j0 },
                if c & 1 != 0 { k1 } else { k0 });
        }
        corners
    }


    fn data_interpol_set(&self, p: Vec3, reference: (usize, usize, usize)) -> WeightedSet {
        let w = self.interpolation_weights(p, reference);
        let mut ws: WeightedSet = self
            .box_corners(reference)
            .iter()
            .zip(w)
            .map(|(&corner, w)| (self.space.row_major_offset(corner), w))
            .collect();

        ws.unify();
        ws.eliminate_below_eps(10.0 * EPS, false, true);
        ws.adjust_weight_sum_shift(1.0);
        ws
    }


    /**
     * Compute tri-linear interpolation coefficients for the local point `p`,
     * if it lies in the donor-eligible region of this patch. The weights
     * sum to one.
     */
    pub fn compute_cc_data_interpol_coeffs(&self, p: Vec3) -> Option<WeightedSet> {
        if !self.metrics_ok {
            return None;
        }
        self.xyz_to_ref_inter_cell(p).map(|reference| self.data_interpol_set(p, reference))
    }


    /**
     * Same as `compute_cc_data_interpol_coeffs`, but over the full hull of
     * cell centers of this patch, ignoring the protection layers. This is
     * for lookups a patch makes into its own data.
     */
    pub fn compute_cc_data_interpol_coeffs_local(&self, p: Vec3) -> Option<WeightedSet> {
        if !self.metrics_ok {
            return None;
        }
        self.xyz_to_ref_cell(p).map(|reference| self.data_interpol_set(p, reference))
    }


    /**
     * Compute coefficients of the directional derivative along `n` (local
     * frame, normalized here) at the local point `p`: the central-difference
     * gradients at the eight surrounding cell centers, blended with the
     * tri-linear weights. The weights sum to zero.
     */
    pub fn compute_cc_grad1n_interpol_coeffs(&self, p: Vec3, n: Vec3) -> Option<WeightedSet> {
        if !self.metrics_ok {
            return None;
        }
        let reference = self.xyz_to_ref_inter_cell(p)?;
        let w = self.interpolation_weights(p, reference);
        let n = n.normalised().as_array();
        let mut d_dn = WeightedSet::new();
        let mut corner_d_dn = WeightedSet::new();

        for (&corner, w) in self.box_corners(reference).iter().zip(w) {
            corner_d_dn.clear();

            for a in 0..3 {
                if let Some((lo, hi, span)) = self.difference_cells(corner, a) {
                    let coeff = n[a] / (span * self.delta[a]);
                    corner_d_dn.push_back(hi, coeff);
                    corner_d_dn.push_back(lo, -coeff);
                }
            }
            d_dn.concatenate(&corner_d_dn, w);
        }
        d_dn.unify();
        d_dn.eliminate_below_eps(10.0 * EPS, true, true);
        d_dn.adjust_weight_sum_shift(0.0);
        Some(d_dn)
    }


    // ------------------------------------------------------------------------
    // Receive cells and neighbor dependencies


    /**
     * Determine the receive cells: every cell within the overlap layers of
     * any block face. Cells on edges and corners are listed once.
     */
    pub fn extract_receive_cells(&mut self) {
        let mut cells: Vec<usize> = Face::ALL
            .iter()
            .flat_map(|&face| (0..self.num_overlap_layers(face)).map(move |layer| (face, layer)))
            .flat_map(|(face, layer)| {
                let slab = self.space.face_layer(face, layer);
                slab.iter().map(|index| self.space.row_major_offset(index)).collect::<Vec<_>>()
            })
            .collect();

        cells.sort_unstable();
        cells.dedup();

        self.receive_cell_data_hits = vec![0; cells.len()];
        self.receive_cell_grad1n_hits = vec![0; cells.len()];
        self.receive_cells = cells;
        debug!("patch {}: {} receive cells", self.index, self.receive_cells.len());
    }


    pub fn receive_cells(&self) -> &[usize] {
        &self.receive_cells
    }

    /**
     * Return how many donors serve each receive cell with value data.
     */
    pub fn receive_cell_data_hits(&self) -> &[usize] {
        &self.receive_cell_data_hits
    }

    pub fn receive_cell_grad1n_hits(&self) -> &[usize] {
        &self.receive_cell_grad1n_hits
    }

    /**
     * Return the number of receive cells without any donor.
     */
    pub fn orphan_receive_cells(&self) -> usize {
        self.receive_cell_data_hits.iter().filter(|&&h| h == 0).count()
    }

    pub fn neighbours(&self) -> &[NeighbourDependency] {
        &self.neighbours
    }


    /**
     * Forget all neighbor dependencies and hit counts.
     */
    pub fn clear_dependencies(&mut self) {
        self.neighbours.clear();
        self.receive_cell_data_hits.iter_mut().for_each(|h| *h = 0);
        self.receive_cell_grad1n_hits.iter_mut().for_each(|h| *h = 0);
    }


    /**
     * Return the axis of the block face closest to a cell. Flat axes are
     * only chosen if all axes are flat.
     */
    pub fn bounding_normal_axis(&self, l: usize) -> Axis {
        let (ni, nj, nk) = self.dim();
        let (i, j, k) = self.ijk(l);
        let n = [ni, nj, nk];
        let index = [i, j, k];

        Axis::ALL
            .iter()
            .filter(|a| n[a.index()] > 1)
            .min_by_key(|a| {
                let c = index[a.index()];
                c.min(n[a.index()] - 1 - c)
            })
            .copied()
            .unwrap_or(Axis::I)
    }


    /**
     * Find interpolation coefficients in the `neighbour` patch for every
     * receive cell of this patch. `neighbour_index` is the neighbor's index
     * in the owning grid. Returns `None` unless at least one receive cell
     * found a donor there. This patch is not modified.
     */
    pub fn find_dependency(&self, neighbour_index: usize, neighbour: &CartesianPatch) -> Option<NeighbourDependency> {
        if !self.interpolate_data {
            return None;
        }
        let transform = self.transform.inverse().then(neighbour.transform());
        let normals = Axis::ALL.map(|a| transform.transfree(Vec3::unit(a)));
        let mut data = DonorTable::default();
        let mut grad1n = DonorTable::default();

        for (ll_rc, &l_rc) in self.receive_cells.iter().enumerate() {
            let xyz = transform.transform(self.xyz_cell(l_rc));

            if let Some(ws) = neighbour.compute_cc_data_interpol_coeffs(xyz) {
                data.push(ll_rc, ws);
            }
            if self.interpolate_grad1n {
                let axis = self.bounding_normal_axis(l_rc);

                if let Some(ws) = neighbour.compute_cc_grad1n_interpol_coeffs(xyz, normals[axis.index()]) {
                    grad1n.push(ll_rc, ws);
                }
            }
        }

        if data.is_empty() {
            return None;
        }
        debug!("patch {} <- patch {}: {} receive cells served", self.index, neighbour_index, data.len());

        Some(NeighbourDependency {
            donor: neighbour_index,
            transform,
            data,
            grad1n,
        })
    }


    /**
     * Find and record the dependency of this patch on `neighbour`, counting
     * a hit for every receive cell served. Returns whether the neighbor
     * donates anything.
     */
    pub fn compute_dependencies(&mut self, neighbour_index: usize, neighbour: &CartesianPatch) -> bool {
        match self.find_dependency(neighbour_index, neighbour) {
            Some(dependency) => {
                self.add_dependency(dependency);
                true
            }
            None => false,
        }
    }


    fn add_dependency(&mut self, dependency: NeighbourDependency) {
        for ll_rc in dependency.data.receive_slots() {
            self.receive_cell_data_hits[ll_rc] += 1
        }
        for ll_rc in dependency.grad1n.receive_slots() {
            self.receive_cell_grad1n_hits[ll_rc] += 1
        }
        self.neighbours.push(dependency)
    }


    /**
     * Replace all neighbor dependencies by the given ones, and finalize
     * them.
     */
    pub fn set_dependencies(&mut self, dependencies: Vec<NeighbourDependency>) {
        self.clear_dependencies();

        for dependency in dependencies {
            self.add_dependency(dependency)
        }
        self.finalize_dependencies();
    }


    /**
     * Pack all dependency tables for replay, ordered by donor and receive
     * cell.
     */
    pub fn finalize_dependencies(&mut self) {
        self.neighbours.sort_by_key(|n| n.donor);

        for n in &mut self.neighbours {
            n.data.finalize();
            n.grad1n.finalize();
        }
    }


    // ------------------------------------------------------------------------
    // Donor data exchange


    /**
     * Evaluate the donor data of `field` for all receive cells, reading the
     * donor patches from `patches` (the full patch list of the grid). The
     * result goes into `out`, variable-interleaved per receive cell. A
     * receive cell served by several donors gets their average; cells
     * without donors are left as zeros and counted as skipped.
     */
    pub fn gather_donor_data(&self, field: usize, patches: &[CartesianPatch], out: &mut Vec<f64>) -> SyncReport {
        self.gather(field, patches, out, |n| &n.data, &self.receive_cell_data_hits)
    }


    /**
     * Evaluate the boundary-normal derivatives of `field` at all receive
     * cells, in the same layout as `gather_donor_data`.
     */
    pub fn gather_donor_grad1n(&self, field: usize, patches: &[CartesianPatch], out: &mut Vec<f64>) -> SyncReport {
        self.gather(field, patches, out, |n| &n.grad1n, &self.receive_cell_grad1n_hits)
    }


    fn gather<F>(&self, field: usize, patches: &[CartesianPatch], out: &mut Vec<f64>, table: F, hits: &[usize]) -> SyncReport
    where
        F: Fn(&NeighbourDependency) -> &DonorTable
    {
        let nv = self.num_variables;
        out.clear();
        out.resize(self.receive_cells.len() * nv, 0.0);

        for n in &self.neighbours {
            let donor = &patches[n.donor];

            for v in 0..nv {
                let src = donor.variable(field, v);

                for (ll_rc, cells, weights) in table(n).iter() {
                    let value: f64 = cells.iter().zip(weights).map(|(&l, &w)| w * src[l]).sum();
                    out[ll_rc * nv + v] += value;
                }
            }
        }

        let mut report = SyncReport::default();

        for (ll_rc, &h) in hits.iter().enumerate() {
            if h == 0 {
                report.cells_skipped += 1;
            } else {
                report.cells_updated += 1;
                if h > 1 {
                    let scale = 1.0 / h as f64;
                    out[ll_rc * nv..(ll_rc + 1) * nv].iter_mut().for_each(|x| *x *= scale);
                }
            }
        }
        report
    }


    /**
     * Write gathered donor data into the receive cells of `field`. Receive
     * cells without donors keep their previous values.
     */
    pub fn scatter_received(&mut self, field: usize, values: &[f64]) {
        let nv = self.num_variables;

        for v in 0..nv {
            let start = self.variable_offset(field, v);

            for (ll_rc, &l_rc) in self.receive_cells.iter().enumerate() {
                if self.receive_cell_data_hits[ll_rc] > 0 {
                    self.data[start + l_rc] = values[ll_rc * nv + v];
                }
            }
        }
    }
}





/**
 * A patch with its field data open for writing and everything else
 * read-only. Grid-wide sweeps hand patches out this way, so that they can
 * never change geometry behind the back of the grid's dependencies.
 */
pub struct PatchDataMut<'a> {
    patch: &'a mut CartesianPatch,
}

impl<'a> PatchDataMut<'a> {

    pub fn new(patch: &'a mut CartesianPatch) -> Self {
        Self { patch }
    }

    pub fn variable_mut(&mut self, field: usize, var: usize) -> &mut [f64] {
        self.patch.variable_mut(field, var)
    }
}

impl Deref for PatchDataMut<'_> {
    type Target = CartesianPatch;

    fn deref(&self) -> &CartesianPatch {
        self.patch
    }
}
