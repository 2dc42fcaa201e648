use log::{debug, info};
use rayon::prelude::*;
use crate::error::{Error, Result};
use crate::geometry::Vec3;
use crate::patch::CartesianPatch;
use crate::patch_grid::PatchGrid;
use crate::weighted_set::FixedWeights;

/// Tolerance of the sign test, relative to the level-set range on a patch
const SIGN_EPS: f64 = 1e-7;




/**
 * A signed distance to an immersed boundary: negative inside the blocked
 * region, positive in the fluid.
 */
pub trait LevelSetDefinition: Send + Sync {
    fn calc_distance(&self, p: Vec3) -> f64;
}

impl<F> LevelSetDefinition for F where F: Fn(Vec3) -> f64 + Send + Sync {
    fn calc_distance(&self, p: Vec3) -> f64 {
        self(p)
    }
}




/**
 * A plane through `point`; the fluid is on the side `normal` points to.
 */
#[derive(Clone, Debug)]
pub struct LevelSetPlane {
    pub point: Vec3,
    pub normal: Vec3,
}

impl LevelSetDefinition for LevelSetPlane {
    fn calc_distance(&self, p: Vec3) -> f64 {
        (p - self.point).dot(self.normal.normalised())
    }
}




/**
 * A solid sphere.
 */
#[derive(Clone, Debug)]
pub struct LevelSetSphere {
    pub center: Vec3,
    pub radius: f64,
}

impl LevelSetDefinition for LevelSetSphere {
    fn calc_distance(&self, p: Vec3) -> f64 {
        (p - self.center).norm() - self.radius
    }
}




/**
 * A cell of a layer next to the zero level. The gradient is the normalized
 * level-set gradient in the patch-local frame. On the inner side, the cell
 * also carries interpolation coefficients, into its own patch, for the
 * mirror point: the cell center reflected through the interface.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct LayerCell {
    pub cell: usize,
    pub g: f64,
    pub gradient: Vec3,
    pub mirror: Option<FixedWeights<8>>,
}

impl LayerCell {
    /**
     * Interpolate a variable array of the cell's patch at the mirror point.
     */
    pub fn mirror_value(&self, data: &[f64]) -> Option<f64> {
        self.mirror.as_ref().map(|m| m.evaluate(data))
    }
}




#[derive(Clone, Debug, Default)]
struct PatchLayers {
    inner: Vec<Vec<LayerCell>>,
    outer: Vec<Vec<LayerCell>>,
}




/**
 * Layers of cells on both sides of an immersed boundary given by a level
 * set. The level set is sampled into one variable of one field of every
 * patch, and the layers are rebuilt from scratch on every `update`.
 */
pub struct LevelSetObject<D> {
    definition: D,
    field: usize,
    var: usize,
    num_inner_layers: usize,
    num_outer_layers: usize,
    min_inner_rel_dist: f64,
    layers: Vec<PatchLayers>,
    affected_patches: Vec<usize>,
    fully_black_patches: Vec<usize>,
}




// ============================================================================
impl<D: LevelSetDefinition> LevelSetObject<D> {


    /**
     * Create a level-set object sampling into variable `var` of field
     * `field`. A layer-0 inner cell whose level-set value is closer to zero
     * than `min_inner_rel_dist` times half the level-set spread over its
     * face neighbors is replaced by its deeper neighbors. The same
     * correction on the outer side is not available; a positive
     * `min_outer_rel_dist` is an error.
     */
    pub fn new(
        definition: D,
        field: usize,
        var: usize,
        num_inner_layers: usize,
        num_outer_layers: usize,
        min_inner_rel_dist: f64,
        min_outer_rel_dist: f64) -> Result<Self>
    {
        if min_outer_rel_dist > 0.0 {
            return Err(Error::OuterLayerCorrectionUnimplemented);
        }
        Ok(Self {
            definition,
            field,
            var,
            num_inner_layers,
            num_outer_layers,
            min_inner_rel_dist,
            layers: Vec::new(),
            affected_patches: Vec::new(),
            fully_black_patches: Vec::new(),
        })
    }


    /**
     * Sample the level set at every cell center of the grid, classify the
     * patches, and rebuild the cell layers.
     */
    pub fn update(&mut self, grid: &mut PatchGrid) {
        let (field, var) = (self.field, self.var);
        let definition = &self.definition;

        grid.for_each_patch(|patch| {
            let g: Vec<f64> = (0..patch.num_cells())
                .map(|l| definition.calc_distance(patch.xyzo_cell(l)))
                .collect();
            patch.variable_mut(field, var).copy_from_slice(&g);
        });

        self.affected_patches.clear();
        self.fully_black_patches.clear();

        for (n, patch) in grid.patches().iter().enumerate() {
            let g = patch.variable(field, var);

            if g.iter().any(|&x| x < 0.0) {
                self.affected_patches.push(n)
            }
            if g.iter().all(|&x| x <= 0.0) {
                self.fully_black_patches.push(n)
            }
        }
        self.extract_b_cell_layers(grid);

        info!("level set: {} affected patches, {} fully black, {} inner and {} outer layer cells",
            self.affected_patches.len(),
            self.fully_black_patches.len(),
            self.layers.iter().flat_map(|l| &l.inner).map(Vec::len).sum::<usize>(),
            self.layers.iter().flat_map(|l| &l.outer).map(Vec::len).sum::<usize>());
    }


    /**
     * Rebuild the inner and outer cell layers of every patch from the
     * level-set values currently stored in the grid.
     */
    pub fn extract_b_cell_layers(&mut self, grid: &PatchGrid) {
        self.layers = grid
            .patches()
            .par_iter()
            .map(|patch| self.extract_patch_layers(patch))
            .collect();
    }


    fn extract_patch_layers(&self, patch: &CartesianPatch) -> PatchLayers {
        let g = patch.variable(self.field, self.var);
        let mut marker = vec![false; g.len()];
        let mut neighbours = Vec::with_capacity(6);
        let mut inner: Vec<Vec<usize>> = vec![Vec::new(); self.num_inner_layers];
        let mut outer: Vec<Vec<usize>> = vec![Vec::new(); self.num_outer_layers];

        let g_min = g.iter().cloned().fold(f64::INFINITY, f64::min);
        let g_max = g.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let eps = (g_max - g_min) * SIGN_EPS;

        for l in 0..g.len() {
            patch.cell_over_face_neighbours(l, &mut neighbours);

            let crossing = neighbours.iter().any(|&n| {
                (g[n] + eps) * (g[l] - eps) < 0.0 || (g[n] - eps) * (g[l] + eps) < 0.0
            });
            if crossing {
                marker[l] = true;

                if g[l] < 0.0 {
                    if let Some(layer) = inner.first_mut() {
                        layer.push(l)
                    }
                } else if let Some(layer) = outer.first_mut() {
                    layer.push(l)
                }
            }
        }

        if self.min_inner_rel_dist > 0.0 {
            if let Some(layer) = inner.first_mut() {
                self.enforce_min_inner_distance(patch, g, layer, &mut marker);
            }
        }
        grow_layers(patch, g, &mut inner, &mut marker, |x| x < 0.0);
        grow_layers(patch, g, &mut outer, &mut marker, |x| x > 0.0);

        PatchLayers {
            inner: inner.iter().map(|layer| {
                layer.iter().filter_map(|&l| self.inner_cell(patch, g, l)).collect()
            }).collect(),
            outer: outer.iter().map(|layer| {
                layer.iter().map(|&l| self.outer_cell(patch, g, l)).collect()
            }).collect(),
        }
    }


    /**
     * Evict layer cells too close to the zero level, replacing each by its
     * unmarked face neighbors with lower level-set values. Replacements are
     * appended to the layer and checked in turn; passes repeat until one
     * evicts nothing.
     */
    fn enforce_min_inner_distance(&self, patch: &CartesianPatch, g: &[f64], layer: &mut Vec<usize>, marker: &mut [bool]) {
        let mut neighbours = Vec::with_capacity(6);
        let mut replacements = 0;

        loop {
            let mut evicted = 0;
            let mut n = 0;

            while n < layer.len() {
                let l = layer[n];
                patch.cell_over_face_neighbours(l, &mut neighbours);

                if neighbours.is_empty() {
                    n += 1;
                    continue;
                }
                let min_g = neighbours.iter().map(|&m| g[m]).fold(f64::INFINITY, f64::min);
                let max_g = neighbours.iter().map(|&m| g[m]).fold(f64::NEG_INFINITY, f64::max);
                let min_distance = self.min_inner_rel_dist * 0.5 * (max_g - min_g);

                if g[l] > -min_distance {
                    layer.remove(n);
                    marker[l] = false;
                    evicted += 1;

                    for &m in &neighbours {
                        if !marker[m] && g[m] < g[l] {
                            layer.push(m);
                            marker[m] = true;
                        }
                    }
                } else {
                    n += 1;
                }
            }
            replacements += evicted;

            if evicted == 0 {
                break;
            }
        }
        debug!("patch {}: {} inner layer cell replacements", patch.index(), replacements);
    }


    fn unit_gradient(&self, patch: &CartesianPatch, l: usize) -> Vec3 {
        patch.compute_nabla_var(self.field, self.var, l).normalised()
    }


    fn inner_cell(&self, patch: &CartesianPatch, g: &[f64], l: usize) -> Option<LayerCell> {
        let gradient = self.unit_gradient(patch, l);
        let mirror_point = patch.xyz_cell(l) + gradient * (-2.0 * g[l]);
        let mirror = patch
            .compute_cc_data_interpol_coeffs_local(mirror_point)?
            .transfer_to_fixed_arrays::<8>()?;

        Some(LayerCell {
            cell: l,
            g: g[l],
            gradient,
            mirror: Some(mirror),
        })
    }


    fn outer_cell(&self, patch: &CartesianPatch, g: &[f64], l: usize) -> LayerCell {
        LayerCell {
            cell: l,
            g: g[l],
            gradient: self.unit_gradient(patch, l),
            mirror: None,
        }
    }


    pub fn definition(&self) -> &D {
        &self.definition
    }

    /**
     * Return the inner layers (index 0 next to the interface) of a patch.
     */
    pub fn inner_layers(&self, patch: usize) -> &[Vec<LayerCell>] {
        self.layers.get(patch).map_or(&[][..], |l| l.inner.as_slice())
    }

    /**
     * Return the outer layers (index 0 next to the interface) of a patch.
     */
    pub fn outer_layers(&self, patch: usize) -> &[Vec<LayerCell>] {
        self.layers.get(patch).map_or(&[][..], |l| l.outer.as_slice())
    }

    /**
     * Return the patches with at least one cell inside the blocked region.
     */
    pub fn affected_patches(&self) -> &[usize] {
        &self.affected_patches
    }

    /**
     * Return the patches with no cell in the fluid.
     */
    pub fn fully_black_patches(&self) -> &[usize] {
        &self.fully_black_patches
    }
}




/**
 * Build layers 1.. by breadth-first growth from the layer before, over
 * unmarked face neighbors on the given side of the interface.
 */
fn grow_layers<F>(patch: &CartesianPatch, g: &[f64], layers: &mut [Vec<usize>], marker: &mut [bool], side: F)
where
    F: Fn(f64) -> bool
{
    let mut neighbours = Vec::with_capacity(6);

    for n in 1..layers.len() {
        let (below, above) = layers.split_at_mut(n);
        let next = &mut above[0];

        for &l in &below[n - 1] {
            patch.cell_over_face_neighbours(l, &mut neighbours);

            for &m in &neighbours {
                if !marker[m] && side(g[m]) {
                    next.push(m);
                    marker[m] = true;
                }
            }
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{LevelSetObject, LevelSetPlane, LevelSetSphere};
    use crate::config::GridSettings;
    use crate::error::Error;
    use crate::geometry::Vec3;
    use crate::patch::CartesianPatch;
    use crate::patch_grid::PatchGrid;

    fn unit_grid() -> PatchGrid {
        let mut grid = PatchGrid::new(GridSettings { num_variables: 2, ..GridSettings::default() });
        grid.insert_patch(CartesianPatch::aligned((10, 10, 10), Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)));
        grid
    }

    fn plane() -> LevelSetPlane {
        LevelSetPlane {
            point: Vec3::new(0.5, 0.0, 0.0),
            normal: Vec3::new(1.0, 0.0, 0.0),
        }
    }

    #[test]
    fn outer_distance_correction_is_rejected() {
        assert!(matches!(
            LevelSetObject::new(plane(), 0, 1, 2, 2, 0.0, 0.5),
            Err(Error::OuterLayerCorrectionUnimplemented)));
    }

    #[test]
    fn flat_interface_gives_the_two_straddling_columns() {
        let mut grid = unit_grid();
        let mut object = LevelSetObject::new(plane(), 0, 1, 2, 2, 0.0, 0.0).unwrap();
        object.update(&mut grid);
        let patch = grid.patch(0);

        let inner = &object.inner_layers(0)[0];
        let outer = &object.outer_layers(0)[0];
        assert_eq!(inner.len(), 100);
        assert_eq!(outer.len(), 100);
        assert!(inner.iter().all(|c| patch.ijk(c.cell).0 == 4));
        assert!(outer.iter().all(|c| patch.ijk(c.cell).0 == 5));

        for c in inner.iter().chain(outer) {
            assert!((c.gradient - Vec3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        }
        assert!(object.inner_layers(0)[1].iter().all(|c| patch.ijk(c.cell).0 == 3));
        assert!(object.outer_layers(0)[1].iter().all(|c| patch.ijk(c.cell).0 == 6));
        assert_eq!(object.affected_patches(), &[0]);
        assert!(object.fully_black_patches().is_empty());
    }

    #[test]
    fn mirror_points_reflect_through_the_interface() {
        let mut grid = unit_grid();
        let mut object = LevelSetObject::new(plane(), 0, 1, 2, 1, 0.0, 0.0).unwrap();
        object.update(&mut grid);

        grid.for_each_patch(|p| {
            for l in 0..p.num_cells() {
                let x = p.xyz_cell(l).x;
                p.variable_mut(1, 0)[l] = x;
            }
        });
        let patch = grid.patch(0);

        for c in &object.inner_layers(0)[0] {
            let mirrored = c.mirror_value(patch.variable(1, 0)).unwrap();
            assert!((mirrored - 0.55).abs() < 1e-9);
        }
        for c in &object.inner_layers(0)[1] {
            let mirrored = c.mirror_value(patch.variable(1, 0)).unwrap();
            assert!((mirrored - 0.65).abs() < 1e-9);
        }
        assert!(object.outer_layers(0)[0].iter().all(|c| c.mirror.is_none()));
    }

    #[test]
    fn inner_cells_too_close_to_the_interface_are_replaced() {
        let mut grid = unit_grid();
        let mut object = LevelSetObject::new(plane(), 0, 1, 2, 1, 1.2, 0.0).unwrap();
        object.update(&mut grid);
        let patch = grid.patch(0);

        let layer0 = &object.inner_layers(0)[0];
        assert_eq!(layer0.len(), 100);
        assert!(layer0.iter().all(|c| patch.ijk(c.cell).0 == 3));
        assert!(object.inner_layers(0)[1].iter().all(|c| [2, 4].contains(&patch.ijk(c.cell).0)));
    }

    #[test]
    fn inner_mirror_points_outside_the_patch_are_dropped() {
        let mut grid = unit_grid();
        let plane = LevelSetPlane {
            point: Vec3::new(0.07, 0.0, 0.0),
            normal: Vec3::new(-1.0, 0.0, 0.0),
        };
        let mut object = LevelSetObject::new(plane, 0, 1, 1, 1, 0.0, 0.0).unwrap();
        object.update(&mut grid);
        assert_eq!(object.outer_layers(0)[0].len(), 100);
        assert!(object.inner_layers(0)[0].is_empty());
    }

    #[test]
    fn sphere_layers_have_unit_gradients() {
        let mut grid = unit_grid();
        let sphere = LevelSetSphere { center: Vec3::new(0.5, 0.5, 0.5), radius: 0.3 };
        let mut object = LevelSetObject::new(sphere, 0, 0, 1, 2, 0.0, 0.0).unwrap();
        object.update(&mut grid);

        assert!(!object.inner_layers(0)[0].is_empty());
        assert!(!object.outer_layers(0)[1].is_empty());
        for c in object.inner_layers(0)[0].iter().chain(&object.outer_layers(0)[0]) {
            assert!((c.gradient.norm() - 1.0).abs() < 1e-12);
            assert!(c.g.abs() < 0.1 * 3f64.sqrt());
        }
        for c in &object.inner_layers(0)[0] {
            assert!(c.g < 0.0);
        }
    }

    #[test]
    fn closures_define_level_sets() {
        let mut grid = unit_grid();
        let mut object = LevelSetObject::new(|p: Vec3| -1.0 - p.x, 0, 0, 1, 1, 0.0, 0.0).unwrap();
        object.update(&mut grid);
        assert_eq!(object.fully_black_patches(), &[0]);
        assert!(object.inner_layers(0)[0].is_empty());
    }
}
