use log::debug;
use crate::error::Result;
use crate::patch_grid::PatchGrid;
use crate::stats::SyncReport;




/**
 * An operation applied to the grid after every stage, typically a boundary
 * condition.
 */
pub trait PostOperation {
    fn apply(&self, grid: &mut PatchGrid);
}

impl<F> PostOperation for F where F: Fn(&mut PatchGrid) {
    fn apply(&self, grid: &mut PatchGrid) {
        self(grid)
    }
}




/**
 * A low-storage Runge-Kutta stage driver for a patch grid. Field 0 holds
 * the new state and field 1 the old state; the flux sweep is supplied by the
 * caller. Before each stage, and once after the last one, the registered
 * sync fields are refreshed from their donors, so each stage reads the
 * neighbor state left behind by the stage before. The post operations run
 * after every stage, in the order they were added.
 */
pub struct RungeKutta {
    alpha: Vec<f64>,
    sync_fields: Vec<usize>,
    post_operations: Vec<Box<dyn PostOperation>>,
}




// ============================================================================
impl RungeKutta {


    pub fn new(alpha: Vec<f64>) -> Self {
        Self {
            alpha,
            sync_fields: Vec::new(),
            post_operations: Vec::new(),
        }
    }


    /**
     * The four-stage scheme with coefficients 1/4, 1/3, 1/2, 1; fourth order
     * for linear problems.
     */
    pub fn low_storage_4() -> Self {
        Self::new(vec![0.25, 1.0 / 3.0, 0.5, 1.0])
    }


    /**
     * Register a field whose receive cells are refreshed between stages.
     */
    pub fn add_sync_field(&mut self, field: usize) {
        if !self.sync_fields.contains(&field) {
            self.sync_fields.push(field)
        }
    }

    pub fn add_post_operation<P: PostOperation + 'static>(&mut self, operation: P) {
        self.post_operations.push(Box::new(operation))
    }

    pub fn sync_fields(&self) -> &[usize] {
        &self.sync_fields
    }

    pub fn alpha(&self) -> &[f64] {
        &self.alpha
    }


    fn sync(&self, grid: &mut PatchGrid) -> Result<SyncReport> {
        self.sync_fields
            .iter()
            .try_fold(SyncReport::default(), |report, &field| {
                Ok(report.merge(grid.access_all_donor_data(field)?))
            })
    }


    /**
     * Advance the grid by one time step `dt`. The sweep is called once per
     * stage with the grid and the stage time step `alpha * dt`; it must
     * compute field 0 from field 1. Returns the combined sync counters.
     */
    pub fn advance<F>(&self, grid: &mut PatchGrid, dt: f64, mut sweep: F) -> Result<SyncReport>
    where
        F: FnMut(&mut PatchGrid, f64)
    {
        let mut report = self.sync(grid)?;
        grid.copy_field(0, 1);

        for (stage, &alpha) in self.alpha.iter().enumerate() {
            report = report.merge(self.sync(grid)?);
            sweep(grid, alpha * dt);

            for operation in &self.post_operations {
                operation.apply(grid);
            }
            debug!("stage {} done, dt = {}", stage, alpha * dt);
        }
        report = report.merge(self.sync(grid)?);
        Ok(report)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use std::cell::Cell;
    use std::rc::Rc;
    use super::RungeKutta;
    use crate::config::GridSettings;
    use crate::error::Error;
    use crate::geometry::Vec3;
    use crate::patch::CartesianPatch;
    use crate::patch_grid::PatchGrid;

    fn grid() -> PatchGrid {
        let mut grid = PatchGrid::new(GridSettings { num_variables: 1, ..GridSettings::default() });
        grid.insert_patch(CartesianPatch::aligned((10, 10, 10), Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)));
        grid.insert_patch(CartesianPatch::aligned((10, 10, 10), Vec3::new(0.6, 0.0, 0.0), Vec3::new(1.6, 1.0, 1.0)));
        grid
    }

    #[test]
    fn decay_is_integrated_with_fourth_order_accuracy() {
        let mut grid = grid();
        grid.compute_dependencies().unwrap();
        grid.set_field_to_const(0, &[1.0]);

        let mut rk = RungeKutta::low_storage_4();
        rk.add_sync_field(0);
        rk.add_sync_field(0);
        assert_eq!(rk.sync_fields(), &[0]);
        assert_eq!(rk.alpha(), &[0.25, 1.0 / 3.0, 0.5, 1.0]);

        let dt = 0.1;
        let mut stages = 0;
        let report = rk.advance(&mut grid, dt, |grid, dt_stage| {
            stages += 1;
            grid.for_each_patch(|patch| {
                let n = patch.num_cells();
                for l in 0..n {
                    let old = patch.variable(1, 0)[l];
                    let new = patch.variable(0, 0)[l];
                    patch.variable_mut(0, 0)[l] = old - dt_stage * new;
                }
            });
        }).unwrap();

        assert_eq!(stages, 4);
        assert_eq!(report.cells_updated, 6 * grid.patches().iter().map(|p| p.receive_cell_data_hits().iter().filter(|&&h| h > 0).count()).sum::<usize>());
        let exact = (-dt).exp();
        for patch in grid.patches() {
            assert!(patch.variable(0, 0).iter().all(|&u| (u - exact).abs() < 1e-6));
        }
    }

    #[test]
    fn post_operations_run_after_every_stage() {
        let mut grid = grid();
        grid.compute_dependencies().unwrap();
        grid.set_field_to_const(0, &[1.0]);

        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut rk = RungeKutta::low_storage_4();
        rk.add_sync_field(0);
        rk.add_post_operation(move |grid: &mut PatchGrid| {
            counter.set(counter.get() + 1);
            grid.patch_data_mut(0, 0, 0)[0] = 0.5;
        });

        rk.advance(&mut grid, 0.1, |grid, dt_stage| {
            grid.for_each_patch(|patch| {
                for l in 0..patch.num_cells() {
                    let old = patch.variable(1, 0)[l];
                    let new = patch.variable(0, 0)[l];
                    patch.variable_mut(0, 0)[l] = old - dt_stage * new;
                }
            });
        }).unwrap();

        assert_eq!(calls.get(), 4);
        assert_eq!(grid.patch(0).variable(0, 0)[0], 0.5);
        assert!(grid.patch(0).variable(0, 0)[1] < 1.0);
    }

    #[test]
    fn stale_dependencies_stop_the_step() {
        let mut grid = grid();
        let mut rk = RungeKutta::low_storage_4();
        rk.add_sync_field(0);
        assert!(matches!(rk.advance(&mut grid, 0.1, |_, _| {}), Err(Error::StaleDependencies)));
    }
}
