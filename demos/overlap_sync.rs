use clap::Parser;
use log::{info, warn, LevelFilter};
use patchgrid::{CartesianPatch, GridSettings, PatchGrid, Vec3};
use patchgrid::runge_kutta::RungeKutta;
use simple_logger::SimpleLogger;




/**
 * Advect a smooth pulse along x through two overlapping flat blocks, and
 * log how many receive cells each time step refreshes from donors.
 */
#[derive(Debug, Parser)]
#[clap(version = "0.1", author = "J. Zrake <jzrake@clemson.edu>")]
struct Opts {
    #[clap(short = 'n', long, default_value = "20")]
    cells_per_block: usize,

    #[clap(short = 'o', long, default_value = "0.4")]
    overlap: f64,

    #[clap(short = 's', long, default_value = "10")]
    num_steps: usize,

    #[clap(long, default_value = "0.5")]
    cfl: f64,

    #[clap(long)]
    output: Option<String>,

    #[clap(short = 'v', long)]
    verbose: bool,
}




// ============================================================================
fn pulse(x: f64) -> f64 {
    (-((x - 0.8) / 0.2).powi(2)).exp()
}




// ============================================================================
fn flat_block(n: usize, x0: f64) -> CartesianPatch {
    let mut patch = CartesianPatch::aligned((n, n, 1), Vec3::new(x0, 0.0, 0.0), Vec3::new(x0 + 1.0, 1.0, 1.0 / n as f64));
    patch.set_num_protect_exception(2, 2, 2, 2, 0, 0);
    patch.set_num_overlap_exception(2, 2, 2, 2, 0, 0);
    patch
}




// ============================================================================
fn upwind_sweep(grid: &mut PatchGrid, dt: f64) {
    grid.for_each_patch(|patch| {
        let dx = patch.cell_spacing().x;
        let (ni, nj, nk) = patch.dim();
        let mut new = patch.variable(1, 0).to_vec();
        let u = patch.variable(0, 0);

        for i in 1..ni {
            for j in 0..nj {
                for k in 0..nk {
                    let l = patch.cell(i, j, k);
                    let m = patch.cell(i - 1, j, k);
                    new[l] -= dt * (u[l] - u[m]) / dx;
                }
            }
        }
        patch.variable_mut(0, 0).copy_from_slice(&new);
    });
}




// ============================================================================
fn main() -> patchgrid::Result<()> {
    let opts = Opts::parse();

    let level = if opts.verbose { LevelFilter::Debug } else { LevelFilter::Info };

    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("{}", e);
    }

    let settings = GridSettings { num_variables: 1, ..GridSettings::default() };
    let n = opts.cells_per_block;
    let mut grid = PatchGrid::new(settings);

    for x0 in [0.0, 1.0 - opts.overlap] {
        grid.insert_patch(flat_block(n, x0));
    }

    let report = grid.compute_dependencies()?;
    info!("{:?}", report);

    if report.donor_edges == 0 {
        warn!("the blocks do not exchange any data; try a larger overlap");
    }

    grid.for_each_patch(|patch| {
        let u: Vec<f64> = (0..patch.num_cells()).map(|l| pulse(patch.xyzo_cell(l).x)).collect();
        patch.variable_mut(0, 0).copy_from_slice(&u);
    });

    let mut rk = RungeKutta::low_storage_4();
    rk.add_sync_field(0);
    let dt = opts.cfl * grid.compute_min_ch_length();

    for step in 0..opts.num_steps {
        let sync = rk.advance(&mut grid, dt, upwind_sweep)?;
        info!("[{}] t={:.4} {:?}", step + 1, (step + 1) as f64 * dt, sync);
    }

    if let Some(base) = &opts.output {
        grid.write_data(base, opts.num_steps)?;
    }
    Ok(())
}
