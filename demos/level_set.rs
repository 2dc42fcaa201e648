use clap::Parser;
use log::{info, LevelFilter};
use patchgrid::{CartesianPatch, GridSettings, LevelSetObject, LevelSetSphere, PatchGrid, Vec3};
use simple_logger::SimpleLogger;




/**
 * Extract the boundary cell layers of a sphere immersed in a single block,
 * and check how well the mirror-point interpolation reflects the level set.
 */
#[derive(Debug, Parser)]
#[clap(version = "0.1", author = "J. Zrake <jzrake@clemson.edu>")]
struct Opts {
    #[clap(short = 'n', long, default_value = "32")]
    num_cells: usize,

    #[clap(short = 'r', long, default_value = "0.3")]
    radius: f64,

    #[clap(long, default_value = "2")]
    inner_layers: usize,

    #[clap(long, default_value = "2")]
    outer_layers: usize,

    #[clap(long, default_value = "0.0")]
    min_inner_rel_dist: f64,
}




// ============================================================================
fn main() -> patchgrid::Result<()> {
    let opts = Opts::parse();

    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).init() {
        eprintln!("{}", e);
    }

    let n = opts.num_cells;
    let mut grid = PatchGrid::new(GridSettings::default());
    grid.insert_patch(CartesianPatch::aligned((n, n, n), Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5)));

    let sphere = LevelSetSphere { center: Vec3::default(), radius: opts.radius };
    let mut object = LevelSetObject::new(sphere, 0, 0, opts.inner_layers, opts.outer_layers, opts.min_inner_rel_dist, 0.0)?;
    object.update(&mut grid);

    let patch = grid.patch(0);
    let g = patch.variable(0, 0);

    for (n, layer) in object.inner_layers(0).iter().enumerate() {
        let error = layer
            .iter()
            .filter_map(|c| c.mirror_value(g).map(|m| (m + c.g).abs()))
            .fold(0.0, f64::max);
        info!("inner layer {}: {} cells, mirror level set error {:.3e}", n, layer.len(), error);
    }
    for (n, layer) in object.outer_layers(0).iter().enumerate() {
        info!("outer layer {}: {} cells", n, layer.len());
    }
    Ok(())
}
