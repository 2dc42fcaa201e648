use clap::Parser;
use log::{info, LevelFilter};
use patchgrid::GridSettings;
use patchgrid::grid_file::read_grid;
use simple_logger::SimpleLogger;




/**
 * Read a grid description file, build its dependencies, and print a
 * summary of the donor relationships.
 */
#[derive(Debug, Parser)]
#[clap(version = "0.1", author = "J. Zrake <jzrake@clemson.edu>")]
struct Opts {
    #[clap(default_value = "demos/two_blocks.grid")]
    grid_file: String,

    #[clap(long, default_value = "1.0")]
    io_scale: f64,

    #[clap(long, default_value = "2")]
    protect_layers: usize,

    #[clap(long, default_value = "2")]
    overlap_layers: usize,

    #[clap(long)]
    grad1n: bool,
}




// ============================================================================
fn main() {
    let opts = Opts::parse();

    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).init() {
        eprintln!("{}", e);
    }

    let settings = GridSettings {
        num_protect_layers: opts.protect_layers,
        num_overlap_layers: opts.overlap_layers,
        interpolate_grad1n: opts.grad1n,
        io_scale: opts.io_scale,
        ..GridSettings::default()
    };

    let result = read_grid(&opts.grid_file, settings).and_then(|mut grid| {
        let report = grid.compute_dependencies()?;

        for patch in grid.patches() {
            let (ni, nj, nk) = patch.dim();
            info!("patch {} '{}' ({} {} {}): donors {:?}, {} of {} receive cells orphaned",
                patch.index(),
                patch.comment(),
                ni, nj, nk,
                grid.donor_graph().donors_of(patch.index()).collect::<Vec<_>>(),
                patch.orphan_receive_cells(),
                patch.receive_cells().len());
        }
        Ok(report)
    });

    match result {
        Ok(report) => info!("{:?}", report),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
