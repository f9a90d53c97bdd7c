//! Jacobi solver for the Poisson equation on a uniformly refined octree grid.
//!
//! Solves `-Δu = f` on the unit cube with the manufactured solution
//! `u = cos(πx) cos(πy) cos(πz)`, using the cell grid's 6-face neighborhood.
//! Cells missing a neighbor hold their initial value, which pins the
//! boundary to the exact solution.

use std::f64::consts::PI;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use amr_octree::io::export_cell_grid;
use amr_octree::{AdjacencyOffset, CellGrid, CellOctree, Error, Result, NO_NEIGHBOR};

const FACE_NEIGHBORHOOD: [AdjacencyOffset; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

/// Jacobi Poisson solver on a uniformly refined octree grid.
#[derive(Parser, Debug)]
#[command(name = "poisson")]
#[command(about = "Runs Jacobi sweeps for the Poisson equation and writes the result")]
struct Args {
    /// Refinement level of the uniform grid.
    refinement_level: usize,

    /// Maximum number of Jacobi sweeps.
    max_iterations: usize,

    /// Residual norm threshold; must be positive.
    epsilon: f64,

    /// Path of the output file.
    output_file: PathBuf,
}

fn eval_phi(position: [f64; 3]) -> f64 {
    (PI * position[0]).cos() * (PI * position[1]).cos() * (PI * position[2]).cos()
}

fn initialise(cells: &CellGrid, u: &mut [f64], f: &mut [f64]) {
    for cell in cells {
        let center = cell.center();
        f[cell.ordinal()] = 3.0 * PI * PI * eval_phi(center);
        u[cell.ordinal()] = eval_phi(center);
    }
}

fn residual_norm(
    cells: &CellGrid,
    u: &[f64],
    f: &[f64],
    residual: &mut [f64],
    spacing: f64,
) -> Result<f64> {
    let mut sum = 0.0;

    for cell in cells {
        let mut neighbor_sum = 0.0;
        let mut is_boundary = false;

        for offset in FACE_NEIGHBORHOOD {
            let neighbor = cells.neighbor_indices(offset)?[cell.ordinal()];
            if neighbor == NO_NEIGHBOR {
                is_boundary = true;
                break;
            }
            neighbor_sum += u[neighbor];
        }

        if !is_boundary {
            residual[cell.ordinal()] = f[cell.ordinal()]
                + (-6.0 * u[cell.ordinal()] + neighbor_sum) / (spacing * spacing);
        }
        sum += residual[cell.ordinal()] * residual[cell.ordinal()];
    }

    Ok(sum.sqrt() / cells.len() as f64)
}

fn solve_poisson(args: &Args) -> Result<()> {
    let octree = CellOctree::create_uniform_grid(args.refinement_level);
    let cells = CellGrid::create(octree.clone())
        .levels(&[args.refinement_level])
        .neighborhood(&FACE_NEIGHBORHOOD)
        .build();

    let num_cells = cells.len();
    let spacing = octree.geometry().dx(args.refinement_level);

    let mut f = vec![0.0; num_cells];
    let mut u = vec![0.0; num_cells];
    let mut u_next = vec![0.0; num_cells];
    let mut residual = vec![0.0; num_cells];

    initialise(&cells, &mut u, &mut f);

    let mut l2_norm = f64::MAX;
    let mut iterations = 0;

    for _ in 0..args.max_iterations {
        for cell in &cells {
            let mut neighbor_sum = 0.0;
            let mut is_boundary = false;

            for offset in FACE_NEIGHBORHOOD {
                let neighbor = cells.neighbor_indices(offset)?[cell.ordinal()];
                if neighbor == NO_NEIGHBOR {
                    is_boundary = true;
                    break;
                }
                neighbor_sum += u[neighbor];
            }

            u_next[cell.ordinal()] = if is_boundary {
                u[cell.ordinal()]
            } else {
                (spacing * spacing * f[cell.ordinal()] + neighbor_sum) / 6.0
            };
        }
        std::mem::swap(&mut u, &mut u_next);

        l2_norm = residual_norm(&cells, &u, &f, &mut residual, spacing)?;
        if l2_norm < args.epsilon {
            break;
        }
        iterations += 1;
    }

    info!(l2_norm, iterations, "finished Jacobi sweeps");
    println!("L2 residual norm: {l2_norm} after {iterations} iterations");

    export_cell_grid(&cells, &args.output_file)?
        .write_grid_vector("u", u)?
        .write_grid_vector("f", f)?
        .write_grid_vector("residual", residual)?
        .finish()
}

fn validate(args: &Args) -> Result<()> {
    if args.epsilon <= 0.0 {
        return Err(Error::InvalidArgument(
            "epsilon must be a positive number".to_string(),
        ));
    }
    if args.output_file.as_os_str().is_empty() {
        return Err(Error::InvalidArgument(
            "output file cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match validate(&args).and_then(|()| solve_poisson(&args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
