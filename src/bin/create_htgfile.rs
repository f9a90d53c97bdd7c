//! Build an octree from a textual descriptor and write it to a grid file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use amr_octree::io::export_octree;
use amr_octree::{CellOctree, Result};

/// Convert an octree descriptor into a tree grid file.
#[derive(Parser, Debug)]
#[command(name = "create-htgfile")]
#[command(about = "Writes the octree described by a `.RPX|` descriptor to a grid file")]
struct Args {
    /// Path of the output file.
    output: PathBuf,

    /// Octree descriptor, e.g. "R|........".
    descriptor: String,
}

fn run(args: &Args) -> Result<()> {
    let octree = CellOctree::from_descriptor(&args.descriptor)?;
    export_octree(&octree, &args.output)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
