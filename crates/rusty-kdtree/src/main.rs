use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use ftlog::LevelFilter;
use mpi::traits::*;

use rusty_kdtree::{
    constants::COORDINATOR,
    distributed::DistributedKdTreeBuilder,
    error::BuildError,
    helpers::{configure_logger, format_group, random_points, render, staircase},
    transport::MpiTransport,
    types::{node::KdTree, point::Coordinate},
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Input {
    /// Points along a descending/ascending staircase.
    Staircase,
    /// Uniformly distributed points.
    Random,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> LevelFilter {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Build a k-d tree over all workers of an MPI job, e.g. `mpirun -n 4 rusty-kdtree`.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of points, generated on the coordinator.
    #[arg(long, default_value_t = 6)]
    npoints: usize,

    /// Dimension of the points.
    #[arg(long, default_value_t = 2)]
    dims: usize,

    #[arg(long, value_enum, default_value_t = Input::Staircase)]
    input: Input,

    /// Seed for random input.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Random coordinates are drawn from [-range, range).
    #[arg(long, default_value_t = 1000)]
    range: Coordinate,

    /// Print the tree, one node per line.
    #[arg(long)]
    print: bool,

    /// Print the tree as nested JSON.
    #[arg(long)]
    json: bool,

    /// Print the finalized flat form of the tree.
    #[arg(long)]
    flat: bool,

    /// Print the wall time of the build.
    #[arg(long)]
    time: bool,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Directory for per rank log files. Logs go to stderr if unset.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn report(tree: &KdTree, args: &Args, elapsed: f64) -> Result<(), BuildError> {
    if args.print {
        print!("{}", render(tree));
    }

    if args.json {
        let json = serde_json::to_string_pretty(&tree.root())
            .map_err(|e| BuildError::Codec(e.to_string()))?;
        println!("{json}");
    }

    if args.flat {
        let flat = tree.finalize()?;
        let groups: Vec<String> = flat.chunks_exact(tree.dims()).map(format_group).collect();
        println!("{}", groups.join(" "));
    }

    if args.time {
        println!("# {elapsed}");
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let Some(universe) = mpi::initialize() else {
        eprintln!("MPI has already been initialized");
        std::process::exit(1);
    };
    let world = universe.world();
    let rank = world.rank();

    let log_file = args
        .log_dir
        .as_ref()
        .map(|dir| dir.join(format!("rusty-kdtree-rank{rank}.log")));
    let guard = match configure_logger(args.log_level.into(), log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("rank {rank}: could not configure logger: {e}");
            world.abort(1)
        }
    };

    let points = if rank == COORDINATOR {
        match args.input {
            Input::Staircase => staircase(args.npoints, args.dims),
            Input::Random => random_points(args.npoints, args.dims, args.range, args.seed),
        }
    } else {
        Vec::new()
    };

    let transport = MpiTransport::new(&world);

    let start = mpi::time();
    let result = DistributedKdTreeBuilder::new(&transport, args.dims)
        .and_then(|builder| builder.build(&points));
    let elapsed = mpi::time() - start;

    // Points are no longer needed once the tree is built.
    drop(points);

    let outcome = match result {
        Ok(Some(tree)) => report(&tree, &args, elapsed),
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        ftlog::error!("rank {rank}: {e}");
        eprintln!("rank {rank}: {e}");
        drop(guard);
        world.abort(1);
    }
}
