//! Command line entry point: ranks the most frequent urls in a
//! newline-delimited input file.

use std::cmp;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use urltop::cluster::MRCluster;
use urltop::parameters::MRParameters;
use urltop::pipeline::top_urls;

/// Ranks the most frequent urls in a newline-delimited input file.
#[derive(Parser)]
#[command(name = "urltop", version, about)]
struct Args {
    /// Directory for input shards, intermediate shards and outputs.
    #[arg(long)]
    data_dir: PathBuf,

    /// Input file. Defaults to <data-dir>/input.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Per-task memory budget in bytes. Defaults to a hundredth of the
    /// input size.
    #[arg(long)]
    mem_budget: Option<usize>,

    /// Worker threads. Defaults to the number of CPUs.
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let input = args.input.unwrap_or_else(|| args.data_dir.join("input"));
    let input_size = fs::metadata(&input)
        .with_context(|| format!("cannot stat input file {}", input.display()))?
        .len() as usize;
    let mem_budget = args.mem_budget.unwrap_or(cmp::max(1, input_size / 100));
    let workers = args.workers.unwrap_or_else(num_cpus::get);
    info!(
        "input {} ({} bytes), budget {} bytes, {} workers",
        input.display(),
        input_size,
        mem_budget,
        workers
    );

    let params = MRParameters::new()
        .set_data_dir(args.data_dir)
        .set_mem_budget(mem_budget)
        .set_workers(workers);
    let mut cluster = MRCluster::new(params.workers);

    let start = Instant::now();
    let outfile = top_urls(&cluster, &params, &input)?;
    println!("duration: {:?}", start.elapsed());
    println!("outfile: {}", outfile.display());

    cluster.shutdown();
    Ok(())
}
