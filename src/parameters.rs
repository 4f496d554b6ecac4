//! Parameters for a url ranking run.
//!

use std::path::PathBuf;

/// Knobs for the pipeline. Construct with `new()` and chain the setters.
#[derive(Clone, Debug)]
pub struct MRParameters {
    /// Directory holding input shards, intermediate shards and job outputs.
    pub data_dir: PathBuf,

    /// Per-task memory budget in bytes.
    pub mem_budget: usize,

    /// Number of worker threads in the cluster.
    pub workers: usize,
}

impl MRParameters {
    pub fn new() -> MRParameters {
        MRParameters {
            data_dir: PathBuf::from("."),
            mem_budget: 64 * 1024 * 1024,
            workers: num_cpus::get(),
        }
    }

    /// Where all files produced by a run live. The directory must exist.
    ///
    /// Default: the current directory.
    pub fn set_data_dir(mut self, dir: PathBuf) -> MRParameters {
        self.data_dir = dir;
        self
    }

    /// Bounds how much input a single map task holds in memory at once;
    /// the driver cuts the input into more, smaller shards when the budget
    /// is tight relative to input size and worker count.
    ///
    /// Default: 64 MiB.
    pub fn set_mem_budget(mut self, bytes: usize) -> MRParameters {
        self.mem_budget = bytes;
        self
    }

    /// How many worker threads serve tasks.
    ///
    /// Default: the number of CPUs.
    pub fn set_workers(mut self, n: usize) -> MRParameters {
        self.workers = n;
        self
    }
}

impl Default for MRParameters {
    fn default() -> MRParameters {
        MRParameters::new()
    }
}
