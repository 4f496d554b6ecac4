//! The mapreduce cluster: a fixed pool of workers fed from one shared task
//! queue, plus the job submission protocol that runs a map phase and a
//! reduce phase separated by a completion barrier.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use log::{debug, info};

use crate::record_types::Record;
use crate::recordio::{RecordReader, RecordWriter};
use crate::shuffle::{key_shard, merge_path, shard_path};

/// Map function: receives the shard path and the shard's full contents,
/// returns the records to shuffle.
pub type MapF = fn(&Path, &str) -> Result<Vec<Record>>;

/// Reduce function: receives one key and all values routed to it, returns
/// the text to append to the partition's merged output.
pub type ReduceF = fn(&str, &[String]) -> Result<String>;

/// Everything a task needs to know about the job it belongs to.
struct JobSpec {
    name: String,
    data_dir: PathBuf,
    map_fn: MapF,
    reduce_fn: ReduceF,
    n_map: usize,
    n_reduce: usize,
}

enum TaskKind {
    Map { input: PathBuf },
    Reduce,
}

/// One unit of scheduled work. `done` is the task's completion signal; the
/// submitting job blocks on it, the pool never does.
struct Task {
    job: Arc<JobSpec>,
    kind: TaskKind,
    index: usize,
    done: Sender<Result<()>>,
}

/// A fixed pool of interchangeable workers shared by all submitted jobs.
/// Any worker runs any pending task of any job; jobs are decoupled from
/// workers entirely.
pub struct MRCluster {
    n_workers: usize,
    task_tx: Sender<Task>,
    exit_tx: Option<Sender<()>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl MRCluster {
    /// Starts a cluster with `n_workers` worker threads. The pool lives
    /// until `shutdown` (also run on drop) and serves every job submitted
    /// in between.
    pub fn new(n_workers: usize) -> MRCluster {
        let (task_tx, task_rx) = unbounded::<Task>();
        let (exit_tx, exit_rx) = bounded::<()>(0);

        let mut workers = Vec::with_capacity(n_workers);
        for id in 0..n_workers {
            let tasks = task_rx.clone();
            let exit = exit_rx.clone();
            workers.push(thread::spawn(move || worker_loop(id, tasks, exit)));
        }

        MRCluster {
            n_workers,
            task_tx,
            exit_tx: Some(exit_tx),
            workers,
        }
    }

    /// Returns how many workers serve this cluster.
    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    /// Submits a job and returns its result future immediately. The job
    /// runs `map_fn` once per input file, routes the emitted records into
    /// `n_reduce` partitions, and (once every map task has finished) runs
    /// `reduce_fn` over each partition. The handle yields the `n_reduce`
    /// merged output paths in partition order.
    pub fn submit(
        &self,
        job_name: &str,
        data_dir: &Path,
        map_fn: MapF,
        reduce_fn: ReduceF,
        map_files: Vec<PathBuf>,
        n_reduce: usize,
    ) -> JobHandle {
        let job = Arc::new(JobSpec {
            name: job_name.to_owned(),
            data_dir: data_dir.to_owned(),
            map_fn,
            reduce_fn,
            n_map: map_files.len(),
            n_reduce,
        });
        let tasks = self.task_tx.clone();
        let (result_tx, result_rx) = bounded(1);
        thread::spawn(move || {
            let _ = result_tx.send(run_job(&tasks, job, map_files));
        });
        JobHandle { result: result_rx }
    }

    /// Stops all workers and waits for them to exit. Call only after every
    /// submitted job has delivered its result; tasks still queued are
    /// discarded, not drained.
    pub fn shutdown(&mut self) {
        self.exit_tx.take();
        for w in self.workers.drain(..) {
            let _ = w.join();
        }
    }
}

impl Drop for MRCluster {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The one-shot result future of a submitted job.
pub struct JobHandle {
    result: Receiver<Result<Vec<PathBuf>>>,
}

impl JobHandle {
    /// Blocks until the job finishes; returns the merged output paths in
    /// reduce-partition order.
    pub fn wait(self) -> Result<Vec<PathBuf>> {
        self.result
            .recv()
            .context("job terminated without reporting a result")?
    }
}

fn worker_loop(id: usize, tasks: Receiver<Task>, exit: Receiver<()>) {
    loop {
        select! {
            recv(tasks) -> task => match task {
                Ok(task) => {
                    let result = match &task.kind {
                        TaskKind::Map { input } => run_map_task(&task.job, task.index, input),
                        TaskKind::Reduce => run_reduce_task(&task.job, task.index),
                    };
                    // The job driver may already be gone if another task of
                    // the same phase failed first.
                    let _ = task.done.send(result);
                }
                Err(_) => break,
            },
            recv(exit) -> _ => break,
        }
    }
    debug!("worker {} exiting", id);
}

fn run_job(tasks: &Sender<Task>, job: Arc<JobSpec>, map_files: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let start = Instant::now();
    debug!("job {}: map phase, {} tasks", job.name, job.n_map);
    let map_kinds = map_files
        .into_iter()
        .map(|input| TaskKind::Map { input })
        .collect();
    run_phase(tasks, &job, "map", map_kinds)?;

    // Barrier: reduce tasks are enqueued only after every map task of this
    // job has signalled completion.
    debug!("job {}: reduce phase, {} partitions", job.name, job.n_reduce);
    let reduce_kinds = (0..job.n_reduce).map(|_| TaskKind::Reduce).collect();
    run_phase(tasks, &job, "reduce", reduce_kinds)?;

    info!("job {} finished in {:?}", job.name, start.elapsed());
    Ok((0..job.n_reduce)
        .map(|r| merge_path(&job.data_dir, &job.name, r))
        .collect())
}

/// Enqueues one task per kind, then blocks on each task's completion
/// signal. Only this job's driving thread waits here; the workers keep
/// serving other jobs' tasks throughout.
fn run_phase(tasks: &Sender<Task>, job: &Arc<JobSpec>, phase: &str, kinds: Vec<TaskKind>) -> Result<()> {
    let mut pending = Vec::with_capacity(kinds.len());
    for (index, kind) in kinds.into_iter().enumerate() {
        let (done_tx, done_rx) = bounded(1);
        tasks
            .send(Task {
                job: job.clone(),
                kind,
                index,
                done: done_tx,
            })
            .map_err(|_| anyhow!("cluster is shut down"))?;
        pending.push(done_rx);
    }
    for (index, done) in pending.into_iter().enumerate() {
        done.recv()
            .with_context(|| {
                format!(
                    "worker died before finishing {} task {} of job {}",
                    phase, index, job.name
                )
            })?
            .with_context(|| format!("{} task {} of job {} failed", phase, index, job.name))?;
    }
    Ok(())
}

/// Reads the whole input shard, maps it, and routes every record to its
/// reduce partition's intermediate shard. All `n_reduce` writers are open
/// for the task's whole lifetime and flushed before completion is
/// signalled.
fn run_map_task(job: &JobSpec, index: usize, input: &Path) -> Result<()> {
    let contents = fs::read_to_string(input)
        .with_context(|| format!("cannot read map input {}", input.display()))?;

    let mut outs = Vec::with_capacity(job.n_reduce);
    for r in 0..job.n_reduce {
        let path = shard_path(&job.data_dir, &job.name, index, r);
        outs.push(
            RecordWriter::create(&path)
                .with_context(|| format!("cannot create intermediate shard {}", path.display()))?,
        );
    }

    for rec in (job.map_fn)(input, &contents)? {
        let r = key_shard(&rec.key, job.n_reduce);
        outs[r]
            .write_record(&rec)
            .with_context(|| format!("cannot write intermediate shard of job {}", job.name))?;
    }

    for out in outs.iter_mut() {
        out.flush()
            .with_context(|| format!("cannot flush intermediate shard of job {}", job.name))?;
    }
    Ok(())
}

/// Decodes this partition's intermediate shards in ascending map-task
/// order, groups values per key, and writes one merged output file.
fn run_reduce_task(job: &JobSpec, index: usize) -> Result<()> {
    // Per key, values end up ordered by map task index, and within one
    // shard by file order.
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for m in 0..job.n_map {
        let path = shard_path(&job.data_dir, &job.name, m, index);
        let reader = RecordReader::open(&path)
            .with_context(|| format!("cannot open intermediate shard {}", path.display()))?;
        for rec in reader {
            grouped.entry(rec.key).or_default().push(rec.value);
        }
    }

    let out_path = merge_path(&job.data_dir, &job.name, index);
    let out = fs::File::create(&out_path)
        .with_context(|| format!("cannot create output file {}", out_path.display()))?;
    let mut out = BufWriter::new(out);
    // Key visitation order is unspecified; a reduce function that needs
    // ordered output has to order it itself.
    for (key, values) in &grouped {
        let text = (job.reduce_fn)(key, values)?;
        out.write_all(text.as_bytes())
            .with_context(|| format!("cannot write output file {}", out_path.display()))?;
    }
    out.flush()
        .with_context(|| format!("cannot flush output file {}", out_path.display()))?;
    Ok(())
}
