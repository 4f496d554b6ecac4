//! Splits one large input file into line-aligned shards sized against a
//! memory budget, so that a single map task never holds more than roughly
//! one shard of input in memory.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

/// Splits `input` into at most `n` shard files in `data_dir` and returns
/// their paths in index order.
///
/// Lines accumulate in a buffer that is flushed to a new shard once it
/// reaches `ceil(size / n)` bytes; the remainder after the last line
/// becomes the final shard. A line is never split across two shards, and
/// concatenating the shards in index order reproduces the input byte for
/// byte. Small inputs may yield fewer than `n` shards.
pub fn partition(data_dir: &Path, input: &Path, n: usize) -> Result<Vec<PathBuf>> {
    assert!(n > 0);

    let size = fs::metadata(input)
        .with_context(|| format!("cannot stat input file {}", input.display()))?
        .len() as usize;
    let part_size = size.div_ceil(n);

    let f = fs::File::open(input)
        .with_context(|| format!("cannot open input file {}", input.display()))?;
    let mut src = BufReader::new(f);

    let mut parts = Vec::new();
    let mut buf: Vec<u8> = Vec::with_capacity(part_size + 4096);
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = src
            .read_until(b'\n', &mut line)
            .with_context(|| format!("cannot read input file {}", input.display()))?;
        if read == 0 {
            break;
        }
        buf.extend_from_slice(&line);
        if buf.len() >= part_size {
            parts.push(write_part(data_dir, parts.len(), &buf)?);
            buf.clear();
        }
    }
    if !buf.is_empty() {
        parts.push(write_part(data_dir, parts.len(), &buf)?);
    }

    debug!(
        "partitioned {} ({} bytes) into {} shards of ~{} bytes",
        input.display(),
        size,
        parts.len(),
        part_size
    );
    Ok(parts)
}

fn partition_name(data_dir: &Path, id: usize) -> PathBuf {
    data_dir.join(format!("input-{}.txt", id))
}

fn write_part(data_dir: &Path, id: usize, buf: &[u8]) -> Result<PathBuf> {
    let name = partition_name(data_dir, id);
    fs::write(&name, buf).with_context(|| format!("cannot write shard file {}", name.display()))?;
    Ok(name)
}
