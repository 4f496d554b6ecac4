//! The url ranking pipeline: a Count job that aggregates per-url occurrence
//! counts, then a Top100 job that funnels every shard's strongest candidates
//! into a single reduce task for the final ranking.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use log::info;

use crate::cluster::MRCluster;
use crate::parameters::MRParameters;
use crate::partition::partition;
use crate::record_types::Record;
use crate::topk::{TopK, UrlCount};

/// How many urls the final ranking keeps.
pub const TOP_N: usize = 100;

/// Runs the full pipeline over `input` and returns the path of the final
/// ranking file: at most `TOP_N` lines of `"<url>: <count>"`, most frequent
/// first.
///
/// The input is cut into `max(1, size * workers / mem_budget)` shards, so a
/// tight budget yields more, smaller map tasks.
pub fn top_urls(cluster: &MRCluster, params: &MRParameters, input: &Path) -> Result<PathBuf> {
    ensure!(params.mem_budget > 0, "memory budget must be positive");

    let input_size = fs::metadata(input)
        .with_context(|| format!("cannot stat input file {}", input.display()))?
        .len() as usize;
    let n_task = (input_size * cluster.n_workers() / params.mem_budget).max(1);
    info!(
        "ranking {} ({} bytes) with {} map tasks",
        input.display(),
        input_size,
        n_task
    );

    let shards = partition(&params.data_dir, input, n_task)?;

    let count_files = cluster
        .submit(
            "Count",
            &params.data_dir,
            url_count_map,
            url_count_reduce,
            shards,
            n_task,
        )
        .wait()?;

    // A single reduce partition merges every shard's candidates.
    let mut top_files = cluster
        .submit(
            "Top100",
            &params.data_dir,
            url_top_map,
            url_top_reduce,
            count_files,
            1,
        )
        .wait()?;
    ensure!(
        top_files.len() == 1,
        "number of Top100 result files is expected to be one, but got {}",
        top_files.len()
    );
    Ok(top_files.remove(0))
}

/// Count map step: counts occurrences within one shard and emits one record
/// per distinct url, which bounds shuffle volume by the shard's distinct-key
/// count rather than its line count. Blank lines don't count.
fn url_count_map(_file: &Path, contents: &str) -> Result<Vec<Record>> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for line in contents.lines() {
        let url = line.trim();
        if url.is_empty() {
            continue;
        }
        *counts.entry(url).or_insert(0) += 1;
    }
    Ok(counts
        .into_iter()
        .map(|(url, n)| Record {
            key: url.to_owned(),
            value: n.to_string(),
        })
        .collect())
}

/// Count reduce step: sums one url's per-shard counts.
fn url_count_reduce(key: &str, values: &[String]) -> Result<String> {
    let mut count: u64 = 0;
    for v in values {
        count += v
            .parse::<u64>()
            .with_context(|| format!("cannot parse count {:?} for url {:?}", v, key))?;
    }
    Ok(format!("{} {}\n", key, count))
}

/// Top100 map step: shrinks one Count output shard to its strongest `TOP_N`
/// candidates before they enter the shuffle. All records share the empty
/// key, so the single reduce task sees every candidate as one group.
fn url_top_map(_file: &Path, contents: &str) -> Result<Vec<Record>> {
    let candidates = contents.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() {
            None
        } else {
            Some(parse_count_line(line))
        }
    });
    let top = TopK::from_counts(TOP_N, candidates)?;
    Ok(top
        .into_descending()
        .into_iter()
        .map(|c| Record {
            key: String::new(),
            value: format!("{} {}", c.url, c.count),
        })
        .collect())
}

/// Top100 reduce step: merges all shards' candidates and renders the final
/// ranking, most frequent first.
fn url_top_reduce(_key: &str, values: &[String]) -> Result<String> {
    let top = TopK::from_counts(TOP_N, values.iter().map(|v| parse_count_line(v)))?;
    let mut out = String::new();
    for c in top.into_descending() {
        writeln!(out, "{}: {}", c.url, c.count)?;
    }
    Ok(out)
}

/// Parses a `"url count"` line. A missing or non-numeric count field is a
/// data integrity error, not a recoverable condition.
fn parse_count_line(line: &str) -> Result<UrlCount> {
    let (url, count) = line
        .split_once(' ')
        .with_context(|| format!("malformed count record {:?}", line))?;
    let count = count
        .parse::<u64>()
        .with_context(|| format!("cannot parse count {:?} for url {:?}", count, url))?;
    Ok(UrlCount {
        url: url.to_owned(),
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn literal_counts(contents: &str) -> HashMap<String, u64> {
        let mut counts = HashMap::new();
        for line in contents.lines() {
            let url = line.trim();
            if url.is_empty() {
                continue;
            }
            *counts.entry(url.to_owned()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_parse_count_line() {
        let c = parse_count_line("http://example.com/x 31").unwrap();
        assert_eq!(c.url, "http://example.com/x");
        assert_eq!(c.count, 31);

        assert!(parse_count_line("no-count-field").is_err());
        assert!(parse_count_line("url not-a-number").is_err());
    }

    #[test]
    fn test_count_job_matches_literal_counts() {
        let contents = "a\nb\n\na\nc\na\nb\n   \nd\n";
        let dir = tempdir().unwrap();
        let input = dir.path().join("input");
        fs::write(&input, contents).unwrap();

        let cluster = MRCluster::new(2);
        let shards = partition(dir.path(), &input, 3).unwrap();
        let outputs = cluster
            .submit("Count", dir.path(), url_count_map, url_count_reduce, shards, 3)
            .wait()
            .unwrap();

        let mut got: HashMap<String, u64> = HashMap::new();
        for path in &outputs {
            for line in fs::read_to_string(path).unwrap().lines() {
                let c = parse_count_line(line).unwrap();
                assert!(got.insert(c.url, c.count).is_none());
            }
        }
        assert_eq!(got, literal_counts(contents));
    }

    #[test]
    fn test_end_to_end_ranking() {
        // 10,000 lines: "a" 500 times, "b" 300 times, 9,200 distinct urls.
        let mut lines = Vec::new();
        for _ in 0..500 {
            lines.push(String::from("a"));
        }
        for _ in 0..300 {
            lines.push(String::from("b"));
        }
        for i in 0..9200 {
            lines.push(format!("http://site-{:04}.example.com/", i));
        }
        let mut rng = StdRng::seed_from_u64(42);
        lines.shuffle(&mut rng);
        let contents = lines.join("\n") + "\n";

        let dir = tempdir().unwrap();
        let input = dir.path().join("input");
        fs::write(&input, &contents).unwrap();
        let input_size = contents.len();

        // Budget small enough that more than one map task is needed.
        let params = MRParameters::new()
            .set_data_dir(dir.path().to_owned())
            .set_mem_budget(input_size / 2)
            .set_workers(2);
        let cluster = MRCluster::new(params.workers);

        let outfile = top_urls(&cluster, &params, &input).unwrap();
        assert!(dir.path().join("input-1.txt").exists());

        let ranking = fs::read_to_string(&outfile).unwrap();
        let lines: Vec<&str> = ranking.lines().collect();
        assert_eq!(lines.len(), TOP_N);
        assert_eq!(lines[0], "a: 500");
        assert_eq!(lines[1], "b: 300");
        // The remaining entries all carry count 1.
        for line in &lines[2..] {
            assert!(line.ends_with(": 1"));
        }
    }

    #[test]
    fn test_tied_counts_rank_larger_url_first() {
        let contents = "x\ny\nx\ny\nz\n";
        let dir = tempdir().unwrap();
        let input = dir.path().join("input");
        fs::write(&input, contents).unwrap();

        let params = MRParameters::new()
            .set_data_dir(dir.path().to_owned())
            .set_mem_budget(usize::MAX)
            .set_workers(2);
        let cluster = MRCluster::new(params.workers);

        let outfile = top_urls(&cluster, &params, &input).unwrap();
        assert_eq!(fs::read_to_string(&outfile).unwrap(), "y: 2\nx: 2\nz: 1\n");
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let contents = "q\nr\nq\ns\nr\nq\n";
        let mut rankings = Vec::new();
        for _ in 0..2 {
            let dir = tempdir().unwrap();
            let input = dir.path().join("input");
            fs::write(&input, contents).unwrap();

            let params = MRParameters::new()
                .set_data_dir(dir.path().to_owned())
                .set_mem_budget(2)
                .set_workers(2);
            let cluster = MRCluster::new(params.workers);
            let outfile = top_urls(&cluster, &params, &input).unwrap();
            rankings.push(fs::read_to_string(&outfile).unwrap());
        }
        assert_eq!(rankings[0], rankings[1]);
        assert_eq!(rankings[0], "q: 3\nr: 2\ns: 1\n");
    }
}
