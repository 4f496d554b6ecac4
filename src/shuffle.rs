//! Deterministic file naming and key routing for the hand-off between map
//! and reduce tasks. Paths are namespaced by job name, so concurrent jobs
//! sharing one data directory cannot collide.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::path::{Path, PathBuf};

/// Path of the intermediate shard written by map task `map_task` for reduce
/// partition `reduce_task`.
pub fn shard_path(data_dir: &Path, job: &str, map_task: usize, reduce_task: usize) -> PathBuf {
    data_dir.join(format!("mrtmp.{}-{}-{}", job, map_task, reduce_task))
}

/// Path of the merged output of reduce partition `reduce_task`.
pub fn merge_path(data_dir: &Path, job: &str, reduce_task: usize) -> PathBuf {
    data_dir.join(format!("mrtmp.{}-res-{}", job, reduce_task))
}

/// Maps a key to a reduce partition in [0, n_reduce). The hash is stable
/// within a process, which is all the shuffle needs; a skewed key
/// distribution costs throughput, not correctness.
pub fn key_shard(key: &str, n_reduce: usize) -> usize {
    let mut h = DefaultHasher::new();
    h.write(key.as_bytes());
    (h.finish() % n_reduce as u64) as usize
}

#[cfg(test)]
mod test {
    use super::{key_shard, merge_path, shard_path};
    use std::path::Path;

    #[test]
    fn test_paths_are_deterministic_and_namespaced() {
        let dir = Path::new("/data");
        assert_eq!(
            shard_path(dir, "Count", 3, 1),
            Path::new("/data/mrtmp.Count-3-1")
        );
        assert_eq!(
            merge_path(dir, "Count", 1),
            Path::new("/data/mrtmp.Count-res-1")
        );
        assert_ne!(shard_path(dir, "Count", 0, 0), shard_path(dir, "Top100", 0, 0));
        assert_ne!(shard_path(dir, "Count", 0, 1), merge_path(dir, "Count", 1));
    }

    #[test]
    fn test_key_shard_is_stable_and_in_range() {
        for key in ["", "a", "http://example.com/x", "\u{1F600}"] {
            for n in [1usize, 2, 7, 64] {
                let shard = key_shard(key, n);
                assert!(shard < n);
                assert_eq!(shard, key_shard(key, n));
            }
            assert_eq!(key_shard(key, 1), 0);
        }
    }
}
