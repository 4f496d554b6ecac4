//! Implements a mapreduce pipeline bounded to one machine, used to rank the
//! most frequent urls in inputs larger than available memory.
//!
//! A fixed pool of workers serves map and reduce tasks of any number of
//! submitted jobs; tasks hand records to each other through length-prefixed
//! shard files on disk.

pub mod cluster;
pub mod parameters;
pub mod partition;
pub mod pipeline;
pub mod record_types;
pub mod recordio;
pub mod shuffle;
pub mod topk;
