//! Length-prefixed record streams, used to hand records from map tasks to
//! reduce tasks through intermediate shard files.
//!
//! On disk a shard is a sequence of records, each encoded as two framed
//! byte strings (key, then value) with 4-byte big-endian length prefixes:
//!
//! ```text
//! llllkkkkkkllllvvvllllkkll...
//! ```
//!
//! Where l is a length byte, k a key byte and v a value byte. Decoding
//! proceeds record by record until the stream ends; a truncated or
//! otherwise undecodable tail counts as end-of-stream, not as an error.

use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::record_types::Record;

/// Writes a record stream to `dest`.
pub struct RecordWriter<W: Write> {
    dest: W,
    records_written: u64,
    bytes_written: u64,
}

impl RecordWriter<BufWriter<fs::File>> {
    /// Creates (or truncates) a shard file and returns a buffered writer
    /// for it.
    pub fn create(path: &Path) -> io::Result<RecordWriter<BufWriter<fs::File>>> {
        let f = fs::File::create(path)?;
        Ok(RecordWriter::new(BufWriter::new(f)))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(dest: W) -> RecordWriter<W> {
        RecordWriter {
            dest,
            records_written: 0,
            bytes_written: 0,
        }
    }

    /// Appends one record to the stream.
    pub fn write_record(&mut self, r: &Record) -> io::Result<()> {
        self.write_frame(r.key.as_bytes())?;
        self.write_frame(r.value.as_bytes())?;
        self.records_written += 1;
        Ok(())
    }

    fn write_frame(&mut self, buf: &[u8]) -> io::Result<()> {
        self.dest.write_all(&(buf.len() as u32).to_be_bytes())?;
        self.dest.write_all(buf)?;
        self.bytes_written += 4 + buf.len() as u64;
        Ok(())
    }

    /// Flushes buffered data down to the sink. Map tasks call this before
    /// signalling completion, so that readers opened afterwards see every
    /// record.
    pub fn flush(&mut self) -> io::Result<()> {
        self.dest.flush()
    }

    /// Returns how many (records, bytes) have been written.
    pub fn stats(&self) -> (u64, u64) {
        (self.records_written, self.bytes_written)
    }
}

/// Reads a record stream produced by `RecordWriter`. Iterating yields
/// records until the stream is exhausted.
pub struct RecordReader<R: Read> {
    src: R,
    records_read: u64,
}

impl RecordReader<BufReader<fs::File>> {
    pub fn open(path: &Path) -> io::Result<RecordReader<BufReader<fs::File>>> {
        let f = fs::File::open(path)?;
        Ok(RecordReader::new(BufReader::new(f)))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(src: R) -> RecordReader<R> {
        RecordReader {
            src,
            records_read: 0,
        }
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    fn read_frame(&mut self) -> Option<String> {
        let mut lenbuf = [0u8; 4];
        self.src.read_exact(&mut lenbuf).ok()?;
        let len = u32::from_be_bytes(lenbuf) as usize;
        let mut buf = vec![0u8; len];
        self.src.read_exact(&mut buf).ok()?;
        String::from_utf8(buf).ok()
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let key = self.read_frame()?;
        let value = self.read_frame()?;
        self.records_read += 1;
        Some(Record { key, value })
    }
}
