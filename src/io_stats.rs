//! I/O statistics tracking module
//!
//! [`TrackedReader`] and [`TrackedWriter`] wrap any stream and record every
//! successful read/write into a shared [`IoStatsTracker`].

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Byte counters shared between the adapters of one stream pass
#[derive(Debug, Clone, Default)]
pub struct IoStatsTracker {
    read_bytes: Arc<AtomicU64>,
    write_bytes: Arc<AtomicU64>,
}

impl IoStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_read(&self, bytes: u64) {
        self.read_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_write(&self, bytes: u64) {
        self.write_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn read_bytes(&self) -> u64 {
        self.read_bytes.load(Ordering::Relaxed)
    }

    pub fn write_bytes(&self) -> u64 {
        self.write_bytes.load(Ordering::Relaxed)
    }
}

/// Reader adapter that records reads into a tracker
pub struct TrackedReader<R> {
    inner: R,
    tracker: IoStatsTracker,
}

impl<R: Read> TrackedReader<R> {
    pub fn new(inner: R, tracker: IoStatsTracker) -> Self {
        Self { inner, tracker }
    }
}

impl<R: Read> Read for TrackedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.tracker.add_read(n as u64);
        }
        Ok(n)
    }
}

/// Writer adapter that records writes into a tracker
pub struct TrackedWriter<W> {
    inner: W,
    tracker: IoStatsTracker,
}

impl<W: Write> TrackedWriter<W> {
    pub fn new(inner: W, tracker: IoStatsTracker) -> Self {
        Self { inner, tracker }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for TrackedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.tracker.add_write(n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_tracked_reader_counts_bytes() {
        let tracker = IoStatsTracker::new();
        let mut reader = TrackedReader::new(Cursor::new(vec![7u8; 1000]), tracker.clone());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out.len(), 1000);
        assert_eq!(tracker.read_bytes(), 1000);
        assert_eq!(tracker.write_bytes(), 0);
    }

    #[test]
    fn test_tracked_writer_counts_bytes() {
        let tracker = IoStatsTracker::new();
        let mut writer = TrackedWriter::new(Vec::new(), tracker.clone());
        writer.write_all(b"hello").unwrap();
        writer.write_all(b" world").unwrap();
        assert_eq!(writer.get_ref().as_slice(), b"hello world");
        assert_eq!(tracker.write_bytes(), 11);
    }

    #[test]
    fn test_clones_share_counters() {
        let tracker = IoStatsTracker::new();
        let clone = tracker.clone();
        clone.add_read(10);
        tracker.add_write(5);
        assert_eq!(tracker.read_bytes(), 10);
        assert_eq!(clone.write_bytes(), 5);
    }
}
