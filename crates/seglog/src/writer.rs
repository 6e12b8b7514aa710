// Segment store - owns the writable segment and its buffered writer,
// applies rotation and retention.

use crate::segment::{SegmentInfo, SegmentManager};
use seglog_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use tracing::debug;

pub(crate) struct SegmentWriter {
    manager: SegmentManager,
    file: BufWriter<File>,
    segment_id: u64,
    /// Bytes on disk at open plus every byte appended since (the buffered
    /// bytes will reach the file, so they count against the rotation bound).
    segment_size: u64,
    max_segment_size: u64,
    max_segments: usize,
    fsync: bool,
}

impl SegmentWriter {
    /// Open the newest segment for append, or create `segment-0` in a fresh
    /// directory. Existing bytes are never truncated here; recovery has
    /// already repaired the tail before the writer is opened.
    pub fn open(
        manager: SegmentManager,
        latest: Option<&SegmentInfo>,
        max_segment_size: u64,
        max_segments: usize,
        fsync: bool,
    ) -> Result<Self> {
        let (segment_id, file, segment_size) = match latest {
            Some(info) => {
                let file = OpenOptions::new().append(true).open(&info.path)?;
                let size = file.metadata()?.len();
                (info.id, file, size)
            }
            None => {
                let path = manager.segment_path(0);
                let file = OpenOptions::new().create_new(true).append(true).open(&path)?;
                (0, file, 0)
            }
        };

        Ok(Self {
            manager,
            file: BufWriter::new(file),
            segment_id,
            segment_size,
            max_segment_size,
            max_segments,
            fsync,
        })
    }

    /// Append one encoded frame to the buffered writer, rotating first if
    /// the frame would push the current segment past its size bound. A frame
    /// is never split across two segment files.
    pub fn append(&mut self, frame: &[u8]) -> Result<()> {
        self.maybe_rotate(frame.len() as u64)?;

        self.file.write_all(frame)?;
        self.segment_size += frame.len() as u64;

        Ok(())
    }

    /// Rotate if the current segment size plus the incoming frame would
    /// reach or exceed the bound. An empty segment is never rotated away, so
    /// an oversized frame lands alone in its own segment.
    fn maybe_rotate(&mut self, pending_bytes: u64) -> Result<bool> {
        if self.segment_size == 0 || self.segment_size + pending_bytes < self.max_segment_size {
            return Ok(false);
        }
        self.rotate()?;
        Ok(true)
    }

    /// Flush and close the current segment, then continue in a freshly
    /// created `segment_id + 1`. Retention is evaluated right after.
    fn rotate(&mut self) -> Result<()> {
        self.flush()?;

        let next_id = self.segment_id + 1;
        let path = self.manager.segment_path(next_id);
        let file = OpenOptions::new().create_new(true).append(true).open(&path)?;

        self.file = BufWriter::new(file);
        self.segment_id = next_id;
        self.segment_size = 0;

        debug!(segment = next_id, "rotated to new segment");

        self.enforce_retention()?;

        Ok(())
    }

    /// Delete lowest-id segments while the directory holds more than
    /// `max_segments` files. A deletion failure propagates but does not roll
    /// back the rotation that triggered it.
    fn enforce_retention(&self) -> Result<()> {
        let mut segments = self.manager.list_segments()?;
        while segments.len() > self.max_segments {
            let oldest = segments.remove(0);
            self.manager.remove_segment(&oldest)?;
            debug!(segment = oldest.id, "retention deleted oldest segment");
        }
        Ok(())
    }

    /// Flush the buffered writer to the OS, and force it to stable storage
    /// when fsync is enabled.
    pub fn flush(&mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|e| Error::Sync(format!("failed to flush segment buffer: {}", e)))?;

        if self.fsync {
            self.file
                .get_ref()
                .sync_all()
                .map_err(|e| Error::Sync(format!("failed to fsync segment: {}", e)))?;
        }

        Ok(())
    }

    /// Flush the application buffer to the OS without forcing physical
    /// durability. Enough for another handle on the same file to see the
    /// appended frames.
    pub fn flush_buffer(&mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|e| Error::Sync(format!("failed to flush segment buffer: {}", e)))
    }

    /// Id of the currently writable segment.
    pub fn segment_id(&self) -> u64 {
        self.segment_id
    }

    /// Current segment size including buffered bytes.
    pub fn segment_size(&self) -> u64 {
        self.segment_size
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        // Best effort flush on drop
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;
    use crate::record::LogEntry;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn setup_dir() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("wal");
        std::fs::create_dir_all(&dir).expect("Failed to create log dir");
        (temp_dir, dir)
    }

    fn open_writer(dir: &PathBuf, max_segment_size: u64, max_segments: usize) -> SegmentWriter {
        let manager = SegmentManager::new(dir.clone());
        let latest = manager.latest_segment().unwrap();
        SegmentWriter::open(manager, latest.as_ref(), max_segment_size, max_segments, false)
            .expect("Failed to open writer")
    }

    fn frame(sequence: u64, payload: &[u8]) -> Vec<u8> {
        LogEntry::new(sequence, payload.to_vec()).encode().unwrap()
    }

    #[test]
    fn test_creates_segment_zero() {
        let (_temp_dir, dir) = setup_dir();

        let writer = open_writer(&dir, 1024, 4);
        assert_eq!(writer.segment_id(), 0);
        assert!(dir.join("segment-0").exists());
    }

    #[test]
    fn test_reopens_newest_segment_at_end() {
        let (_temp_dir, dir) = setup_dir();

        {
            let mut writer = open_writer(&dir, 1024, 4);
            writer.append(&frame(1, b"first")).unwrap();
            writer.flush().unwrap();
        }

        let mut writer = open_writer(&dir, 1024, 4);
        assert_eq!(writer.segment_id(), 0);
        assert!(writer.segment_size() > 0);

        writer.append(&frame(2, b"second")).unwrap();
        writer.flush().unwrap();

        let outcome = reader::read_segment(&dir.join("segment-0")).unwrap();
        assert_eq!(outcome.entries.len(), 2);
        assert!(!outcome.torn_tail);
    }

    #[test]
    fn test_rotation_boundary() {
        let (_temp_dir, dir) = setup_dir();

        let payload = vec![0u8; 40];
        let mut writer = open_writer(&dir, 128, 8);

        let mut sequence = 0;
        while writer.segment_id() == 0 {
            sequence += 1;
            writer.append(&frame(sequence, &payload)).unwrap();
        }
        writer.flush().unwrap();

        assert_eq!(writer.segment_id(), 1);
        assert!(dir.join("segment-1").exists());

        // No frame is split: both files decode cleanly and every entry is
        // accounted for exactly once.
        let first = reader::read_segment(&dir.join("segment-0")).unwrap();
        let second = reader::read_segment(&dir.join("segment-1")).unwrap();
        assert!(!first.torn_tail);
        assert!(!second.torn_tail);

        let all: Vec<u64> = first
            .entries
            .iter()
            .chain(second.entries.iter())
            .map(|e| e.sequence_number)
            .collect();
        let expected: Vec<u64> = (1..=sequence).collect();
        assert_eq!(all, expected);

        // The closed segment stayed under the bound.
        assert!(std::fs::metadata(dir.join("segment-0")).unwrap().len() < 128);
    }

    #[test]
    fn test_oversized_frame_gets_own_segment() {
        let (_temp_dir, dir) = setup_dir();

        let mut writer = open_writer(&dir, 64, 8);
        writer.append(&frame(1, &vec![0u8; 256])).unwrap();
        writer.flush().unwrap();

        // No rotation away from the empty segment 0.
        assert_eq!(writer.segment_id(), 0);

        // The next frame rotates.
        writer.append(&frame(2, b"next")).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.segment_id(), 1);
    }

    #[test]
    fn test_retention_deletes_oldest() {
        let (_temp_dir, dir) = setup_dir();

        let payload = vec![0u8; 40];
        let mut writer = open_writer(&dir, 64, 2);

        let mut sequence = 0;
        while writer.segment_id() < 3 {
            sequence += 1;
            writer.append(&frame(sequence, &payload)).unwrap();
        }
        writer.flush().unwrap();

        let manager = SegmentManager::new(dir.clone());
        let ids: Vec<u64> = manager
            .list_segments()
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();

        // Exactly max_segments files remain, contiguous, highest id current.
        assert_eq!(ids, vec![2, 3]);
        assert!(!dir.join("segment-0").exists());
        assert!(!dir.join("segment-1").exists());
    }

    #[test]
    fn test_flush_makes_bytes_visible() {
        let (_temp_dir, dir) = setup_dir();

        let mut writer = open_writer(&dir, 1024, 4);
        writer.append(&frame(1, b"buffered")).unwrap();

        writer.flush_buffer().unwrap();

        let outcome = reader::read_segment(&dir.join("segment-0")).unwrap();
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].payload, b"buffered");
    }
}
