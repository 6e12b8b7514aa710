// Segment naming and directory scanning
//
// Segments are named: segment-{id}
// Where id is a non-negative decimal integer with no leading zeros. Ids are
// assigned in creation order, so callers must sort numerically, never
// lexically ("segment-10" sorts after "segment-9").

use seglog_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Filename prefix for segment files.
pub const SEGMENT_PREFIX: &str = "segment-";

/// Manages the segment files of one log directory.
pub struct SegmentManager {
    dir: PathBuf,
}

/// Information about one segment file.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// Numeric id extracted from the filename
    pub id: u64,
    /// Path to the segment file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl SegmentManager {
    /// Create a new segment manager for the given directory.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// The directory this manager operates on.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic path of the segment with the given id.
    pub fn segment_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{}{}", SEGMENT_PREFIX, id))
    }

    /// List all segments, sorted ascending by numeric id.
    ///
    /// The directory is owned exclusively by one log instance, so any entry
    /// that does not parse as a segment filename fails with
    /// `DirectoryCorrupt` rather than being skipped.
    pub fn list_segments(&self) -> Result<Vec<SegmentInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut segments = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_str().ok_or_else(|| {
                Error::DirectoryCorrupt(format!(
                    "non-UTF-8 file name in log directory {:?}",
                    self.dir
                ))
            })?;

            let id = parse_segment_id(name).ok_or_else(|| {
                Error::DirectoryCorrupt(format!(
                    "unexpected file {:?} in log directory {:?}",
                    name, self.dir
                ))
            })?;

            if !entry.file_type()?.is_file() {
                return Err(Error::DirectoryCorrupt(format!(
                    "{:?} in log directory {:?} is not a regular file",
                    name, self.dir
                )));
            }

            let size = entry.metadata()?.len();
            segments.push(SegmentInfo {
                id,
                path: entry.path(),
                size,
            });
        }

        segments.sort_by_key(|s| s.id);

        Ok(segments)
    }

    /// Get the newest (highest id) segment, or `None` for a fresh directory.
    pub fn latest_segment(&self) -> Result<Option<SegmentInfo>> {
        Ok(self.list_segments()?.pop())
    }

    /// Get the oldest (lowest id) segment.
    pub fn oldest_segment(&self) -> Result<Option<SegmentInfo>> {
        Ok(self.list_segments()?.into_iter().next())
    }

    /// Number of segment files in the directory.
    pub fn segment_count(&self) -> Result<usize> {
        Ok(self.list_segments()?.len())
    }

    /// Total size of all segments in bytes.
    pub fn total_size(&self) -> Result<u64> {
        Ok(self.list_segments()?.iter().map(|s| s.size).sum())
    }

    /// Delete a segment file.
    pub fn remove_segment(&self, segment: &SegmentInfo) -> Result<()> {
        fs::remove_file(&segment.path)?;
        Ok(())
    }
}

/// Parse a canonical segment filename into its numeric id.
///
/// Rejects anything that is not `segment-` followed by a decimal integer
/// without leading zeros, so numeric and lexical order cannot silently
/// diverge for ids the engine itself would never generate.
fn parse_segment_id(name: &str) -> Option<u64> {
    let suffix = name.strip_prefix(SEGMENT_PREFIX)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if suffix.len() > 1 && suffix.starts_with('0') {
        return None;
    }
    suffix.parse().ok()
}
