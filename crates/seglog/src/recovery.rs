// Startup recovery - determines where the log left off and repairs a torn
// tail before the segment is reopened for append.
//
// Only the newest segment is scanned: prior segments were flushed and
// closed before rotation, so they are already durable and are never
// reopened for write.

use crate::reader;
use seglog_core::Result;
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing::info;

/// What recovery found in the newest segment.
#[derive(Debug)]
pub(crate) struct RecoveryOutcome {
    /// Sequence number of the last valid entry, or 0 for an empty segment.
    /// The engine resumes numbering at `last_sequence + 1`.
    pub last_sequence: u64,
    /// True when a torn tail was truncated away.
    pub repaired: bool,
    /// Segment length after repair.
    pub valid_len: u64,
}

/// Scan the segment and, if its tail is torn (a partial trailing write or a
/// checksum-invalid frame), truncate the file to the end of the last intact
/// frame. Without the truncation, later appends would write valid frames
/// after garbage bytes that no future scan could skip.
pub(crate) fn recover_segment(path: &Path) -> Result<RecoveryOutcome> {
    let scan = reader::scan_segment(path)?;

    let last_sequence = scan
        .entries
        .last()
        .map(|e| e.sequence_number)
        .unwrap_or(0);

    if !scan.torn_tail {
        return Ok(RecoveryOutcome {
            last_sequence,
            repaired: false,
            valid_len: scan.valid_len,
        });
    }

    let file_len = fs::metadata(path)?.len();
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(scan.valid_len)?;

    info!(
        path = ?path,
        valid_len = scan.valid_len,
        discarded = file_len - scan.valid_len,
        "repaired torn segment tail"
    );

    Ok(RecoveryOutcome {
        last_sequence,
        repaired: true,
        valid_len: scan.valid_len,
    })
}
