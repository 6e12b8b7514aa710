// Segment reading - linear frame walk with torn-tail classification
//
// The frame stream is not self-synchronizing: a corrupted length prefix
// invalidates everything after it, so the scan stops at the first frame
// that is incomplete or fails validation and reports the offset of the
// last intact frame boundary.

use crate::record::{LogEntry, FRAME_PREFIX_SIZE, MAX_ENTRY_SIZE};
use seglog_core::{Error, Result};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Result of decoding one segment file.
#[derive(Debug)]
pub struct ReadOutcome {
    /// Every intact frame's entry, in write order.
    pub entries: Vec<LogEntry>,
    /// True when the scan stopped at a trailing partial or corrupt frame.
    /// The entries decoded before it are still returned.
    pub torn_tail: bool,
}

/// Full scan state, used by recovery to locate the repair offset.
#[derive(Debug)]
pub(crate) struct SegmentScan {
    pub entries: Vec<LogEntry>,
    /// Byte offset just past the last intact, checksum-valid frame.
    pub valid_len: u64,
    pub torn_tail: bool,
}

/// Decode every intact frame of the segment at `path`, in order.
pub fn read_segment(path: &Path) -> Result<ReadOutcome> {
    let scan = scan_segment(path)?;
    Ok(ReadOutcome {
        entries: scan.entries,
        torn_tail: scan.torn_tail,
    })
}

/// Walk frames from the start of the file. Ending exactly at a frame
/// boundary is a clean tail; anything else (partial length prefix,
/// unreasonable length, short body, checksum failure, undecodable body)
/// marks the tail as torn at the last intact boundary. Only real I/O
/// failures are returned as errors.
pub(crate) fn scan_segment(path: &Path) -> Result<SegmentScan> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut entries = Vec::new();
    let mut valid_len: u64 = 0;
    let mut torn_tail = false;

    loop {
        let mut prefix = [0u8; FRAME_PREFIX_SIZE];
        let read = read_fully(&mut reader, &mut prefix)?;
        if read == 0 {
            break;
        }
        if read < FRAME_PREFIX_SIZE {
            torn_tail = true;
            break;
        }

        let length = u32::from_le_bytes(prefix) as usize;
        if length == 0 || length > MAX_ENTRY_SIZE {
            torn_tail = true;
            break;
        }

        let mut frame = vec![0u8; FRAME_PREFIX_SIZE + length];
        frame[..FRAME_PREFIX_SIZE].copy_from_slice(&prefix);
        let read = read_fully(&mut reader, &mut frame[FRAME_PREFIX_SIZE..])?;
        if read < length {
            torn_tail = true;
            break;
        }

        match LogEntry::decode(&frame) {
            Ok((entry, consumed)) => {
                valid_len += consumed as u64;
                entries.push(entry);
            }
            Err(Error::ChecksumMismatch { .. }) | Err(Error::MalformedFrame(_)) => {
                torn_tail = true;
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(SegmentScan {
        entries,
        valid_len,
        torn_tail,
    })
}

/// Read until the buffer is full or end-of-file; returns the bytes read.
/// Distinguishes a clean end-of-file (0) from a torn prefix (short count),
/// which `read_exact` cannot.
fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(filled)
}
