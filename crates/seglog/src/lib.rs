//! # seglog
//!
//! A durable, segmented, append-only write-ahead log.
//!
//! A host process (a database, a replicated state machine) appends opaque
//! payloads before applying them, so its state can be reconstructed after a
//! crash. Entries are written as length-prefixed, CRC-checked frames into
//! numbered segment files; writes are buffered and flushed by a background
//! task on a fixed interval (or explicitly via [`Wal::sync`]). On open, the
//! newest segment is scanned to recover the last assigned sequence number,
//! and a tail torn by a mid-write crash is truncated away before new
//! appends are accepted.
//!
//! Each [`Wal`] value owns one directory; a process may hold any number of
//! independent instances over different directories. The engine is the sole
//! writer for its directory; cross-process coordination is the caller's
//! responsibility.
//!
//! ```no_run
//! use seglog::{Wal, WalConfig};
//!
//! # fn main() -> seglog::Result<()> {
//! let mut wal = Wal::open(WalConfig {
//!     directory: "/var/lib/myapp/wal".into(),
//!     ..WalConfig::default()
//! })?;
//!
//! let sequence = wal.append(b"state mutation")?;
//! wal.sync()?;
//!
//! let outcome = wal.read_all(wal.current_segment_id()?)?;
//! assert_eq!(outcome.entries.last().unwrap().sequence_number, sequence);
//! wal.close();
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{info, warn};

mod flusher;
pub mod reader;
pub mod record;
mod recovery;
pub mod segment;
mod writer;

pub use reader::ReadOutcome;
pub use record::LogEntry;
pub use seglog_core::{Error, Result};
pub use segment::{SegmentInfo, SegmentManager, SEGMENT_PREFIX};

use flusher::Flusher;
use writer::SegmentWriter;

/// Log configuration options.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Directory holding the segment files; created if absent.
    pub directory: PathBuf,
    /// Maximum segment size in bytes before rotation.
    pub max_segment_size: u64,
    /// Maximum number of segment files; the oldest is deleted when the
    /// count is exceeded after a rotation.
    pub max_segments: usize,
    /// Whether flushes force physical durability (fsync) or only reach the
    /// OS buffer cache.
    pub fsync: bool,
    /// Interval of the background flush task.
    pub flush_interval: Duration,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("wal"),
            max_segment_size: 64 * 1024 * 1024, // 64 MB
            max_segments: 8,
            fsync: true,
            flush_interval: Duration::from_millis(200),
        }
    }
}

/// A point-in-time summary of the log.
#[derive(Debug, Clone)]
pub struct WalStats {
    /// Number of segment files on disk.
    pub segment_count: usize,
    /// Total bytes across all segment files.
    pub total_bytes: u64,
    /// Sequence number of the most recently appended entry.
    pub last_sequence: u64,
}

/// Writer-side state, mutated only under the engine lock. `writer` is
/// `None` once the log is closed; the file handle is released at that
/// point, not at drop.
pub(crate) struct WriterState {
    pub(crate) writer: Option<SegmentWriter>,
    pub(crate) last_sequence: u64,
}

/// State shared between the engine handle and the background flusher.
pub(crate) struct SharedState {
    pub(crate) state: Mutex<WriterState>,
}

/// The write-ahead log engine.
///
/// `append` and `sync` take `&self` and are safe to call from multiple
/// threads; they serialize on one internal lock, which the background flush
/// task also takes. Sequence numbers are assigned in lock-acquisition
/// order and frames are written in sequence order, across rotations.
pub struct Wal {
    config: WalConfig,
    manager: SegmentManager,
    shared: Arc<SharedState>,
    flusher: Option<Flusher>,
}

impl Wal {
    /// Open the log in `config.directory`.
    ///
    /// Scans the directory (any unrecognized filename is
    /// [`Error::DirectoryCorrupt`]), recovers the last sequence number from
    /// the newest segment, repairs a torn tail by truncation, opens the
    /// newest segment for append (creating `segment-0` in a fresh
    /// directory), and starts the periodic flush task.
    pub fn open(config: WalConfig) -> Result<Wal> {
        fs::create_dir_all(&config.directory)?;

        let manager = SegmentManager::new(config.directory.clone());
        let latest = manager.latest_segment()?;

        let (last_sequence, repaired) = match &latest {
            Some(info) => {
                let outcome = recovery::recover_segment(&info.path)?;
                (outcome.last_sequence, outcome.repaired)
            }
            None => (0, false),
        };

        let writer = SegmentWriter::open(
            SegmentManager::new(config.directory.clone()),
            latest.as_ref(),
            config.max_segment_size,
            config.max_segments,
            config.fsync,
        )?;

        let shared = Arc::new(SharedState {
            state: Mutex::new(WriterState {
                writer: Some(writer),
                last_sequence,
            }),
        });

        let flusher = Flusher::spawn(Arc::clone(&shared), config.flush_interval)?;

        info!(
            directory = ?config.directory,
            last_sequence,
            repaired,
            "opened write-ahead log"
        );

        Ok(Wal {
            config,
            manager,
            shared,
            flusher: Some(flusher),
        })
    }

    /// Append an opaque payload, returning its assigned sequence number.
    ///
    /// The frame goes into the in-memory buffer; it reaches the OS (and,
    /// with fsync enabled, stable storage) on the next [`Wal::sync`] or
    /// periodic flush. The store may rotate to a new segment first.
    pub fn append(&self, payload: &[u8]) -> Result<u64> {
        let mut guard = self.lock_state()?;
        let state = &mut *guard;
        let writer = state.writer.as_mut().ok_or(Error::Closed)?;

        let sequence = state.last_sequence + 1;
        let frame = LogEntry::new(sequence, payload.to_vec()).encode()?;
        writer.append(&frame)?;
        state.last_sequence = sequence;

        Ok(sequence)
    }

    /// Flush buffered frames to the OS, forcing physical durability when
    /// fsync is enabled. On failure the buffered data stays in place for a
    /// later retry.
    pub fn sync(&self) -> Result<()> {
        let mut guard = self.lock_state()?;
        guard.writer.as_mut().ok_or(Error::Closed)?.flush()
    }

    /// Decode every intact entry of the given segment, in order.
    ///
    /// A trailing partial or corrupt frame does not fail the read: the
    /// entries decoded before it are returned with
    /// [`ReadOutcome::torn_tail`] set. Reading the currently writable
    /// segment flushes the application buffer first so the scan sees every
    /// appended frame.
    pub fn read_all(&self, segment_id: u64) -> Result<ReadOutcome> {
        let mut guard = self.lock_state()?;
        let writer = guard.writer.as_mut().ok_or(Error::Closed)?;
        if writer.segment_id() == segment_id {
            writer.flush_buffer()?;
        }

        reader::read_segment(&self.manager.segment_path(segment_id))
    }

    /// Close the log: cancel the background flush task, flush once more
    /// (best effort), and release the file handle. Every further operation
    /// fails with [`Error::Closed`]. Idempotent.
    pub fn close(&mut self) {
        if let Some(flusher) = self.flusher.take() {
            flusher.shutdown();
        }

        match self.shared.state.lock() {
            Ok(mut state) => {
                if let Some(mut writer) = state.writer.take() {
                    if let Err(e) = writer.flush() {
                        warn!(error = %e, "final flush on close failed");
                    }
                }
            }
            Err(_) => warn!("writer state poisoned during close"),
        }
    }

    /// Sequence number of the most recently appended entry (0 if none).
    pub fn last_sequence(&self) -> Result<u64> {
        let guard = self.lock_state()?;
        if guard.writer.is_none() {
            return Err(Error::Closed);
        }
        Ok(guard.last_sequence)
    }

    /// Id of the currently writable segment.
    pub fn current_segment_id(&self) -> Result<u64> {
        let guard = self.lock_state()?;
        guard
            .writer
            .as_ref()
            .map(|w| w.segment_id())
            .ok_or(Error::Closed)
    }

    /// Summary of the on-disk log. Flushes the application buffer so the
    /// reported sizes include every appended frame.
    pub fn stats(&self) -> Result<WalStats> {
        let mut guard = self.lock_state()?;
        let state = &mut *guard;
        let writer = state.writer.as_mut().ok_or(Error::Closed)?;
        writer.flush_buffer()?;

        let segments = self.manager.list_segments()?;
        Ok(WalStats {
            segment_count: segments.len(),
            total_bytes: segments.iter().map(|s| s.size).sum(),
            last_sequence: state.last_sequence,
        })
    }

    /// The configuration this log was opened with.
    pub fn config(&self) -> &WalConfig {
        &self.config
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, WriterState>> {
        self.shared.state.lock().map_err(|_| Error::LockPoisoned)
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        self.close();
    }
}
