// Log entry format and frame encoding/decoding
//
// Frame format (binary):
// [length: u32 LE] [entry bytes]
//
// The entry bytes are the bincode encoding of `LogEntry`: the sequence
// number, the caller's opaque payload, and a CRC-32 over the payload
// concatenated with the full 8-byte little-endian sequence number.

use crc32fast::Hasher;
use seglog_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Size of the length prefix preceding every entry on disk.
pub const FRAME_PREFIX_SIZE: usize = 4;

/// Sanity bound on a single serialized entry. A declared length above this
/// is treated as corruption rather than an allocation request.
pub const MAX_ENTRY_SIZE: usize = 16 * 1024 * 1024;

/// A single entry in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonically increasing sequence number, assigned by the engine.
    /// The first entry ever written to a fresh log is 1.
    pub sequence_number: u64,
    /// Opaque bytes supplied by the caller; never inspected by the engine.
    pub payload: Vec<u8>,
    /// CRC-32 (IEEE) over `payload ++ sequence_number.to_le_bytes()`.
    pub checksum: u32,
}

impl LogEntry {
    /// Create an entry, computing its checksum.
    pub fn new(sequence_number: u64, payload: Vec<u8>) -> Self {
        let checksum = checksum_of(sequence_number, &payload);
        Self {
            sequence_number,
            payload,
            checksum,
        }
    }

    /// Encode the entry to a frame: a u32 LE length prefix followed by the
    /// bincode-serialized entry.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)
            .map_err(|e| Error::MalformedFrame(format!("failed to serialize entry: {}", e)))?;

        let mut frame = Vec::with_capacity(FRAME_PREFIX_SIZE + body.len());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(&body);

        Ok(frame)
    }

    /// Decode one frame from the start of `data`, verifying the checksum.
    ///
    /// Returns the entry and the number of bytes consumed. Structural
    /// problems (short buffer, unreasonable length, undeserializable body)
    /// are `MalformedFrame`; an intact frame whose stored checksum does not
    /// match the recomputed one is `ChecksumMismatch`.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < FRAME_PREFIX_SIZE {
            return Err(Error::MalformedFrame(format!(
                "frame shorter than length prefix: {} bytes",
                data.len()
            )));
        }

        let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if length == 0 || length > MAX_ENTRY_SIZE {
            return Err(Error::MalformedFrame(format!(
                "unreasonable frame length: {} bytes",
                length
            )));
        }

        let total = FRAME_PREFIX_SIZE + length;
        if data.len() < total {
            return Err(Error::MalformedFrame(format!(
                "incomplete frame: declared {} bytes, {} available",
                length,
                data.len() - FRAME_PREFIX_SIZE
            )));
        }

        let entry: LogEntry = bincode::deserialize(&data[FRAME_PREFIX_SIZE..total])
            .map_err(|e| Error::MalformedFrame(format!("failed to deserialize entry: {}", e)))?;

        let actual = checksum_of(entry.sequence_number, &entry.payload);
        if actual != entry.checksum {
            return Err(Error::ChecksumMismatch {
                expected: entry.checksum,
                actual,
            });
        }

        Ok((entry, total))
    }
}

/// CRC-32 over the payload followed by the full 8-byte LE sequence number.
fn checksum_of(sequence_number: u64, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.update(&sequence_number.to_le_bytes());
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let entry = LogEntry::new(42, b"hello".to_vec());

        let frame = entry.encode().unwrap();
        assert!(frame.len() > FRAME_PREFIX_SIZE);

        let (decoded, consumed) = LogEntry::decode(&frame).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn test_empty_payload() {
        let entry = LogEntry::new(1, Vec::new());

        let frame = entry.encode().unwrap();
        let (decoded, _) = LogEntry::decode(&frame).unwrap();

        assert_eq!(decoded.sequence_number, 1);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_checksum_covers_full_sequence_number() {
        // Two entries that differ only in the upper bytes of the sequence
        // number must have different checksums.
        let low = LogEntry::new(1, b"payload".to_vec());
        let high = LogEntry::new(1 | (1 << 40), b"payload".to_vec());

        assert_ne!(low.checksum, high.checksum);
    }

    #[test]
    fn test_payload_corruption_detected() {
        let entry = LogEntry::new(7, b"some payload bytes".to_vec());
        let mut frame = entry.encode().unwrap();

        // Flip a bit inside the payload region of the serialized entry.
        let idx = frame.len() - 8;
        frame[idx] ^= 0x01;

        match LogEntry::decode(&frame) {
            Err(Error::ChecksumMismatch { .. }) | Err(Error::MalformedFrame(_)) => {}
            other => panic!("expected corruption error, got {:?}", other),
        }
    }

    #[test]
    fn test_sequence_number_corruption_detected() {
        let entry = LogEntry::new(3, b"x".to_vec());
        let mut frame = entry.encode().unwrap();

        // The serialized entry starts with the 8-byte LE sequence number;
        // flip its most significant byte.
        frame[FRAME_PREFIX_SIZE + 7] ^= 0xFF;

        match LogEntry::decode(&frame) {
            Err(Error::ChecksumMismatch { .. }) => {}
            other => panic!("expected checksum mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_incomplete_frame() {
        let entry = LogEntry::new(9, b"value".to_vec());
        let frame = entry.encode().unwrap();

        let result = LogEntry::decode(&frame[..frame.len() - 1]);
        assert!(matches!(result, Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn test_unreasonable_length_rejected() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&(u32::MAX).to_le_bytes());
        frame.extend_from_slice(&[0u8; 16]);

        let result = LogEntry::decode(&frame);
        assert!(matches!(result, Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn test_zero_length_rejected() {
        let frame = 0u32.to_le_bytes();
        let result = LogEntry::decode(&frame);
        assert!(matches!(result, Err(Error::MalformedFrame(_))));
    }
}
