//! Shard file format.
//!
//! ```text
//! header: magic u32 LE | version u32 LE
//! frame:  len u32 LE | crc32 u32 LE | payload[len]
//! ```
//!
//! The payload is a bincode-encoded [`LogRecord`]. The CRC covers the payload
//! only; a frame whose length runs past the end of the file is a torn write.
//! The 32-bit length caps one encoded record at `MAX_PAYLOAD_LEN` bytes.

use crate::error::{Error, Result};
use bincode::{Decode, Encode};
use crc32fast::Hasher;
use thiserror::Error as ThisError;

pub const SHARD_MAGIC: u32 = 0x564B4853; // "SHKV"
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: u64 = 8;
pub const FRAME_OVERHEAD: usize = 8;
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum LogRecord {
    Put { key: i64, value: String },
    Delete { key: i64 },
}

impl LogRecord {
    pub fn key(&self) -> i64 {
        match self {
            LogRecord::Put { key, .. } | LogRecord::Delete { key } => *key,
        }
    }

    /// Length-prefixed, checksummed frame ready to append.
    pub fn encode_frame(&self) -> Result<Vec<u8>> {
        let payload = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::Serialization(format!("failed to encode record: {}", e)))?;
        let len = payload_len(payload.len())?;

        let mut frame = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&checksum(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }
}

fn payload_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        Error::Serialization(format!(
            "record of {} bytes exceeds the {} byte frame limit",
            len, MAX_PAYLOAD_LEN
        ))
    })
}

fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

pub fn encode_header() -> [u8; HEADER_LEN as usize] {
    let mut header = [0u8; HEADER_LEN as usize];
    header[..4].copy_from_slice(&SHARD_MAGIC.to_le_bytes());
    header[4..].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header
}

/// Checks the file header, returning a description of what is wrong.
pub fn check_header(bytes: &[u8]) -> std::result::Result<(), String> {
    if bytes.len() < HEADER_LEN as usize {
        return Err(format!("header is {} bytes, expected {}", bytes.len(), HEADER_LEN));
    }
    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != SHARD_MAGIC {
        return Err(format!("bad magic {:#010x}", magic));
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(format!("unsupported format version {}", version));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum FrameError {
    #[error("torn frame at offset {offset}")]
    Torn { offset: u64 },

    #[error("checksum mismatch at offset {offset}")]
    Checksum { offset: u64 },

    #[error("undecodable frame at offset {offset}: {reason}")]
    Decode { offset: u64, reason: String },
}

impl FrameError {
    pub fn offset(&self) -> u64 {
        match self {
            FrameError::Torn { offset }
            | FrameError::Checksum { offset }
            | FrameError::Decode { offset, .. } => *offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub offset: u64,
    pub len: u64,
    pub record: LogRecord,
}

/// Walks the frames of a shard file body. Stops after the first bad frame.
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: u64,
    failed: bool,
}

impl<'a> FrameReader<'a> {
    /// `buf` holds the bytes following the header, which starts at file offset `base`.
    pub fn new(buf: &'a [u8], base: u64) -> Self {
        Self {
            buf,
            pos: 0,
            base,
            failed: false,
        }
    }

    fn next_frame(&mut self) -> std::result::Result<Frame, FrameError> {
        let offset = self.base + self.pos as u64;
        let rest = &self.buf[self.pos..];
        if rest.len() < FRAME_OVERHEAD {
            return Err(FrameError::Torn { offset });
        }

        let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let crc = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]);
        let payload = rest
            .get(FRAME_OVERHEAD..FRAME_OVERHEAD + len)
            .ok_or(FrameError::Torn { offset })?;

        if checksum(payload) != crc {
            return Err(FrameError::Checksum { offset });
        }

        let (record, consumed): (LogRecord, usize) =
            bincode::decode_from_slice(payload, bincode::config::standard()).map_err(|e| {
                FrameError::Decode {
                    offset,
                    reason: e.to_string(),
                }
            })?;
        if consumed != len {
            return Err(FrameError::Decode {
                offset,
                reason: format!("{} trailing bytes", len - consumed),
            });
        }

        let frame_len = FRAME_OVERHEAD + len;
        self.pos += frame_len;
        Ok(Frame {
            offset,
            len: frame_len as u64,
            record,
        })
    }
}

impl Iterator for FrameReader<'_> {
    type Item = std::result::Result<Frame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }
        let item = self.next_frame();
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_len_limit() {
        assert_eq!(payload_len(MAX_PAYLOAD_LEN).unwrap(), u32::MAX);
        if let Some(too_large) = MAX_PAYLOAD_LEN.checked_add(1) {
            assert!(matches!(payload_len(too_large), Err(Error::Serialization(_))));
        }
    }

    fn put(key: i64, value: &str) -> LogRecord {
        LogRecord::Put {
            key,
            value: value.to_string(),
        }
    }

    fn body(records: &[LogRecord]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|r| r.encode_frame().unwrap())
            .collect()
    }

    #[test]
    fn test_header_check() {
        assert!(check_header(&encode_header()).is_ok());
        assert!(check_header(&[0u8; 4]).is_err());

        let mut wrong_version = encode_header();
        wrong_version[4] = 9;
        assert!(check_header(&wrong_version).unwrap_err().contains("version"));

        let mut wrong_magic = encode_header();
        wrong_magic[0] ^= 0xFF;
        assert!(check_header(&wrong_magic).unwrap_err().contains("magic"));
    }

    #[test]
    fn test_reader_yields_frames_with_offsets() {
        let records = vec![put(1, "UserA"), LogRecord::Delete { key: 1 }, put(-4, "")];
        let buf = body(&records);

        let frames: Vec<Frame> = FrameReader::new(&buf, HEADER_LEN)
            .collect::<std::result::Result<_, _>>()
            .unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].offset, HEADER_LEN);
        assert_eq!(frames[1].offset, HEADER_LEN + frames[0].len);
        assert_eq!(frames.iter().map(|f| f.len).sum::<u64>(), buf.len() as u64);
        assert_eq!(
            frames.into_iter().map(|f| f.record).collect::<Vec<_>>(),
            records
        );
    }

    #[test]
    fn test_reader_detects_torn_tail() {
        let mut buf = body(&[put(1, "a"), put(2, "b")]);
        let first_len = put(1, "a").encode_frame().unwrap().len();
        buf.truncate(buf.len() - 2);

        let items: Vec<_> = FrameReader::new(&buf, 0).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(
            items[1].clone().unwrap_err(),
            FrameError::Torn {
                offset: first_len as u64
            }
        );
    }

    #[test]
    fn test_reader_detects_bit_flip() {
        let mut buf = body(&[put(7, "payload")]);
        let last = buf.len() - 1;
        buf[last] ^= 0x01;

        let items: Vec<_> = FrameReader::new(&buf, 0).collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(FrameError::Checksum { offset: 0 })));
    }

    #[test]
    fn test_record_key() {
        assert_eq!(put(9, "x").key(), 9);
        assert_eq!(LogRecord::Delete { key: -2 }.key(), -2);
    }
}
