//! Event log envelope format (component C1, spec §5.1).
//!
//! A type-extensible, binary framing with:
//! - 24-byte naturally aligned header
//! - CRC32 checksum for integrity
//! - bincode serialization for payloads
//! - a partition key and dedup fingerprint carried in the header so a
//!   reader can route and dedup without decoding the payload
//!
//! # Header Layout (24 bytes)
//!
//! ```text
//! ┌──────────────┬───────────┬──────────────────────────────────────┐
//! │ payload_len  │ 2 bytes   │ Payload size (max 64KB)               │
//! │ stream_id    │ 1 byte    │ Which logical stream (reference/trade/…)│
//! │ schema_ver   │ 1 byte    │ Payload format version (0-255)        │
//! │ partition_key│ 8 bytes   │ Routes to a single-writer worker      │
//! │ seq_id       │ 8 bytes   │ Monotonic sequence within the stream  │
//! │ checksum     │ 4 bytes   │ CRC32 of payload                      │
//! └──────────────┴───────────┴──────────────────────────────────────┘
//! ```

use crate::error::EventLogError;
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

pub const EVENT_HEADER_SIZE: usize = 24;

/// Event log header. `#[repr(C, packed)]` so its on-disk size matches
/// `EVENT_HEADER_SIZE` exactly with no compiler-inserted padding.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub partition_key: u64,
    pub seq_id: u64,
    pub checksum: u32,
    pub payload_len: u16,
    pub stream_id: u8,
    pub schema_version: u8,
}

impl EventHeader {
    pub fn new(
        stream_id: StreamId,
        partition_key: u64,
        seq_id: u64,
        schema_version: u8,
        payload: &[u8],
    ) -> Self {
        Self {
            partition_key,
            seq_id,
            checksum: crc32_checksum(payload),
            payload_len: payload.len() as u16,
            stream_id: stream_id as u8,
            schema_version,
        }
    }

    pub fn to_bytes(&self) -> [u8; EVENT_HEADER_SIZE] {
        let mut buf = [0u8; EVENT_HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.partition_key.to_le_bytes());
        buf[8..16].copy_from_slice(&self.seq_id.to_le_bytes());
        buf[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf[20..22].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[22] = self.stream_id;
        buf[23] = self.schema_version;
        buf
    }

    pub fn from_bytes(buf: &[u8; EVENT_HEADER_SIZE]) -> Self {
        Self {
            partition_key: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            seq_id: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            checksum: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
            payload_len: u16::from_le_bytes(buf[20..22].try_into().unwrap()),
            stream_id: buf[22],
            schema_version: buf[23],
        }
    }

    pub fn verify_checksum(&self, payload: &[u8]) -> bool {
        self.checksum == crc32_checksum(payload)
    }
}

/// Logical event streams. Each component's egress lands on its own stream
/// so a reader can replay just the streams it cares about.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamId {
    Reference = 1,
    MarketData = 2,
    Position = 3,
    Contract = 4,
    Inventory = 5,
    Limit = 6,
    Locate = 7,
    ShortSell = 8,
    Rule = 9,
    DeadLetter = 255,
}

impl TryFrom<u8> for StreamId {
    type Error = EventLogError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Reference),
            2 => Ok(Self::MarketData),
            3 => Ok(Self::Position),
            4 => Ok(Self::Contract),
            5 => Ok(Self::Inventory),
            6 => Ok(Self::Limit),
            7 => Ok(Self::Locate),
            8 => Ok(Self::ShortSell),
            9 => Ok(Self::Rule),
            255 => Ok(Self::DeadLetter),
            other => Err(EventLogError::UnknownStream(other)),
        }
    }
}

#[inline]
pub fn crc32_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Appends framed entries to an underlying writer (a file, in production;
/// a `Vec<u8>` or `Cursor` in tests).
pub struct EventLogWriter<W: Write> {
    writer: W,
    next_seq: u64,
}

impl<W: Write> EventLogWriter<W> {
    pub fn new(writer: W, start_seq: u64) -> Self {
        Self {
            writer,
            next_seq: start_seq,
        }
    }

    pub fn append<T: Serialize>(
        &mut self,
        stream_id: StreamId,
        partition_key: u64,
        payload: &T,
    ) -> Result<u64, EventLogError> {
        let bytes =
            bincode::serialize(payload).map_err(|e| EventLogError::Serialization(e.to_string()))?;
        let seq_id = self.next_seq;
        self.next_seq += 1;
        let header = EventHeader::new(stream_id, partition_key, seq_id, 1, &bytes);
        self.writer.write_all(&header.to_bytes())?;
        self.writer.write_all(&bytes)?;
        Ok(seq_id)
    }

    pub fn flush(&mut self) -> Result<(), EventLogError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}

#[derive(Debug)]
pub struct RawEntry {
    pub header: EventHeader,
    pub payload: Vec<u8>,
}

/// Reads framed entries back, verifying checksums. Used both for live
/// tailing and for full replay from the start of the log (spec §5.1
/// "Replay: a consumer can request replay from a cursor").
pub struct EventLogReader<R: Read> {
    reader: R,
}

impl<R: Read> EventLogReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn read_entry(&mut self) -> Result<Option<RawEntry>, EventLogError> {
        let mut header_buf = [0u8; EVENT_HEADER_SIZE];
        match self.reader.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let header = EventHeader::from_bytes(&header_buf);
        let mut payload = vec![0u8; header.payload_len as usize];
        self.reader.read_exact(&mut payload)?;
        if !header.verify_checksum(&payload) {
            return Err(EventLogError::ChecksumMismatch {
                seq_id: header.seq_id,
                expected: header.checksum,
                got: crc32_checksum(&payload),
            });
        }
        Ok(Some(RawEntry { header, payload }))
    }

    pub fn iter(&mut self) -> EventLogIterator<'_, R> {
        EventLogIterator { reader: self }
    }
}

pub struct EventLogIterator<'a, R: Read> {
    reader: &'a mut EventLogReader<R>,
}

impl<R: Read> Iterator for EventLogIterator<'_, R> {
    type Item = Result<RawEntry, EventLogError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// A decoded entry paired with its stream, ready for dispatch.
#[derive(Debug, Deserialize, Serialize)]
pub struct DecodedEntry<T> {
    pub seq_id: u64,
    pub partition_key: u64,
    pub payload: T,
}

impl<R: Read> EventLogIterator<'_, R> {
    /// Decode a raw entry's payload as `T`, checking the stream id matches.
    pub fn decode<T: for<'de> Deserialize<'de>>(
        entry: RawEntry,
        expect: StreamId,
    ) -> Result<DecodedEntry<T>, EventLogError> {
        let got = StreamId::try_from(entry.header.stream_id)?;
        if got as u8 != expect as u8 {
            return Err(EventLogError::UnknownStream(entry.header.stream_id));
        }
        let payload = bincode::deserialize(&entry.payload)
            .map_err(|e| EventLogError::Serialization(e.to_string()))?;
        Ok(DecodedEntry {
            seq_id: entry.header.seq_id,
            partition_key: entry.header.partition_key,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_is_exactly_24_bytes() {
        assert_eq!(std::mem::size_of::<EventHeader>(), EVENT_HEADER_SIZE);
    }

    #[test]
    fn header_round_trips_through_bytes() {
        let header = EventHeader::new(StreamId::Position, 42, 7, 1, b"payload");
        let bytes = header.to_bytes();
        assert_eq!(EventHeader::from_bytes(&bytes), header);
    }

    #[test]
    fn write_then_read_back_preserves_payload_and_partition_key() {
        let mut buffer = Vec::new();
        {
            let mut writer = EventLogWriter::new(&mut buffer, 1);
            let seq = writer
                .append(StreamId::Position, 99, &("hello".to_string(), 42u64))
                .unwrap();
            assert_eq!(seq, 1);
            writer.flush().unwrap();
        }
        let cursor = Cursor::new(&buffer);
        let mut reader = EventLogReader::new(cursor);
        let entry = reader.read_entry().unwrap().unwrap();
        let partition_key = entry.header.partition_key;
        assert_eq!(partition_key, 99);
        let decoded: (String, u64) = bincode::deserialize(&entry.payload).unwrap();
        assert_eq!(decoded, ("hello".to_string(), 42));
        assert!(reader.read_entry().unwrap().is_none());
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut buffer = Vec::new();
        {
            let mut writer = EventLogWriter::new(&mut buffer, 1);
            writer.append(StreamId::Position, 1, &"data").unwrap();
        }
        buffer[EVENT_HEADER_SIZE] ^= 0xFF;
        let mut reader = EventLogReader::new(Cursor::new(&buffer));
        let err = reader.read_entry().unwrap_err();
        assert!(matches!(err, EventLogError::ChecksumMismatch { .. }));
    }

    #[test]
    fn unknown_stream_id_is_rejected() {
        assert!(matches!(
            StreamId::try_from(200),
            Err(EventLogError::UnknownStream(200))
        ));
    }
}
