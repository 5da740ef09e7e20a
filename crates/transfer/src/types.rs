use std::time::{Duration, Instant};

/// A contiguous byte range of the payload, sent in one PUT.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Byte offset of the first byte within the payload.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
}

impl Chunk {
    /// Number of bytes in the chunk.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Inclusive offset of the last byte.
    ///
    /// Only meaningful for non-empty chunks.
    pub fn end_byte(&self) -> u64 {
        self.offset + self.data.len() as u64 - 1
    }
}

/// How a payload is delivered to its signed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// One PUT carrying the whole buffer.
    SingleShot,
    /// Range-addressed PUTs following the resumable protocol.
    Resumable,
}

impl TransferMode {
    /// Picks the mode for a payload of `size` bytes.
    ///
    /// Only payloads strictly larger than `threshold` use the resumable protocol.
    pub fn for_size(size: u64, threshold: u64) -> Self {
        if size > threshold {
            TransferMode::Resumable
        } else {
            TransferMode::SingleShot
        }
    }
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferMode::SingleShot => f.write_str("single-shot"),
            TransferMode::Resumable => f.write_str("resumable"),
        }
    }
}

/// Summary of a finished upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    pub mode: TransferMode,
    pub bytes_sent: u64,
    pub chunks_sent: u32,
    pub elapsed: Duration,
}

/// Transfer progress for one upload call.
///
/// Holds the offset of the next unsent byte. The offset only moves forward, and
/// only by the length of a chunk the server has acknowledged.
#[derive(Debug)]
pub struct UploadSession {
    total_size: u64,
    start_byte: u64,
    chunks_sent: u32,
    started_at: Instant,
}

impl UploadSession {
    /// Creates a session for a payload of `total_size` bytes.
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            start_byte: 0,
            chunks_sent: 0,
            started_at: Instant::now(),
        }
    }

    /// Offset of the next unsent byte.
    pub fn start_byte(&self) -> u64 {
        self.start_byte
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Number of acknowledged chunks.
    pub fn chunks_sent(&self) -> u32 {
        self.chunks_sent
    }

    /// Bytes still waiting to be sent.
    pub fn remaining(&self) -> u64 {
        self.total_size - self.start_byte
    }

    /// Records that the server acknowledged the chunk ending at `end_byte`.
    ///
    /// Returns the new start offset.
    pub fn acknowledge(&mut self, end_byte: u64) -> u64 {
        debug_assert!(end_byte >= self.start_byte);
        debug_assert!(end_byte < self.total_size);
        self.start_byte = end_byte + 1;
        self.chunks_sent += 1;
        self.start_byte
    }

    /// Builds the final report.
    pub fn report(&self, mode: TransferMode) -> UploadReport {
        UploadReport {
            mode,
            bytes_sent: self.start_byte,
            chunks_sent: self.chunks_sent,
            elapsed: self.started_at.elapsed(),
        }
    }
}
