//! Ghost input-data section
//!
//! The uncompressed input section of a ghost recording holds three
//! run-length encoded sub-streams behind an 8-byte header:
//!
//! | Offset | Size | Description                        |
//! |--------|------|------------------------------------|
//! | 0x00   | 2    | Face-button tuple count (BE)       |
//! | 0x02   | 2    | Direction tuple count (BE)         |
//! | 0x04   | 2    | Trick tuple count (BE)             |
//! | 0x06   | 2    | Padding                            |
//! | 0x08   | ...  | Face, direction, trick tuples      |
//!
//! Every tuple is two bytes. Loading the file and decompressing it belongs
//! to the caller; this module only interprets bytes already in memory.

use std::ops::Deref;
use std::sync::Arc;

use kp_core::GhostError;
use tracing::debug;

use crate::ghost_stream::{DirectionLayout, FaceButtonsLayout, TrickLayout, TupleLayout};

/// Maximum size of the uncompressed input section
pub const RKG_UNCOMPRESSED_INPUT_DATA_SECTION_SIZE: usize = 0x2774;
/// Size of the tuple-count header at the start of the section
pub const RKG_INPUT_DATA_HEADER_SIZE: usize = 0x8;
/// Bytes per run-length tuple
pub const TUPLE_SIZE: usize = 2;

/// Immutable ghost input bytes.
///
/// Clones are handles onto the same allocation, so the player that loaded
/// the recording and its decoders never duplicate the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostBuffer(Arc<[u8]>);

impl GhostBuffer {
    /// Copy an input section into a new buffer
    pub fn from_section(bytes: &[u8]) -> Result<Self, GhostError> {
        if bytes.len() < RKG_INPUT_DATA_HEADER_SIZE {
            return Err(GhostError::SectionTooShort {
                len: bytes.len(),
                needed: RKG_INPUT_DATA_HEADER_SIZE,
            });
        }
        if bytes.len() > RKG_UNCOMPRESSED_INPUT_DATA_SECTION_SIZE {
            return Err(GhostError::SectionTooLarge {
                len: bytes.len(),
                limit: RKG_UNCOMPRESSED_INPUT_DATA_SECTION_SIZE,
            });
        }
        Ok(Self(Arc::from(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for GhostBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Location of one sub-stream inside the section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRange {
    /// Byte offset of the first tuple
    pub start: usize,
    /// Number of tuples
    pub tuples: u16,
}

impl StreamRange {
    /// One past the last byte of the stream
    pub fn end(&self) -> usize {
        self.start + self.tuples as usize * TUPLE_SIZE
    }
}

/// A parsed input section with bounds-checked stream ranges
#[derive(Debug, Clone)]
pub struct InputSection {
    buffer: GhostBuffer,
    face: StreamRange,
    direction: StreamRange,
    trick: StreamRange,
}

impl InputSection {
    /// Read the header and check that all three streams fit in the buffer
    pub fn parse(buffer: GhostBuffer) -> Result<Self, GhostError> {
        let len = buffer.len();
        if len < RKG_INPUT_DATA_HEADER_SIZE {
            return Err(GhostError::SectionTooShort {
                len,
                needed: RKG_INPUT_DATA_HEADER_SIZE,
            });
        }

        let count = |at: usize| u16::from_be_bytes([buffer[at], buffer[at + 1]]);

        let face = StreamRange {
            start: RKG_INPUT_DATA_HEADER_SIZE,
            tuples: count(0x0),
        };
        let direction = StreamRange {
            start: face.end(),
            tuples: count(0x2),
        };
        let trick = StreamRange {
            start: direction.end(),
            tuples: count(0x4),
        };

        for (stream, range) in [
            (FaceButtonsLayout::NAME, face),
            (DirectionLayout::NAME, direction),
            (TrickLayout::NAME, trick),
        ] {
            if range.end() > len {
                return Err(GhostError::StreamOverrun {
                    stream,
                    end: range.end(),
                    len,
                });
            }
        }

        debug!(
            "Parsed ghost input section: {} bytes, tuples face={} direction={} trick={}",
            len, face.tuples, direction.tuples, trick.tuples
        );

        Ok(Self {
            buffer,
            face,
            direction,
            trick,
        })
    }

    /// Copy and parse raw section bytes in one step
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GhostError> {
        Self::parse(GhostBuffer::from_section(bytes)?)
    }

    pub fn buffer(&self) -> &GhostBuffer {
        &self.buffer
    }

    pub fn face(&self) -> StreamRange {
        self.face
    }

    pub fn direction(&self) -> StreamRange {
        self.direction
    }

    pub fn trick(&self) -> StreamRange {
        self.trick
    }

    /// Scan every tuple for values no recording can legitimately contain
    pub fn validate(&self) -> Result<(), GhostError> {
        self.validate_stream::<FaceButtonsLayout>(self.face)?;
        self.validate_stream::<DirectionLayout>(self.direction)?;
        self.validate_stream::<TrickLayout>(self.trick)
    }

    fn validate_stream<L: TupleLayout>(&self, range: StreamRange) -> Result<(), GhostError> {
        for (index, tuple) in self.tuples(range).enumerate() {
            if !L::is_valid(tuple) {
                return Err(GhostError::InvalidTuple {
                    stream: L::NAME,
                    index,
                    value: tuple[0],
                });
            }
        }
        Ok(())
    }

    /// Frames covered by each stream as (face, direction, trick)
    pub fn frame_counts(&self) -> (u32, u32, u32) {
        (
            self.stream_frames::<FaceButtonsLayout>(self.face),
            self.stream_frames::<DirectionLayout>(self.direction),
            self.stream_frames::<TrickLayout>(self.trick),
        )
    }

    /// Frames until every stream is exhausted
    pub fn frame_count(&self) -> u32 {
        let (face, direction, trick) = self.frame_counts();
        face.max(direction).max(trick)
    }

    fn stream_frames<L: TupleLayout>(&self, range: StreamRange) -> u32 {
        self.tuples(range)
            .map(|tuple| L::hold_frames(tuple) as u32)
            .sum()
    }

    fn tuples(&self, range: StreamRange) -> impl Iterator<Item = [u8; 2]> + '_ {
        self.buffer[range.start..range.end()]
            .chunks_exact(TUPLE_SIZE)
            .map(|pair| [pair[0], pair[1]])
    }
}
