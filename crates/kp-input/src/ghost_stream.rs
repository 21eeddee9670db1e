//! Ghost sub-stream decoders
//!
//! Each sub-stream is a list of two-byte (value, duration) tuples. A stream
//! holds the current tuple's value for `duration` frames, then moves on to
//! the next tuple, so reading once per frame yields exactly what an
//! uncompressed per-frame recording would have held.
//!
//! The three streams share the cursor mechanics in [`GhostButtonsStream`] and
//! differ only in how a tuple splits into value and duration ([`TupleLayout`]).

use std::fmt;
use std::marker::PhantomData;

use tracing::{debug, trace};

use crate::ghost_file::{GhostBuffer, StreamRange, TUPLE_SIZE};

/// How one stream's tuples split into value and duration
pub trait TupleLayout {
    /// Stream name used in logs and errors
    const NAME: &'static str;
    /// Value reported once the stream is exhausted
    const NEUTRAL: u8;

    /// The semantic value held by a tuple
    fn value(tuple: [u8; 2]) -> u8;

    /// Encoded duration in frames
    fn duration(tuple: [u8; 2]) -> u16 {
        tuple[1] as u16
    }

    /// Frames the tuple is actually held. A zero duration still lasts a frame.
    fn hold_frames(tuple: [u8; 2]) -> u16 {
        Self::duration(tuple).max(1)
    }

    /// Whether a recording could have produced this tuple
    fn is_valid(tuple: [u8; 2]) -> bool;
}

/// Face buttons: `[buttons, duration]`.
///
/// | Bit  | Meaning                                   |
/// |------|-------------------------------------------|
/// | 0x01 | Accelerate                                |
/// | 0x02 | Brake / drift                             |
/// | 0x04 | Item                                      |
/// | 0x08 | Brake pressed after accelerate            |
///
/// 0x08 registers a hop whether or not 0x01 is also held. Recordings rely on
/// this, including ones no real controller could have produced, so the bit is
/// passed through untouched.
#[derive(Debug, Clone, Copy)]
pub struct FaceButtonsLayout;

impl TupleLayout for FaceButtonsLayout {
    const NAME: &'static str = "face";
    const NEUTRAL: u8 = 0x00;

    fn value(tuple: [u8; 2]) -> u8 {
        tuple[0]
    }

    fn is_valid(tuple: [u8; 2]) -> bool {
        tuple[0] & !0x0F == 0
    }
}

/// Analog direction: `[xy, duration]`.
///
/// Low nibble is vertical (0xE up, 0x7 neutral, 0x0 down), high nibble is
/// horizontal (0xE right, 0x7 neutral, 0x0 left).
#[derive(Debug, Clone, Copy)]
pub struct DirectionLayout;

impl DirectionLayout {
    /// Split a direction byte into raw (x, y) stick codes
    pub fn split(value: u8) -> (u8, u8) {
        (value >> 4, value & 0x0F)
    }
}

impl TupleLayout for DirectionLayout {
    const NAME: &'static str = "direction";
    const NEUTRAL: u8 = 0x77;

    fn value(tuple: [u8; 2]) -> u8 {
        tuple[0]
    }

    fn is_valid(tuple: [u8; 2]) -> bool {
        let (x, y) = Self::split(tuple[0]);
        x <= 0xE && y <= 0xE
    }
}

/// Trick d-pad: `[0TTT DDDD, DDDD DDDD]`.
///
/// Bits 0x70 of the first byte are the trick (0 none, 1 up/wheelie, 2 down,
/// 3 left, 4 right). The low nibble of the first byte supplies the upper four
/// bits of a 12-bit duration whose low eight bits are the second byte, so the
/// sequence boundary cannot be judged from the second byte alone.
#[derive(Debug, Clone, Copy)]
pub struct TrickLayout;

impl TupleLayout for TrickLayout {
    const NAME: &'static str = "trick";
    const NEUTRAL: u8 = 0x00;

    fn value(tuple: [u8; 2]) -> u8 {
        (tuple[0] >> 4) & 0x7
    }

    fn duration(tuple: [u8; 2]) -> u16 {
        ((tuple[0] as u16 & 0x0F) << 8) | tuple[1] as u16
    }

    fn is_valid(tuple: [u8; 2]) -> bool {
        tuple[0] & 0x80 == 0 && Self::value(tuple) <= 4
    }
}

/// Stream lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Tuples remain to be read
    Reading,
    /// Every tuple has been played out
    Finished,
}

/// Cursor over one run-length encoded sub-stream of a shared ghost buffer
#[derive(Clone)]
pub struct GhostButtonsStream<L> {
    buffer: GhostBuffer,
    range: StreamRange,
    /// Index of the tuple being played, i.e. completed sequences
    current_sequence: u32,
    /// Frames already played from the current tuple
    read_sequence_frames: u16,
    state: StreamState,
    layout: PhantomData<L>,
}

pub type FaceButtonsStream = GhostButtonsStream<FaceButtonsLayout>;
pub type DirectionStream = GhostButtonsStream<DirectionLayout>;
pub type TrickStream = GhostButtonsStream<TrickLayout>;

impl<L: TupleLayout> GhostButtonsStream<L> {
    /// Create a stream over `range`.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the end of the buffer. [`InputSection`]
    /// only hands out ranges it has checked.
    ///
    /// [`InputSection`]: crate::ghost_file::InputSection
    pub fn new(buffer: GhostBuffer, range: StreamRange) -> Self {
        assert!(
            range.end() <= buffer.len(),
            "{} stream ends at 0x{:x} past buffer of 0x{:x} bytes",
            L::NAME,
            range.end(),
            buffer.len()
        );

        let mut stream = Self {
            buffer,
            range,
            current_sequence: 0,
            read_sequence_frames: 0,
            state: StreamState::Reading,
            layout: PhantomData,
        };
        stream.reset();
        stream
    }

    /// Rewind to the first tuple
    pub fn reset(&mut self) {
        self.current_sequence = 0;
        self.read_sequence_frames = 0;
        self.state = if self.range.tuples == 0 {
            StreamState::Finished
        } else {
            StreamState::Reading
        };
    }

    /// Play one frame.
    ///
    /// Returns the value held this frame, or `None` once the stream is
    /// exhausted.
    pub fn read_frame(&mut self) -> Option<u8> {
        if self.state != StreamState::Reading {
            return None;
        }

        if self.read_sequence_frames >= L::hold_frames(self.tuple()) {
            self.current_sequence += 1;
            self.read_sequence_frames = 0;

            if self.current_sequence >= self.range.tuples as u32 {
                debug!(
                    "{} stream finished after {} sequences",
                    L::NAME,
                    self.current_sequence
                );
                self.state = StreamState::Finished;
                return None;
            }

            trace!(
                "{} stream sequence {} at 0x{:x}",
                L::NAME,
                self.current_sequence,
                self.cursor()
            );
        }

        self.read_sequence_frames += 1;
        Some(L::value(self.tuple()))
    }

    /// Whether the last [`read_frame`](Self::read_frame) was the first frame
    /// of its tuple
    pub fn read_is_new_sequence(&self) -> bool {
        self.state == StreamState::Reading && self.read_sequence_frames == 1
    }

    /// Value of the loaded tuple, without advancing
    pub fn read_val(&self) -> Option<u8> {
        match self.state {
            StreamState::Reading => Some(L::value(self.tuple())),
            StreamState::Finished => None,
        }
    }

    /// Frames left before the loaded tuple is exhausted
    pub fn remaining_sequence_frames(&self) -> u16 {
        match self.state {
            StreamState::Reading => L::hold_frames(self.tuple()) - self.read_sequence_frames,
            StreamState::Finished => 0,
        }
    }

    /// Byte offset of the loaded tuple in the buffer
    pub fn cursor(&self) -> usize {
        self.range.start + self.current_sequence as usize * TUPLE_SIZE
    }

    pub fn current_sequence(&self) -> u32 {
        self.current_sequence
    }

    pub fn read_sequence_frames(&self) -> u16 {
        self.read_sequence_frames
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == StreamState::Finished
    }

    fn tuple(&self) -> [u8; 2] {
        let at = self.cursor();
        [self.buffer[at], self.buffer[at + 1]]
    }
}

impl<L: TupleLayout> fmt::Debug for GhostButtonsStream<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GhostButtonsStream")
            .field("stream", &L::NAME)
            .field("range", &self.range)
            .field("current_sequence", &self.current_sequence)
            .field("read_sequence_frames", &self.read_sequence_frames)
            .field("state", &self.state)
            .finish()
    }
}
