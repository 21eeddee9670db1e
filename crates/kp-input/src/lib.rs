//! Controller input for kartpad
//!
//! Normalizes live, ghost-replay and host-driven input into one
//! [`RaceInputState`] per frame:
//! - [`ghost_file`]: the uncompressed ghost input-data section
//! - [`ghost_stream`]: run-length decoders for the three ghost sub-streams
//! - [`controller`]: the controller variants
//! - [`kpad`]: current/last state holders consumed by the race engine
//! - [`race`]: race-stage clock and the replay session driver

pub mod controller;
pub mod ghost_file;
pub mod ghost_stream;
pub mod input_state;
pub mod kpad;
pub mod race;

pub use controller::{
    ControlSource, ControllerKind, GhostController, HostController, KPadController,
    LiveController, NullPadBackend, PadBackend,
};
pub use ghost_file::{GhostBuffer, InputSection, RKG_UNCOMPRESSED_INPUT_DATA_SECTION_SIZE};
pub use ghost_stream::{
    DirectionStream, FaceButtonsStream, GhostButtonsStream, StreamState, TrickStream,
};
pub use input_state::{Buttons, RaceInputState, Trick, Vector2f};
pub use kpad::{KPad, KPadPlayer};
pub use race::{RaceClock, RaceStage, ReplaySession};
