//! Controller variants
//!
//! A [`KPadController`] produces one [`RaceInputState`] per tick. What feeds
//! it depends on its [`ControllerKind`]:
//! - `Ghost`: decoded from a recorded input section
//! - `Host`: injected by an external program between ticks
//! - `Live`: polled from a [`PadBackend`]

use std::fmt;

use kp_core::InputError;
use serde::Serialize;
use tracing::{debug, trace};

use crate::ghost_file::InputSection;
use crate::ghost_stream::{
    DirectionLayout, DirectionStream, FaceButtonsLayout, FaceButtonsStream, TrickLayout,
    TrickStream, TupleLayout,
};
use crate::input_state::{stick_to_raw, Buttons, RaceInputState, Trick, Vector2f, STICK_RAW_MAX};

/// Where a controller's input comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ControlSource {
    Unknown = -1,
    /// Wii Remote
    Core = 0,
    /// Wii Remote + Nunchuk
    Freestyle = 1,
    Classic = 2,
    Gamecube = 3,
    Ghost = 4,
    Ai = 5,
    /// An external program driving the player
    Host = 6,
}

/// Source of live pad input
pub trait PadBackend: fmt::Debug {
    /// Device family this backend reads
    fn control_source(&self) -> ControlSource;

    /// Sample the pad. `None` means the pad is disconnected.
    fn poll(&mut self) -> Option<RaceInputState>;
}

/// Backend reporting a connected pad that is never touched
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPadBackend;

impl PadBackend for NullPadBackend {
    fn control_source(&self) -> ControlSource {
        ControlSource::Gamecube
    }

    fn poll(&mut self) -> Option<RaceInputState> {
        Some(RaceInputState::new())
    }
}

/// Ghost playback: three sub-stream decoders over one input section
#[derive(Debug, Clone)]
pub struct GhostController {
    section: InputSection,
    face: FaceButtonsStream,
    direction: DirectionStream,
    trick: TrickStream,
    /// Decoded input is only published while set. The streams keep advancing
    /// either way so they stay on the recording's frame clock.
    accepting_inputs: bool,
}

impl GhostController {
    pub fn new(section: InputSection) -> Self {
        let buffer = section.buffer();
        Self {
            face: FaceButtonsStream::new(buffer.clone(), section.face()),
            direction: DirectionStream::new(buffer.clone(), section.direction()),
            trick: TrickStream::new(buffer.clone(), section.trick()),
            section,
            accepting_inputs: false,
        }
    }

    pub fn set_accepting_inputs(&mut self, set: bool) {
        debug!("Ghost controller accepting inputs: {}", set);
        self.accepting_inputs = set;
    }

    pub fn is_accepting_inputs(&self) -> bool {
        self.accepting_inputs
    }

    /// All three streams have played out
    pub fn is_finished(&self) -> bool {
        self.face.is_finished() && self.direction.is_finished() && self.trick.is_finished()
    }

    pub fn section(&self) -> &InputSection {
        &self.section
    }

    pub fn face_stream(&self) -> &FaceButtonsStream {
        &self.face
    }

    pub fn direction_stream(&self) -> &DirectionStream {
        &self.direction
    }

    pub fn trick_stream(&self) -> &TrickStream {
        &self.trick
    }

    fn reset(&mut self) {
        self.face.reset();
        self.direction.reset();
        self.trick.reset();
        self.accepting_inputs = false;
    }

    fn calc_impl(&mut self, state: &mut RaceInputState) {
        let buttons = self.face.read_frame().unwrap_or(FaceButtonsLayout::NEUTRAL);
        let direction = self.direction.read_frame().unwrap_or(DirectionLayout::NEUTRAL);
        let trick = self.trick.read_frame().unwrap_or(TrickLayout::NEUTRAL);

        if !self.accepting_inputs {
            state.reset();
            return;
        }

        let (stick_x, stick_y) = DirectionLayout::split(direction);
        state.set_raw(buttons as u16, stick_x, stick_y, trick);
    }
}

/// Input injected by an external program.
///
/// Every setter validates first and either replaces the whole pending state
/// or leaves it untouched.
#[derive(Debug, Clone, Default)]
pub struct HostController {
    inputs: RaceInputState,
}

impl HostController {
    pub fn new() -> Self {
        Self::default()
    }

    /// State that the next tick will publish
    pub fn inputs(&self) -> &RaceInputState {
        &self.inputs
    }

    pub fn set_inputs(&mut self, state: &RaceInputState) -> Result<(), InputError> {
        if !state.is_buttons_valid() {
            return Err(InputError::InvalidButtons(state.buttons_raw()));
        }
        let stick = state.stick();
        if !state.is_stick_valid(stick.x) || !state.is_stick_valid(stick.y) {
            return Err(InputError::StickOutOfRange {
                x: stick.x,
                y: stick.y,
            });
        }
        if !state.is_trick_valid() {
            return Err(InputError::InvalidTrick(state.trick_raw()));
        }

        self.inputs = *state;
        Ok(())
    }

    /// Stick values in [-1, 1] snap to the nearest of the 15 raw positions
    pub fn set_inputs_stick(
        &mut self,
        buttons: u16,
        stick: Vector2f,
        trick: Trick,
    ) -> Result<(), InputError> {
        self.set_inputs_xy(buttons, stick.x, stick.y, trick)
    }

    pub fn set_inputs_xy(
        &mut self,
        buttons: u16,
        stick_x: f32,
        stick_y: f32,
        trick: Trick,
    ) -> Result<(), InputError> {
        let (Some(x_raw), Some(y_raw)) = (stick_to_raw(stick_x), stick_to_raw(stick_y)) else {
            return Err(InputError::StickOutOfRange {
                x: stick_x,
                y: stick_y,
            });
        };
        self.set_inputs_raw_stick(buttons, x_raw, y_raw, trick)
    }

    /// Raw stick codes, 0 to 14 with 7 centered
    pub fn set_inputs_raw_stick(
        &mut self,
        buttons: u16,
        stick_x_raw: u8,
        stick_y_raw: u8,
        trick: Trick,
    ) -> Result<(), InputError> {
        check_buttons(buttons)?;
        if stick_x_raw > STICK_RAW_MAX || stick_y_raw > STICK_RAW_MAX {
            return Err(InputError::RawStickOutOfRange {
                x: stick_x_raw,
                y: stick_y_raw,
            });
        }

        self.inputs = RaceInputState::from_raw(buttons, stick_x_raw, stick_y_raw, trick as u8);
        Ok(())
    }

    /// Raw stick codes shifted so 0 is centered, -7 to 7
    pub fn set_inputs_raw_stick_zero_center(
        &mut self,
        buttons: u16,
        stick_x_raw: i8,
        stick_y_raw: i8,
        trick: Trick,
    ) -> Result<(), InputError> {
        const RANGE: std::ops::RangeInclusive<i8> = -7..=7;
        if !RANGE.contains(&stick_x_raw) || !RANGE.contains(&stick_y_raw) {
            return Err(InputError::CenteredStickOutOfRange {
                x: stick_x_raw,
                y: stick_y_raw,
            });
        }
        self.set_inputs_raw_stick(
            buttons,
            (stick_x_raw + 7) as u8,
            (stick_y_raw + 7) as u8,
            trick,
        )
    }

    fn reset(&mut self) {
        self.inputs.reset();
    }

    fn calc_impl(&mut self, state: &mut RaceInputState) {
        *state = self.inputs;
    }
}

fn check_buttons(buttons: u16) -> Result<(), InputError> {
    if buttons & !Buttons::all().bits() != 0 {
        return Err(InputError::InvalidButtons(buttons));
    }
    Ok(())
}

/// A physical pad behind a [`PadBackend`]
#[derive(Debug)]
pub struct LiveController {
    backend: Box<dyn PadBackend>,
}

impl LiveController {
    pub fn new(backend: Box<dyn PadBackend>) -> Self {
        Self { backend }
    }

    /// Returns whether the pad answered
    fn calc_impl(&mut self, state: &mut RaceInputState) -> bool {
        match self.backend.poll() {
            Some(polled) => {
                *state = polled;
                true
            }
            None => {
                state.reset();
                false
            }
        }
    }
}

/// Variant-specific controller data
#[derive(Debug)]
pub enum ControllerKind {
    Ghost(GhostController),
    Host(HostController),
    Live(LiveController),
}

/// A controller and the input state it produced on the last tick
#[derive(Debug)]
pub struct KPadController {
    kind: ControllerKind,
    race_input_state: RaceInputState,
    /// Whether the controller is active
    connected: bool,
    /// True for auto transmission, false for manual
    drift_is_auto: bool,
    frame_valid: bool,
}

impl KPadController {
    fn with_kind(kind: ControllerKind, drift_is_auto: bool) -> Self {
        Self {
            kind,
            race_input_state: RaceInputState::new(),
            connected: true,
            drift_is_auto,
            frame_valid: true,
        }
    }

    /// Ghost playback over an already parsed input section
    pub fn ghost(section: InputSection, drift_is_auto: bool) -> Self {
        Self::with_kind(
            ControllerKind::Ghost(GhostController::new(section)),
            drift_is_auto,
        )
    }

    pub fn host(drift_is_auto: bool) -> Self {
        Self::with_kind(ControllerKind::Host(HostController::new()), drift_is_auto)
    }

    pub fn live(backend: Box<dyn PadBackend>, drift_is_auto: bool) -> Self {
        Self::with_kind(
            ControllerKind::Live(LiveController::new(backend)),
            drift_is_auto,
        )
    }

    /// Produce this tick's input state
    pub fn calc(&mut self) {
        let state = &mut self.race_input_state;
        match &mut self.kind {
            ControllerKind::Ghost(ghost) => ghost.calc_impl(state),
            ControllerKind::Host(host) => host.calc_impl(state),
            ControllerKind::Live(live) => self.connected = live.calc_impl(state),
        }

        self.frame_valid = self.race_input_state.is_valid();
        if !self.frame_valid {
            trace!(
                "{:?} controller produced invalid state {:?}",
                self.control_source(),
                self.race_input_state
            );
        }
    }

    /// Clear per-race state and set the transmission mode
    pub fn reset(&mut self, drift_is_auto: bool) {
        self.race_input_state.reset();
        self.frame_valid = true;
        self.connected = true;
        self.drift_is_auto = drift_is_auto;
        match &mut self.kind {
            ControllerKind::Ghost(ghost) => ghost.reset(),
            ControllerKind::Host(host) => host.reset(),
            ControllerKind::Live(_) => {}
        }
    }

    pub fn control_source(&self) -> ControlSource {
        match &self.kind {
            ControllerKind::Ghost(_) => ControlSource::Ghost,
            ControllerKind::Host(_) => ControlSource::Host,
            ControllerKind::Live(live) => live.backend.control_source(),
        }
    }

    pub fn race_input_state(&self) -> &RaceInputState {
        &self.race_input_state
    }

    /// Validity of the state produced by the last [`calc`](Self::calc)
    pub fn is_frame_valid(&self) -> bool {
        self.frame_valid
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_drift_is_auto(&mut self, drift_is_auto: bool) {
        self.drift_is_auto = drift_is_auto;
    }

    pub fn drift_is_auto(&self) -> bool {
        self.drift_is_auto
    }

    pub fn kind(&self) -> &ControllerKind {
        &self.kind
    }

    pub fn as_ghost(&self) -> Option<&GhostController> {
        match &self.kind {
            ControllerKind::Ghost(ghost) => Some(ghost),
            _ => None,
        }
    }

    pub fn as_ghost_mut(&mut self) -> Option<&mut GhostController> {
        match &mut self.kind {
            ControllerKind::Ghost(ghost) => Some(ghost),
            _ => None,
        }
    }

    pub fn as_host_mut(&mut self) -> Option<&mut HostController> {
        match &mut self.kind {
            ControllerKind::Host(host) => Some(host),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(face: &[[u8; 2]], direction: &[[u8; 2]], trick: &[[u8; 2]]) -> InputSection {
        let mut bytes = Vec::new();
        for count in [face.len(), direction.len(), trick.len(), 0] {
            bytes.extend_from_slice(&(count as u16).to_be_bytes());
        }
        for tuple in face.iter().chain(direction).chain(trick) {
            bytes.extend_from_slice(tuple);
        }
        InputSection::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_ghost_composes_streams() {
        let section = section(&[[0x01, 3]], &[[0xE0, 3]], &[[0x40, 3]]);
        let mut controller = KPadController::ghost(section, false);
        controller.as_ghost_mut().unwrap().set_accepting_inputs(true);

        controller.calc();
        let state = controller.race_input_state();
        assert!(state.accelerate());
        assert_eq!(state.stick(), Vector2f::new(1.0, -1.0));
        assert_eq!(state.trick(), Trick::Right);
        assert!(controller.is_frame_valid());
        assert_eq!(controller.control_source(), ControlSource::Ghost);
    }

    #[test]
    fn test_ghost_hop_quirk() {
        let section = section(&[[0x08, 1], [0x09, 1]], &[[0x77, 2]], &[[0x00, 2]]);
        let mut controller = KPadController::ghost(section, false);
        controller.as_ghost_mut().unwrap().set_accepting_inputs(true);

        controller.calc();
        assert!(controller.race_input_state().drift());
        assert!(!controller.race_input_state().accelerate());

        controller.calc();
        assert!(controller.race_input_state().drift());
        assert!(controller.race_input_state().accelerate());
    }

    #[test]
    fn test_gated_ghost_still_consumes() {
        let section = section(&[[0x01, 2], [0x04, 2]], &[[0x77, 4]], &[[0x00, 4]]);
        let mut controller = KPadController::ghost(section, false);

        controller.calc();
        controller.calc();
        assert_eq!(*controller.race_input_state(), RaceInputState::new());
        assert_eq!(
            controller.as_ghost().unwrap().face_stream().read_sequence_frames(),
            2
        );

        controller.as_ghost_mut().unwrap().set_accepting_inputs(true);
        controller.calc();
        assert!(controller.race_input_state().item());
        assert!(!controller.race_input_state().accelerate());
    }

    #[test]
    fn test_ghost_neutral_after_exhaustion() {
        let section = section(&[[0x01, 1]], &[[0xEE, 1]], &[[0x10, 1]]);
        let mut controller = KPadController::ghost(section, false);
        controller.as_ghost_mut().unwrap().set_accepting_inputs(true);

        controller.calc();
        assert!(!controller.as_ghost().unwrap().is_finished());
        controller.calc();
        assert!(controller.as_ghost().unwrap().is_finished());
        assert_eq!(*controller.race_input_state(), RaceInputState::new());
    }

    #[test]
    fn test_ghost_reset_rewinds_and_closes_gate() {
        let section = section(&[[0x01, 1], [0x02, 1]], &[], &[]);
        let mut controller = KPadController::ghost(section, false);
        controller.as_ghost_mut().unwrap().set_accepting_inputs(true);
        controller.calc();
        controller.calc();
        assert!(controller.race_input_state().brake());

        controller.reset(true);
        assert!(controller.drift_is_auto());
        let ghost = controller.as_ghost().unwrap();
        assert!(!ghost.is_accepting_inputs());
        assert_eq!(ghost.face_stream().current_sequence(), 0);
    }

    #[test]
    fn test_invalid_ghost_frame_is_flagged() {
        let section = section(&[[0x01, 1]], &[[0xF7, 1]], &[[0x00, 1]]);
        let mut controller = KPadController::ghost(section, false);
        controller.as_ghost_mut().unwrap().set_accepting_inputs(true);
        controller.calc();
        assert!(!controller.is_frame_valid());
    }

    #[test]
    fn test_host_publishes_on_calc() {
        let mut controller = KPadController::host(false);
        controller
            .as_host_mut()
            .unwrap()
            .set_inputs_xy(0x01, -1.0, 0.0, Trick::Up)
            .unwrap();
        assert!(!controller.race_input_state().accelerate());

        controller.calc();
        let state = controller.race_input_state();
        assert!(state.accelerate());
        assert_eq!(state.stick_x_raw(), 0);
        assert_eq!(state.stick_y_raw(), 7);
        assert!(state.trick_up());
        assert_eq!(controller.control_source(), ControlSource::Host);
    }

    #[test]
    fn test_host_rejects_and_keeps_previous() {
        let mut host = HostController::new();
        host.set_inputs_raw_stick(0x02, 3, 11, Trick::Down).unwrap();
        let before = *host.inputs();

        assert_eq!(
            host.set_inputs_raw_stick(0x01, 15, 7, Trick::None),
            Err(InputError::RawStickOutOfRange { x: 15, y: 7 })
        );
        assert_eq!(
            host.set_inputs_xy(0x01, 1.5, 0.0, Trick::None),
            Err(InputError::StickOutOfRange { x: 1.5, y: 0.0 })
        );
        assert!(host.set_inputs_xy(0x01, 0.0, f32::NAN, Trick::None).is_err());
        assert_eq!(
            host.set_inputs_raw_stick_zero_center(0x01, -8, 0, Trick::None),
            Err(InputError::CenteredStickOutOfRange { x: -8, y: 0 })
        );
        assert_eq!(
            host.set_inputs_raw_stick(0x20, 7, 7, Trick::None),
            Err(InputError::InvalidButtons(0x20))
        );
        assert_eq!(
            host.set_inputs(&RaceInputState::from_raw(0, 7, 7, 6)),
            Err(InputError::InvalidTrick(6))
        );

        assert_eq!(*host.inputs(), before);
    }

    #[test]
    fn test_host_zero_center_matches_raw() {
        let mut centered = HostController::new();
        centered.set_inputs_raw_stick_zero_center(0x05, -7, 7, Trick::Left).unwrap();
        let mut raw = HostController::new();
        raw.set_inputs_raw_stick(0x05, 0, 14, Trick::Left).unwrap();
        assert_eq!(centered.inputs(), raw.inputs());
    }

    #[test]
    fn test_host_float_stick_quantizes() {
        let mut host = HostController::new();
        host.set_inputs_stick(0, Vector2f::new(0.5, -0.3), Trick::None).unwrap();
        assert_eq!(host.inputs().stick_x_raw(), 11);
        assert_eq!(host.inputs().stick_y_raw(), 5);
        assert!(host.inputs().is_valid());
    }

    #[test]
    fn test_control_source_serializes_by_name() {
        let json = serde_json::to_value(KPadController::host(false).control_source()).unwrap();
        assert_eq!(json, "Host");
    }

    #[test]
    fn test_live_controller_disconnect() {
        #[derive(Debug)]
        struct Unplugged;
        impl PadBackend for Unplugged {
            fn control_source(&self) -> ControlSource {
                ControlSource::Classic
            }
            fn poll(&mut self) -> Option<RaceInputState> {
                None
            }
        }

        let mut controller = KPadController::live(Box::new(Unplugged), false);
        controller.calc();
        assert!(!controller.is_connected());
        assert_eq!(controller.control_source(), ControlSource::Classic);

        // A new race starts out connected until the backend says otherwise
        controller.reset(false);
        assert!(controller.is_connected());
        controller.calc();
        assert!(!controller.is_connected());

        let mut controller = KPadController::live(Box::new(NullPadBackend), true);
        controller.calc();
        assert!(controller.is_connected());
        assert!(controller.is_frame_valid());
        assert!(controller.drift_is_auto());
    }
}
