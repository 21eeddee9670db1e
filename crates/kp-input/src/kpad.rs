//! KPad: the input view handed to the race engine

use kp_core::GhostError;
use tracing::{debug, info};

use crate::controller::{HostController, KPadController, PadBackend};
use crate::ghost_file::{GhostBuffer, InputSection};
use crate::input_state::RaceInputState;
use crate::race::RaceStage;

/// Holds a controller plus the current and previous input state.
///
/// `last_state` is always what `current_state` was before the latest
/// [`calc`](Self::calc), which is how the engine detects presses and releases.
#[derive(Debug, Default)]
pub struct KPad {
    controller: Option<KPadController>,
    current_input_state: RaceInputState,
    last_input_state: RaceInputState,
}

impl KPad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calc(&mut self) {
        self.last_input_state = self.current_input_state;
        if let Some(controller) = &mut self.controller {
            controller.calc();
            self.current_input_state = *controller.race_input_state();
        }
    }

    /// Clear both snapshots
    pub fn reset(&mut self) {
        self.current_input_state.reset();
        self.last_input_state.reset();
    }

    pub fn current_state(&self) -> &RaceInputState {
        &self.current_input_state
    }

    pub fn last_state(&self) -> &RaceInputState {
        &self.last_input_state
    }

    pub fn drift_is_auto(&self) -> bool {
        self.controller
            .as_ref()
            .is_some_and(KPadController::drift_is_auto)
    }

    pub fn controller(&self) -> Option<&KPadController> {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> Option<&mut KPadController> {
        self.controller.as_mut()
    }

    /// Install a controller, replacing any previous one. Only valid between races.
    pub fn set_controller(&mut self, controller: KPadController) {
        debug!("KPad controller set to {:?}", controller.control_source());
        self.controller = Some(controller);
        self.reset();
    }
}

/// KPad for a human-slot player, owning the ghost recording it replays
#[derive(Debug, Default)]
pub struct KPadPlayer {
    pad: KPad,
    ghost_buffer: Option<GhostBuffer>,
}

impl KPadPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a ghost input section and replay it through a ghost controller
    pub fn set_ghost_controller(
        &mut self,
        inputs: &[u8],
        drift_is_auto: bool,
    ) -> Result<(), GhostError> {
        let section = InputSection::from_bytes(inputs)?;
        self.set_ghost_section(section, drift_is_auto);
        Ok(())
    }

    /// Replay an already parsed (and possibly validated) section
    pub fn set_ghost_section(&mut self, section: InputSection, drift_is_auto: bool) {
        info!(
            "Loaded ghost inputs: {} frames, drift_is_auto={}",
            section.frame_count(),
            drift_is_auto
        );
        self.ghost_buffer = Some(section.buffer().clone());
        self.pad.set_controller(KPadController::ghost(section, drift_is_auto));
    }

    pub fn set_host_controller(&mut self, drift_is_auto: bool) {
        self.ghost_buffer = None;
        self.pad.set_controller(KPadController::host(drift_is_auto));
    }

    pub fn set_live_controller(&mut self, backend: Box<dyn PadBackend>, drift_is_auto: bool) {
        self.ghost_buffer = None;
        self.pad.set_controller(KPadController::live(backend, drift_is_auto));
    }

    /// Start publishing ghost input once the intro fade has finished
    pub fn start_ghost_proxy(&mut self) {
        self.set_ghost_gate(true);
    }

    /// Stop publishing ghost input once the race is over
    pub fn end_ghost_proxy(&mut self) {
        self.set_ghost_gate(false);
    }

    fn set_ghost_gate(&mut self, open: bool) {
        if let Some(ghost) = self.pad.controller_mut().and_then(KPadController::as_ghost_mut) {
            ghost.set_accepting_inputs(open);
        }
    }

    /// React to a race-stage transition reported by the race clock
    pub fn on_stage_changed(&mut self, stage: RaceStage) {
        match stage {
            RaceStage::Countdown => self.start_ghost_proxy(),
            RaceStage::FinishLocal => self.end_ghost_proxy(),
            RaceStage::Intro | RaceStage::Race | RaceStage::FinishGlobal => {}
        }
    }

    /// Whether a ghost is attached and has played out completely
    pub fn is_ghost_finished(&self) -> bool {
        self.pad
            .controller()
            .and_then(KPadController::as_ghost)
            .is_some_and(|ghost| ghost.is_finished())
    }

    pub fn ghost_buffer(&self) -> Option<&GhostBuffer> {
        self.ghost_buffer.as_ref()
    }

    pub fn host_controller_mut(&mut self) -> Option<&mut HostController> {
        self.pad
            .controller_mut()
            .and_then(KPadController::as_host_mut)
    }

    pub fn calc(&mut self) {
        self.pad.calc();
    }

    pub fn reset(&mut self) {
        self.pad.reset();
    }

    pub fn current_state(&self) -> &RaceInputState {
        self.pad.current_state()
    }

    pub fn last_state(&self) -> &RaceInputState {
        self.pad.last_state()
    }

    pub fn drift_is_auto(&self) -> bool {
        self.pad.drift_is_auto()
    }

    pub fn pad(&self) -> &KPad {
        &self.pad
    }

    pub fn pad_mut(&mut self) -> &mut KPad {
        &mut self.pad
    }
}
