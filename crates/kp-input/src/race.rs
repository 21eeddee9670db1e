//! Race-stage clock and replay session
//!
//! The race engine owns the stage machine; it reports each transition to the
//! player explicitly instead of the player looking up a global race manager.

use kp_core::config::PlaybackConfig;
use kp_core::{InvalidFramePolicy, KartpadError, Result};
use tracing::{info, trace, warn};

use crate::ghost_file::InputSection;
use crate::input_state::RaceInputState;
use crate::kpad::KPadPlayer;

/// Stages of a race, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RaceStage {
    Intro = 0,
    Countdown = 1,
    Race = 2,
    FinishLocal = 3,
    FinishGlobal = 4,
}

/// Frame-driven race-stage timers
#[derive(Debug, Clone)]
pub struct RaceClock {
    stage: RaceStage,
    intro_timer: u16,
    timer: u32,
    intro_duration: u16,
    countdown_duration: u16,
}

impl RaceClock {
    pub fn new(intro_duration: u16, countdown_duration: u16) -> Self {
        Self {
            stage: RaceStage::Intro,
            intro_timer: 0,
            timer: 0,
            intro_duration,
            countdown_duration,
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self::new(config.intro_duration, config.countdown_duration)
    }

    /// Advance one frame. Returns the stage just entered, if any.
    pub fn calc(&mut self) -> Option<RaceStage> {
        match self.stage {
            RaceStage::Intro => {
                self.intro_timer += 1;
                if self.intro_timer >= self.intro_duration {
                    return Some(self.enter(RaceStage::Countdown));
                }
            }
            RaceStage::Countdown => {
                self.timer += 1;
                if self.timer >= self.countdown_duration as u32 {
                    return Some(self.enter(RaceStage::Race));
                }
            }
            RaceStage::Race => self.timer += 1,
            RaceStage::FinishLocal | RaceStage::FinishGlobal => {}
        }
        None
    }

    /// Jump straight to the countdown
    pub fn skip_intro(&mut self) -> Option<RaceStage> {
        (self.stage == RaceStage::Intro).then(|| self.enter(RaceStage::Countdown))
    }

    /// The local player crossed the finish line
    pub fn finish(&mut self) -> Option<RaceStage> {
        (self.stage == RaceStage::Race).then(|| self.enter(RaceStage::FinishLocal))
    }

    /// Every player has finished
    pub fn finish_global(&mut self) -> Option<RaceStage> {
        (self.stage == RaceStage::FinishLocal).then(|| self.enter(RaceStage::FinishGlobal))
    }

    fn enter(&mut self, stage: RaceStage) -> RaceStage {
        info!("Race stage {:?} -> {:?}", self.stage, stage);
        if stage == RaceStage::Countdown {
            self.timer = 0;
        }
        self.stage = stage;
        stage
    }

    pub fn stage(&self) -> RaceStage {
        self.stage
    }

    pub fn is_stage_reached(&self, stage: RaceStage) -> bool {
        self.stage >= stage
    }

    /// Frames left in the countdown; zero or negative once racing
    pub fn countdown_timer(&self) -> i32 {
        self.countdown_duration as i32 - self.timer as i32
    }

    /// Frames since the countdown began
    pub fn timer(&self) -> u32 {
        self.timer
    }
}

/// Drives one player's ghost replay frame by frame.
///
/// The player is not polled during the intro, so the first recorded frame
/// lines up with the first countdown frame.
#[derive(Debug)]
pub struct ReplaySession {
    player: KPadPlayer,
    clock: RaceClock,
    policy: InvalidFramePolicy,
    trace_frames: bool,
    frame: u32,
    input_frame: u32,
}

impl ReplaySession {
    pub fn new(player: KPadPlayer, clock: RaceClock, policy: InvalidFramePolicy) -> Self {
        Self {
            player,
            clock,
            policy,
            trace_frames: false,
            frame: 0,
            input_frame: 0,
        }
    }

    /// Build a session replaying `section` under the playback settings
    pub fn from_config(section: InputSection, config: &PlaybackConfig) -> Result<Self> {
        if config.validate_on_load {
            section.validate()?;
        }

        let mut player = KPadPlayer::new();
        player.set_ghost_section(section, config.drift_is_auto);
        Ok(Self::new(
            player,
            RaceClock::from_config(config),
            config.invalid_frame_policy,
        ))
    }

    /// Log every polled state at trace level
    pub fn with_frame_tracing(mut self, enabled: bool) -> Self {
        self.trace_frames = enabled;
        self
    }

    /// Skip the intro and open the replay gate now
    pub fn skip_intro(&mut self) {
        if let Some(stage) = self.clock.skip_intro() {
            self.player.on_stage_changed(stage);
        }
    }

    /// Run one simulation tick and return the player's current state
    pub fn tick(&mut self) -> Result<&RaceInputState> {
        self.frame += 1;

        if self.clock.is_stage_reached(RaceStage::Countdown) {
            self.player.calc();
            self.check_frame()?;
            self.input_frame += 1;
        }

        if let Some(stage) = self.clock.calc() {
            self.player.on_stage_changed(stage);
        }

        Ok(self.player.current_state())
    }

    fn check_frame(&self) -> Result<()> {
        let state = self.player.current_state();
        if self.trace_frames {
            trace!("Input frame {}: {:?}", self.input_frame, state);
        }

        let valid = self
            .player
            .pad()
            .controller()
            .map_or(true, |controller| controller.is_frame_valid());
        if valid {
            return Ok(());
        }

        match self.policy {
            InvalidFramePolicy::Ignore => Ok(()),
            InvalidFramePolicy::Warn => {
                warn!("Invalid input on frame {}: {:?}", self.input_frame, state);
                Ok(())
            }
            InvalidFramePolicy::Abort => Err(KartpadError::InvalidFrame {
                frame: self.input_frame,
            }),
        }
    }

    /// The local player finished; stop publishing ghost input
    pub fn finish(&mut self) {
        if let Some(stage) = self.clock.finish() {
            self.player.on_stage_changed(stage);
        }
    }

    /// The attached ghost has played out
    pub fn is_finished(&self) -> bool {
        self.player.is_ghost_finished()
    }

    /// Ticks run so far
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Ticks on which the player was polled
    pub fn input_frame(&self) -> u32 {
        self.input_frame
    }

    pub fn stage(&self) -> RaceStage {
        self.clock.stage()
    }

    pub fn clock(&self) -> &RaceClock {
        &self.clock
    }

    pub fn player(&self) -> &KPadPlayer {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut KPadPlayer {
        &mut self.player
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(face: &[[u8; 2]], direction: &[[u8; 2]]) -> InputSection {
        let mut bytes = Vec::new();
        for count in [face.len(), direction.len(), 0, 0] {
            bytes.extend_from_slice(&(count as u16).to_be_bytes());
        }
        for tuple in face.iter().chain(direction) {
            bytes.extend_from_slice(tuple);
        }
        InputSection::from_bytes(&bytes).unwrap()
    }

    fn config(intro: u16, countdown: u16, policy: InvalidFramePolicy) -> PlaybackConfig {
        PlaybackConfig {
            intro_duration: intro,
            countdown_duration: countdown,
            invalid_frame_policy: policy,
            ..PlaybackConfig::default()
        }
    }

    #[test]
    fn test_clock_stages() {
        let mut clock = RaceClock::new(2, 3);
        assert_eq!(clock.calc(), None);
        assert_eq!(clock.calc(), Some(RaceStage::Countdown));
        assert_eq!(clock.countdown_timer(), 3);
        assert_eq!(clock.calc(), None);
        assert_eq!(clock.calc(), None);
        assert_eq!(clock.calc(), Some(RaceStage::Race));
        assert!(clock.is_stage_reached(RaceStage::Countdown));
        assert!(!clock.is_stage_reached(RaceStage::FinishLocal));

        clock.calc();
        assert_eq!(clock.countdown_timer(), -1);

        assert_eq!(clock.finish(), Some(RaceStage::FinishLocal));
        assert_eq!(clock.finish(), None);
        assert_eq!(clock.finish_global(), Some(RaceStage::FinishGlobal));
    }

    #[test]
    fn test_session_waits_for_countdown() {
        let section = section(&[[0x01, 2], [0x02, 2]], &[[0x77, 4]]);
        let mut session =
            ReplaySession::from_config(section, &config(3, 240, InvalidFramePolicy::Abort))
                .unwrap();

        for _ in 0..3 {
            assert_eq!(*session.tick().unwrap(), RaceInputState::new());
        }
        assert_eq!(session.stage(), RaceStage::Countdown);
        assert_eq!(session.input_frame(), 0);

        assert!(session.tick().unwrap().accelerate());
        assert!(session.tick().unwrap().accelerate());
        assert!(session.tick().unwrap().brake());
        assert_eq!(session.input_frame(), 3);
        assert_eq!(session.frame(), 6);
    }

    #[test]
    fn test_session_skip_intro_and_finish() {
        let section = section(&[[0x01, 5]], &[[0x77, 5]]);
        let mut session =
            ReplaySession::from_config(section, &config(100, 1, InvalidFramePolicy::Abort))
                .unwrap();
        session.skip_intro();

        assert!(session.tick().unwrap().accelerate());
        assert_eq!(session.stage(), RaceStage::Race);

        session.finish();
        assert_eq!(session.stage(), RaceStage::FinishLocal);
        assert!(!session.tick().unwrap().accelerate());
        assert!(!session.is_finished());

        for _ in 0..4 {
            session.tick().unwrap();
        }
        assert!(session.is_finished());
    }

    #[test]
    fn test_invalid_frame_policies() {
        let bad = || section(&[[0x01, 1]], &[[0xF7, 1]]);
        let no_validate = |policy| PlaybackConfig {
            validate_on_load: false,
            ..config(0, 240, policy)
        };

        assert!(
            ReplaySession::from_config(bad(), &config(0, 240, InvalidFramePolicy::Warn)).is_err()
        );

        let mut session =
            ReplaySession::from_config(bad(), &no_validate(InvalidFramePolicy::Warn)).unwrap();
        session.tick().unwrap();
        assert!(session.tick().is_ok());

        let mut session =
            ReplaySession::from_config(bad(), &no_validate(InvalidFramePolicy::Abort)).unwrap();
        session.tick().unwrap();
        assert!(matches!(
            session.tick(),
            Err(KartpadError::InvalidFrame { frame: 0 })
        ));
    }
}
