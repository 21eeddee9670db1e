//! Per-frame race input state

use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// Decoded race buttons
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Buttons: u16 {
        const ACCELERATE = 0x0001;
        const BRAKE      = 0x0002;
        const ITEM       = 0x0004;
        /// Brake pressed after accelerate. Registers a hop even without ACCELERATE.
        const DRIFT      = 0x0008;
    }
}

/// Raw stick code for a centered axis
pub const STICK_NEUTRAL_RAW: u8 = 7;
/// Largest raw stick code that maps into [-1, 1]
pub const STICK_RAW_MAX: u8 = 14;

/// D-pad trick direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Trick {
    #[default]
    None = 0,
    /// Also starts a wheelie on bikes
    Up = 1,
    Down = 2,
    Left = 3,
    Right = 4,
}

impl Trick {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Up),
            2 => Some(Self::Down),
            3 => Some(Self::Left),
            4 => Some(Self::Right),
            _ => None,
        }
    }
}

/// Normalized 2D stick position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vector2f {
    pub x: f32,
    pub y: f32,
}

impl Vector2f {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Map a raw stick code onto [-1, 1]. Codes above 14 land outside the range.
pub fn stick_from_raw(raw: u8) -> f32 {
    raw as f32 / 7.0 - 1.0
}

/// Quantize a normalized stick value to its raw code, if it is in range.
pub fn stick_to_raw(value: f32) -> Option<u8> {
    if !(-1.0..=1.0).contains(&value) {
        return None;
    }
    Some((value * 7.0 + 7.0).round() as u8)
}

/// A set of controller inputs for one frame.
///
/// The decoded fields (`buttons`, `stick`, `trick`) are always recomputed from
/// the raw fields; nothing writes them independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RaceInputState {
    buttons: u16,
    buttons_raw: u16,
    stick: Vector2f,
    stick_x_raw: u8,
    stick_y_raw: u8,
    trick: Trick,
    trick_raw: u8,
}

impl Default for RaceInputState {
    fn default() -> Self {
        Self::new()
    }
}

impl RaceInputState {
    /// Neutral state: no buttons, centered stick, no trick
    pub const fn new() -> Self {
        Self {
            buttons: 0,
            buttons_raw: 0,
            stick: Vector2f::ZERO,
            stick_x_raw: STICK_NEUTRAL_RAW,
            stick_y_raw: STICK_NEUTRAL_RAW,
            trick: Trick::None,
            trick_raw: 0,
        }
    }

    /// Build a state from raw values, decoding everything else
    pub fn from_raw(buttons_raw: u16, stick_x_raw: u8, stick_y_raw: u8, trick_raw: u8) -> Self {
        let mut state = Self::new();
        state.set_raw(buttons_raw, stick_x_raw, stick_y_raw, trick_raw);
        state
    }

    /// Replace the raw values and re-decode
    pub fn set_raw(&mut self, buttons_raw: u16, stick_x_raw: u8, stick_y_raw: u8, trick_raw: u8) {
        self.buttons_raw = buttons_raw;
        self.buttons = buttons_raw & Buttons::all().bits();
        self.stick_x_raw = stick_x_raw;
        self.stick_y_raw = stick_y_raw;
        self.stick = Vector2f::new(stick_from_raw(stick_x_raw), stick_from_raw(stick_y_raw));
        self.trick_raw = trick_raw;
        self.trick = Trick::from_raw(trick_raw).unwrap_or_default();
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_valid(&self) -> bool {
        self.is_buttons_valid()
            && self.is_stick_valid(self.stick.x)
            && self.is_stick_valid(self.stick.y)
            && self.is_trick_valid()
    }

    /// No bits outside the recognized button mask
    pub fn is_buttons_valid(&self) -> bool {
        self.buttons_raw & !Buttons::all().bits() == 0
    }

    /// In [-1, 1] and exactly on one of the 15 quantization steps
    pub fn is_stick_valid(&self, stick: f32) -> bool {
        match stick_to_raw(stick) {
            Some(raw) => stick_from_raw(raw) == stick,
            None => false,
        }
    }

    pub fn is_trick_valid(&self) -> bool {
        Trick::from_raw(self.trick_raw).is_some()
    }

    pub fn buttons(&self) -> Buttons {
        Buttons::from_bits_truncate(self.buttons)
    }

    pub fn buttons_raw(&self) -> u16 {
        self.buttons_raw
    }

    pub fn stick(&self) -> Vector2f {
        self.stick
    }

    pub fn stick_x_raw(&self) -> u8 {
        self.stick_x_raw
    }

    pub fn stick_y_raw(&self) -> u8 {
        self.stick_y_raw
    }

    pub fn trick(&self) -> Trick {
        self.trick
    }

    pub fn trick_raw(&self) -> u8 {
        self.trick_raw
    }

    pub fn accelerate(&self) -> bool {
        self.buttons().contains(Buttons::ACCELERATE)
    }

    pub fn brake(&self) -> bool {
        self.buttons().contains(Buttons::BRAKE)
    }

    pub fn item(&self) -> bool {
        self.buttons().contains(Buttons::ITEM)
    }

    pub fn drift(&self) -> bool {
        self.buttons().contains(Buttons::DRIFT)
    }

    pub fn trick_up(&self) -> bool {
        self.trick == Trick::Up
    }

    pub fn trick_down(&self) -> bool {
        self.trick == Trick::Down
    }
}
