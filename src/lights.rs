use rand::Rng;
use std::time::Duration;

/// Bounds of the random wait before the red light, in milliseconds (max exclusive)
pub const PRE_DELAY_MIN_MS: u64 = 400;
pub const PRE_DELAY_MAX_MS: u64 = 900;

pub const SET_DELAY: Duration = Duration::from_millis(500);
pub const HOLD_DELAY: Duration = Duration::from_millis(400);
pub const GO_DELAY: Duration = Duration::from_millis(400);

/// On/off state of the three start lights
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lights {
    pub red: bool,
    pub amber: bool,
    pub green: bool,
}

impl Lights {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_dark(&self) -> bool {
        !(self.red || self.amber || self.green)
    }
}

/// A step of the start sequence, reached after a scheduled delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Ready,
    Set,
    Hold,
    Go,
}

impl Phase {
    /// The phase that follows this one and how long to wait for it
    pub fn next(self) -> Option<(Phase, Duration)> {
        match self {
            Phase::Ready => Some((Phase::Set, SET_DELAY)),
            Phase::Set => Some((Phase::Hold, HOLD_DELAY)),
            Phase::Hold => Some((Phase::Go, GO_DELAY)),
            Phase::Go => None,
        }
    }

    pub fn apply(self, lights: &mut Lights) {
        match self {
            Phase::Ready => lights.red = true,
            Phase::Set => {
                lights.red = false;
                lights.amber = true;
            }
            Phase::Hold => {
                // amber is dropped and re-lit in the same step
                lights.amber = false;
                lights.amber = true;
            }
            Phase::Go => {
                lights.amber = false;
                lights.green = true;
            }
        }
    }

    /// Status label shown when entering this phase; Hold keeps the previous one
    pub fn status(self) -> Option<&'static str> {
        match self {
            Phase::Ready => Some("Ready…"),
            Phase::Set => Some("Set…"),
            Phase::Hold => None,
            Phase::Go => Some("GO !"),
        }
    }
}

/// Random wait between arming and the red light
pub fn pre_delay<R: Rng + ?Sized>(rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(PRE_DELAY_MIN_MS..PRE_DELAY_MAX_MS))
}
