//! Mower state model and the closed command set

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::CHARGE_STATE_CHARGING;

/// Normalized mower activity handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MowerState {
    /// Docked or parked, not working
    #[default]
    Idle,
    /// Cutting grass
    Mowing,
    /// Docked and charging
    Charging,
    /// Heading back to the dock
    Returning,
    /// Job paused by the owner
    Paused,
    /// Stopped on a fault
    Error,
    /// Only produced by the device-offline failure path
    Offline,
}

impl MowerState {
    /// Map a vendor work-state code. Unknown codes are `Idle`.
    pub const fn from_work_state(code: i64) -> Self {
        match code {
            1 => Self::Mowing,
            2 => Self::Charging,
            3 => Self::Returning,
            4 => Self::Paused,
            5 => Self::Error,
            _ => Self::Idle,
        }
    }

    /// Combine work-state and charge-state codes into one state.
    ///
    /// Work-state wins when present. Without it, a charging charge-state
    /// means `Charging`; anything else is `Idle`.
    pub const fn normalize(work_state: Option<i64>, charge_state: Option<i64>) -> Self {
        match (work_state, charge_state) {
            (Some(code), _) => Self::from_work_state(code),
            (None, Some(CHARGE_STATE_CHARGING)) => Self::Charging,
            (None, _) => Self::Idle,
        }
    }

    /// Lowercase name used in logs and serialized snapshots.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Mowing => "mowing",
            Self::Charging => "charging",
            Self::Returning => "returning",
            Self::Paused => "paused",
            Self::Error => "error",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for MowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands accepted by `sendCommand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MowerCommand {
    /// Begin a mowing job
    Start,
    /// Pause the current job
    Pause,
    /// Continue a paused job
    Resume,
    /// End the current job
    Stop,
    /// Drive back to the dock
    ReturnToDock,
}

impl MowerCommand {
    /// Every command, in declaration order.
    pub const ALL: [Self; 5] =
        [Self::Start, Self::Pause, Self::Resume, Self::Stop, Self::ReturnToDock];

    /// Thing-model service identifier invoked for this command.
    pub const fn service_identifier(self) -> &'static str {
        match self {
            Self::Start => "startMowing",
            Self::Pause => "pauseMowing",
            Self::Resume => "resumeMowing",
            Self::Stop => "stopMowing",
            Self::ReturnToDock => "returnToDock",
        }
    }
}

impl fmt::Display for MowerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_identifier())
    }
}

/// A command name outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mower command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for MowerCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" | "startMowing" => Ok(Self::Start),
            "pause" | "pauseMowing" => Ok(Self::Pause),
            "resume" | "resumeMowing" => Ok(Self::Resume),
            "stop" | "stopMowing" => Ok(Self::Stop),
            "return_to_dock" | "returnToDock" | "dock" => Ok(Self::ReturnToDock),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}
