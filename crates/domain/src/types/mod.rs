//! Domain data types

pub mod device;
pub mod mower;
pub mod session;

pub use device::{DeviceRecord, DeviceStatus, MowerSnapshot};
pub use mower::{MowerCommand, MowerState, UnknownCommand};
pub use session::{ApiGeneration, AuthPhase, AuthState, RestoredAuth, Session};
