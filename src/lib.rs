#![no_std]
pub mod angle;
pub mod controller;
pub mod modulation;
pub mod pid;
pub mod speed;
pub mod transforms;

pub use controller::{ControlState, Controller, ControllerConfig, Direction};
pub use modulation::PhaseDuties;

pub const SQRT_3: f32 = 1.732_050_8;
pub const FRAC_1_SQRT_3: f32 = 0.577_350_26;

/// Counts per revolution of a 12 bit magnetic encoder
pub const DEFAULT_RESOLUTION: u32 = 4096;
pub const DEFAULT_CARRIER_PERIOD: u16 = 1000;
/// Volts
pub const DEFAULT_MAX_VOLTAGE: f32 = 12.;
/// Nominal rate at which the scheduler should call [`Controller::tick`]
pub const DEFAULT_CONTROL_RATE_HZ: u32 = 1000;
