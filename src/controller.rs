//! Closed-loop speed control from a single absolute position sensor, without
//! current feedback.
//!
//! Every tick the rotor angle is read, speed is estimated from the change in
//! angle, and the speed regulator's output sets the amplitude of a voltage
//! vector placed at the rotor's electrical angle. The vector is modulated
//! into three PWM compare values.
use core::fmt;

use crate::angle::{self, AngleTracker};
use crate::modulation::{self, PhaseDuties};
use crate::pid::{self, Pi};
use crate::speed;
use crate::transforms::{self, AlphaBeta, DirectQuadrature, PhaseVoltages};

/// Absolute rotary position sensor, e.g. a magnetic encoder on a serial bus.
pub trait AngleSensor {
    type Error: fmt::Debug;
    /// Latest raw angle, already reduced to `[0, resolution)`.
    ///
    /// Must return within a bounded time, failures are reported rather than
    /// retried.
    fn read_raw_angle(&mut self) -> Result<u16, Self::Error>;
}

/// Three-phase PWM stage. Compare values are in `[0, carrier period]`.
pub trait PwmOutput {
    fn set_duties(&mut self, duties: PhaseDuties);
    fn enable_output(&mut self);
    fn disable_output(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// The angle could not be read. Nothing was emitted for the tick and the
    /// previous duties stay applied.
    Sensor(E),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Sensor(e) => write!(f, "angle sensor read failed: {:?}", e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Must be a power of two in `4..=65536`
    Resolution(u32),
    CarrierPeriod,
    MaxVoltage(f32),
    PolePairs,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Resolution(r) => write!(f, "invalid sensor resolution: {}", r),
            ConfigError::CarrierPeriod => write!(f, "carrier period must be nonzero"),
            ConfigError::MaxVoltage(v) => write!(f, "invalid maximum voltage: {}", v),
            ConfigError::PolePairs => write!(f, "pole pairs must be nonzero"),
        }
    }
}

/// Read-only copy of the controller state for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlState {
    pub enabled: bool,
    pub direction: Direction,
    /// RPM
    pub speed_reference: f32,
    /// RPM, as estimated on the last tick
    pub speed_actual: f32,
    /// Volts, amplitude of the applied vector
    pub voltage_reference: f32,
    pub raw_angle: u16,
    pub turns: i32,
    /// Radians, electrical
    pub theta: f32,
    pub stationary: AlphaBeta,
    pub rotating: DirectQuadrature,
    pub duties: PhaseDuties,
}

/// Speed controller driving one motor.
///
/// Owns the only long-lived control state: the speed regulator and the angle
/// tracker. Every method takes `&mut self`, so calls from another execution
/// context than the tick (e.g. a console changing the reference) need the
/// controller behind a mutex shared with the tick handler.
#[derive(Debug)]
pub struct Controller<S, O> {
    sensor: S,
    output: O,
    carrier_period: u16,
    max_voltage: f32,
    pole_pairs: u32,
    tracker: AngleTracker,
    speed_pid: Pi,
    // Records the timestamp of the previous successful tick
    prev_us: Option<u32>,
    state: ControlState,
}

impl<S: AngleSensor, O: PwmOutput> Controller<S, O> {
    pub fn enable(&mut self) {
        if self.state.enabled {
            log::debug!("Controller already enabled");
            return;
        }
        log::info!("Enabling controller");
        self.speed_pid.reset();
        self.tracker.reseed();
        self.prev_us = None;
        self.state.enabled = true;
        self.output.enable_output();
    }

    pub fn disable(&mut self) {
        if !self.state.enabled {
            log::debug!("Controller already disabled");
            return;
        }
        log::info!("Disabling controller");
        self.state.enabled = false;
        self.output.disable_output();
        self.apply_neutral();
    }

    /// Sets a new speed reference in RPM, restarting the regulator.
    pub fn set_reference(&mut self, speed_rpm: f32, direction: Direction) {
        log::info!("New reference: {} RPM, {:?}", speed_rpm, direction);
        self.state.speed_reference = speed_rpm;
        self.state.direction = direction;
        self.speed_pid.reset();
    }

    /// Runs one control period. `timestamp_us` is a free running, wrapping
    /// microsecond clock.
    ///
    /// Returns the emitted duties, or `None` while disabled.
    pub fn tick(&mut self, timestamp_us: u32) -> Result<Option<PhaseDuties>, Error<S::Error>> {
        if !self.state.enabled {
            return Ok(None);
        }

        let raw = match self.sensor.read_raw_angle() {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Angle read failed: {:?}, holding {:?}", e, self.state.duties);
                return Err(Error::Sensor(e));
            }
        };

        let dt_us = self
            .prev_us
            .map(|prev_us| timestamp_us.wrapping_sub(prev_us))
            .unwrap_or(0);
        self.prev_us = Some(timestamp_us);

        let resolution = self.tracker.resolution();
        let delta = self.tracker.update(raw);
        let speed_actual = speed::speed_rpm(delta, dt_us, resolution);
        let theta = angle::electrical_angle(raw, resolution, self.pole_pairs);

        let regulated = self
            .speed_pid
            .update(self.state.speed_reference - speed_actual);
        let voltage_reference = regulated.clamp(0., self.max_voltage);
        if voltage_reference != regulated {
            log::debug!("Voltage limiter triggered: {}", regulated);
        }

        let stationary =
            transforms::clarke(PhaseVoltages::synthesize(voltage_reference, theta));
        let duties = modulation::space_vector_modulation(stationary, self.carrier_period);
        self.output.set_duties(duties);

        log::debug!(
            "Tick: angle {}, speed {} RPM, voltage {}, duties {:?}",
            raw,
            speed_actual,
            voltage_reference,
            duties
        );

        self.state = ControlState {
            speed_actual,
            voltage_reference,
            raw_angle: raw,
            turns: self.tracker.turns(),
            theta,
            stationary,
            rotating: transforms::park(stationary, theta),
            duties,
            ..self.state
        };
        Ok(Some(duties))
    }

    pub fn snapshot(&self) -> ControlState {
        self.state
    }

    pub fn speed_regulator(&self) -> &Pi {
        &self.speed_pid
    }

    pub fn tracker(&self) -> &AngleTracker {
        &self.tracker
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Disarms the output and hands the collaborators back.
    pub fn release(mut self) -> (S, O) {
        self.disable();
        (self.sensor, self.output)
    }

    fn apply_neutral(&mut self) {
        let neutral = PhaseDuties::neutral(self.carrier_period);
        self.output.set_duties(neutral);
        self.state.duties = neutral;
        self.state.voltage_reference = 0.;
        self.state.stationary = AlphaBeta::default();
        self.state.rotating = DirectQuadrature::default();
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    resolution: u32,
    carrier_period: u16,
    max_voltage: f32,
    pole_pairs: u32,
    speed_consts: pid::Constants,
    speed_limits: pid::Limits,
}

impl ControllerConfig {
    pub fn new() -> Self {
        ControllerConfig {
            resolution: crate::DEFAULT_RESOLUTION,
            carrier_period: crate::DEFAULT_CARRIER_PERIOD,
            max_voltage: crate::DEFAULT_MAX_VOLTAGE,
            pole_pairs: 1,
            speed_consts: pid::Constants { kp: 0.1, ki: 0.01 },
            speed_limits: pid::Limits::symmetric(10.),
        }
    }
    /// Realize a disabled `Controller` from the configuration
    pub fn realize<S: AngleSensor, O: PwmOutput>(
        &self,
        sensor: S,
        output: O,
    ) -> Result<Controller<S, O>, ConfigError> {
        if !self.resolution.is_power_of_two() || !(4..=65536).contains(&self.resolution) {
            return Err(ConfigError::Resolution(self.resolution));
        }
        if self.carrier_period == 0 {
            return Err(ConfigError::CarrierPeriod);
        }
        if !(self.max_voltage.is_finite() && self.max_voltage > 0.) {
            return Err(ConfigError::MaxVoltage(self.max_voltage));
        }
        if self.pole_pairs == 0 {
            return Err(ConfigError::PolePairs);
        }

        let mut controller = Controller {
            sensor,
            output,
            carrier_period: self.carrier_period,
            max_voltage: self.max_voltage,
            pole_pairs: self.pole_pairs,
            tracker: AngleTracker::new(self.resolution),
            speed_pid: Pi::new(self.speed_consts, self.speed_limits),
            prev_us: None,
            state: ControlState::default(),
        };
        controller.output.disable_output();
        controller.apply_neutral();
        Ok(controller)
    }
    pub fn set_resolution(&mut self, resolution: u32) -> &mut Self {
        self.resolution = resolution;
        self
    }
    pub fn set_carrier_period(&mut self, carrier_period: u16) -> &mut Self {
        self.carrier_period = carrier_period;
        self
    }
    pub fn set_max_voltage(&mut self, max_voltage: f32) -> &mut Self {
        self.max_voltage = max_voltage;
        self
    }
    pub fn set_pole_pairs(&mut self, pole_pairs: u32) -> &mut Self {
        self.pole_pairs = pole_pairs;
        self
    }
    pub fn set_speed_consts(&mut self, speed_consts: pid::Constants) -> &mut Self {
        self.speed_consts = speed_consts;
        self
    }
    pub fn set_speed_limits(&mut self, speed_limits: pid::Limits) -> &mut Self {
        self.speed_limits = speed_limits;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoSensor;

    impl AngleSensor for NoSensor {
        type Error = ();
        fn read_raw_angle(&mut self) -> Result<u16, ()> {
            Err(())
        }
    }

    #[derive(Default)]
    struct NullPwm {
        enabled: bool,
        duties: PhaseDuties,
    }

    impl PwmOutput for NullPwm {
        fn set_duties(&mut self, duties: PhaseDuties) {
            self.duties = duties;
        }
        fn enable_output(&mut self) {
            self.enabled = true;
        }
        fn disable_output(&mut self) {
            self.enabled = false;
        }
    }

    #[test]
    fn invalid_configs_rejected() {
        let realize = |config: &ControllerConfig| {
            config
                .realize(NoSensor, NullPwm::default())
                .map(|_| ())
                .unwrap_err()
        };
        assert_eq!(
            realize(ControllerConfig::new().set_resolution(4000)),
            ConfigError::Resolution(4000)
        );
        assert_eq!(
            realize(ControllerConfig::new().set_resolution(131072)),
            ConfigError::Resolution(131072)
        );
        assert_eq!(
            realize(ControllerConfig::new().set_carrier_period(0)),
            ConfigError::CarrierPeriod
        );
        assert_eq!(
            realize(ControllerConfig::new().set_max_voltage(-1.)),
            ConfigError::MaxVoltage(-1.)
        );
        assert_eq!(
            realize(ControllerConfig::new().set_pole_pairs(0)),
            ConfigError::PolePairs
        );
    }

    #[test]
    fn starts_disabled_and_neutral() {
        let mut controller = ControllerConfig::new()
            .realize(NoSensor, NullPwm::default())
            .unwrap();
        assert!(!controller.output().enabled);
        assert_eq!(controller.output().duties, PhaseDuties::neutral(1000));
        assert!(!controller.snapshot().enabled);
        // Disabled ticks never touch the sensor
        assert_eq!(controller.tick(0), Ok(None));
    }

    #[test]
    fn sensor_failure_is_reported() {
        let mut controller = ControllerConfig::new()
            .realize(NoSensor, NullPwm::default())
            .unwrap();
        controller.enable();
        assert!(controller.output().enabled);
        assert_eq!(controller.tick(0), Err(Error::Sensor(())));
        assert_eq!(controller.output().duties, PhaseDuties::neutral(1000));
    }

    #[test]
    fn reference_resets_regulator() {
        let mut controller = ControllerConfig::new()
            .realize(NoSensor, NullPwm::default())
            .unwrap();
        controller.set_reference(250., Direction::Reverse);
        let state = controller.snapshot();
        assert_eq!(state.speed_reference, 250.);
        assert_eq!(state.direction, Direction::Reverse);
        assert_eq!(controller.speed_regulator().integral(), 0.);
    }
}
