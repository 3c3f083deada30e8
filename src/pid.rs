#[derive(Clone, Copy, Debug)]
pub struct Constants {
    pub kp: f32,
    pub ki: f32,
}

impl Constants {
    pub fn new(kp: f32, ki: f32) -> Self {
        Constants { kp, ki }
    }
}

/// Output range of a regulator, also used to bound the accumulator
/// (anti-windup).
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub min: f32,
    pub max: f32,
    // Block construction so ordering can be upheld
    _private: (),
}

impl Limits {
    /// # Panics
    /// If `min` is greater than `max` or either bound is NaN.
    pub fn new(min: f32, max: f32) -> Self {
        if !(min <= max) {
            log::error!("Invalid regulator limit ordering");
            panic!();
        }
        Limits {
            min,
            max,
            _private: (),
        }
    }

    pub fn symmetric(magnitude: f32) -> Self {
        Limits::new(-magnitude, magnitude)
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Proportional-integral regulator.
///
/// The integral term is clamped to the output limits on its own before the
/// proportional term is added, and the sum is clamped again.
#[derive(Clone, Copy, Debug)]
pub struct Pi {
    constants: Constants,
    limits: Limits,
    accumulator: f32,
    last_error: f32,
    // The output calculated from the last update
    output: f32,
}

impl Pi {
    pub fn new(constants: Constants, limits: Limits) -> Self {
        Pi {
            constants,
            limits,
            accumulator: 0.,
            last_error: 0.,
            output: 0.,
        }
    }

    /// Run one step for `err = setpoint - measurement` and return the output.
    pub fn update(&mut self, err: f32) -> f32 {
        let Constants { kp, ki } = self.constants;

        let proportional = kp * err;
        self.accumulator += ki * err;
        if self.accumulator > self.limits.max || self.accumulator < self.limits.min {
            log::debug!("Accumulator limiter triggered");
            self.accumulator = self.limits.clamp(self.accumulator);
        }

        self.output = self.limits.clamp(proportional + self.accumulator);
        self.last_error = err;
        self.output
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.;
        self.last_error = 0.;
        self.output = 0.;
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn integral(&self) -> f32 {
        self.accumulator
    }

    pub fn last_error(&self) -> f32 {
        self.last_error
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }
}
